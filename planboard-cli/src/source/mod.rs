//! Document sources: fetch a named workbook as bytes

pub mod graph;
pub mod local;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CLIENT_SECRET_ENV, SourceBackend, SourceConfig};

pub use graph::GraphSource;
pub use local::LocalFileSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} while fetching {path}: {message}")]
    Http {
        status: u16,
        path: String,
        message: String,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can hand over the bytes of a file by path
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Build the configured source
pub fn from_config(config: &SourceConfig) -> Result<Arc<dyn DocumentSource>> {
    let source: Arc<dyn DocumentSource> = match &config.backend {
        SourceBackend::Local { root } => Arc::new(LocalFileSource::new(root.clone())),
        SourceBackend::Graph {
            tenant_id,
            client_id,
            site_id,
            client_secret,
        } => {
            let secret = match client_secret {
                Some(secret) => secret.clone(),
                None => std::env::var(CLIENT_SECRET_ENV)
                    .with_context(|| format!("{} is not set", CLIENT_SECRET_ENV))?,
            };
            Arc::new(GraphSource::new(
                tenant_id.clone(),
                client_id.clone(),
                secret,
                site_id.clone(),
            ))
        }
    };

    log::debug!("Document source: {}", source.describe());
    Ok(source)
}
