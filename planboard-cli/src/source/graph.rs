//! SharePoint document library access through Microsoft Graph
//!
//! Uses the client-credentials flow; the access token is cached until
//! shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{DocumentSource, FetchError};

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Renew this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

pub struct GraphSource {
    http: Client,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    site_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl GraphSource {
    pub fn new(tenant_id: String, client_id: String, client_secret: String, site_id: String) -> Self {
        Self {
            http: Client::new(),
            tenant_id,
            client_id,
            client_secret,
            site_id,
            token: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", LOGIN_BASE, self.tenant_id)
    }

    fn content_url(&self, path: &str) -> String {
        format!(
            "{}/sites/{}/drive/root:/{}:/content",
            GRAPH_BASE,
            self.site_id,
            encode_path(path)
        )
    }

    async fn access_token(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        log::debug!("Requesting Graph access token for tenant {}", self.tenant_id);
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
            let message = body["error_description"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("unknown error");
            return Err(FetchError::Auth(format!("token request returned {}: {}", status, message)));
        }

        let token: TokenResponse = response.json().await?;
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(value)
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl DocumentSource for GraphSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let token = self.access_token().await?;
        let url = self.content_url(path);
        log::debug!("Downloading {}", url);

        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Drop the cached token so the next attempt asks for a new one
                *self.token.lock().await = None;
                Err(FetchError::Auth(format!("Graph returned {} for {}", status, path)))
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(path.to_string())),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(FetchError::Http {
                    status: status.as_u16(),
                    path: path.to_string(),
                    message,
                })
            }
        }
    }

    fn describe(&self) -> String {
        format!("Microsoft Graph site {}", self.site_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GraphSource {
        GraphSource::new(
            "contoso.onmicrosoft.com".into(),
            "client".into(),
            "secret".into(),
            "contoso.sharepoint.com,abc,def".into(),
        )
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(
            encode_path("/Quality/PPAR/Plan vs Actual.xlsm"),
            "Quality/PPAR/Plan%20vs%20Actual.xlsm"
        );
    }

    #[test]
    fn test_urls() {
        let source = source();
        assert_eq!(
            source.token_url(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
        assert_eq!(
            source.content_url("A B/c.xlsx"),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com,abc,def/drive/root:/A%20B/c.xlsx:/content"
        );
    }

    #[test]
    fn test_token_freshness() {
        let stale = CachedToken {
            value: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        let fresh = CachedToken {
            value: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(!stale.is_fresh());
        assert!(fresh.is_fresh());
    }
}
