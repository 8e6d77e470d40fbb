//! Workbooks from a local directory

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{DocumentSource, FetchError};

#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl DocumentSource for LocalFileSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.root.join(path.trim_start_matches('/'));
        log::debug!("Reading {}", full.display());

        tokio::fs::read(&full).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                FetchError::NotFound(full.display().to_string())
            } else {
                FetchError::Io {
                    path: full.display().to_string(),
                    source,
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("PPAR")).unwrap();
        std::fs::write(dir.path().join("PPAR/plan.xlsx"), b"bytes").unwrap();

        let source = LocalFileSource::new(dir.path().to_path_buf());
        assert_eq!(source.fetch("/PPAR/plan.xlsx").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalFileSource::new(dir.path().to_path_buf());
        let err = source.fetch("missing.xlsx").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
