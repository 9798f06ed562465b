//! The two backend implementations behind the gateway client share this interface:
//! `LiveBackend` talks HTTP, `MockBackend` answers locally from the key/value store.

use crate::store::StoreError;
use crate::types::{FileStatus, Message, UploadKind};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend api error: {0}")]
    Api(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which implementation served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Mock,
}

/// A file selected for upload: display name plus contents.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the name is the path's final component.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// One method per backend capability. Errors are turned into fallbacks by the gateway client.
#[async_trait]
pub trait Backend: Send + Sync {
    fn mode(&self) -> Mode;

    async fn send_chat(&self, text: &str, credential: Option<&str>)
        -> Result<String, GatewayError>;

    async fn fetch_history(&self) -> Result<Vec<Message>, GatewayError>;

    async fn upload(&self, file: &UploadFile, kind: UploadKind) -> Result<bool, GatewayError>;

    async fn set_data_source_url(&self, url: &str) -> Result<bool, GatewayError>;

    async fn save_credential(&self, key: &str) -> Result<bool, GatewayError>;

    async fn clear_credential(&self) -> Result<bool, GatewayError>;

    async fn fetch_upload_status(&self) -> Result<FileStatus, GatewayError>;
}
