//! Local stand-in used while the backend is unreachable. Uploads and settings are recorded as
//! markers in the key/value store so the setup flow can still be completed.

use crate::gateway::backend::{Backend, GatewayError, Mode, UploadFile};
use crate::store::{self, KeyValueStore};
use crate::types::{FileStatus, Message, UploadKind};
use async_trait::async_trait;
use std::sync::Arc;

pub const MOCK_REPLY: &str = "This is a mock response as the backend is not available. In production, this would come from your Python backend with LangChain and Google Gemini.";

#[derive(Clone)]
pub struct MockBackend {
    store: Arc<dyn KeyValueStore>,
}

impl MockBackend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Upload status derived from store markers; a CSV counts whether it came by URL or by file.
    pub fn local_status(&self) -> FileStatus {
        FileStatus {
            csv: self.store.contains(store::CSV_URL)
                || self.store.contains(&store::upload_key(UploadKind::Csv)),
            privacy: self.store.contains(&store::upload_key(UploadKind::Privacy)),
            terms: self.store.contains(&store::upload_key(UploadKind::Terms)),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn mode(&self) -> Mode {
        Mode::Mock
    }

    async fn send_chat(
        &self,
        _text: &str,
        _credential: Option<&str>,
    ) -> Result<String, GatewayError> {
        log::debug!("using mock chat reply");
        Ok(MOCK_REPLY.to_string())
    }

    async fn fetch_history(&self) -> Result<Vec<Message>, GatewayError> {
        Ok(Vec::new())
    }

    async fn upload(&self, file: &UploadFile, kind: UploadKind) -> Result<bool, GatewayError> {
        log::debug!("mock upload of {} as {}", file.name, kind);
        self.store.set(&store::upload_key(kind), &file.name)?;
        Ok(true)
    }

    async fn set_data_source_url(&self, url: &str) -> Result<bool, GatewayError> {
        self.store.set(store::CSV_URL, url)?;
        Ok(true)
    }

    async fn save_credential(&self, key: &str) -> Result<bool, GatewayError> {
        self.store.set(store::API_KEY, key)?;
        Ok(true)
    }

    async fn clear_credential(&self) -> Result<bool, GatewayError> {
        self.store.remove(store::API_KEY)?;
        Ok(true)
    }

    async fn fetch_upload_status(&self) -> Result<FileStatus, GatewayError> {
        Ok(self.local_status())
    }
}
