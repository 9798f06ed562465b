//! Setup flow: API key entry and the three required uploads (CSV data, privacy policy, terms).
//!
//! Every successful change returns the aggregated [`FileStatus`]. When a chat session is attached,
//! the flow is the single owner of that status and pushes it into the session after each load or
//! change. The CSV slot can be filled by a file or by a URL; the latest success counts.

use crate::gateway::{Gateway, UploadFile};
use crate::session::ChatSession;
use crate::store::{self, KeyValueStore};
use crate::types::{self, FileStatus, Notice, UploadKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("api key is empty")]
    EmptyApiKey,
    #[error("csv url is empty")]
    EmptyUrl,
    #[error("{} is not accepted for {} (expected .{})", .name, .kind, .kind.accepted_extensions().join(" or ."))]
    UnsupportedFile { kind: UploadKind, name: String },
    #[error("reading {}: {}", .path.display(), .source)]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} failed")]
    Failed(&'static str),
}

pub struct SetupFlow {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn KeyValueStore>,
    notices: mpsc::UnboundedSender<Notice>,
    status: FileStatus,
    session: Option<Arc<ChatSession>>,
}

impl SetupFlow {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn KeyValueStore>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            gateway,
            store,
            notices,
            status: FileStatus::default(),
            session: None,
        }
    }

    /// Keep `session` in step with this flow's status.
    pub fn with_session(mut self, session: Arc<ChatSession>) -> Self {
        self.session = Some(session);
        self
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    async fn publish(&self) {
        if let Some(session) = &self.session {
            session.update_file_status(self.status).await;
        }
    }

    /// Load the current upload status from the gateway.
    pub async fn load(&mut self) -> FileStatus {
        self.status = self.gateway.fetch_upload_status().await;
        self.publish().await;
        self.status
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn credential_saved(&self) -> bool {
        store::credential_exists(self.store.as_ref())
    }

    /// True when all files are present and an API key is stored.
    pub fn is_complete(&self) -> bool {
        types::setup_complete(&self.status, self.credential_saved())
    }

    pub async fn save_api_key(&mut self, key: &str) -> Result<(), SetupError> {
        let key = key.trim();
        if key.is_empty() {
            self.notify(Notice::error("Empty API Key", "Please enter a valid API key."));
            return Err(SetupError::EmptyApiKey);
        }
        if self.gateway.save_credential(key).await {
            self.notify(Notice::info("API Key Saved", "Your API key has been saved."));
            Ok(())
        } else {
            self.notify(Notice::error(
                "Failed to Save API Key",
                "There was an error saving your API key.",
            ));
            Err(SetupError::Failed("saving api key"))
        }
    }

    pub async fn clear_api_key(&mut self) -> Result<(), SetupError> {
        if self.gateway.clear_credential().await {
            self.notify(Notice::info("API Key Removed", "Your API key has been removed."));
            Ok(())
        } else {
            self.notify(Notice::error(
                "Failed to Remove API Key",
                "There was an error removing your API key.",
            ));
            Err(SetupError::Failed("removing api key"))
        }
    }

    fn accept(&self, kind: UploadKind, name: &str) -> Result<(), SetupError> {
        if kind.accepts(name) {
            return Ok(());
        }
        let err = SetupError::UnsupportedFile {
            kind,
            name: name.to_string(),
        };
        self.notify(Notice::error("Unsupported file", err.to_string()));
        Err(err)
    }

    /// Upload a file for `kind`. Only the extension is checked before sending.
    pub async fn upload_file(
        &mut self,
        file: UploadFile,
        kind: UploadKind,
    ) -> Result<FileStatus, SetupError> {
        self.accept(kind, &file.name)?;
        if self.gateway.upload(&file, kind).await {
            self.status = self.status.with(kind);
            self.publish().await;
            self.notify(Notice::info(
                "File uploaded successfully",
                format!("{} file has been uploaded.", kind.as_str().to_uppercase()),
            ));
            Ok(self.status)
        } else {
            self.notify(Notice::error(
                "Upload failed",
                "There was an error uploading your file.",
            ));
            Err(SetupError::Failed("upload"))
        }
    }

    /// Read `path` from disk and upload it for `kind`.
    pub async fn upload_path(
        &mut self,
        path: &Path,
        kind: UploadKind,
    ) -> Result<FileStatus, SetupError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.accept(kind, &name)?;
        let file = UploadFile::read(path)
            .await
            .map_err(|source| SetupError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        self.upload_file(file, kind).await
    }

    /// Point the CSV slot at a URL for the backend to ingest.
    pub async fn set_csv_url(&mut self, url: &str) -> Result<FileStatus, SetupError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SetupError::EmptyUrl);
        }
        if self.gateway.set_data_source_url(url).await {
            self.status = self.status.with(UploadKind::Csv);
            self.publish().await;
            self.notify(Notice::info(
                "CSV URL set successfully",
                "The CSV data has been loaded from the URL.",
            ));
            Ok(self.status)
        } else {
            self.notify(Notice::error(
                "Error setting CSV URL",
                "There was an error loading data from the URL.",
            ));
            Err(SetupError::Failed("setting csv url"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayClient;
    use crate::store::MemoryStore;
    use crate::types::NoticeLevel;
    use std::time::Duration;

    fn offline_flow() -> (SetupFlow, Arc<MemoryStore>, mpsc::UnboundedReceiver<Notice>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = GatewayClient::new("http://127.0.0.1:1", store.clone())
            .with_health_settings(Duration::from_millis(500), Duration::from_secs(30));
        let (tx, rx) = mpsc::unbounded_channel();
        (SetupFlow::new(Arc::new(gateway), store.clone(), tx), store, rx)
    }

    #[tokio::test]
    async fn full_offline_setup_completes() {
        let (mut flow, _, _rx) = offline_flow();
        assert!(!flow.is_complete());
        flow.save_api_key("  my-key  ").await.unwrap();
        flow.set_csv_url("https://example.com/phones.csv").await.unwrap();
        flow.upload_file(UploadFile::new("privacy.txt", b"p".to_vec()), UploadKind::Privacy)
            .await
            .unwrap();
        let status = flow
            .upload_file(UploadFile::new("terms.pdf", b"t".to_vec()), UploadKind::Terms)
            .await
            .unwrap();
        assert!(status.all_uploaded());
        assert!(flow.is_complete());
        assert_eq!(flow.load().await, status);
    }

    #[tokio::test]
    async fn blank_key_is_rejected_with_notice() {
        let (mut flow, store, mut rx) = offline_flow();
        let err = flow.save_api_key("   ").await.unwrap_err();
        assert!(matches!(err, SetupError::EmptyApiKey));
        assert!(store.get(store::API_KEY).is_none());
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Empty API Key");
    }

    #[tokio::test]
    async fn wrong_extension_never_reaches_gateway() {
        let (mut flow, store, _rx) = offline_flow();
        let err = flow
            .upload_file(UploadFile::new("phones.xlsx", b"x".to_vec()), UploadKind::Csv)
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedFile { .. }));
        assert!(!store.contains("file_csv"));
        assert!(!flow.status().csv);
    }

    #[tokio::test]
    async fn blank_url_is_ignored() {
        let (mut flow, store, mut rx) = offline_flow();
        assert!(matches!(flow.set_csv_url(" ").await, Err(SetupError::EmptyUrl)));
        assert!(!store.contains(store::CSV_URL));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_file_reports_read_error() {
        let (mut flow, _, _rx) = offline_flow();
        let path = std::env::temp_dir().join(format!("handset-missing-{}.csv", uuid::Uuid::new_v4()));
        let err = flow.upload_path(&path, UploadKind::Csv).await.unwrap_err();
        assert!(matches!(err, SetupError::ReadFile { .. }));
    }

    #[tokio::test]
    async fn clearing_key_breaks_completion() {
        let (mut flow, _, _rx) = offline_flow();
        flow.save_api_key("k").await.unwrap();
        assert!(flow.credential_saved());
        flow.clear_api_key().await.unwrap();
        assert!(!flow.credential_saved());
    }
}
