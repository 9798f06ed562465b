//! Gateway client: probes the backend once per call (through the health cache) and dispatches to
//! the live or mock implementation. Failures become safe defaults; nothing here returns an error
//! to the caller except `send_chat`, whose signature allows other gateways to fail.

use crate::config::{self, Config};
use crate::gateway::backend::{Backend, GatewayError, Mode, UploadFile};
use crate::gateway::health::HealthCache;
use crate::gateway::live::LiveBackend;
use crate::gateway::mock::MockBackend;
use crate::store::{self, KeyValueStore};
use crate::types::{FileStatus, Message, UploadKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reply shown when the live chat call fails.
pub const REQUEST_FAILED_REPLY: &str =
    "Sorry, there was an error connecting to the assistant. Please try again later.";

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// What the session and setup flow need from the backend.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// True when the backend answered its health probe (possibly cached).
    async fn probe_health(&self) -> bool;

    async fn send_chat(&self, text: &str, credential: Option<&str>)
        -> Result<String, GatewayError>;

    async fn fetch_history(&self) -> Vec<Message>;

    async fn upload(&self, file: &UploadFile, kind: UploadKind) -> bool;

    async fn set_data_source_url(&self, url: &str) -> bool;

    async fn save_credential(&self, key: &str) -> bool;

    async fn clear_credential(&self) -> bool;

    async fn fetch_upload_status(&self) -> FileStatus;
}

pub struct GatewayClient {
    live: LiveBackend,
    mock: MockBackend,
    store: Arc<dyn KeyValueStore>,
    health: HealthCache,
    health_timeout: Duration,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            live: LiveBackend::new(base_url, reqwest::Client::new()),
            mock: MockBackend::new(store.clone()),
            store,
            health: HealthCache::default(),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    /// Build from config: base URL (env HANDSET_API_URL wins), probe timeout and cache window.
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(config::resolve_backend_url(config), store).with_health_settings(
            config.backend.health_timeout(),
            config.backend.health_cache_ttl(),
        )
    }

    pub fn with_health_settings(mut self, timeout: Duration, ttl: Duration) -> Self {
        self.health_timeout = timeout;
        self.health = HealthCache::new(ttl);
        self
    }

    pub fn base_url(&self) -> &str {
        self.live.base_url()
    }

    /// Forget the cached probe so the next call checks the backend again.
    pub fn invalidate_health(&self) {
        self.health.invalidate();
    }

    async fn backend(&self) -> &dyn Backend {
        if self.probe_health().await {
            &self.live
        } else {
            &self.mock
        }
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn probe_health(&self) -> bool {
        if let Some(available) = self.health.fresh(Instant::now()) {
            return available;
        }
        let available = self.live.health(self.health_timeout).await;
        self.health.record(available, Instant::now());
        available
    }

    async fn send_chat(
        &self,
        text: &str,
        credential: Option<&str>,
    ) -> Result<String, GatewayError> {
        match self.backend().await.send_chat(text, credential).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                log::error!("error communicating with backend: {}", e);
                Ok(REQUEST_FAILED_REPLY.to_string())
            }
        }
    }

    async fn fetch_history(&self) -> Vec<Message> {
        self.backend()
            .await
            .fetch_history()
            .await
            .unwrap_or_else(|e| {
                log::error!("error fetching conversation history: {}", e);
                Vec::new()
            })
    }

    async fn upload(&self, file: &UploadFile, kind: UploadKind) -> bool {
        self.backend()
            .await
            .upload(file, kind)
            .await
            .unwrap_or_else(|e| {
                log::error!("error uploading {} file: {}", kind, e);
                false
            })
    }

    async fn set_data_source_url(&self, url: &str) -> bool {
        self.backend()
            .await
            .set_data_source_url(url)
            .await
            .unwrap_or_else(|e| {
                log::error!("error setting csv url: {}", e);
                false
            })
    }

    /// On a live success the key is also kept in the local slot, which is what gates chat.
    async fn save_credential(&self, key: &str) -> bool {
        let backend = self.backend().await;
        match backend.save_credential(key).await {
            Ok(true) if backend.mode() == Mode::Live => {
                if let Err(e) = self.store.set(store::API_KEY, key) {
                    log::error!("api key saved remotely but not locally: {}", e);
                    return false;
                }
                true
            }
            Ok(saved) => saved,
            Err(e) => {
                log::error!("error saving api key: {}", e);
                false
            }
        }
    }

    async fn clear_credential(&self) -> bool {
        let backend = self.backend().await;
        match backend.clear_credential().await {
            Ok(true) if backend.mode() == Mode::Live => {
                if let Err(e) = self.store.remove(store::API_KEY) {
                    log::error!("api key cleared remotely but not locally: {}", e);
                    return false;
                }
                true
            }
            Ok(cleared) => cleared,
            Err(e) => {
                log::error!("error clearing api key: {}", e);
                false
            }
        }
    }

    async fn fetch_upload_status(&self) -> FileStatus {
        match self.backend().await.fetch_upload_status().await {
            Ok(status) => status,
            Err(e) => {
                log::error!("error checking files status: {}", e);
                self.mock.local_status()
            }
        }
    }
}
