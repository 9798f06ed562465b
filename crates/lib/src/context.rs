//! Per-run wiring: config, local store and gateway client, created once at startup and shared
//! by the chat session and setup flow.

use crate::config::{self, Config};
use crate::gateway::{Gateway, GatewayClient};
use crate::session::{ChatSession, SessionOptions};
use crate::setup::SetupFlow;
use crate::store::{FileStore, KeyValueStore};
use crate::types::Notice;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: Arc<dyn KeyValueStore>,
    pub gateway: Arc<dyn Gateway>,
}

impl AppContext {
    /// Load config (missing file => defaults), open the file store and build the gateway client.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let (config, config_path) = config::load_config(config_path)?;
        let storage = config::resolve_storage_path(&config, &config_path);
        log::debug!("using store at {}", storage.display());
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(storage));
        let gateway = GatewayClient::from_config(&config, store.clone());
        log::debug!("backend url {}", gateway.base_url());
        Ok(Self::new(config, config_path, store, Arc::new(gateway)))
    }

    /// Assemble from parts (tests substitute an in-memory store or a fake gateway).
    pub fn new(
        config: Config,
        config_path: PathBuf,
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            config,
            config_path,
            store,
            gateway,
        }
    }

    pub fn chat_session(&self, notices: mpsc::UnboundedSender<Notice>) -> ChatSession {
        ChatSession::new(
            self.gateway.clone(),
            self.store.clone(),
            SessionOptions::from_config(&self.config.chat),
            notices,
        )
    }

    pub fn setup_flow(&self, notices: mpsc::UnboundedSender<Notice>) -> SetupFlow {
        SetupFlow::new(self.gateway.clone(), self.store.clone(), notices)
    }
}
