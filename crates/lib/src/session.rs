//! Chat session: the conversation shown to the user, the typing indicator, the welcome flag and
//! the cached setup state that gates sending.
//!
//! State sits behind an async lock so a front end can render snapshots while a send is in flight.

use crate::config::ChatConfig;
use crate::gateway::Gateway;
use crate::store::{self, KeyValueStore};
use crate::types::{
    self, BackendAvailability, FileStatus, Message, Notice, UploadKind, WELCOME_MESSAGES,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Bot reply appended when the gateway call itself fails.
pub const CONNECTION_ERROR_REPLY: &str =
    "Sorry, I'm having trouble connecting to my backend. Please try again later.";

/// Why a message was not sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("missing required files: {}", join_kinds(.0))]
    MissingFiles(Vec<UploadKind>),
    #[error("api key required")]
    MissingCredential,
}

fn join_kinds(kinds: &[UploadKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Welcome message timing and choice. `welcome_choice` pins the message (tests); otherwise random.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub welcome_delay: Duration,
    pub welcome_choice: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(chat: &ChatConfig) -> Self {
        Self {
            welcome_delay: chat.welcome_delay(),
            welcome_choice: None,
        }
    }
}

fn pick_welcome(choice: Option<usize>) -> &'static str {
    let index = choice.unwrap_or_else(|| {
        let mut bytes = [0u8; 8];
        if let Err(e) = getrandom::getrandom(&mut bytes) {
            log::debug!("getrandom failed, using first welcome message: {}", e);
            return 0;
        }
        (u64::from_le_bytes(bytes) % WELCOME_MESSAGES.len() as u64) as usize
    });
    WELCOME_MESSAGES[index % WELCOME_MESSAGES.len()]
}

/// Point-in-time copy of the session for rendering.
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub typing: bool,
    pub show_welcome: bool,
    pub loading_history: bool,
    pub file_status: FileStatus,
    pub availability: BackendAvailability,
    pub credential_saved: bool,
}

impl ChatSnapshot {
    pub fn setup_complete(&self) -> bool {
        types::setup_complete(&self.file_status, self.credential_saved)
    }
}

#[derive(Debug)]
struct ChatState {
    messages: Vec<Message>,
    show_welcome: bool,
    loading_history: bool,
    file_status: FileStatus,
    availability: BackendAvailability,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            show_welcome: true,
            loading_history: false,
            file_status: FileStatus::default(),
            availability: BackendAvailability::Unknown,
        }
    }
}

/// Raises the typing flag and lowers it on drop, including when the send future is cancelled.
struct TypingGuard<'a>(&'a AtomicBool);

impl<'a> TypingGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ChatSession {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn KeyValueStore>,
    options: SessionOptions,
    notices: mpsc::UnboundedSender<Notice>,
    state: RwLock<ChatState>,
    typing: AtomicBool,
    activated: AtomicBool,
}

impl ChatSession {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            gateway,
            store,
            options,
            notices,
            state: RwLock::new(ChatState::default()),
            typing: AtomicBool::new(false),
            activated: AtomicBool::new(false),
        }
    }

    fn notify(&self, notice: Notice) {
        // Receiver may be gone when the front end shuts down; nothing to deliver then.
        let _ = self.notices.send(notice);
    }

    /// First activation: probe the backend, load setup state, then show either the stored history
    /// or a welcome message. The welcome delay and the history fetch run together; whichever
    /// finishes last, a non-empty history wins. Later calls do nothing.
    pub async fn activate(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            return;
        }

        let available = self.gateway.probe_health().await;
        self.state.write().await.availability = available.into();
        if !available {
            log::info!("backend not available, using development mode");
            self.notify(Notice::info(
                "Development Mode",
                "Backend not detected. Running in development mode with mock data.",
            ));
        }

        self.refresh_file_status().await;

        let welcome = Message::bot(pick_welcome(self.options.welcome_choice));
        let (_, history) = tokio::join!(
            tokio::time::sleep(self.options.welcome_delay),
            self.load_history()
        );

        let mut state = self.state.write().await;
        if !history.is_empty() {
            log::debug!("restored {} messages from history", history.len());
            state.messages = history;
        } else if state.messages.is_empty() {
            state.messages.push(welcome);
        }
    }

    async fn load_history(&self) -> Vec<Message> {
        self.state.write().await.loading_history = true;
        let history = self.gateway.fetch_history().await;
        self.state.write().await.loading_history = false;
        history
    }

    /// Fetch history again; a non-empty result replaces the conversation.
    pub async fn refresh_history(&self) {
        let history = self.load_history().await;
        if !history.is_empty() {
            self.state.write().await.messages = history;
        }
    }

    /// Re-read upload status from the gateway into the session.
    pub async fn refresh_file_status(&self) -> FileStatus {
        let status = self.gateway.fetch_upload_status().await;
        self.state.write().await.file_status = status;
        status
    }

    /// Replace the cached upload status verbatim (no merge).
    pub async fn update_file_status(&self, status: FileStatus) {
        self.state.write().await.file_status = status;
    }

    pub fn credential_saved(&self) -> bool {
        store::credential_exists(self.store.as_ref())
    }

    pub async fn setup_complete(&self) -> bool {
        let status = self.state.read().await.file_status;
        types::setup_complete(&status, self.credential_saved())
    }

    /// Leave the welcome screen without sending anything.
    pub async fn start_chat(&self) {
        self.state.write().await.show_welcome = false;
    }

    pub fn is_typing(&self) -> bool {
        self.typing.load(Ordering::SeqCst)
    }

    pub async fn availability(&self) -> BackendAvailability {
        self.state.read().await.availability
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let state = self.state.read().await;
        ChatSnapshot {
            messages: state.messages.clone(),
            typing: self.is_typing(),
            show_welcome: state.show_welcome,
            loading_history: state.loading_history,
            file_status: state.file_status,
            availability: state.availability,
            credential_saved: self.credential_saved(),
        }
    }

    /// Send a user message and append the reply.
    ///
    /// Blank input is ignored. Unless the backend is known to be unavailable, all files and a
    /// stored API key are required; a failed check emits a notice and leaves the session as is.
    /// On success the user message and exactly one bot message are appended.
    pub async fn send_message(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        let (availability, status) = {
            let state = self.state.read().await;
            (state.availability, state.file_status)
        };
        if availability != BackendAvailability::Unavailable {
            if !status.all_uploaded() {
                self.notify(Notice::error(
                    "Missing required files",
                    "Please upload all required files before chatting.",
                ));
                return Err(ValidationError::MissingFiles(status.missing()));
            }
            if !self.credential_saved() {
                self.notify(Notice::error(
                    "API key required",
                    "Please save your Google Gemini API key first.",
                ));
                return Err(ValidationError::MissingCredential);
            }
        }

        {
            let mut state = self.state.write().await;
            state.show_welcome = false;
            state.messages.push(Message::user(text));
        }

        let _typing = TypingGuard::raise(&self.typing);
        let credential = self.store.get(store::API_KEY);
        let reply = match self.gateway.send_chat(text, credential.as_deref()).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("error getting response: {}", e);
                CONNECTION_ERROR_REPLY.to_string()
            }
        };
        self.state.write().await.messages.push(Message::bot(reply));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_welcome_choice_wraps() {
        assert_eq!(pick_welcome(Some(1)), WELCOME_MESSAGES[1]);
        assert_eq!(pick_welcome(Some(4)), WELCOME_MESSAGES[1]);
    }

    #[test]
    fn random_welcome_is_one_of_the_set() {
        let w = pick_welcome(None);
        assert!(WELCOME_MESSAGES.contains(&w));
    }

    #[test]
    fn typing_guard_lowers_flag_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _g = TypingGuard::raise(&flag);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_files_error_names_kinds() {
        let e = ValidationError::MissingFiles(vec![UploadKind::Privacy, UploadKind::Terms]);
        assert_eq!(e.to_string(), "missing required files: privacy, terms");
    }
}
