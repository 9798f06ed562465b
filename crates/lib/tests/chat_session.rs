//! Chat session behaviour against a scripted gateway: activation, send gating, typing flag.

use async_trait::async_trait;
use lib::gateway::{Gateway, GatewayClient, GatewayError, UploadFile};
use lib::session::{ChatSession, SessionOptions, ValidationError, CONNECTION_ERROR_REPLY};
use lib::setup::SetupFlow;
use lib::store::{self, KeyValueStore, MemoryStore};
use lib::types::{
    BackendAvailability, FileStatus, Message, Notice, NoticeLevel, Sender, UploadKind,
    WELCOME_MESSAGES,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const ALL_FILES: FileStatus = FileStatus {
    csv: true,
    privacy: true,
    terms: true,
};

#[derive(Default)]
struct ScriptedGateway {
    available: bool,
    status: FileStatus,
    history: Vec<&'static str>,
    history_delay: Duration,
    fail_chat: bool,
    hold_chat: Option<Arc<Notify>>,
    chat_calls: AtomicUsize,
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn probe_health(&self) -> bool {
        self.available
    }

    async fn send_chat(
        &self,
        text: &str,
        _credential: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hold_chat {
            gate.notified().await;
        }
        if self.fail_chat {
            return Err(GatewayError::Api("503 unavailable".to_string()));
        }
        Ok(format!("re: {}", text))
    }

    async fn fetch_history(&self) -> Vec<Message> {
        tokio::time::sleep(self.history_delay).await;
        self.history
            .iter()
            .filter_map(|l| lib::gateway::protocol::parse_history_line(l))
            .collect()
    }

    async fn upload(&self, _file: &UploadFile, _kind: UploadKind) -> bool {
        true
    }

    async fn set_data_source_url(&self, _url: &str) -> bool {
        true
    }

    async fn save_credential(&self, _key: &str) -> bool {
        true
    }

    async fn clear_credential(&self) -> bool {
        true
    }

    async fn fetch_upload_status(&self) -> FileStatus {
        self.status
    }
}

struct Harness {
    session: Arc<ChatSession>,
    gateway: Arc<ScriptedGateway>,
    store: Arc<MemoryStore>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

fn harness(gateway: ScriptedGateway, with_key: bool) -> Harness {
    let store = Arc::new(MemoryStore::new());
    if with_key {
        store.set(store::API_KEY, "key").unwrap();
    }
    let gateway = Arc::new(gateway);
    let (tx, rx) = mpsc::unbounded_channel();
    let options = SessionOptions {
        welcome_delay: Duration::from_millis(20),
        welcome_choice: Some(2),
    };
    let session = ChatSession::new(gateway.clone(), store.clone(), options, tx);
    Harness {
        session: Arc::new(session),
        gateway,
        store,
        notices: rx,
    }
}

fn ready_gateway() -> ScriptedGateway {
    ScriptedGateway {
        available: true,
        status: ALL_FILES,
        ..Default::default()
    }
}

#[tokio::test]
async fn activation_without_history_shows_one_welcome() {
    let h = harness(ready_gateway(), true);
    h.session.activate().await;
    h.session.activate().await;

    let snap = h.session.snapshot().await;
    assert_eq!(snap.messages.len(), 1);
    assert_eq!(snap.messages[0].sender, Sender::Bot);
    assert_eq!(snap.messages[0].content, WELCOME_MESSAGES[2]);
    assert!(snap.show_welcome);
    assert!(!snap.loading_history);
    assert_eq!(snap.availability, BackendAvailability::Available);
    assert!(snap.setup_complete());
}

#[tokio::test]
async fn history_replaces_welcome_even_when_it_arrives_late() {
    let h = harness(
        ScriptedGateway {
            history: vec!["User: hi", "Bot: hello"],
            history_delay: Duration::from_millis(60),
            ..ready_gateway()
        },
        true,
    );
    h.session.activate().await;

    let messages = h.session.messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].sender, Sender::Bot);
    assert_eq!(messages[1].content, "hello");
}

#[tokio::test]
async fn unavailable_backend_announces_development_mode() {
    let mut h = harness(ScriptedGateway::default(), false);
    h.session.activate().await;

    assert_eq!(
        h.session.availability().await,
        BackendAvailability::Unavailable
    );
    let notice = h.notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.title, "Development Mode");
    assert!(h.notices.try_recv().is_err());
}

#[tokio::test]
async fn blank_input_changes_nothing() {
    let mut h = harness(ready_gateway(), true);
    h.session.activate().await;
    let before = h.session.messages().await;
    let _ = h.notices.try_recv();

    for text in ["", "   ", "\n\t"] {
        assert_eq!(
            h.session.send_message(text).await,
            Err(ValidationError::EmptyMessage)
        );
    }
    assert_eq!(h.session.messages().await, before);
    assert!(!h.session.is_typing());
    assert!(h.notices.try_recv().is_err());
    assert_eq!(h.gateway.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credential_blocks_send() {
    let mut h = harness(ready_gateway(), false);
    h.session.activate().await;
    let before = h.session.messages().await;

    assert_eq!(
        h.session.send_message("hi").await,
        Err(ValidationError::MissingCredential)
    );
    let notice = h.notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.title, "API key required");
    assert_eq!(notice.description, "Please save your Google Gemini API key first.");
    assert_eq!(h.session.messages().await, before);
    assert!(h.session.snapshot().await.show_welcome);
    assert_eq!(h.gateway.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_files_block_send_before_credential_check() {
    let mut h = harness(
        ScriptedGateway {
            available: true,
            status: FileStatus {
                csv: true,
                ..Default::default()
            },
            ..Default::default()
        },
        false,
    );
    h.session.activate().await;

    assert_eq!(
        h.session.send_message("hi").await,
        Err(ValidationError::MissingFiles(vec![
            UploadKind::Privacy,
            UploadKind::Terms
        ]))
    );
    assert_eq!(h.notices.try_recv().unwrap().title, "Missing required files");
}

#[tokio::test]
async fn development_mode_skips_setup_gate() {
    let h = harness(ScriptedGateway::default(), false);
    h.session.activate().await;
    let before = h.session.messages().await.len();

    h.session.send_message("hi").await.unwrap();
    assert_eq!(h.session.messages().await.len(), before + 2);
}

#[tokio::test]
async fn send_appends_user_then_bot_and_clears_typing() {
    let h = harness(ready_gateway(), true);
    h.session.activate().await;
    let before = h.session.messages().await.len();

    h.session.send_message("hi").await.unwrap();

    let snap = h.session.snapshot().await;
    assert_eq!(snap.messages.len(), before + 2);
    let user = &snap.messages[before];
    let bot = &snap.messages[before + 1];
    assert_eq!((user.sender, user.content.as_str()), (Sender::User, "hi"));
    assert_eq!((bot.sender, bot.content.as_str()), (Sender::Bot, "re: hi"));
    assert!(!snap.typing);
    assert!(!snap.show_welcome);
}

#[tokio::test]
async fn failing_gateway_still_yields_two_messages() {
    let h = harness(
        ScriptedGateway {
            fail_chat: true,
            ..ready_gateway()
        },
        true,
    );
    h.session.activate().await;
    let before = h.session.messages().await.len();

    h.session.send_message("hi").await.unwrap();

    let messages = h.session.messages().await;
    assert_eq!(messages.len(), before + 2);
    assert_eq!(messages[before + 1].content, CONNECTION_ERROR_REPLY);
    assert!(!h.session.is_typing());
}

async fn wait_for_typing(session: &ChatSession) {
    for _ in 0..100 {
        if session.is_typing() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("typing indicator never raised");
}

#[tokio::test]
async fn typing_is_visible_while_reply_is_pending() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        ScriptedGateway {
            hold_chat: Some(gate.clone()),
            ..ready_gateway()
        },
        true,
    );
    h.session.activate().await;

    let session = h.session.clone();
    let send = tokio::spawn(async move { session.send_message("hi").await });
    wait_for_typing(&h.session).await;
    assert_eq!(
        h.session.messages().await.last().map(|m| m.sender),
        Some(Sender::User)
    );

    gate.notify_one();
    send.await.unwrap().unwrap();
    assert!(!h.session.is_typing());
}

#[tokio::test]
async fn cancelled_send_clears_typing() {
    let h = harness(
        ScriptedGateway {
            hold_chat: Some(Arc::new(Notify::new())),
            ..ready_gateway()
        },
        true,
    );
    h.session.activate().await;

    let session = h.session.clone();
    let send = tokio::spawn(async move { session.send_message("hi").await });
    wait_for_typing(&h.session).await;
    send.abort();
    let _ = send.await;
    assert!(!h.session.is_typing());
}

#[tokio::test]
async fn file_status_update_replaces_without_merge() {
    let h = harness(ready_gateway(), true);
    h.session.activate().await;
    assert!(h.session.setup_complete().await);

    let partial = FileStatus {
        privacy: true,
        ..Default::default()
    };
    h.session.update_file_status(partial).await;
    assert_eq!(h.session.snapshot().await.file_status, partial);
    assert!(!h.session.setup_complete().await);

    h.store.remove(store::API_KEY).unwrap();
    h.session.update_file_status(ALL_FILES).await;
    assert!(!h.session.setup_complete().await);
}

#[tokio::test]
async fn refresh_history_keeps_conversation_when_backend_has_none() {
    let h = harness(ready_gateway(), true);
    h.session.activate().await;
    h.session.send_message("hi").await.unwrap();
    let before = h.session.messages().await;

    h.session.refresh_history().await;
    assert_eq!(h.session.messages().await, before);
}

#[tokio::test]
async fn setup_flow_keeps_attached_session_in_step() {
    let store = Arc::new(MemoryStore::new());
    let gateway: Arc<dyn Gateway> = Arc::new(
        GatewayClient::new("http://127.0.0.1:1", store.clone())
            .with_health_settings(Duration::from_millis(500), Duration::from_secs(30)),
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    let options = SessionOptions {
        welcome_delay: Duration::from_millis(10),
        welcome_choice: Some(0),
    };
    let session = Arc::new(ChatSession::new(
        gateway.clone(),
        store.clone(),
        options,
        tx.clone(),
    ));
    let mut setup = SetupFlow::new(gateway, store.clone(), tx).with_session(session.clone());

    session.activate().await;
    setup.load().await;

    // CSV arrives from elsewhere; reloading the flow must reach the session.
    store.set(store::CSV_URL, "https://example.com/phones.csv").unwrap();
    assert!(setup.load().await.csv);
    assert!(session.snapshot().await.file_status.csv);

    setup
        .upload_file(UploadFile::new("privacy.txt", b"p".to_vec()), UploadKind::Privacy)
        .await
        .unwrap();
    let status = session.snapshot().await.file_status;
    assert!(status.csv, "csv flag survives a later upload");
    assert!(status.privacy);
    assert!(!status.terms);

    setup
        .upload_file(UploadFile::new("terms.pdf", b"t".to_vec()), UploadKind::Terms)
        .await
        .unwrap();
    setup.save_api_key("key").await.unwrap();
    assert_eq!(session.snapshot().await.file_status, ALL_FILES);
    assert!(session.setup_complete().await);
    assert!(setup.is_complete());
}
