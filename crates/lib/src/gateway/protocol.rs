//! Backend HTTP wire types (JSON bodies) and history transcript parsing.

use crate::types::{FileStatus, Message, Sender};
use serde::{Deserialize, Serialize};

pub const HEALTH_PATH: &str = "/health";
pub const CHAT_PATH: &str = "/chat";
pub const HISTORY_PATH: &str = "/history";
pub const UPLOAD_PATH: &str = "/upload";
pub const CSV_URL_PATH: &str = "/set-csv-url";
pub const API_KEY_PATH: &str = "/api-key";
pub const CLEAR_API_KEY_PATH: &str = "/clear-api-key";
pub const FILES_STATUS_PATH: &str = "/files-status";

/// Header carrying the stored API key on chat requests. Backends that keep the key server-side ignore it.
pub const API_KEY_HEADER: &str = "x-api-key";

const USER_PREFIX: &str = "User: ";
const BOT_PREFIX: &str = "Bot: ";

/// POST /chat body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// POST /chat reply.
#[derive(Debug, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Option<String>,
}

/// GET /history reply. Items are kept as raw JSON so non-string entries can be skipped.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryReply {
    #[serde(default)]
    pub history: Option<Vec<serde_json::Value>>,
}

/// `{success}` reply shared by upload, set-csv-url, api-key and clear-api-key.
#[derive(Debug, Default, Deserialize)]
pub struct SuccessReply {
    #[serde(default)]
    pub success: Option<bool>,
}

impl SuccessReply {
    pub fn succeeded(&self) -> bool {
        self.success.unwrap_or(false)
    }
}

/// POST /set-csv-url body.
#[derive(Debug, Serialize)]
pub struct CsvUrlRequest<'a> {
    pub url: &'a str,
}

/// POST /api-key body.
#[derive(Debug, Serialize)]
pub struct ApiKeyRequest<'a> {
    pub api_key: &'a str,
}

/// GET /files-status reply; omitted fields count as not uploaded.
#[derive(Debug, Default, Deserialize)]
pub struct FilesStatusReply {
    #[serde(default)]
    pub csv: Option<bool>,
    #[serde(default)]
    pub privacy: Option<bool>,
    #[serde(default)]
    pub terms: Option<bool>,
}

impl From<FilesStatusReply> for FileStatus {
    fn from(r: FilesStatusReply) -> Self {
        FileStatus {
            csv: r.csv.unwrap_or(false),
            privacy: r.privacy.unwrap_or(false),
            terms: r.terms.unwrap_or(false),
        }
    }
}

/// Convert one transcript line ("User: ..." / "Bot: ...") into a fresh Message.
pub fn parse_history_line(line: &str) -> Option<Message> {
    if let Some(rest) = line.strip_prefix(USER_PREFIX) {
        Some(Message::new(Sender::User, rest))
    } else {
        line.strip_prefix(BOT_PREFIX)
            .map(|rest| Message::new(Sender::Bot, rest))
    }
}

/// Convert the history array, dropping non-string items and unprefixed lines.
pub fn parse_history(items: &[serde_json::Value]) -> Vec<Message> {
    items
        .iter()
        .filter_map(|v| v.as_str())
        .filter_map(parse_history_line)
        .collect()
}
