//! Conversation and setup types shared by the gateway client, session and setup flow.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub const BOT_NAME: &str = "Smartphone Assistant";

pub const BOT_TAGLINE: &str =
    "I'm here to help you with information, assistance, and answers to your questions.";

pub const WELCOME_MESSAGES: [&str; 3] = [
    "Hello! I'm your smartphone assistant. How can I help you today?",
    "Hi there! I can help you find the perfect smartphone. What are you looking for?",
    "Welcome! I'm here to answer questions about our smartphones, privacy policy, and terms. How can I assist you?",
];

pub const QUICK_REPLIES: [&str; 6] = [
    "What smartphones do you have?",
    "Tell me about your privacy policy",
    "What are your terms and conditions?",
    "Compare phones in my price range",
    "What's your return policy?",
    "How do I contact support?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// One entry in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Sender::Bot, content)
    }
}

/// The three required inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadKind {
    Csv,
    Privacy,
    Terms,
}

impl UploadKind {
    pub const ALL: [UploadKind; 3] = [UploadKind::Csv, UploadKind::Privacy, UploadKind::Terms];

    /// Wire name used for the multipart `type` field and store markers.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Csv => "csv",
            UploadKind::Privacy => "privacy",
            UploadKind::Terms => "terms",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadKind::Csv => "CSV Data",
            UploadKind::Privacy => "Privacy Policy",
            UploadKind::Terms => "Terms & Conditions",
        }
    }

    /// File extensions offered when selecting a file for this slot (lowercase, no dot).
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Csv => &["csv"],
            UploadKind::Privacy | UploadKind::Terms => &["txt", "pdf"],
        }
    }

    /// Extension filter only; content, size and type are not checked.
    pub fn accepts(&self, file_name: &str) -> bool {
        let ext = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return false,
        };
        self.accepted_extensions().contains(&ext.as_str())
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(UploadKind::Csv),
            "privacy" => Ok(UploadKind::Privacy),
            "terms" => Ok(UploadKind::Terms),
            other => Err(format!(
                "unknown upload kind '{}': expected csv, privacy or terms",
                other
            )),
        }
    }
}

/// Completion flags for the three required inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStatus {
    pub csv: bool,
    pub privacy: bool,
    pub terms: bool,
}

impl FileStatus {
    pub fn get(&self, kind: UploadKind) -> bool {
        match kind {
            UploadKind::Csv => self.csv,
            UploadKind::Privacy => self.privacy,
            UploadKind::Terms => self.terms,
        }
    }

    /// Copy with `kind` marked done.
    pub fn with(mut self, kind: UploadKind) -> Self {
        match kind {
            UploadKind::Csv => self.csv = true,
            UploadKind::Privacy => self.privacy = true,
            UploadKind::Terms => self.terms = true,
        }
        self
    }

    pub fn all_uploaded(&self) -> bool {
        self.csv && self.privacy && self.terms
    }

    pub fn missing(&self) -> Vec<UploadKind> {
        UploadKind::ALL
            .into_iter()
            .filter(|k| !self.get(*k))
            .collect()
    }
}

/// Setup is complete when every required file is present and a credential is stored.
pub fn setup_complete(status: &FileStatus, credential_exists: bool) -> bool {
    status.all_uploaded() && credential_exists
}

/// Whether the backend answered its health probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendAvailability {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl From<bool> for BackendAvailability {
    fn from(available: bool) -> Self {
        if available {
            BackendAvailability::Available
        } else {
            BackendAvailability::Unavailable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient user-facing notification (title + description).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}
