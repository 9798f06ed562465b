//! HTTP backend (http://localhost:9000 by default).

use crate::gateway::backend::{Backend, GatewayError, Mode, UploadFile};
use crate::gateway::protocol::{
    self, ApiKeyRequest, ChatReply, ChatRequest, CsvUrlRequest, FilesStatusReply, HistoryReply,
    SuccessReply,
};
use crate::types::{FileStatus, Message, UploadKind};
use async_trait::async_trait;
use std::time::Duration;

/// Reply used when /chat succeeds without a usable `response` field.
pub const EMPTY_REPLY_FALLBACK: &str = "I'm sorry, I couldn't process that request.";

/// Client for the backend HTTP API.
#[derive(Clone)]
pub struct LiveBackend {
    base_url: String,
    client: reqwest::Client,
}

impl LiveBackend {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /health with a short timeout. Any 2xx counts as available.
    pub async fn health(&self, timeout: Duration) -> bool {
        let url = self.url(protocol::HEALTH_PATH);
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(res) => {
                let ok = res.status().is_success();
                if !ok {
                    log::info!("backend health returned {}", res.status());
                }
                ok
            }
            Err(e) => {
                log::info!("backend not available: {}", e);
                false
            }
        }
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Err(GatewayError::Api(format!("{} {}", status, body)))
    }

    async fn post_for_success<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<bool, GatewayError> {
        let mut req = self.client.post(self.url(path));
        if let Some(b) = body {
            req = req.json(b);
        }
        let res = Self::check(req.send().await?).await?;
        let data: SuccessReply = res.json().await?;
        Ok(data.succeeded())
    }
}

#[async_trait]
impl Backend for LiveBackend {
    fn mode(&self) -> Mode {
        Mode::Live
    }

    /// POST /chat — `{message}` in, `{response}` out.
    async fn send_chat(
        &self,
        text: &str,
        credential: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut req = self
            .client
            .post(self.url(protocol::CHAT_PATH))
            .json(&ChatRequest { message: text });
        if let Some(key) = credential.filter(|k| !k.is_empty()) {
            req = req.header(protocol::API_KEY_HEADER, key);
        }
        let res = Self::check(req.send().await?).await?;
        let data: ChatReply = res.json().await?;
        Ok(data
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string()))
    }

    /// GET /history — prefixed transcript lines.
    async fn fetch_history(&self) -> Result<Vec<Message>, GatewayError> {
        let res = self.client.get(self.url(protocol::HISTORY_PATH)).send().await?;
        let res = Self::check(res).await?;
        let data: HistoryReply = res.json().await?;
        Ok(data
            .history
            .map(|items| protocol::parse_history(&items))
            .unwrap_or_default())
    }

    /// POST /upload — multipart `file` + `type`.
    async fn upload(&self, file: &UploadFile, kind: UploadKind) -> Result<bool, GatewayError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("type", kind.as_str());
        let res = self
            .client
            .post(self.url(protocol::UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        let res = Self::check(res).await?;
        let data: SuccessReply = res.json().await?;
        Ok(data.succeeded())
    }

    async fn set_data_source_url(&self, url: &str) -> Result<bool, GatewayError> {
        self.post_for_success(protocol::CSV_URL_PATH, Some(&CsvUrlRequest { url }))
            .await
    }

    async fn save_credential(&self, key: &str) -> Result<bool, GatewayError> {
        self.post_for_success(protocol::API_KEY_PATH, Some(&ApiKeyRequest { api_key: key }))
            .await
    }

    async fn clear_credential(&self) -> Result<bool, GatewayError> {
        self.post_for_success::<()>(protocol::CLEAR_API_KEY_PATH, None)
            .await
    }

    async fn fetch_upload_status(&self) -> Result<FileStatus, GatewayError> {
        let res = self
            .client
            .get(self.url(protocol::FILES_STATUS_PATH))
            .send()
            .await?;
        let res = Self::check(res).await?;
        let data: FilesStatusReply = res.json().await?;
        Ok(data.into())
    }
}
