//! Document-chat server collaborators.
//!
//! The server owns document ingestion and answer generation. It exposes two
//! endpoints:
//!
//! - `POST /upload`: multipart form with a `file` field, returns `{ "session_id" }`
//! - `POST /chat`: JSON `{ "session_id", "question" }`, returns `{ "answer" }`
//!
//! Answers arrive in one piece. Any incremental display is done client-side by
//! the reveal scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::types::{Attachment, SessionId};

/// Message used when an upload fails without a server-provided detail
pub const UPLOAD_FAILED: &str = "Failed to upload document";
/// Message used when a question fails without a server-provided detail
pub const CHAT_FAILED: &str = "Failed to get an answer";

/// External collaborator that ingests documents and answers questions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Register a document and open a session scoped to it
    async fn upload(&self, attachment: &Attachment) -> ChatResult<SessionId>;

    /// Ask a question against an existing session
    async fn ask(&self, session: &SessionId, question: &str) -> ChatResult<String>;
}

/// `DocumentService` over HTTP
#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDocumentService {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, client))
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &ChatConfig) -> ChatResult<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn upload(&self, attachment: &Attachment) -> ChatResult<SessionId> {
        let url = self.endpoint("upload");
        debug!("Uploading {} ({} bytes) to {}", attachment.name, attachment.bytes.len(), url);

        let part = reqwest::multipart::Part::bytes(attachment.bytes.clone())
            .file_name(attachment.name.clone())
            .mime_str(&attachment.content_type)
            .map_err(|e| ChatError::UploadFailed(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::UploadFailed(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Upload rejected with status {}", status);
            return Err(ChatError::UploadFailed(
                error_detail(&body).unwrap_or_else(|| UPLOAD_FAILED.to_string()),
            ));
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| ChatError::UploadFailed(format!("Invalid upload response: {}", e)))?;

        Ok(SessionId::new(result.session_id))
    }

    async fn ask(&self, session: &SessionId, question: &str) -> ChatResult<String> {
        let url = self.endpoint("chat");
        debug!("Asking session {} at {}", session, url);

        let request = ChatRequest {
            session_id: session.as_str(),
            question,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::ChatRequestFailed(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Chat request rejected with status {}", status);
            return Err(ChatError::ChatRequestFailed(
                error_detail(&body).unwrap_or_else(|| CHAT_FAILED.to_string()),
            ));
        }

        let result: ChatAnswer = response
            .json()
            .await
            .map_err(|e| ChatError::ChatRequestFailed(format!("Invalid chat response: {}", e)))?;

        Ok(result.answer)
    }
}

/// Extract the `detail` field of an error body.
///
/// String details are returned as-is; structured details (validation error
/// lists) are rendered as JSON text.
pub fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    session_id: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatAnswer {
    answer: String,
}
