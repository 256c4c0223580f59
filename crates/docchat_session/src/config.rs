//! Controller configuration.
//!
//! Values are layered: defaults, then an optional JSON settings file, then
//! `DOCCHAT_*` environment variables. The CLI applies its flags last.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};
use crate::types::extension_of;

/// Default server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Default delay between revealed characters
pub const DEFAULT_REVEAL_INTERVAL_MS: u64 = 15;
/// Default timeout for a single HTTP request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const ENV_API_URL: &str = "DOCCHAT_API_URL";
pub const ENV_REVEAL_INTERVAL_MS: &str = "DOCCHAT_REVEAL_INTERVAL_MS";
pub const ENV_ACCEPT: &str = "DOCCHAT_ACCEPT";

/// Which document types may be attached, by file extension.
///
/// Extensions are stored lowercase with a leading dot, however they were
/// written in the settings file or on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AttachmentPolicy {
    extensions: Vec<String>,
}

impl AttachmentPolicy {
    /// Accept PDF documents only
    pub fn pdf_only() -> Self {
        Self {
            extensions: vec![".pdf".to_string()],
        }
    }

    /// Accept PDF, Word and plain text documents
    pub fn documents() -> Self {
        Self {
            extensions: [".pdf", ".doc", ".docx", ".txt"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    /// Parse a comma separated accept list such as `.pdf,.docx` or `pdf, txt`
    pub fn parse(list: &str) -> ChatResult<Self> {
        Self::from_entries(list.split(','))
    }

    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> ChatResult<Self> {
        let mut extensions: Vec<String> = Vec::new();
        for raw in entries {
            let ext = raw.trim().trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() {
                continue;
            }
            if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ChatError::Config(format!("Invalid file extension: {}", raw.trim())));
            }
            let ext = format!(".{}", ext);
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }

        if extensions.is_empty() {
            return Err(ChatError::Config("Accept list is empty".to_string()));
        }
        Ok(Self { extensions })
    }

    /// Whether a file with this name may be attached
    pub fn allows(&self, file_name: &str) -> bool {
        match extension_of(file_name) {
            Some(ext) => self.extensions.iter().any(|e| *e == ext),
            None => false,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Accept list in the form used by file pickers, e.g. `.pdf,.txt`
    pub fn describe(&self) -> String {
        self.extensions.join(",")
    }
}

impl TryFrom<Vec<String>> for AttachmentPolicy {
    type Error = ChatError;

    fn try_from(entries: Vec<String>) -> ChatResult<Self> {
        Self::from_entries(entries.iter().map(String::as_str))
    }
}

impl From<AttachmentPolicy> for Vec<String> {
    fn from(policy: AttachmentPolicy) -> Self {
        policy.extensions
    }
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self::pdf_only()
    }
}

/// Conversation controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// Base URL of the document-chat server
    pub base_url: String,
    /// Delay between two revealed characters, in milliseconds
    pub reveal_interval_ms: u64,
    /// Timeout for each HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// Accepted attachment extensions
    pub attachments: AttachmentPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reveal_interval_ms: DEFAULT_REVEAL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            attachments: AttachmentPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Load a JSON settings file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> ChatResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> ChatResult<Self> {
        Self::default().apply_env()
    }

    /// Override values from `DOCCHAT_*` environment variables
    pub fn apply_env(self) -> ChatResult<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override values from a variable lookup
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_REVEAL_INTERVAL_MS).filter(|v| !v.trim().is_empty()) {
            self.reveal_interval_ms = raw.trim().parse().map_err(|_| {
                ChatError::Config(format!("{} must be a number of milliseconds, got {:?}", ENV_REVEAL_INTERVAL_MS, raw))
            })?;
        }

        if let Some(list) = lookup(ENV_ACCEPT).filter(|v| !v.trim().is_empty()) {
            self.attachments = AttachmentPolicy::parse(&list)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> ChatResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "Server URL must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.reveal_interval_ms == 0 {
            return Err(ChatError::Config("Reveal interval must be at least 1ms".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ChatError::Config("Request timeout must be at least 1s".to_string()));
        }
        if self.attachments.extensions().is_empty() {
            return Err(ChatError::Config("At least one attachment type must be accepted".to_string()));
        }
        Ok(())
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
