//! Scripted document service for testing.
//!
//! Provides a configurable implementation of the `DocumentService` trait that
//! returns queued replies and records every call, so controller behavior can
//! be verified without a running server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::client::DocumentService;
use crate::error::{ChatError, ChatResult};
use crate::types::{Attachment, SessionId};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedCall {
    Upload { file_name: String, size: usize },
    Ask { session: SessionId, question: String },
}

/// Scripted document service.
///
/// Uploads answer with queued session ids (or `session-N` when the queue is
/// empty); questions answer with queued replies (or an empty answer). A gate
/// can hold replies until the test releases them.
#[derive(Clone, Default)]
pub struct ScriptedDocumentService {
    uploads: Arc<RwLock<VecDeque<Result<String, String>>>>,
    answers: Arc<RwLock<VecDeque<Result<String, String>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    upload_gate: Option<Arc<Notify>>,
    answer_gate: Option<Arc<Notify>>,
}

impl ScriptedDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful upload returning `session_id`
    pub fn with_session(self, session_id: impl Into<String>) -> Self {
        self.uploads.write().push_back(Ok(session_id.into()));
        self
    }

    /// Queue a failed upload with a server detail message
    pub fn fail_upload(self, detail: impl Into<String>) -> Self {
        self.uploads.write().push_back(Err(detail.into()));
        self
    }

    /// Queue an answer
    pub fn with_answer(self, answer: impl Into<String>) -> Self {
        self.answers.write().push_back(Ok(answer.into()));
        self
    }

    /// Queue a failed question with a server detail message
    pub fn fail_answer(self, detail: impl Into<String>) -> Self {
        self.answers.write().push_back(Err(detail.into()));
        self
    }

    /// Hold every upload until `gate` is notified
    pub fn hold_uploads(mut self, gate: Arc<Notify>) -> Self {
        self.upload_gate = Some(gate);
        self
    }

    /// Hold every answer until `gate` is notified
    pub fn hold_answers(mut self, gate: Arc<Notify>) -> Self {
        self.answer_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.count(|c| matches!(c, CapturedCall::Upload { .. }))
    }

    pub fn ask_count(&self) -> usize {
        self.count(|c| matches!(c, CapturedCall::Ask { .. }))
    }

    fn count(&self, pred: impl Fn(&CapturedCall) -> bool) -> usize {
        self.captured_calls.read().iter().filter(|&c| pred(c)).count()
    }
}

#[async_trait]
impl DocumentService for ScriptedDocumentService {
    async fn upload(&self, attachment: &Attachment) -> ChatResult<SessionId> {
        let call_number = {
            let mut calls = self.captured_calls.write();
            calls.push(CapturedCall::Upload {
                file_name: attachment.name.clone(),
                size: attachment.bytes.len(),
            });
            calls.iter().filter(|c| matches!(c, CapturedCall::Upload { .. })).count()
        };

        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }

        let reply = self.uploads.write().pop_front();
        match reply {
            Some(Ok(id)) => Ok(SessionId::new(id)),
            Some(Err(detail)) => Err(ChatError::UploadFailed(detail)),
            None => Ok(SessionId::new(format!("session-{}", call_number))),
        }
    }

    async fn ask(&self, session: &SessionId, question: &str) -> ChatResult<String> {
        self.captured_calls.write().push(CapturedCall::Ask {
            session: session.clone(),
            question: question.to_string(),
        });

        if let Some(gate) = &self.answer_gate {
            gate.notified().await;
        }

        let reply = self.answers.write().pop_front();
        match reply {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(detail)) => Err(ChatError::ChatRequestFailed(detail)),
            None => Ok(String::new()),
        }
    }
}
