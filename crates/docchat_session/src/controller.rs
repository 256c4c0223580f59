//! Conversation controller.
//!
//! Ties the session manager, the message store and the reveal scheduler
//! together. The display layer calls `submit`, `start_new_session` and
//! `cancel_reveal`, renders `snapshot()` and waits on `subscribe()` for
//! changes. It never mutates the state directly.
//!
//! Submissions are expected one at a time: the display layer disables input
//! while `snapshot().is_busy()` is true. The controller is `Send + Sync`, so it
//! can be shared behind an `Arc` to start a new chat while a request is still
//! in flight; that request's response is then discarded.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{DocumentService, HttpDocumentService};
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::reveal::RevealScheduler;
use crate::session::SessionManager;
use crate::state::Shared;
use crate::types::{Attachment, ConversationSnapshot, MessageId, SessionId, SubmitOutcome};

/// Orchestrates one chat conversation
pub struct ConversationController {
    config: ChatConfig,
    shared: Arc<Shared>,
    service: Arc<dyn DocumentService>,
    sessions: SessionManager,
    reveal: RevealScheduler,
}

impl ConversationController {
    /// Create a controller talking to `service`
    pub fn new(config: ChatConfig, service: Arc<dyn DocumentService>) -> Self {
        let shared = Arc::new(Shared::new());
        let reveal = RevealScheduler::new(Arc::clone(&shared));
        let sessions = SessionManager::new(Arc::clone(&shared), Arc::clone(&service), reveal.clone());

        Self {
            config,
            shared,
            service,
            sessions,
            reveal,
        }
    }

    /// Create a controller for the HTTP server named in `config`
    pub fn connect(config: ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        let service = HttpDocumentService::from_config(&config)?;
        Ok(Self::new(config, Arc::new(service)))
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Send a question, optionally with a document.
    ///
    /// The first message of a conversation must carry a document. The user
    /// message is shown immediately and removed again if the request fails.
    /// On success the answer starts revealing into a new assistant message.
    pub async fn submit(
        &self,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> ChatResult<SubmitOutcome> {
        let text = text.into();
        if text.trim().is_empty() && attachment.is_none() {
            return Err(ChatError::EmptyInput);
        }

        // Any real submit stops the running reveal, even one that is rejected below
        self.reveal.cancel_reveal();

        let is_first_message = self.shared.read(|st| st.store.is_empty());
        if is_first_message && attachment.is_none() {
            return Err(self.fail(ChatError::MissingAttachment));
        }

        if let Some(attachment) = &attachment {
            if !self.config.attachments.allows(&attachment.name) {
                return Err(self.fail(ChatError::UnsupportedAttachment {
                    name: attachment.name.clone(),
                    allowed: self.config.attachments.describe(),
                }));
            }
        }

        let attachment_name = attachment.as_ref().map(|a| a.name.clone());
        let (user_message, epoch) = self.shared.update(|st| {
            let id = st.store.append_user_message(text.as_str(), attachment_name.clone());
            if is_first_message {
                st.title = attachment_name;
            }
            st.error = None;
            st.awaiting_response = true;
            (id, st.epoch)
        });

        let answer = match self.request_answer(&text, attachment.as_ref()).await {
            Ok(answer) => answer,
            Err(err) => return self.roll_back(epoch, user_message, is_first_message, err),
        };

        let assistant_message = self.shared.update(|st| {
            if st.epoch != epoch {
                return None;
            }
            st.awaiting_response = false;
            Some(st.store.append_empty_assistant_message())
        });
        let Some(assistant_message) = assistant_message else {
            warn!("Dropping answer for a discarded chat");
            return Ok(SubmitOutcome::Discarded);
        };

        self.reveal
            .start_reveal(assistant_message, &answer, self.config.reveal_interval());

        Ok(SubmitOutcome::Answered {
            user_message,
            assistant_message,
        })
    }

    /// Discard the conversation and its session
    pub fn start_new_session(&self) {
        self.sessions.start_new_session();
    }

    /// Stop revealing the current answer, keeping what is already shown
    pub fn cancel_reveal(&self) {
        self.reveal.cancel_reveal();
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_revealing()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.sessions.current()
    }

    /// Dismiss the error currently shown
    pub fn clear_error(&self) {
        self.shared.update(|st| st.error = None);
    }

    /// Copy of the state for rendering
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.shared.read(|st| st.snapshot())
    }

    /// Receiver that changes whenever the conversation state changes,
    /// including once per revealed character
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.subscribe()
    }

    async fn request_answer(&self, question: &str, attachment: Option<&Attachment>) -> ChatResult<String> {
        let session = self.sessions.ensure_session(attachment).await?;
        debug!("Sending question to session {}", session);
        self.service.ask(&session, question).await
    }

    fn roll_back(
        &self,
        epoch: u64,
        user_message: MessageId,
        is_first_message: bool,
        err: ChatError,
    ) -> ChatResult<SubmitOutcome> {
        let applied = self.shared.update(|st| {
            if st.epoch != epoch {
                return false;
            }
            st.store.remove_message(user_message);
            if is_first_message {
                st.title = None;
            }
            st.error = Some(err.to_string());
            st.awaiting_response = false;
            true
        });

        if !applied {
            info!("Request for a discarded chat ended: {}", err);
            return Ok(SubmitOutcome::Discarded);
        }

        warn!("Submit failed: {}", err);
        Err(err)
    }

    fn fail(&self, err: ChatError) -> ChatError {
        debug!("Rejected submit: {}", err);
        self.shared.update(|st| st.error = Some(err.to_string()));
        err
    }
}
