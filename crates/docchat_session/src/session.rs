//! Session manager.
//!
//! A session is created at most once per conversation: when the first user
//! message carries a document, that document is registered with the server
//! and the returned id scopes every later question.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::DocumentService;
use crate::error::{ChatError, ChatResult};
use crate::reveal::RevealScheduler;
use crate::state::Shared;
use crate::types::{Attachment, SessionId};

/// Owns session identity and the new-chat lifecycle
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
    service: Arc<dyn DocumentService>,
    reveal: RevealScheduler,
}

impl SessionManager {
    pub(crate) fn new(shared: Arc<Shared>, service: Arc<dyn DocumentService>, reveal: RevealScheduler) -> Self {
        Self {
            shared,
            service,
            reveal,
        }
    }

    /// The current session id, if a document has been registered
    pub fn current(&self) -> Option<SessionId> {
        self.shared.read(|st| st.session.clone())
    }

    /// Discard the session and the whole conversation.
    ///
    /// Stops any reveal in progress. Responses to requests issued before this
    /// call are ignored when they arrive.
    pub fn start_new_session(&self) {
        self.reveal.cancel_reveal();
        let previous = self.shared.update(|st| {
            let previous = st.session.take();
            st.reset();
            previous
        });

        match previous {
            Some(id) => info!("Started a new chat, dropped session {}", id),
            None => info!("Started a new chat"),
        }
    }

    /// Return the current session, registering `attachment` if there is none.
    ///
    /// Registration is attempted once; its failure is returned as-is.
    pub async fn ensure_session(&self, attachment: Option<&Attachment>) -> ChatResult<SessionId> {
        let (existing, epoch) = self.shared.read(|st| (st.session.clone(), st.epoch));
        if let Some(id) = existing {
            return Ok(id);
        }

        let attachment = attachment.ok_or(ChatError::MissingSession)?;
        info!("Registering document {}", attachment.name);
        let id = self.service.upload(attachment).await?;

        let stored = self.shared.update(|st| {
            if st.epoch != epoch {
                return false;
            }
            st.session = Some(id.clone());
            true
        });
        if !stored {
            warn!("Ignoring session {} issued for a discarded chat", id);
            return Err(ChatError::Stale);
        }

        info!("Session {} opened for {}", id, attachment.name);
        Ok(id)
    }
}
