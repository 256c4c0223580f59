//! Conversation state shared between the controller and the reveal task.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::reveal::Reveal;
use crate::store::MessageStore;
use crate::types::{ConversationSnapshot, SessionId};

/// Everything the display layer renders for one conversation
#[derive(Debug, Default)]
pub struct ConversationState {
    pub(crate) store: MessageStore,
    pub(crate) session: Option<SessionId>,
    pub(crate) title: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) awaiting_response: bool,
    pub(crate) reveal: Option<Reveal>,
    /// Bumped on every new chat; responses carrying an older epoch are stale.
    pub(crate) epoch: u64,
    pub(crate) reveal_generation: u64,
}

impl ConversationState {
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_some()
    }

    /// Forget the conversation and start a new epoch
    pub(crate) fn reset(&mut self) {
        self.store.clear();
        self.session = None;
        self.title = None;
        self.error = None;
        self.awaiting_response = false;
        self.reveal = None;
        self.epoch += 1;
    }

    pub(crate) fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.store.messages().to_vec(),
            title: self.title.clone(),
            error: self.error.clone(),
            session_id: self.session.clone(),
            awaiting_response: self.awaiting_response,
            revealing: self.reveal.is_some(),
        }
    }
}

/// State cell plus a revision counter that observers can wait on.
///
/// The lock is only taken inside `read`/`update`, so it is never held across
/// an await point.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<ConversationState>,
    revisions: watch::Sender<u64>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            state: Mutex::new(ConversationState::default()),
            revisions,
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Mutate the state and notify observers
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.revisions.send_modify(|rev| *rev += 1);
        result
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }
}
