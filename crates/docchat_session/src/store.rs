//! Ordered message log.
//!
//! Messages are kept in insertion order, which is also display order. Ids come
//! from a counter that survives `clear`, so an id handed out before a reset
//! can never address a message created after it.

use chrono::Utc;
use tracing::debug;

use crate::types::{Message, MessageId, Sender};

/// In-memory message log for one conversation
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    last_id: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message and return its id
    pub fn append_user_message(
        &mut self,
        text: impl Into<String>,
        attachment_name: Option<String>,
    ) -> MessageId {
        self.push(Sender::User, text.into(), attachment_name)
    }

    /// Append an assistant message with no text yet; its id is the reveal target
    pub fn append_empty_assistant_message(&mut self) -> MessageId {
        self.push(Sender::Assistant, String::new(), None)
    }

    /// Append one character to a message. Returns false if the message is gone.
    pub fn append_char(&mut self, id: MessageId, ch: char) -> bool {
        match self.get_mut(id) {
            Some(message) => {
                message.text.push(ch);
                true
            }
            None => false,
        }
    }

    /// Remove a message, e.g. to roll back an optimistic append
    pub fn remove_message(&mut self, id: MessageId) -> Option<Message> {
        let index = self.index_of(id)?;
        debug!("Removing message {}", id);
        Some(self.messages.remove(index))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index_of(id).map(|i| &self.messages[i])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. The id counter keeps counting.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, sender: Sender, text: String, attachment_name: Option<String>) -> MessageId {
        self.last_id += 1;
        let id = MessageId::new(self.last_id);
        debug!("Appending {:?} message {}", sender, id);
        self.messages.push(Message {
            id,
            sender,
            text,
            attachment_name,
            created_at: Utc::now(),
        });
        id
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let index = self.index_of(id)?;
        Some(&mut self.messages[index])
    }

    // Ids are sorted, so a binary search is enough.
    fn index_of(&self, id: MessageId) -> Option<usize> {
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }
}
