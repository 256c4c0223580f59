//! Reveal scheduler.
//!
//! The server sends each answer in one piece. To look like live generation,
//! the answer is copied into its assistant message one character per tick.
//! This is purely a display effect: nothing streams over the wire.
//!
//! ```text
//!            start_reveal
//!   ┌──────┐ ───────────▶ ┌───────────┐
//!   │ Idle │              │ Revealing │ ── tick: append next char
//!   └──────┘ ◀─────────── └───────────┘
//!        text exhausted / cancel_reveal
//! ```
//!
//! At most one reveal exists. Starting another cancels the current one first,
//! and every reveal carries a generation number so a tick from a superseded
//! timer can never touch the store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::state::{ConversationState, Shared};
use crate::store::MessageStore;
use crate::types::MessageId;

/// Progress of one answer being revealed into its message
#[derive(Debug, Clone)]
pub struct Reveal {
    target: MessageId,
    chars: Vec<char>,
    index: usize,
    generation: u64,
}

/// What a single reveal step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    /// One character was appended and more remain
    Advanced,
    /// The whole text has been revealed
    Completed,
    /// The target message no longer exists
    TargetGone,
}

impl Reveal {
    pub fn new(target: MessageId, full_text: &str) -> Self {
        Self {
            target,
            chars: full_text.chars().collect(),
            index: 0,
            generation: 0,
        }
    }

    pub fn target(&self) -> MessageId {
        self.target
    }

    /// Number of characters revealed so far
    pub fn revealed(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.chars.len() - self.index
    }

    /// Append the next character to the target message
    pub fn step(&mut self, store: &mut MessageStore) -> RevealStep {
        let Some(&ch) = self.chars.get(self.index) else {
            return RevealStep::Completed;
        };
        if !store.append_char(self.target, ch) {
            return RevealStep::TargetGone;
        }
        self.index += 1;
        if self.index == self.chars.len() {
            RevealStep::Completed
        } else {
            RevealStep::Advanced
        }
    }
}

/// Advance the active reveal of `generation`. Returns true once the timer
/// driving it should stop.
fn tick(state: &mut ConversationState, generation: u64) -> bool {
    let ConversationState { reveal, store, .. } = state;
    let Some(active) = reveal.as_mut().filter(|r| r.generation == generation) else {
        return true;
    };

    match active.step(store) {
        RevealStep::Advanced => false,
        step => {
            debug!("Reveal of {} finished ({:?})", active.target, step);
            *reveal = None;
            true
        }
    }
}

/// Drives the active reveal with a repeating timer
#[derive(Clone)]
pub struct RevealScheduler {
    shared: Arc<Shared>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RevealScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Reveal `full_text` into `target`, one character every `interval`.
    ///
    /// Any reveal already running is cancelled first. Must be called from
    /// within a tokio runtime.
    pub fn start_reveal(&self, target: MessageId, full_text: &str, interval: Duration) {
        self.cancel_reveal();

        let mut reveal = Reveal::new(target, full_text);
        let generation = self.shared.update(|st| {
            st.reveal_generation += 1;
            reveal.generation = st.reveal_generation;
            st.reveal = Some(reveal);
            st.reveal_generation
        });
        debug!("Revealing {} chars into {}", full_text.chars().count(), target);

        let interval = interval.max(Duration::from_millis(1));
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                if shared.update(|st| tick(st, generation)) {
                    break;
                }
            }
        });

        *self.task.lock() = Some(handle);
    }

    /// Stop the running reveal, keeping the text revealed so far
    pub fn cancel_reveal(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        let cancelled = self.shared.read(|st| st.reveal.is_some());
        if cancelled {
            self.shared.update(|st| st.reveal = None);
            debug!("Reveal cancelled");
        }
    }

    pub fn is_revealing(&self) -> bool {
        self.shared.read(|st| st.reveal.is_some())
    }
}
