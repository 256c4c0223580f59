//! # docchat_session - Chat Session Controller for docchat
//!
//! This crate holds the client-side logic of a document chat:
//! - Session identity, created by uploading the first attached document
//! - An ordered message log, mutated only through the controller
//! - A simulated streaming reveal of answers that arrive in one piece
//!
//! Rendering is left to the caller, which observes the conversation through
//! [`ConversationController::snapshot`] and [`ConversationController::subscribe`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  submit   ┌────────────────────────┐  upload/chat  ┌──────────────┐
//! │ Display layer  │──────────▶│ ConversationController │──────────────▶│ Doc service  │
//! └───────▲────────┘           └──┬──────────┬──────────┘               └──────────────┘
//!         │                       │          │
//!         │ snapshot/subscribe    ▼          ▼
//!         │              ┌──────────────┐ ┌─────────────────┐
//!         └──────────────│ MessageStore │◀│ RevealScheduler │
//!                        └──────────────┘ └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use docchat_session::{Attachment, ChatConfig, ConversationController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = ConversationController::connect(ChatConfig::from_env()?)?;
//!     let paper = Attachment::from_path("paper.pdf").await?;
//!
//!     let mut changes = controller.subscribe();
//!     controller.submit("Summarize the findings", Some(paper)).await?;
//!     while controller.is_revealing() {
//!         changes.changed().await?;
//!     }
//!     println!("{:#?}", controller.snapshot().messages);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod mock;
pub mod reveal;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

pub use client::{error_detail, DocumentService, HttpDocumentService, CHAT_FAILED, UPLOAD_FAILED};
pub use config::{AttachmentPolicy, ChatConfig};
pub use controller::ConversationController;
pub use error::{ChatError, ChatResult};
pub use mock::{CapturedCall, ScriptedDocumentService};
pub use reveal::{Reveal, RevealScheduler, RevealStep};
pub use session::SessionManager;
pub use state::ConversationState;
pub use store::MessageStore;
pub use types::{
    Attachment, ConversationSnapshot, Message, MessageId, Sender, SessionId, SubmitOutcome,
};
