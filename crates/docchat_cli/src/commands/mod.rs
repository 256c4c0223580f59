//! CLI command definitions.
//!
//! Both commands are thin display layers over `ConversationController`:
//! they submit input, then print the answer as it is revealed.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docchat_session::{AttachmentPolicy, ChatConfig, ConversationController, MessageId};
use tokio::sync::mpsc;

pub mod ask;
pub mod chat;

/// docchat - Ask questions about your documents
#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, about = "docchat - Ask questions about your documents")]
#[command(long_about = r#"
docchat uploads a document to a document-chat server and lets you ask
questions about it. Answers are revealed character by character.

COMMANDS:
  ask   → Upload a document and ask a single question
  chat  → Interactive conversation (/attach, /new, /quit)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Server request failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Base URL of the document-chat server
    #[arg(short, long, global = true, env = "DOCCHAT_API_URL")]
    pub server: Option<String>,

    /// JSON settings file
    #[arg(short, long, global = true, env = "DOCCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Delay between revealed characters, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub reveal_interval_ms: Option<u64>,

    /// Accepted attachment types, e.g. ".pdf,.docx,.txt"
    #[arg(long, global = true, value_name = "EXTENSIONS")]
    pub accept: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a document and ask one question about it
    Ask(ask::AskArgs),

    /// Start an interactive conversation
    Chat(chat::ChatArgs),
}

impl GlobalArgs {
    /// Settings file, then environment, then command-line flags
    pub fn resolve_config(&self) -> Result<ChatConfig> {
        self.resolve_config_with(|key| std::env::var(key).ok())
    }

    /// Same as `resolve_config`, reading variables through `lookup`
    pub fn resolve_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ChatConfig> {
        let base = match &self.config {
            Some(path) => ChatConfig::load(path)?,
            None => ChatConfig::default(),
        };
        let mut config = base.apply_vars(lookup)?;

        if let Some(server) = &self.server {
            config.base_url = server.trim().to_string();
        }
        if let Some(ms) = self.reveal_interval_ms {
            config.reveal_interval_ms = ms;
        }
        if let Some(accept) = &self.accept {
            config.attachments = AttachmentPolicy::parse(accept)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn controller(&self) -> Result<ConversationController> {
        let config = self.resolve_config()?;
        tracing::debug!("Using server {}", config.base_url);
        Ok(ConversationController::connect(config)?)
    }
}

/// Ctrl-C presses, delivered as messages.
///
/// A single listener is installed for the whole run, so the key keeps
/// working between reveals and no press is lost while nobody is waiting.
pub struct Interrupts {
    rx: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    /// Start listening for Ctrl-C
    pub fn listen() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }

    /// Interrupts fed by hand, for tests
    #[cfg(test)]
    pub fn channel() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next Ctrl-C. Never resolves once the listener is gone.
    pub async fn next(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// How a reveal ended on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEnd {
    Finished,
    Stopped,
}

/// Print the assistant message `id` as it grows, until its reveal ends.
///
/// Ctrl-C stops the reveal and keeps the text shown so far.
pub async fn print_reveal(
    controller: &ConversationController,
    id: MessageId,
    interrupts: &mut Interrupts,
) -> Result<RevealEnd> {
    write_reveal(controller, id, interrupts, &mut std::io::stdout()).await
}

async fn write_reveal<W: Write>(
    controller: &ConversationController,
    id: MessageId,
    interrupts: &mut Interrupts,
    out: &mut W,
) -> Result<RevealEnd> {
    let mut changes = controller.subscribe();
    let mut printed = 0;
    let mut end = RevealEnd::Finished;

    loop {
        let _ = changes.borrow_and_update();
        let snapshot = controller.snapshot();
        if let Some(message) = snapshot.message(id) {
            if message.text.len() > printed {
                write!(out, "{}", &message.text[printed..])?;
                out.flush()?;
                printed = message.text.len();
            }
        }

        if !snapshot.revealing {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interrupts.next() => {
                controller.cancel_reveal();
                write!(out, " [stopped]")?;
                end = RevealEnd::Stopped;
                break;
            }
        }
    }

    writeln!(out)?;
    Ok(end)
}
