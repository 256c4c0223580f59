//! Chat command - Interactive conversation about a document.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use docchat_session::{Attachment, ChatError, ConversationController, SubmitOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use super::{print_reveal, GlobalArgs, Interrupts};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Document to attach to the first question
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Question(String),
    Attach(PathBuf),
    NewChat,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Self::Question(line.to_string());
        };

        let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        match name {
            "attach" if !rest.trim().is_empty() => Self::Attach(PathBuf::from(rest.trim())),
            "new" => Self::NewChat,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

pub async fn execute(global: &GlobalArgs, args: &ChatArgs) -> Result<()> {
    let controller = global.controller()?;
    let staged = match &args.file {
        Some(path) => Some(stage(path, &controller).await?),
        None => None,
    };

    println!("💬 docchat - type /help for commands, Ctrl-C to leave");
    let lines = BufReader::new(tokio::io::stdin()).lines();
    run(&controller, lines, staged, &mut Interrupts::listen()).await
}

/// Read and answer lines until `/quit`, end of input or Ctrl-C.
///
/// Ctrl-C during a reveal only stops the reveal; anywhere else it leaves.
async fn run<R>(
    controller: &ConversationController,
    mut lines: Lines<R>,
    mut staged: Option<Attachment>,
    interrupts: &mut Interrupts,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        prompt(controller, staged.as_ref());
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupts.next() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match Input::parse(&line) {
            Input::Question(text) => {
                let attachment = staged.take();
                if submit(controller, text, attachment, interrupts).await? == Submitted::Interrupted {
                    println!();
                    break;
                }
            }
            Input::Attach(path) => match stage(&path, controller).await {
                Ok(attachment) => staged = Some(attachment),
                Err(e) => println!("⚠️  {}", e),
            },
            Input::NewChat => {
                controller.start_new_session();
                staged = None;
                println!("✨ New chat");
            }
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Unknown(cmd) => println!("⚠️  Unknown command: {}", cmd),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Submitted {
    Done,
    Interrupted,
}

async fn submit(
    controller: &ConversationController,
    text: String,
    attachment: Option<Attachment>,
    interrupts: &mut Interrupts,
) -> Result<Submitted> {
    let result = tokio::select! {
        result = controller.submit(text, attachment) => result,
        _ = interrupts.next() => return Ok(Submitted::Interrupted),
    };

    match result {
        Ok(SubmitOutcome::Answered { assistant_message, .. }) => {
            print_reveal(controller, assistant_message, interrupts).await?;
        }
        Ok(SubmitOutcome::Discarded) => debug!("Answer discarded"),
        Err(ChatError::EmptyInput) => {}
        Err(e @ (ChatError::Io(_) | ChatError::Serialization(_) | ChatError::Config(_))) => {
            return Err(e.into());
        }
        Err(_) => {
            if let Some(error) = controller.snapshot().error {
                println!("⚠️  {}", error);
            }
        }
    }
    Ok(Submitted::Done)
}

async fn stage(path: &Path, controller: &ConversationController) -> Result<Attachment> {
    let attachment = Attachment::from_path(path).await?;
    let policy = &controller.config().attachments;
    if !policy.allows(&attachment.name) {
        anyhow::bail!("{} is not an accepted document type ({})", attachment.name, policy.describe());
    }
    if controller.session_id().is_some() {
        println!("📎 {} staged (this chat already has a document; it will not be re-uploaded)", attachment.name);
    } else {
        println!("📎 {} staged", attachment.name);
    }
    Ok(attachment)
}

fn prompt(controller: &ConversationController, staged: Option<&Attachment>) {
    use std::io::Write;

    let snapshot = controller.snapshot();
    let title = snapshot.title.as_deref().unwrap_or("new chat");
    match staged {
        Some(a) => print!("[{} + {}] > ", title, a.name),
        None => print!("[{}] > ", title),
    }
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!("  <text>          ask a question");
    println!("  /attach <path>  attach a document to the next question");
    println!("  /new            start a new chat");
    println!("  /quit           exit");
}
