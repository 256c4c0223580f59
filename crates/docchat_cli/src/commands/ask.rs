//! Ask command - Upload a document and ask a single question.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use docchat_session::{Attachment, SubmitOutcome};
use tracing::info;

use super::{print_reveal, GlobalArgs, Interrupts};

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Document to ask about
    #[arg(short, long)]
    pub file: PathBuf,

    /// Print the finished conversation as JSON instead of revealing the answer
    #[arg(long)]
    pub json: bool,

    /// The question
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
}

impl AskArgs {
    pub fn question(&self) -> String {
        self.question.join(" ")
    }
}

pub async fn execute(global: &GlobalArgs, args: &AskArgs) -> Result<()> {
    let controller = global.controller()?;
    let attachment = Attachment::from_path(&args.file).await?;
    info!("Asking about {}", attachment.name);

    if !args.json {
        println!("📄 {}", attachment.name);
    }

    let outcome = controller.submit(args.question(), Some(attachment)).await?;
    let SubmitOutcome::Answered { assistant_message, .. } = outcome else {
        anyhow::bail!("The conversation was reset before the answer arrived");
    };

    if args.json {
        let mut changes = controller.subscribe();
        while controller.is_revealing() {
            changes.changed().await?;
        }
        println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    } else {
        print_reveal(&controller, assistant_message, &mut Interrupts::listen()).await?;
    }

    Ok(())
}
