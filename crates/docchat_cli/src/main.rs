//! docchat CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Server request failure

use std::process::ExitCode;

use clap::Parser;
use docchat_session::ChatError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const REQUEST_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so revealed answers on stdout stay clean
    let level = if cli.global.verbose { "docchat=debug" } else { "docchat=info" };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(level.parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match &cli.command {
        Commands::Ask(args) => commands::ask::execute(&cli.global, args).await,
        Commands::Chat(args) => commands::chat::execute(&cli.global, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<ChatError>() {
        Some(ChatError::Config(_)) => ExitCodes::INVALID_ARGS,
        Some(
            ChatError::EmptyInput
            | ChatError::MissingAttachment
            | ChatError::MissingSession
            | ChatError::UnsupportedAttachment { .. },
        ) => ExitCodes::INVALID_ARGS,
        Some(err) if err.is_request_failure() => ExitCodes::REQUEST_FAILURE,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
