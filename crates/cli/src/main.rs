//! userhub CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! userhub-cli migrate
//!
//! # Re-send a verification link to an unverified account
//! userhub-cli verification resend -e alice@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `verification resend` - Publish a fresh verification link

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "userhub-cli")]
#[command(author, version, about = "userhub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage email verification
    Verification {
        #[command(subcommand)]
        action: VerificationAction,
    },
}

#[derive(Subcommand)]
enum VerificationAction {
    /// Issue and publish a fresh verification link
    Resend {
        /// Account email address (case-sensitive)
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Verification { action } => match action {
            VerificationAction::Resend { email } => {
                commands::verification::resend(&email).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resend() {
        let cli = Cli::try_parse_from([
            "userhub-cli",
            "verification",
            "resend",
            "--email",
            "alice@example.com",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Verification {
                action: VerificationAction::Resend { ref email }
            } if email == "alice@example.com"
        ));
    }
}
