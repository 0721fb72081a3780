//! Secure Commerce CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sc-cli migrate
//!
//! # Create an admin account (password from --password or SC_ADMIN_PASSWORD)
//! sc-cli admin create -e admin@example.com -f Ada -l Lovelace
//!
//! # Delete expired password reset codes
//! sc-cli otp prune
//!
//! # Forget revoked tokens that have expired anyway
//! sc-cli tokens prune
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Secure Commerce CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Maintain password reset codes
    Otp {
        #[command(subcommand)]
        action: OtpAction,
    },
    /// Maintain the revoked token list
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Given name
        #[arg(short, long)]
        first_name: String,

        /// Family name
        #[arg(short, long)]
        last_name: String,

        /// Account password
        #[arg(long, env = "SC_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum OtpAction {
    /// Delete codes older than the validity window
    Prune,
}

#[derive(Subcommand)]
enum TokensAction {
    /// Delete revoked ids whose tokens have expired
    Prune,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load .env before parsing so `SC_ADMIN_PASSWORD` can come from it
    dotenvy::dotenv().ok();
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
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                first_name,
                last_name,
                password,
            } => {
                let password = SecretString::from(password);
                commands::admin::create_user(&email, &first_name, &last_name, &password).await?;
            }
        },
        Commands::Otp { action } => match action {
            OtpAction::Prune => {
                commands::otp::prune().await?;
            }
        },
        Commands::Tokens { action } => match action {
            TokensAction::Prune => {
                commands::tokens::prune().await?;
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
    fn test_parses_maintenance_commands() {
        for args in [["sc-cli", "otp", "prune"], ["sc-cli", "tokens", "prune"]] {
            assert!(Cli::try_parse_from(args).is_ok(), "{args:?}");
        }
        assert!(Cli::try_parse_from(["sc-cli", "tokens", "purge"]).is_err());
    }
}
