//! Ubuntu Lend CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! ul-cli migrate
//!
//! # Grant or revoke admin access
//! ul-cli admin promote --email ops@ubuntulend.com
//! ul-cli admin demote --email ops@ubuntulend.com
//!
//! # Regenerate dashboard metrics (defaults to today)
//! ul-cli metrics refresh --date 2026-03-31
//!
//! # Delete expired one-time codes and pending sign-ups
//! ul-cli cleanup
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ul-cli")]
#[command(author, version, about = "Ubuntu Lend CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Dashboard aggregates
    Metrics {
        #[command(subcommand)]
        action: MetricsAction,
    },
    /// Delete expired one-time codes and pending OAuth sign-ups
    Cleanup,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin access to an existing user
    Promote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke admin access
    Demote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum MetricsAction {
    /// Recompute aggregates for one day
    Refresh {
        /// Day to compute (YYYY-MM-DD), defaults to today in UTC
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Demote { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Metrics { action } => match action {
            MetricsAction::Refresh { date } => commands::metrics::refresh(date).await?,
        },
        Commands::Cleanup => commands::cleanup::run().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_metrics_refresh_date() {
        let cli = Cli::try_parse_from(["ul-cli", "metrics", "refresh", "--date", "2026-03-31"])
            .expect("valid args");
        match cli.command {
            Commands::Metrics {
                action: MetricsAction::Refresh { date },
            } => assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 31)),
            _ => panic!("expected metrics refresh"),
        }
    }

    #[test]
    fn test_promote_requires_email() {
        assert!(Cli::try_parse_from(["ul-cli", "admin", "promote"]).is_err());
    }
}
