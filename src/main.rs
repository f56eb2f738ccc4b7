//! monteverde-cli - Lightweight messaging client for the Monteverde school portal
//!
//! A terminal client for the portal's messaging subsystem: conversations,
//! threads and sending, against the school REST backend.

mod api;
mod auth;
mod config;
mod conversations;
mod models;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::models::Role;

#[derive(Parser)]
#[command(name = "monteverde-cli")]
#[command(about = "Lightweight CLI messaging client for the Monteverde school portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with portal credentials
    Login {
        /// Account email
        email: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show current authentication status
    Status,

    /// Show current user info (verify auth works)
    Whoami,

    /// List contacts by role
    Contacts {
        /// Role to list: docente, familia or admin
        #[arg(short, long, default_value = "familia")]
        role: Role,
    },

    /// List conversations (newest first, with unread counts)
    Chats,

    /// Open the conversation with a contact and mark it read
    Read {
        /// Contact user id (from `chats` or `contacts` output)
        contact_id: i64,
    },

    /// Send a message
    Send {
        /// Recipient user id
        #[arg(short, long)]
        to: i64,

        /// Subject (defaults to the role placeholder)
        #[arg(short, long)]
        subject: Option<String>,

        /// Message body
        message: String,
    },
}

/// Prompt for the password on stdin when not given as a flag.
fn prompt_password() -> Result<String> {
    print!("Password: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            tracing::info!("Logging in...");
            auth::login(&email, &password).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout()?;
        }
        Commands::Status => {
            auth::status()?;
        }
        Commands::Whoami => {
            api::whoami().await?;
        }
        Commands::Contacts { role } => {
            api::list_contacts(role).await?;
        }
        Commands::Chats => {
            tracing::info!("Fetching conversations...");
            api::list_chats().await?;
        }
        Commands::Read { contact_id } => {
            api::read_thread(contact_id).await?;
        }
        Commands::Send {
            to,
            subject,
            message,
        } => {
            tracing::info!("Sending message...");
            api::send_message(to, subject.as_deref(), &message).await?;
        }
    }

    Ok(())
}
