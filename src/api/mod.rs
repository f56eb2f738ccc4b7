//! API client module for the Monteverde portal

pub mod client;
pub mod error;
mod messages;
mod users;

use anyhow::Result;

use crate::models::Role;

/// List conversations aggregated from the flat message store
pub async fn list_chats() -> Result<()> {
    messages::list_chats().await
}

/// Open the thread with a contact, marking inbound messages read
pub async fn read_thread(contact_id: i64) -> Result<()> {
    messages::read_thread(contact_id).await
}

/// Send a message to a contact
pub async fn send_message(to: i64, subject: Option<&str>, body: &str) -> Result<()> {
    messages::send(to, subject, body).await
}

/// List contacts with a given role
pub async fn list_contacts(role: Role) -> Result<()> {
    users::list_contacts(role).await
}

/// Show current user info (verify auth works)
pub async fn whoami() -> Result<()> {
    users::whoami().await
}
