//! Contact and user lookups

use anyhow::{Context, Result};

use super::client::PortalClient;
use super::error::ApiError;
use crate::conversations::ContactSource;
use crate::models::{Contact, Role};

/// Contacts visible for a role. The two common roles have dedicated
/// endpoints; anything else goes through the generic alias.
pub async fn contacts_by_role(client: &PortalClient, role: Role) -> Result<Vec<Contact>, ApiError> {
    let path = match role {
        Role::Familia => "/usuarios/familia".to_string(),
        Role::Docente => "/usuarios/docentes".to_string(),
        other => format!("/usuarios/por-rol/{}", other),
    };
    client.get(&path).await
}

/// Single contact record by user id.
pub async fn user_by_id(client: &PortalClient, user_id: i64) -> Result<Contact, ApiError> {
    client.get(&format!("/usuario/{}", user_id)).await
}

impl ContactSource for PortalClient {
    async fn contact(&self, user_id: i64) -> Result<Contact, ApiError> {
        user_by_id(self, user_id).await
    }
}

/// List contacts with a given role (prints to stdout).
pub async fn list_contacts(role: Role) -> Result<()> {
    let client = PortalClient::new()?;
    let contacts = contacts_by_role(&client, role)
        .await
        .with_context(|| format!("Failed to fetch {} contacts", role))?;

    println!("\nContacts ({}):", role);
    println!("{:-<60}", "");

    if contacts.is_empty() {
        println!("  (none found)");
        return Ok(());
    }

    for contact in &contacts {
        println!("{}  [id {}]", contact.name, contact.id);
        println!("  {}", contact.email);
    }

    Ok(())
}

/// Show the logged-in user, verified against the backend.
pub async fn whoami() -> Result<()> {
    let client = PortalClient::new()?;
    let session_user = client.current_user()?;

    let user = user_by_id(&client, session_user.id)
        .await
        .context("Failed to verify session against the backend")?;

    println!("Logged in as:");
    println!("  Name:  {}", user.name);
    println!("  Email: {}", user.email);
    println!("  Role:  {}", user.role);
    println!("  Id:    {}", user.id);

    Ok(())
}
