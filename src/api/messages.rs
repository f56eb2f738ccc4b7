//! Messaging endpoints and the conversation/send commands
//!
//! The backend stores flat message records; the conversation view is derived
//! client-side (see `conversations`) and rebuilt in full after every mutation.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::client::PortalClient;
use super::error::ApiError;
use crate::conversations::{self, ReadStateSink};
use crate::models::{Contact, Message, OutgoingMessage};

/// Flat message list for a user.
pub async fn messages_for_user(
    client: &PortalClient,
    user_id: i64,
) -> Result<Vec<Message>, ApiError> {
    let value: Value = client.get(&format!("/mensajes/{}", user_id)).await?;
    parse_messages(value)
}

/// Full thread between two users, ascending by timestamp.
pub async fn thread_between(
    client: &PortalClient,
    user_a: i64,
    user_b: i64,
) -> Result<Vec<Message>, ApiError> {
    let value: Value = client
        .get(&format!("/conversacion/{}/{}", user_a, user_b))
        .await?;
    parse_messages(value)
}

/// Flip a message's read flag server-side.
pub async fn mark_read(client: &PortalClient, message_id: i64) -> Result<(), ApiError> {
    client
        .put(&format!("/mensajes/marcar-leido/{}", message_id))
        .await
}

impl ReadStateSink for PortalClient {
    async fn mark_read(&self, message_id: i64) -> Result<(), ApiError> {
        mark_read(self, message_id).await
    }
}

/// Send a message to a contact, returning the server-created record.
///
/// The body must be non-empty after trimming; an empty body is rejected here,
/// before any network traffic. A missing subject falls back to the sender
/// role's fixed placeholder.
pub async fn send_message(
    client: &PortalClient,
    recipient_id: i64,
    subject: Option<&str>,
    body: &str,
) -> Result<Message> {
    let body = match normalize_body(body) {
        Some(b) => b,
        None => bail!("Message body is empty; nothing sent."),
    };

    let sender = client.current_user()?;
    let subject = subject
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| sender.role.default_subject().to_string());

    let outgoing = OutgoingMessage {
        sender_id: sender.id,
        recipient_id,
        subject,
        body,
    };

    let payload = serde_json::to_value(&outgoing).context("Failed to encode message")?;
    let value: Value = client.post("/mensajes/enviar", &payload).await?;
    Ok(parse_sent(value)?)
}

/// Trimmed body, or None when nothing is left.
fn normalize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Accept a bare message array or a `{mensajes}` / `{conversacion}` wrapper.
///
/// Any other object shape is a decode error rather than an empty list, so a
/// drifting backend payload surfaces instead of reading as "no messages".
fn parse_messages(value: Value) -> Result<Vec<Message>, ApiError> {
    let list = match value {
        Value::Object(mut map) => map
            .remove("mensajes")
            .or_else(|| map.remove("conversacion"))
            .ok_or_else(|| {
                ApiError::Decode(serde::de::Error::custom(
                    "expected a message array or a mensajes/conversacion wrapper",
                ))
            })?,
        other => other,
    };
    Ok(serde_json::from_value(list)?)
}

/// The created record comes back either bare or under a `mensaje` key.
fn parse_sent(value: Value) -> Result<Message, ApiError> {
    let record = match value {
        Value::Object(mut map) if map.contains_key("mensaje") => {
            map.remove("mensaje").unwrap_or(Value::Null)
        }
        other => other,
    };
    Ok(serde_json::from_value(record)?)
}

/// Body preview for the conversation list, cut at a char boundary.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// List conversations aggregated from the flat message store (prints to stdout).
pub async fn list_chats() -> Result<()> {
    let client = PortalClient::new()?;
    let user = client.current_user()?;

    let messages = messages_for_user(&client, user.id)
        .await
        .context("Failed to fetch messages")?;
    let summaries = conversations::summarize(&messages, user.id);
    let chats = conversations::resolve(&client, summaries).await;

    println!("\nConversations:");
    println!("{:-<60}", "");

    if chats.is_empty() {
        println!("  (no conversations yet)");
        return Ok(());
    }

    let total_unread: u32 = chats.iter().map(|c| c.unread_count).sum();

    for chat in &chats {
        if chat.unread_count > 0 {
            println!("{}  [id {}]  ({} unread)", chat.contact.name, chat.contact.id, chat.unread_count);
        } else {
            println!("{}  [id {}]", chat.contact.name, chat.contact.id);
        }
        println!("  Subject: {}", chat.last_message.subject);
        println!("  {}", preview(&chat.last_message.body, 60));
        println!(
            "  {}",
            chat.last_message.timestamp.format("%d/%m/%Y %H:%M")
        );
        println!();
    }

    println!(
        "{} conversations, {} unread messages",
        chats.len(),
        total_unread
    );

    Ok(())
}

/// Open the thread with a contact and mark inbound messages read.
pub async fn read_thread(contact_id: i64) -> Result<()> {
    let client = PortalClient::new()?;
    let user = client.current_user()?;

    let contact: Contact = super::users::user_by_id(&client, contact_id)
        .await
        .with_context(|| format!("Failed to fetch contact {}", contact_id))?;

    let thread = thread_between(&client, user.id, contact.id)
        .await
        .with_context(|| format!("Failed to fetch conversation with {}", contact.name))?;
    let mut summaries = conversations::summarize(&thread, user.id);
    let unread_before = summaries.first().map(|s| s.unread_count).unwrap_or(0);

    println!("\nConversation with {} <{}>:", contact.name, contact.email);
    println!("{:-<60}", "");

    if thread.is_empty() {
        println!("  (no messages yet)");
        return Ok(());
    }

    for msg in &thread {
        let who = if msg.sender_id == user.id {
            "me"
        } else {
            contact.name.as_str()
        };
        println!(
            "[{}] {}: ({}) {}",
            msg.timestamp.format("%d/%m/%Y %H:%M"),
            who,
            msg.subject,
            msg.body
        );
    }

    // The thread is shown as fully read whatever the individual outcomes.
    let outcomes = conversations::mark_thread_read(&client, &thread, user.id).await;
    conversations::clear_unread(&mut summaries, contact.id);
    let unread_after = summaries.first().map(|s| s.unread_count).unwrap_or(0);

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    if !outcomes.is_empty() {
        if failed == 0 {
            println!("\n{} message(s) marked read.", outcomes.len());
        } else {
            println!(
                "\n{} message(s) marked read, {} failed (shown as read anyway).",
                outcomes.len() - failed,
                failed
            );
        }
        println!("Unread: {} -> {}", unread_before, unread_after);
    }

    Ok(())
}

/// Send a message and rebuild the conversation list.
pub async fn send(recipient_id: i64, subject: Option<&str>, body: &str) -> Result<()> {
    let client = PortalClient::new()?;
    let user = client.current_user()?;

    let sent = send_message(&client, recipient_id, subject, body)
        .await
        .context("Failed to send message")?;

    println!("Message sent.");
    println!(
        "[{}] me: ({}) {}",
        sent.timestamp.format("%d/%m/%Y %H:%M"),
        sent.subject,
        sent.body
    );

    // Re-fetch and re-aggregate so the new ordering is reflected.
    let messages = messages_for_user(&client, user.id)
        .await
        .context("Failed to refresh messages")?;
    let summaries = conversations::summarize(&messages, user.id);
    println!("Conversation list refreshed ({} conversations).", summaries.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_body_rejects_whitespace() {
        assert_eq!(normalize_body(""), None);
        assert_eq!(normalize_body("   \n\t "), None);
        assert_eq!(normalize_body("  hola  "), Some("hola".to_string()));
    }

    #[test]
    fn test_parse_messages_bare_array() {
        let value = json!([{
            "id": 1, "emisorId": 2, "receptorId": 3, "asunto": "a",
            "cuerpo": "b", "fecha": "2024-05-10T14:30:00Z", "leido": false
        }]);
        let msgs = parse_messages(value).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, 1);
    }

    #[test]
    fn test_parse_messages_wrapped() {
        let value = json!({"mensajes": [], "pagination": {"page": 1}});
        assert!(parse_messages(value).unwrap().is_empty());
    }

    #[test]
    fn test_parse_messages_conversacion_wrapper() {
        let value = json!({"conversacion": [{
            "id": 2, "emisorId": 4, "receptorId": 5, "asunto": "a",
            "cuerpo": "b", "fecha": "2024-05-10T14:30:00Z", "leido": true
        }]});
        let msgs = parse_messages(value).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, 2);
    }

    #[test]
    fn test_parse_messages_rejects_unknown_object_shape() {
        let value = json!({"resultados": [], "total": 0});
        assert!(matches!(
            parse_messages(value),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_sent_under_mensaje_key() {
        let value = json!({
            "message": "Mensaje enviado exitosamente",
            "mensaje": {
                "id": 9, "emisorId": 2, "receptorId": 3, "asunto": "a",
                "cuerpo": "b", "fecha": "2024-05-10T14:30:00Z", "leido": false
            }
        });
        assert_eq!(parse_sent(value).unwrap().id, 9);
    }

    #[test]
    fn test_parse_sent_bare_record() {
        let value = json!({
            "id": 4, "emisorId": 2, "receptorId": 3, "asunto": "a",
            "cuerpo": "b", "fecha": "2024-05-10T14:30:00Z", "leido": false
        });
        assert_eq!(parse_sent(value).unwrap().id, 4);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("corto", 60), "corto");
        let long = "á".repeat(70);
        let cut = preview(&long, 60);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 63);
    }
}
