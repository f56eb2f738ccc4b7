//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message record as stored by the portal backend.
///
/// Immutable once sent except for the `read` flag, which the backend flips
/// false -> true when the recipient marks it read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "emisorId")]
    pub sender_id: i64,
    #[serde(rename = "receptorId")]
    pub recipient_id: i64,
    #[serde(rename = "asunto")]
    pub subject: String,
    #[serde(rename = "cuerpo")]
    pub body: String,
    #[serde(rename = "fecha")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "leido")]
    pub read: bool,
}

impl Message {
    /// The other party of this message, from `self_id`'s point of view.
    pub fn counterpart(&self, self_id: i64) -> i64 {
        if self.sender_id == self_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }

    /// True when this message is addressed to `self_id` and not yet read.
    pub fn is_unread_for(&self, self_id: i64) -> bool {
        self.recipient_id == self_id && !self.read
    }
}

/// Request body for `POST /mensajes/enviar`.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    #[serde(rename = "emisorId")]
    pub sender_id: i64,
    #[serde(rename = "receptorId")]
    pub recipient_id: i64,
    #[serde(rename = "asunto")]
    pub subject: String,
    #[serde(rename = "cuerpo")]
    pub body: String,
}
