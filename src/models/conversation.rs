//! Conversation model (derived, never persisted)

use super::{Contact, Message};

/// Derived grouping of all messages between the current user and one contact.
///
/// Rebuilt from the flat message list whenever that list changes; `last_message`
/// is the thread's newest message and `unread_count` the inbound messages not
/// yet marked read.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub contact: Contact,
    pub last_message: Message,
    pub unread_count: u32,
}
