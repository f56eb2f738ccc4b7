//! Conversation aggregation over the flat message store
//!
//! The backend only knows flat message records; everything conversation-shaped
//! is derived here. `summarize` is pure and idempotent so callers re-run it
//! after any mutation (send, mark-read) instead of patching state in place.

use std::collections::HashMap;

use crate::api::error::ApiError;
use crate::models::{Contact, Conversation, Message};

/// Per-counterpart rollup before contact resolution.
#[derive(Debug, Clone)]
pub struct ThreadSummary {
    pub contact_id: i64,
    pub last_message: Message,
    pub unread_count: u32,
}

/// Group a flat message list into one summary per counterpart.
///
/// `last_message` is the newest message of each thread and `unread_count` the
/// number of messages addressed to `self_id` with `read == false`. The result
/// is sorted newest-first by last message; ties keep first-appearance order.
pub fn summarize(messages: &[Message], self_id: i64) -> Vec<ThreadSummary> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut summaries: Vec<ThreadSummary> = Vec::new();

    for msg in messages {
        let contact_id = msg.counterpart(self_id);
        let idx = *index.entry(contact_id).or_insert_with(|| {
            summaries.push(ThreadSummary {
                contact_id,
                last_message: msg.clone(),
                unread_count: 0,
            });
            summaries.len() - 1
        });

        let summary = &mut summaries[idx];
        if msg.is_unread_for(self_id) {
            summary.unread_count += 1;
        }
        if msg.timestamp > summary.last_message.timestamp {
            summary.last_message = msg.clone();
        }
    }

    // sort_by is stable, so equal timestamps keep insertion order
    summaries.sort_by(|a, b| b.last_message.timestamp.cmp(&a.last_message.timestamp));
    summaries
}

/// Zero the unread counter for one contact in the local view.
///
/// Applied after opening a thread, regardless of how the individual mark-read
/// requests fared server-side.
pub fn clear_unread(summaries: &mut [ThreadSummary], contact_id: i64) {
    for summary in summaries.iter_mut() {
        if summary.contact_id == contact_id {
            summary.unread_count = 0;
        }
    }
}

/// Source of contact records, implemented by the API client.
#[allow(async_fn_in_trait)]
pub trait ContactSource {
    async fn contact(&self, user_id: i64) -> Result<Contact, ApiError>;
}

/// Attach contact records to summaries, newest-first order preserved.
///
/// A failed lookup drops that counterpart from the result; the failure is
/// logged and not retried.
pub async fn resolve<S: ContactSource>(
    source: &S,
    summaries: Vec<ThreadSummary>,
) -> Vec<Conversation> {
    let mut conversations = Vec::with_capacity(summaries.len());
    for summary in summaries {
        match source.contact(summary.contact_id).await {
            Ok(contact) => conversations.push(Conversation {
                contact,
                last_message: summary.last_message,
                unread_count: summary.unread_count,
            }),
            Err(e) => {
                tracing::warn!(
                    "Contact lookup for user {} failed, dropping conversation: {}",
                    summary.contact_id,
                    e
                );
            }
        }
    }
    conversations
}

/// Sink for mark-read requests, implemented by the API client.
#[allow(async_fn_in_trait)]
pub trait ReadStateSink {
    async fn mark_read(&self, message_id: i64) -> Result<(), ApiError>;
}

/// Per-message result of a mark-read batch.
#[derive(Debug)]
pub struct MarkReadOutcome {
    pub message_id: i64,
    pub ok: bool,
}

/// Mark every inbound unread message of a thread read, one request at a time.
///
/// Returns an outcome per message so the caller decides the partial-failure
/// policy; nothing is rolled back or retried here.
pub async fn mark_thread_read<S: ReadStateSink>(
    sink: &S,
    thread: &[Message],
    self_id: i64,
) -> Vec<MarkReadOutcome> {
    let mut outcomes = Vec::new();
    for msg in thread.iter().filter(|m| m.is_unread_for(self_id)) {
        let ok = match sink.mark_read(msg.id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to mark message {} read: {}", msg.id, e);
                false
            }
        };
        outcomes.push(MarkReadOutcome {
            message_id: msg.id,
            ok,
        });
    }
    outcomes
}
