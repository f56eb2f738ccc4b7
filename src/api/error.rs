//! Error taxonomy for portal API calls
//!
//! Three failure families surface from the client: transport errors,
//! non-2xx responses carrying a message payload, and session expiry after a
//! failed refresh. Command handlers convert these to user-facing context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network/transport failure before a response arrived.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; `message` comes from the backend payload when present.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// 401 and the one-shot refresh failed; stored credentials were cleared.
    #[error("session expired; run 'monteverde-cli login'")]
    SessionExpired,

    /// No stored credentials at all.
    #[error("not logged in; run 'monteverde-cli login'")]
    NotLoggedIn,
}
