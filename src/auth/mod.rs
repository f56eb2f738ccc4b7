//! Authentication module for the Monteverde portal
//!
//! Plain email/password login against `/auth/login` yielding a JWT access
//! token plus a refresh token; sessions are hydrated from persisted config
//! at startup and torn down by clearing that storage.

pub mod login;
pub mod tokens;

pub use login::{login, logout, status};
pub use tokens::{StoredToken, TokenStore};
