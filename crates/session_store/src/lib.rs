//! Persistent key/value storage for the browser-style session.
//!
//! The client keeps exactly three values: the raw access token, its scheme
//! tag, and the serialized signed-in user. [`MemorySessionStore`] drops them
//! on exit. [`FileSessionStore`] keeps them between runs in an owner-only
//! file, and only when the caller asks for it.

mod error;
mod paths;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use paths::{default_session_file, session_root, SESSION_FILE_NAME};
pub use schema::{SessionFile, SESSION_FILE_VERSION};
pub use store::{FileSessionStore, MemorySessionStore, SessionStorage};

/// Raw access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Token scheme tag, usually `bearer`.
pub const TOKEN_TYPE_KEY: &str = "token_type";
/// JSON-serialized signed-in user.
pub const USER_KEY: &str = "user";
