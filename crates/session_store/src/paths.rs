use std::path::PathBuf;

pub const SESSION_DIR: &str = "concierge";
pub const SESSION_FILE_NAME: &str = "session.json";

/// Per-user data directory holding the session file, when the platform has one.
#[must_use]
pub fn session_root() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|root| root.join(SESSION_DIR))
}

#[must_use]
pub fn default_session_file() -> Option<PathBuf> {
    session_root().map(|root| root.join(SESSION_FILE_NAME))
}
