use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SESSION_FILE_VERSION: u32 = 1;

/// On-disk layout of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFile {
    pub version: u32,
    /// RFC3339 timestamp of the last write.
    pub saved_at: String,
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

impl SessionFile {
    #[must_use]
    pub fn v1(saved_at: impl Into<String>, entries: BTreeMap<String, String>) -> Self {
        Self {
            version: SESSION_FILE_VERSION,
            saved_at: saved_at.into(),
            entries,
        }
    }
}
