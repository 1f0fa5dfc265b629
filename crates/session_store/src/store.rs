use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::SessionStoreError;
use crate::schema::{SessionFile, SESSION_FILE_VERSION};

/// String key/value storage shared by the auth store and the host.
///
/// Implementations are internally synchronized so one handle can be shared
/// behind an `Arc`.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Process-lifetime storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(lock_unpoisoned(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        lock_unpoisoned(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        lock_unpoisoned(&self.entries).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        lock_unpoisoned(&self.entries).clear();
        Ok(())
    }
}

/// JSON-file storage rewritten in full on every mutation.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        let path = path.to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => load_entries(&path, &contents)?,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no session file yet; starting empty");
                BTreeMap::new()
            }
            Err(source) => {
                return Err(SessionStoreError::io("reading session file", &path, source));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), SessionStoreError> {
        let mut entries = lock_unpoisoned(&self.entries);
        let mut next = entries.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        persist(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl SessionStorage for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(lock_unpoisoned(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.mutate(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        self.mutate(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            changed
        })
    }
}

fn load_entries(path: &Path, contents: &str) -> Result<BTreeMap<String, String>, SessionStoreError> {
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let file = serde_json::from_str::<SessionFile>(contents)
        .map_err(|source| SessionStoreError::json_parse(path, source))?;
    validate_session_file(path, &file)?;
    Ok(file.entries)
}

pub(crate) fn validate_session_file(path: &Path, file: &SessionFile) -> Result<(), SessionStoreError> {
    if file.version != SESSION_FILE_VERSION {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: file.version,
        });
    }

    if OffsetDateTime::parse(&file.saved_at, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            field: "saved_at",
            value: file.saved_at.clone(),
        });
    }

    Ok(())
}

fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), SessionStoreError> {
    let saved_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)?;
    let file = SessionFile::v1(saved_at, entries.clone());
    let json = serde_json::to_string_pretty(&file)
        .map_err(|source| SessionStoreError::json_serialize(path, source))?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| SessionStoreError::io("creating session directory", parent, source))?;
    }

    let staging = path.with_extension("json.tmp");
    write_private(&staging, json.as_bytes())
        .map_err(|source| SessionStoreError::io("writing session file", &staging, source))?;
    fs::rename(&staging, path)
        .map_err(|source| SessionStoreError::io("replacing session file", path, source))?;
    debug!(path = %path.display(), keys = entries.len(), "session file saved");
    Ok(())
}

/// Write `bytes` to a fresh file only the owner can read. The session holds a
/// bearer token.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
