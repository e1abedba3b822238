// State store: two small JSON records in the per-user config directory,
// one for the account (token + profile) and one for the conversation
// session. Reads fail soft: a missing, unreadable or malformed file is the
// same as having no prior state. Writes go through a temp file + rename so
// a concurrent reader never parses a half-written record; two racing
// invocations resolve last-writer-wins, no locking.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{AccountState, SessionState};

const ACCOUNT_FILE: &str = "config.json";
const SESSION_FILE: &str = "session.json";

/// Owns the on-disk account and session records.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at the user's config directory (`~/.config/manai` on
    /// Linux). Falls back to a dotted directory in `$HOME` when the platform
    /// reports no config dir.
    pub fn open() -> Self {
        let dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("manai");
        Self { dir }
    }

    /// Store rooted at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_account(&self) -> Option<AccountState> {
        self.load_json(ACCOUNT_FILE)
    }

    pub fn save_account(&self, account: &AccountState) {
        self.save_json(ACCOUNT_FILE, account);
    }

    pub fn clear_account(&self) {
        self.remove(ACCOUNT_FILE);
    }

    pub fn load_session(&self) -> Option<SessionState> {
        self.load_json(SESSION_FILE)
    }

    pub fn save_session(&self, session: &SessionState) {
        self.save_json(SESSION_FILE, session);
    }

    pub fn clear_session(&self) {
        self.remove(SESSION_FILE);
    }

    fn load_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("ignoring malformed state file {}: {err}", path.display());
                None
            }
        }
    }

    // State loss is non-fatal: warn and carry on.
    fn save_json<T: Serialize>(&self, name: &str, value: &T) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            log::warn!("could not create {}: {err}", self.dir.display());
            return;
        }
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let data = match serde_json::to_string_pretty(value) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("could not serialize {name}: {err}");
                return;
            }
        };
        let result = fs::write(&tmp, data).and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = result {
            log::warn!("could not save {}: {err}", path.display());
        }
    }

    fn remove(&self, name: &str) {
        let path = self.dir.join(name);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserProfile;
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at(dir.path());
        (dir, store)
    }

    fn account() -> AccountState {
        AccountState {
            token: "T1".into(),
            user: UserProfile {
                email: "a@b.com".into(),
                first_name: "Ana".into(),
                last_name: "Silva".into(),
                tier_type: "free".into(),
            },
        }
    }

    #[test]
    fn account_round_trips() {
        let (_dir, store) = store();
        store.save_account(&account());
        assert_eq!(store.load_account(), Some(account()));
    }

    #[test]
    fn missing_files_read_as_empty() {
        let (_dir, store) = store();
        assert_eq!(store.load_account(), None);
        assert_eq!(store.load_session(), None);
    }

    #[test]
    fn malformed_file_reads_as_empty() {
        let (dir, store) = store();
        fs::write(dir.path().join(ACCOUNT_FILE), "{not json").unwrap();
        assert_eq!(store.load_account(), None);
    }

    #[test]
    fn partial_account_record_reads_as_empty() {
        let (dir, store) = store();
        // token without user: a half-written record is "not authenticated"
        fs::write(dir.path().join(ACCOUNT_FILE), r#"{"token":"T1"}"#).unwrap();
        assert_eq!(store.load_account(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = store();
        store.save_account(&account());
        store.clear_account();
        store.clear_account();
        assert_eq!(store.load_account(), None);
    }

    #[test]
    fn session_round_trips() {
        let (_dir, store) = store();
        let session = SessionState {
            context_id: "ctx-123".into(),
            auxiliary_id: None,
            last_used_at: Utc::now(),
        };
        store.save_session(&session);
        assert_eq!(store.load_session(), Some(session));
        store.clear_session();
        assert_eq!(store.load_session(), None);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let (dir, store) = store();
        store.save_account(&account());
        assert!(!dir.path().join("config.json.tmp").exists());
    }
}
