use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Default session lifetime: 24 hours
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Which of the two uploaded datasets a file is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Feature,
    Target,
}

impl FromStr for FileRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(FileRole::Feature),
            "target" => Ok(FileRole::Target),
            _ => Err("Invalid file type specified.".to_string()),
        }
    }
}

/// Per-user context the plot and config handlers work from
///
/// Holds the storage paths of the uploaded CSV files and their headers
/// (without `main_id`). Replacing a file of one role leaves the other role
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub feature_filepath: Option<String>,
    pub target_filepath: Option<String>,
    pub feature_headers: Vec<String>,
    pub target_headers: Vec<String>,
}

impl SessionData {
    /// Record a freshly uploaded dataset
    pub fn set_dataset(&mut self, role: FileRole, path: String, headers: Vec<String>) {
        match role {
            FileRole::Feature => {
                self.feature_filepath = Some(path);
                self.feature_headers = headers;
            }
            FileRole::Target => {
                self.target_filepath = Some(path);
                self.target_headers = headers;
            }
        }
    }

    /// Forget the dataset of one role
    pub fn clear_dataset(&mut self, role: FileRole) {
        match role {
            FileRole::Feature => {
                self.feature_filepath = None;
                self.feature_headers.clear();
            }
            FileRole::Target => {
                self.target_filepath = None;
                self.target_headers.clear();
            }
        }
    }

    /// Both dataset paths, if both have been uploaded
    pub fn dataset_paths(&self) -> Option<(&str, &str)> {
        match (&self.feature_filepath, &self.target_filepath) {
            (Some(f), Some(t)) if !f.is_empty() && !t.is_empty() => Some((f.as_str(), t.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    data: SessionData,
    expires_at: SystemTime,
}

/// In-memory map from session id to [`SessionData`]
///
/// Owned by the application state and handed to handlers explicitly.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(SESSION_DURATION)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an empty session and return its id
    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            data: SessionData::default(),
            expires_at: SystemTime::now() + self.ttl,
        };

        self.write().insert(session_id.clone(), session);
        session_id
    }

    /// Whether the id names a live session
    pub fn is_valid(&self, session_id: &str) -> bool {
        self.read()
            .get(session_id)
            .is_some_and(|s| s.expires_at > SystemTime::now())
    }

    /// Snapshot of a live session's data
    pub fn get(&self, session_id: &str) -> Option<SessionData> {
        self.read()
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.data.clone())
    }

    /// Mutate a live session's data in place
    ///
    /// Returns `None` if the session does not exist or has expired.
    pub fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionData) -> R) -> Option<R> {
        let mut sessions = self.write();
        let session = sessions
            .get_mut(session_id)
            .filter(|s| s.expires_at > SystemTime::now())?;
        Some(f(&mut session.data))
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_replace_only_their_role() {
        let mut data = SessionData::default();
        data.set_dataset(FileRole::Feature, "f.csv".into(), vec!["A".into()]);
        data.set_dataset(FileRole::Target, "t.csv".into(), vec!["T".into()]);
        assert_eq!(data.dataset_paths(), Some(("f.csv", "t.csv")));

        data.set_dataset(FileRole::Feature, "g.csv".into(), vec!["B".into()]);
        assert_eq!(data.feature_headers, vec!["B"]);
        assert_eq!(data.target_filepath.as_deref(), Some("t.csv"));

        data.clear_dataset(FileRole::Target);
        assert_eq!(data.dataset_paths(), None);
        assert!(data.target_headers.is_empty());
    }

    #[test]
    fn store_round_trips_updates() {
        let store = SessionStore::default();
        let id = store.create();
        assert!(store.is_valid(&id));

        store
            .update(&id, |d| d.set_dataset(FileRole::Target, "t.csv".into(), vec![]))
            .unwrap();
        assert_eq!(
            store.get(&id).unwrap().target_filepath.as_deref(),
            Some("t.csv")
        );

        assert!(store.get("not-a-session").is_none());
        assert!(store.update("not-a-session", |_| ()).is_none());
    }

    #[test]
    fn expired_sessions_are_invisible_and_purged() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create();

        assert!(!store.is_valid(&id));
        assert!(store.get(&id).is_none());
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn file_role_parsing() {
        assert_eq!("feature".parse::<FileRole>(), Ok(FileRole::Feature));
        assert_eq!("target".parse::<FileRole>(), Ok(FileRole::Target));
        assert!("Feature".parse::<FileRole>().is_err());
    }
}
