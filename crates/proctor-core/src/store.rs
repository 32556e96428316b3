//! Session record persistence.
//!
//! The core treats storage as an opaque key-value store keyed by session id. Two
//! backends: an in-process [`MemorySessionStore`] and a sled-backed
//! [`SledSessionStore`] that keeps records as JSON under `session/{id}`.

use std::path::Path;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assessment::{AssessmentUrl, SessionId};
use crate::error::ProctorResult;
use crate::lockdown::LockdownLogEntry;
use crate::violation::Violation;

/// Key prefix for session records in the sled tree.
pub const SESSION_KEY_PREFIX: &str = "session/";

/// What is kept about one proctored attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub assessment_url: AssessmentUrl,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub lockdown_log: Vec<LockdownLogEntry>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(session_id: SessionId, assessment_url: AssessmentUrl) -> Self {
        Self {
            session_id,
            assessment_url,
            created_at: Utc::now(),
            violations: Vec::new(),
            lockdown_log: Vec::new(),
            submitted: false,
            ended_at: None,
        }
    }
}

/// Opaque key-value persistence for session records.
pub trait SessionStore: Send + Sync {
    fn save(&self, session_id: &SessionId, record: &SessionRecord) -> ProctorResult<()>;
    fn load(&self, session_id: &SessionId) -> ProctorResult<Option<SessionRecord>>;
}

/// Records held in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: DashMap<SessionId, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session_id: &SessionId, record: &SessionRecord) -> ProctorResult<()> {
        self.records.insert(session_id.clone(), record.clone());
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> ProctorResult<Option<SessionRecord>> {
        Ok(self.records.get(session_id).map(|r| r.value().clone()))
    }
}

/// Sled-backed store.
pub struct SledSessionStore {
    db: sled::Db,
}

impl SledSessionStore {
    pub fn open(path: impl AsRef<Path>) -> ProctorResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), "[STORE] Session store opened");
        Ok(Self { db })
    }

    fn key(session_id: &SessionId) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, session_id)
    }

    /// Ids of every stored session.
    pub fn session_ids(&self) -> ProctorResult<Vec<SessionId>> {
        let mut ids = Vec::new();
        for item in self.db.scan_prefix(SESSION_KEY_PREFIX) {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some(id) = key.strip_prefix(SESSION_KEY_PREFIX) {
                ids.push(SessionId::from(id));
            }
        }
        Ok(ids)
    }
}

impl SessionStore for SledSessionStore {
    fn save(&self, session_id: &SessionId, record: &SessionRecord) -> ProctorResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.db.insert(Self::key(session_id), bytes)?;
        self.db.flush()?;
        debug!(session = %session_id, "[STORE] Session record saved");
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> ProctorResult<Option<SessionRecord>> {
        match self.db.get(Self::key(session_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
