//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryStore` satisfies `ReleaseStore`, `ExperimentStore` and
//! `SessionStore` without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug)]
struct SessionState {
    record: SessionRecord,
    events: Vec<SessionEvent>,
}

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order is creation order
    releases: Vec<ReleaseRecord>,
    experiments: Vec<ExperimentRecord>,
    sessions: Vec<SessionState>,
}

/// In-memory store backed by plain vectors.
///
/// `fail_with` switches the store into a failing mode where every call
/// returns `StorageError::Backend`, which lets callers exercise their
/// handling of store failures distinct from `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failure: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a backend error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(message.into());
    }

    /// Resume normal operation after `fail_with`.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of release records, including duplicates of one version.
    pub fn release_count(&self) -> usize {
        self.tables.lock().unwrap().releases.len()
    }

    /// Number of experiment records.
    pub fn experiment_count(&self) -> usize {
        self.tables.lock().unwrap().experiments.len()
    }

    /// Number of session records.
    pub fn session_count(&self) -> usize {
        self.tables.lock().unwrap().sessions.len()
    }

    fn check(&self) -> StorageResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(StorageError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn find_release_by_version(&self, version: &str) -> StorageResult<ReleaseRecord> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        tables
            .releases
            .iter()
            .find(|r| r.version == version)
            .cloned()
            .ok_or_else(|| StorageError::not_found("release", version))
    }

    async fn create_release(&self, version: &str) -> StorageResult<ReleaseRecord> {
        self.check()?;
        let record = ReleaseRecord {
            hash: RecordHash::generate("release"),
            version: version.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().releases.push(record.clone());
        Ok(record)
    }

    async fn list_releases(&self) -> StorageResult<Vec<ReleaseRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.releases.iter().rev().cloned().collect())
    }
}

#[async_trait]
impl ExperimentStore for MemoryStore {
    async fn create_experiment(
        &self,
        release_reference: &RecordHash,
        version: &str,
    ) -> StorageResult<ExperimentRecord> {
        self.check()?;
        let record = ExperimentRecord {
            hash: RecordHash::generate("experiment"),
            release_reference: release_reference.clone(),
            version: version.to_string(),
            started_at: Utc::now(),
            fields: Default::default(),
        };
        self.tables.lock().unwrap().experiments.push(record.clone());
        Ok(record)
    }

    async fn set_experiment_field(
        &self,
        hash: &RecordHash,
        field: &str,
        value: serde_json::Value,
    ) -> StorageResult<()> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let experiment = tables
            .experiments
            .iter_mut()
            .find(|e| &e.hash == hash)
            .ok_or_else(|| StorageError::not_found("experiment", hash.as_str()))?;
        experiment.fields.insert(field.to_string(), value);
        Ok(())
    }

    async fn get_experiment(&self, hash: &RecordHash) -> StorageResult<ExperimentRecord> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        tables
            .experiments
            .iter()
            .find(|e| &e.hash == hash)
            .cloned()
            .ok_or_else(|| StorageError::not_found("experiment", hash.as_str()))
    }

    async fn list_experiments(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<ExperimentRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .experiments
            .iter()
            .rev()
            .filter(|e| release_reference.map(|r| &e.release_reference == r).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: NewSession) -> StorageResult<SessionRecord> {
        self.check()?;
        let record = SessionRecord::from_new(session, Utc::now());
        self.tables.lock().unwrap().sessions.push(SessionState {
            record: record.clone(),
            events: Vec::new(),
        });
        Ok(record)
    }

    async fn append_event(&self, hash: &RecordHash, event: SessionEvent) -> StorageResult<()> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let state = tables
            .sessions
            .iter_mut()
            .find(|s| &s.record.hash == hash)
            .ok_or_else(|| StorageError::not_found("session", hash.as_str()))?;
        state.events.push(event);
        Ok(())
    }

    async fn get_session(&self, hash: &RecordHash) -> StorageResult<SessionRecord> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        tables
            .sessions
            .iter()
            .find(|s| &s.record.hash == hash)
            .map(|s| s.record.clone())
            .ok_or_else(|| StorageError::not_found("session", hash.as_str()))
    }

    async fn get_events(&self, hash: &RecordHash) -> StorageResult<Vec<SessionEvent>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let state = tables
            .sessions
            .iter()
            .find(|s| &s.record.hash == hash)
            .ok_or_else(|| StorageError::not_found("session", hash.as_str()))?;
        let mut events = state.events.clone();
        events.sort_by_key(|e| e.seq);
        Ok(events)
    }

    async fn list_sessions(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<SessionRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .sessions
            .iter()
            .rev()
            .filter(|s| {
                release_reference
                    .map(|r| &s.record.release_reference == r)
                    .unwrap_or(true)
            })
            .map(|s| s.record.clone())
            .collect())
    }
}
