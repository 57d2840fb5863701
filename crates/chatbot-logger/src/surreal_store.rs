//! SurrealDB-backed implementation of the chatbot storage traits
//!
//! Uses the row types in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::schema::{ExperimentRow, ReleaseRow, SessionEventRow, SessionRow};
use crate::storage_traits::{
    ExperimentRecord, ExperimentStore, NewSession, RecordHash, ReleaseRecord, ReleaseStore,
    SessionEvent, SessionRecord, SessionStore, StorageResult,
};
use crate::SurrealHandle;

/// SurrealDB-backed store for releases, experiments and sessions.
#[derive(Clone)]
pub struct SurrealStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Ok(Self::new(Arc::new(SurrealHandle::setup_db().await?)))
    }

    /// Create from environment variables.
    ///
    /// Uses the connection chain of [`SurrealHandle::setup_from_env`].
    pub async fn from_env() -> crate::Result<Self> {
        Ok(Self::new(Arc::new(SurrealHandle::setup_from_env().await?)))
    }

    // -- private helpers -----------------------------------------------------

    /// Run a query with a single string binding and return the first result set.
    async fn select<T: DeserializeOwned>(
        &self,
        sql: &'static str,
        bind: Option<(&'static str, String)>,
    ) -> StorageResult<Vec<T>> {
        let mut query = self.handle.db().query(sql);
        if let Some(binding) = bind {
            query = query.bind(binding);
        }
        let mut res = query.await?;
        Ok(res.take(0)?)
    }

    async fn create<T>(&self, table: &'static str, row: T) -> StorageResult<T>
    where
        T: serde::Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let created: Option<T> = self.handle.db().create(table).content(row).await?;
        created.ok_or_else(|| StorageError::Backend(format!("failed to create {table} record")))
    }

    async fn fetch_experiment(&self, hash: &RecordHash) -> StorageResult<ExperimentRow> {
        let rows: Vec<ExperimentRow> = self
            .select(
                "SELECT * FROM experiments WHERE hash = $hash LIMIT 1",
                Some(("hash", hash.to_string())),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::not_found("experiment", hash.as_str()))
    }

    async fn fetch_session(&self, hash: &RecordHash) -> StorageResult<SessionRow> {
        let rows: Vec<SessionRow> = self
            .select(
                "SELECT * FROM sessions WHERE hash = $hash LIMIT 1",
                Some(("hash", hash.to_string())),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::not_found("session", hash.as_str()))
    }
}

#[async_trait]
impl ReleaseStore for SurrealStore {
    #[instrument(skip(self))]
    async fn find_release_by_version(&self, version: &str) -> StorageResult<ReleaseRecord> {
        let rows: Vec<ReleaseRow> = self
            .select(
                "SELECT * FROM releases WHERE version = $version ORDER BY created_at ASC LIMIT 1",
                Some(("version", version.to_string())),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::not_found("release", version))?
            .into_record()
    }

    #[instrument(skip(self))]
    async fn create_release(&self, version: &str) -> StorageResult<ReleaseRecord> {
        debug!("creating release");
        self.create("releases", ReleaseRow::new(version))
            .await?
            .into_record()
    }

    async fn list_releases(&self) -> StorageResult<Vec<ReleaseRecord>> {
        let rows: Vec<ReleaseRow> = self
            .select("SELECT * FROM releases ORDER BY created_at DESC", None)
            .await?;
        rows.into_iter().map(ReleaseRow::into_record).collect()
    }
}

#[async_trait]
impl ExperimentStore for SurrealStore {
    #[instrument(skip(self), fields(release = %release_reference.short()))]
    async fn create_experiment(
        &self,
        release_reference: &RecordHash,
        version: &str,
    ) -> StorageResult<ExperimentRecord> {
        debug!("creating experiment");
        self.create("experiments", ExperimentRow::new(release_reference, version))
            .await?
            .into_record()
    }

    #[instrument(skip(self, value), fields(experiment = %hash.short()))]
    async fn set_experiment_field(
        &self,
        hash: &RecordHash,
        field: &str,
        value: serde_json::Value,
    ) -> StorageResult<()> {
        let mut row = self.fetch_experiment(hash).await?;
        row.fields.insert(field.to_string(), value);
        let fields = serde_json::to_string(&row.fields)?;

        self.handle
            .db()
            .query("UPDATE experiments SET fields = $fields WHERE hash = $hash")
            .bind(("fields", fields))
            .bind(("hash", hash.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    async fn get_experiment(&self, hash: &RecordHash) -> StorageResult<ExperimentRecord> {
        self.fetch_experiment(hash).await?.into_record()
    }

    async fn list_experiments(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<ExperimentRecord>> {
        let rows: Vec<ExperimentRow> = match release_reference {
            Some(release) => {
                self.select(
                    "SELECT * FROM experiments WHERE release_reference = $release ORDER BY started_at DESC",
                    Some(("release", release.to_string())),
                )
                .await?
            }
            None => {
                self.select("SELECT * FROM experiments ORDER BY started_at DESC", None)
                    .await?
            }
        };
        rows.into_iter().map(ExperimentRow::into_record).collect()
    }
}

#[async_trait]
impl SessionStore for SurrealStore {
    #[instrument(skip(self, session), fields(username = %session.username))]
    async fn create_session(&self, session: NewSession) -> StorageResult<SessionRecord> {
        let record = SessionRecord::from_new(session, chrono::Utc::now());
        debug!(session = %record.hash.short(), "creating session");
        self.create("sessions", SessionRow::from_record(&record))
            .await?
            .into_record()
    }

    async fn append_event(&self, hash: &RecordHash, event: SessionEvent) -> StorageResult<()> {
        self.fetch_session(hash).await?;
        self.create("session_events", SessionEventRow::new(hash, event))
            .await?;
        Ok(())
    }

    async fn get_session(&self, hash: &RecordHash) -> StorageResult<SessionRecord> {
        self.fetch_session(hash).await?.into_record()
    }

    async fn get_events(&self, hash: &RecordHash) -> StorageResult<Vec<SessionEvent>> {
        self.fetch_session(hash).await?;
        let rows: Vec<SessionEventRow> = self
            .select(
                "SELECT * FROM session_events WHERE session = $session_hash ORDER BY seq ASC",
                Some(("session_hash", hash.to_string())),
            )
            .await?;
        rows.into_iter().map(SessionEventRow::into_event).collect()
    }

    async fn list_sessions(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<SessionRecord>> {
        let rows: Vec<SessionRow> = match release_reference {
            Some(release) => {
                self.select(
                    "SELECT * FROM sessions WHERE release_reference = $release ORDER BY started_at DESC",
                    Some(("release", release.to_string())),
                )
                .await?
            }
            None => {
                self.select("SELECT * FROM sessions ORDER BY started_at DESC", None)
                    .await?
            }
        };
        rows.into_iter().map(SessionRow::into_record).collect()
    }
}
