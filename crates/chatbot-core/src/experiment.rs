//! Dev-mode configuration capture.
//!
//! Assembly code writes every snapshot through a [`ConfigRecorder`] without
//! checking whether dev mode is on: outside dev mode the recorder is a
//! [`NoopRecorder`] and nothing reaches the store.

use std::sync::Arc;

use async_trait::async_trait;
use chatbot_logger::{ExperimentRecord, ExperimentStore, RecordHash, ReleaseRecord};
use serde::Serialize;

use crate::domain::error::Result;
use crate::domain::snapshot::ExperimentField;
use crate::domain::version::VersionString;
use crate::obs;

/// Capability to record one configuration field.
#[async_trait]
pub trait ConfigRecorder: Send + Sync {
    /// Replace `field` wholesale with `value`.
    async fn record(&self, field: ExperimentField, value: serde_json::Value) -> Result<()>;

    /// Hash of the Experiment being written, `None` when not recording.
    fn experiment(&self) -> Option<&RecordHash>;
}

/// Serialize `snapshot` and record it under `field`.
pub async fn record_snapshot<T>(
    recorder: &dyn ConfigRecorder,
    field: ExperimentField,
    snapshot: &T,
) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(snapshot)?;
    recorder.record(field, value).await
}

/// Recorder bound to one persisted Experiment.
pub struct ExperimentRecorder {
    store: Arc<dyn ExperimentStore>,
    record: ExperimentRecord,
}

impl ExperimentRecorder {
    /// Create the Experiment linked to `release` and return a recorder for it.
    pub async fn start(
        store: Arc<dyn ExperimentStore>,
        release: &ReleaseRecord,
        version: &VersionString,
    ) -> Result<Self> {
        let record = store
            .create_experiment(&release.hash, version.as_str())
            .await?;
        obs::emit_experiment_started(
            record.hash.as_str(),
            release.hash.as_str(),
            version.as_str(),
        );
        Ok(Self { store, record })
    }

    pub fn hash(&self) -> &RecordHash {
        &self.record.hash
    }
}

#[async_trait]
impl ConfigRecorder for ExperimentRecorder {
    async fn record(&self, field: ExperimentField, value: serde_json::Value) -> Result<()> {
        self.store
            .set_experiment_field(&self.record.hash, field.as_str(), value)
            .await?;
        obs::emit_experiment_field_recorded(self.record.hash.as_str(), field.as_str());
        Ok(())
    }

    fn experiment(&self) -> Option<&RecordHash> {
        Some(&self.record.hash)
    }
}

/// Recorder used outside dev mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl ConfigRecorder for NoopRecorder {
    async fn record(&self, _field: ExperimentField, _value: serde_json::Value) -> Result<()> {
        Ok(())
    }

    fn experiment(&self) -> Option<&RecordHash> {
        None
    }
}

/// Start a dev-mode Experiment for `release`.
pub async fn start_experiment(
    store: Arc<dyn ExperimentStore>,
    release: &ReleaseRecord,
    version: &VersionString,
) -> Result<ExperimentRecorder> {
    ExperimentRecorder::start(store, release, version).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ChatbotError;
    use chatbot_logger::fakes::MemoryStore;
    use chatbot_logger::{ReleaseStore, StorageError};
    use serde_json::json;

    async fn setup() -> (Arc<MemoryStore>, ReleaseRecord, VersionString) {
        let store = Arc::new(MemoryStore::new());
        let release = store.create_release("1.0.0").await.unwrap();
        (store, release, VersionString::parse("1.0.0").unwrap())
    }

    #[tokio::test]
    async fn experiment_links_to_release() {
        let (store, release, version) = setup().await;
        let recorder = start_experiment(store.clone(), &release, &version)
            .await
            .unwrap();

        let persisted = store.get_experiment(recorder.hash()).await.unwrap();
        assert_eq!(persisted.release_reference, release.hash);
        assert_eq!(persisted.version, "1.0.0");
        assert!(persisted.fields.is_empty());
        assert_eq!(recorder.experiment(), Some(&persisted.hash));
    }

    #[tokio::test]
    async fn recording_twice_overwrites_the_field() {
        let (store, release, version) = setup().await;
        let recorder = start_experiment(store.clone(), &release, &version)
            .await
            .unwrap();

        record_snapshot(&recorder, ExperimentField::Llm, &json!({"model": "a", "extra": 1}))
            .await
            .unwrap();
        record_snapshot(&recorder, ExperimentField::Llm, &json!({"model": "b"}))
            .await
            .unwrap();

        let persisted = store.get_experiment(recorder.hash()).await.unwrap();
        assert_eq!(persisted.fields["llm"], json!({"model": "b"}));
    }

    #[tokio::test]
    async fn noop_recorder_never_touches_the_store() {
        let store = Arc::new(MemoryStore::new());
        store.fail_with("should not be called");

        let recorder = NoopRecorder;
        record_snapshot(&recorder, ExperimentField::Memory, &json!({"k": "v"}))
            .await
            .unwrap();
        assert!(recorder.experiment().is_none());

        store.recover();
        assert_eq!(store.experiment_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_propagates() {
        let (store, release, version) = setup().await;
        let recorder = start_experiment(store.clone(), &release, &version)
            .await
            .unwrap();
        store.fail_with("disk full");

        let err = record_snapshot(&recorder, ExperimentField::Agent, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatbotError::Storage(StorageError::Backend(_))
        ));
    }
}
