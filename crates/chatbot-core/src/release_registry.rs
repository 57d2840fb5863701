use std::sync::Arc;

use chatbot_logger::{ReleaseRecord, ReleaseStore, StorageError};

use crate::domain::error::Result;
use crate::domain::version::VersionString;
use crate::obs;

/// Thin API layer over a release store backend.
///
/// Only `StorageError::NotFound` counts as absence; any other lookup
/// failure propagates instead of triggering creation. Concurrent callers
/// racing on a brand-new version may each create a record.
pub struct ReleaseRegistry<S: ?Sized> {
    store: Arc<S>,
}

impl<S> ReleaseRegistry<S>
where
    S: ReleaseStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Find the Release for `version`, creating it when none exists yet.
    pub async fn get_or_create_release(&self, version: &VersionString) -> Result<ReleaseRecord> {
        match self.store.find_release_by_version(version.as_str()).await {
            Ok(release) => {
                obs::emit_release_reused(release.hash.as_str(), version.as_str());
                Ok(release)
            }
            Err(StorageError::NotFound { .. }) => {
                let release = self.store.create_release(version.as_str()).await?;
                obs::emit_release_created(release.hash.as_str(), version.as_str());
                Ok(release)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Newest Release, if any has been recorded.
    pub async fn current(&self) -> Result<Option<ReleaseRecord>> {
        Ok(self.store.list_releases().await?.into_iter().next())
    }

    /// All Releases, newest first.
    pub async fn history(&self) -> Result<Vec<ReleaseRecord>> {
        Ok(self.store.list_releases().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ChatbotError;
    use chatbot_logger::fakes::MemoryStore;

    fn version(v: &str) -> VersionString {
        VersionString::parse(v).unwrap()
    }

    #[tokio::test]
    async fn second_lookup_reuses_the_release() {
        let store = Arc::new(MemoryStore::new());
        let registry = ReleaseRegistry::new(store.clone());

        let first = registry
            .get_or_create_release(&version("1.0.0"))
            .await
            .expect("first call");
        let second = registry
            .get_or_create_release(&version("1.0.0"))
            .await
            .expect("second call");

        assert_eq!(first.version, "1.0.0");
        assert_eq!(first.hash, second.hash);
        assert_eq!(store.release_count(), 1);
    }

    #[tokio::test]
    async fn distinct_versions_get_distinct_releases() {
        let store = Arc::new(MemoryStore::new());
        let registry = ReleaseRegistry::new(store.clone());

        registry.get_or_create_release(&version("1.0.0")).await.unwrap();
        registry.get_or_create_release(&version("1.1.0")).await.unwrap();

        assert_eq!(store.release_count(), 2);
        let current = registry.current().await.unwrap().expect("current exists");
        assert_eq!(current.version, "1.1.0");
        let history = registry.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].version, "1.0.0");
    }

    #[tokio::test]
    async fn store_failure_is_not_treated_as_absence() {
        let store = Arc::new(MemoryStore::new());
        store.fail_with("connection reset");
        let registry = ReleaseRegistry::new(store.clone());

        let err = registry
            .get_or_create_release(&version("1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatbotError::Storage(StorageError::Backend(_))
        ));

        store.recover();
        assert_eq!(store.release_count(), 0);
    }

    #[tokio::test]
    async fn current_is_none_on_empty_store() {
        let registry = ReleaseRegistry::new(Arc::new(MemoryStore::new()));
        assert!(registry.current().await.unwrap().is_none());
    }
}
