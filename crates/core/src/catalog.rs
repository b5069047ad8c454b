//! Patient catalogue: the resolver behind a snapshot cache.
//!
//! This is the read interface the binaries use. `resolve_all_patients` serves the cached
//! snapshot while it is fresh and rebuilds it otherwise; `resolve_patient` answers from a fresh
//! snapshot when it holds the id and resolves directly when it does not.

use crate::cache::{Snapshot, SnapshotCache};
use crate::config::CoreConfig;
use crate::paths::BatchLayout;
use crate::record::PatientRecord;
use crate::resolver::RecordResolver;
use crate::sources::{connect, MongoBaselineStore, MongoWorkflowSource};
use crate::RecordResult;
use std::sync::Arc;
use tumorboard_types::PatientId;

#[derive(Clone)]
pub struct PatientCatalog {
    resolver: Arc<RecordResolver>,
    cache: Arc<SnapshotCache>,
}

impl PatientCatalog {
    pub fn new(resolver: RecordResolver, cache: SnapshotCache) -> Self {
        Self {
            resolver: Arc::new(resolver),
            cache: Arc::new(cache),
        }
    }

    /// Wire the sources described by `cfg`.
    ///
    /// File sources are always present. The workflow and baseline stores are added when
    /// configured; their clients connect lazily, so an unreachable server is reported when a
    /// patient is resolved rather than here.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidInput` if a configured MongoDB URI cannot be parsed.
    pub async fn from_config(cfg: &CoreConfig) -> RecordResult<Self> {
        let mut resolver = RecordResolver::from_layout(BatchLayout::new(cfg.patient_data_root()))
            .with_known_ids(cfg.known_patient_ids().to_vec());

        if let Some(store) = cfg.workflow_store() {
            let client = connect(&store.uri).await?;
            tracing::info!(
                "workflow store: {}/{}",
                store.database,
                store.collection
            );
            resolver = resolver.with_primary(Arc::new(MongoWorkflowSource::new(&client, store)));
        } else {
            tracing::info!("no workflow store configured, reading batch files only");
        }

        if let Some(baseline) = cfg.baseline_store() {
            let client = connect(&baseline.store.uri).await?;
            tracing::info!(
                "baseline store: {}/{} (model {})",
                baseline.store.database,
                baseline.store.collection,
                baseline.model_tag.as_str()
            );
            resolver = resolver.with_baseline(
                Arc::new(MongoBaselineStore::new(&client, &baseline.store)),
                baseline.model_tag.as_str(),
            );
        }

        Ok(Self::new(resolver, SnapshotCache::new(cfg.cache_ttl())))
    }

    pub async fn resolve_patient(&self, id: &PatientId) -> RecordResult<PatientRecord> {
        if let Some(record) = self.cache.get().and_then(|s| s.get(id).cloned()) {
            return Ok(record);
        }
        self.resolver.resolve_patient(id).await
    }

    /// The fresh snapshot, rebuilding it if it expired or was invalidated.
    pub async fn resolve_all_patients(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = self.cache.get() {
            return snapshot;
        }
        self.reload().await
    }

    pub fn invalidate_cache(&self) {
        tracing::info!("patient snapshot invalidated");
        self.cache.invalidate();
    }

    /// Discard the snapshot and rebuild it now.
    ///
    /// A snapshot with degraded patients is returned but not cached, so the next request
    /// asks the primary store again.
    pub async fn reload(&self) -> Arc<Snapshot> {
        self.cache.invalidate();
        let batch = self.resolver.resolve_batch().await;
        if batch.degraded.is_empty() {
            let snapshot = self.cache.store(batch.records);
            tracing::info!("patient snapshot rebuilt with {} patients", snapshot.len());
            snapshot
        } else {
            tracing::warn!(
                "serving uncached snapshot, {} patients resolved without the primary store",
                batch.degraded.len()
            );
            self.cache.transient(batch.records, batch.degraded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Provenance;
    use crate::sources::RecordSource;
    use crate::test_support::{fragment, CountingSource, ManualClock};
    use crate::RecordError;
    use std::time::Duration;

    fn id(s: &str) -> PatientId {
        PatientId::parse(s).unwrap()
    }

    fn catalog(
        source: Arc<CountingSource>,
        clock: Arc<ManualClock>,
    ) -> PatientCatalog {
        let resolver = RecordResolver::new(vec![source as Arc<dyn RecordSource>], None)
            .with_known_ids(vec![id("1"), id("2")]);
        PatientCatalog::new(
            resolver,
            SnapshotCache::with_clock(Duration::from_secs(300), clock),
        )
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cached() {
        let source = CountingSource::with(Provenance::PrimaryStore, fragment(Some("i"), Some("r")));
        let catalog = catalog(source.clone(), ManualClock::new());

        let first = catalog.resolve_all_patients().await;
        let second = catalog.resolve_all_patients().await;

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 2);

        // Single lookups are answered from the snapshot too.
        catalog.resolve_patient(&id("1")).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_expiry_force_rebuild() {
        let source = CountingSource::with(Provenance::PrimaryStore, fragment(None, Some("r")));
        let clock = ManualClock::new();
        let catalog = catalog(source.clone(), clock.clone());

        catalog.resolve_all_patients().await;
        catalog.invalidate_cache();
        catalog.resolve_all_patients().await;
        assert_eq!(source.calls(), 4);

        clock.advance(Duration::from_secs(301));
        catalog.resolve_all_patients().await;
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn test_unknown_id_resolves_directly() {
        let source = CountingSource::empty(Provenance::PrimaryStore);
        let catalog = catalog(source.clone(), ManualClock::new());

        catalog.resolve_all_patients().await;
        let record = catalog.resolve_patient(&id("99")).await.unwrap();

        assert!(!record.has_source_data());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_degraded_rebuild_is_served_but_not_cached() {
        let source = CountingSource::unavailable(Provenance::PrimaryStore);
        let catalog = catalog(source.clone(), ManualClock::new());

        let snapshot = catalog.resolve_all_patients().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.is_degraded());

        let again = catalog.resolve_all_patients().await;
        assert!(!Arc::ptr_eq(&snapshot, &again));
        assert_eq!(source.calls(), 4);

        let err = catalog.resolve_patient(&id("1")).await.expect_err("store down");
        assert!(matches!(err, RecordError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_from_config_without_stores_reads_files() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("patient_4_complete_workflow.json"),
            r#"{"recommendation_result": {"raw_response": "plan"}}"#,
        )
        .unwrap();

        let cfg = CoreConfig::new(temp_dir.path().to_path_buf());
        let catalog = PatientCatalog::from_config(&cfg).await.expect("catalog");
        let snapshot = catalog.resolve_all_patients().await;

        let record = snapshot.get(&id("4")).expect("patient 4 listed");
        assert_eq!(record.primary_recommendation.text, "plan");
    }
}
