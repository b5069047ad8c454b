//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Nothing in this crate reads process environment variables during request
//! handling; binaries call [`CoreConfig::from_lookup`] with `std::env::var` after loading `.env`.

use crate::constants::{
    DEFAULT_BASELINE_COLLECTION, DEFAULT_CACHE_TTL, DEFAULT_PATIENT_DATA_ROOT,
    DEFAULT_WORKFLOW_COLLECTION, ENV_BASELINE_COLLECTION, ENV_BASELINE_MODEL_TAG,
    ENV_BASELINE_MONGODB_DB, ENV_BASELINE_MONGODB_URI, ENV_CACHE_TTL_SECS,
    ENV_EVALUATION_MONGODB_DB, ENV_EVALUATION_MONGODB_URI, ENV_PATIENT_DATA_ROOT,
    ENV_PATIENT_IDS, ENV_WORKFLOW_COLLECTION, ENV_WORKFLOW_MONGODB_DB, ENV_WORKFLOW_MONGODB_URI,
};
use crate::{RecordError, RecordResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tumorboard_types::{NonEmptyText, PatientId};

/// Database used when a MongoDB URI is configured without an explicit database name.
const DEFAULT_DATABASE: &str = "tumorboard";

/// Connection details for one MongoDB collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoStoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// Connection details for a MongoDB database whose collection names are fixed by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoDatabaseConfig {
    pub uri: String,
    pub database: String,
}

/// Baseline store connection plus the generating-model tag to look up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaselineStoreConfig {
    pub store: MongoStoreConfig,
    pub model_tag: NonEmptyText,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_root: PathBuf,
    known_patient_ids: Vec<PatientId>,
    cache_ttl: Duration,
    workflow_store: Option<MongoStoreConfig>,
    baseline_store: Option<BaselineStoreConfig>,
    evaluation_store: Option<MongoDatabaseConfig>,
}

impl CoreConfig {
    /// Create a file-only configuration: no document stores, default cache TTL.
    pub fn new(patient_data_root: PathBuf) -> Self {
        Self {
            patient_data_root,
            known_patient_ids: Vec::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            workflow_store: None,
            baseline_store: None,
            evaluation_store: None,
        }
    }

    pub fn with_known_patient_ids(mut self, ids: Vec<PatientId>) -> Self {
        self.known_patient_ids = ids;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_workflow_store(mut self, store: MongoStoreConfig) -> Self {
        self.workflow_store = Some(store);
        self
    }

    pub fn with_baseline_store(mut self, store: BaselineStoreConfig) -> Self {
        self.baseline_store = Some(store);
        self
    }

    pub fn with_evaluation_store(mut self, store: MongoDatabaseConfig) -> Self {
        self.evaluation_store = Some(store);
        self
    }

    /// Build the configuration from a variable lookup, typically `|k| std::env::var(k).ok()`.
    ///
    /// Empty or whitespace-only values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidInput` if:
    /// - `PATIENT_CACHE_TTL_SECS` is not a whole number of seconds,
    /// - `PATIENT_IDS` contains an invalid identifier,
    /// - `BASELINE_MONGODB_URI` is set without `BASELINE_MODEL_TAG`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RecordResult<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let root = get(ENV_PATIENT_DATA_ROOT).unwrap_or_else(|| DEFAULT_PATIENT_DATA_ROOT.into());
        let mut cfg = Self::new(PathBuf::from(root))
            .with_known_patient_ids(patient_ids_from_env_value(get(ENV_PATIENT_IDS))?)
            .with_cache_ttl(cache_ttl_from_env_value(get(ENV_CACHE_TTL_SECS))?);

        if let Some(uri) = get(ENV_WORKFLOW_MONGODB_URI) {
            cfg = cfg.with_workflow_store(MongoStoreConfig {
                uri,
                database: get(ENV_WORKFLOW_MONGODB_DB).unwrap_or_else(|| DEFAULT_DATABASE.into()),
                collection: get(ENV_WORKFLOW_COLLECTION)
                    .unwrap_or_else(|| DEFAULT_WORKFLOW_COLLECTION.into()),
            });
        }

        if let Some(uri) = get(ENV_BASELINE_MONGODB_URI) {
            let model_tag = get(ENV_BASELINE_MODEL_TAG).ok_or_else(|| {
                RecordError::InvalidInput(format!(
                    "{ENV_BASELINE_MONGODB_URI} is set but {ENV_BASELINE_MODEL_TAG} is missing"
                ))
            })?;
            cfg = cfg.with_baseline_store(BaselineStoreConfig {
                store: MongoStoreConfig {
                    uri,
                    database: get(ENV_BASELINE_MONGODB_DB)
                        .unwrap_or_else(|| DEFAULT_DATABASE.into()),
                    collection: get(ENV_BASELINE_COLLECTION)
                        .unwrap_or_else(|| DEFAULT_BASELINE_COLLECTION.into()),
                },
                model_tag: NonEmptyText::new(model_tag)?,
            });
        }

        if let Some(uri) = get(ENV_EVALUATION_MONGODB_URI) {
            cfg = cfg.with_evaluation_store(MongoDatabaseConfig {
                uri,
                database: get(ENV_EVALUATION_MONGODB_DB)
                    .unwrap_or_else(|| DEFAULT_DATABASE.into()),
            });
        }

        Ok(cfg)
    }

    pub fn patient_data_root(&self) -> &Path {
        &self.patient_data_root
    }

    pub fn known_patient_ids(&self) -> &[PatientId] {
        &self.known_patient_ids
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn workflow_store(&self) -> Option<&MongoStoreConfig> {
        self.workflow_store.as_ref()
    }

    pub fn baseline_store(&self) -> Option<&BaselineStoreConfig> {
        self.baseline_store.as_ref()
    }

    pub fn evaluation_store(&self) -> Option<&MongoDatabaseConfig> {
        self.evaluation_store.as_ref()
    }
}

/// Parse the comma-separated allow-list of patient ids served from the primary store.
///
/// Duplicates are dropped; order of first appearance is kept.
pub fn patient_ids_from_env_value(value: Option<String>) -> RecordResult<Vec<PatientId>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let mut ids: Vec<PatientId> = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = PatientId::parse(part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Parse the snapshot cache lifetime in seconds.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_CACHE_TTL`].
pub fn cache_ttl_from_env_value(value: Option<String>) -> RecordResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_CACHE_TTL),
        Some(v) => v.parse::<u64>().map(Duration::from_secs).map_err(|_| {
            RecordError::InvalidInput(format!(
                "{ENV_CACHE_TTL_SECS} must be a whole number of seconds (got '{v}')"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults_to_file_only() {
        let cfg = CoreConfig::from_lookup(lookup(&[])).expect("empty config should resolve");

        assert_eq!(cfg.patient_data_root(), Path::new(DEFAULT_PATIENT_DATA_ROOT));
        assert_eq!(cfg.cache_ttl(), DEFAULT_CACHE_TTL);
        assert!(cfg.known_patient_ids().is_empty());
        assert!(cfg.workflow_store().is_none());
        assert!(cfg.baseline_store().is_none());
        assert!(cfg.evaluation_store().is_none());
    }

    #[test]
    fn test_from_lookup_reads_stores() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            (ENV_PATIENT_DATA_ROOT, "/data/batch"),
            (ENV_PATIENT_IDS, "1, 2,2,3"),
            (ENV_CACHE_TTL_SECS, "60"),
            (ENV_WORKFLOW_MONGODB_URI, "mongodb://wf:27017"),
            (ENV_BASELINE_MONGODB_URI, "mongodb://bl:27017"),
            (ENV_BASELINE_MODEL_TAG, "gpt-4o"),
            (ENV_BASELINE_COLLECTION, "baselines"),
        ]))
        .expect("config should resolve");

        assert_eq!(cfg.patient_data_root(), Path::new("/data/batch"));
        let ids: Vec<&str> = cfg.known_patient_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(60));

        let wf = cfg.workflow_store().expect("workflow store configured");
        assert_eq!(wf.database, DEFAULT_DATABASE);
        assert_eq!(wf.collection, DEFAULT_WORKFLOW_COLLECTION);

        let bl = cfg.baseline_store().expect("baseline store configured");
        assert_eq!(bl.model_tag.as_str(), "gpt-4o");
        assert_eq!(bl.store.collection, "baselines");
    }

    #[test]
    fn test_baseline_without_model_tag_is_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_BASELINE_MONGODB_URI, "mongodb://bl")]))
            .expect_err("missing model tag should fail");
        assert!(matches!(err, RecordError::InvalidInput(_)));
    }

    #[test]
    fn test_cache_ttl_from_env_value() {
        assert_eq!(cache_ttl_from_env_value(None).unwrap(), DEFAULT_CACHE_TTL);
        assert_eq!(
            cache_ttl_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_CACHE_TTL
        );
        assert_eq!(
            cache_ttl_from_env_value(Some("0".into())).unwrap(),
            Duration::ZERO
        );
        assert!(cache_ttl_from_env_value(Some("5m".into())).is_err());
    }

    #[test]
    fn test_patient_ids_reject_unsafe_values() {
        let err = patient_ids_from_env_value(Some("1,../2".into())).expect_err("should fail");
        assert!(matches!(err, RecordError::InvalidIdentifier(_)));
    }
}
