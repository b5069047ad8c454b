//! Multi-source patient record resolution.
//!
//! The resolver walks a fixed priority list of [`RecordSource`]s and fills each field group
//! (clinical narrative, recommendation + trials) from the first source that holds it. Groups
//! are independent: the clinical text may come from the workflow store while the
//! recommendation comes from a file. Each source is loaded at most once per resolution and the
//! walk stops as soon as every group is filled.
//!
//! Error policy:
//! - a source without data is skipped silently (debug log)
//! - a failing or malformed non-primary source is logged and skipped
//! - a malformed primary-store document is logged and treated as absent
//! - an unreachable primary store aborts a single-patient resolution with
//!   [`RecordError::SourceUnavailable`], so callers can tell "empty" from "broken"
//! - when resolving every patient, that patient is instead resolved from the remaining
//!   sources and reported as degraded; the batch itself never fails
//!
//! The legacy recommendation files are a last resort: they are read only when no source in
//! the chain carried a recommendation at all, and never merged with other sources.

use crate::normalize::{normalize_optional, normalize_text};
use crate::paths::BatchLayout;
use crate::record::{BaselineRecommendation, ClinicalText, PatientRecord, PatientRecordBuilder, Provenance};
use crate::sources::{
    BaselineStore, ClinicalFragment, DirectoryFileSource, FlatFileSource, LegacyFileSource,
    RecordSource, SourceError,
};
use crate::{RecordError, RecordResult};
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tumorboard_types::PatientId;

/// Baseline store together with the model tag whose output is shown.
#[derive(Clone)]
struct BaselineLookup {
    store: Arc<dyn BaselineStore>,
    model_tag: String,
}

/// What to do when the primary store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnPrimaryFailure {
    Abort,
    Degrade,
}

/// Every known patient, with the ids resolved without the primary store.
#[derive(Debug, Default)]
pub struct ResolvedBatch {
    pub records: BTreeMap<PatientId, PatientRecord>,
    pub degraded: BTreeSet<PatientId>,
}

#[derive(Clone)]
pub struct RecordResolver {
    chain: Vec<Arc<dyn RecordSource>>,
    last_resort: Option<Arc<dyn RecordSource>>,
    baseline: Option<BaselineLookup>,
    known_ids: Vec<PatientId>,
}

impl RecordResolver {
    /// Creates a resolver over `chain`, consulted in order, with an optional last-resort
    /// recommendation source.
    pub fn new(
        chain: Vec<Arc<dyn RecordSource>>,
        last_resort: Option<Arc<dyn RecordSource>>,
    ) -> Self {
        Self {
            chain,
            last_resort,
            baseline: None,
            known_ids: Vec::new(),
        }
    }

    /// Resolver over the batch results directory only: patient directory file, flat file,
    /// then the legacy recommendation files.
    pub fn from_layout(layout: BatchLayout) -> Self {
        Self::new(
            vec![
                Arc::new(DirectoryFileSource::new(layout.clone())),
                Arc::new(FlatFileSource::new(layout.clone())),
            ],
            Some(Arc::new(LegacyFileSource::new(layout))),
        )
    }

    /// Put `primary` in front of the existing chain.
    pub fn with_primary(mut self, primary: Arc<dyn RecordSource>) -> Self {
        self.chain.insert(0, primary);
        self
    }

    pub fn with_baseline(mut self, store: Arc<dyn BaselineStore>, model_tag: impl Into<String>) -> Self {
        self.baseline = Some(BaselineLookup {
            store,
            model_tag: model_tag.into(),
        });
        self
    }

    /// Ids served by the primary store. They are known in advance rather than discovered.
    pub fn with_known_ids(mut self, ids: Vec<PatientId>) -> Self {
        self.known_ids = ids;
        self
    }

    /// Resolve one patient into a normalised record.
    ///
    /// A patient unknown to every source resolves to a record of sentinel defaults.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::SourceUnavailable` if the primary store is configured and fails.
    pub async fn resolve_patient(&self, id: &PatientId) -> RecordResult<PatientRecord> {
        self.resolve_with(id, OnPrimaryFailure::Abort)
            .await
            .map(|(record, _)| record)
    }

    /// Resolve one patient; the flag is true when the primary store failed and was skipped.
    async fn resolve_with(
        &self,
        id: &PatientId,
        on_primary_failure: OnPrimaryFailure,
    ) -> RecordResult<(PatientRecord, bool)> {
        let mut builder = PatientRecordBuilder::new(id.clone());
        let mut degraded = false;

        for source in &self.chain {
            if builder.has_clinical() && builder.has_recommendation() {
                break;
            }

            let fragment = match source.try_load(id).await {
                Ok(Some(fragment)) => fragment,
                Ok(None) => {
                    tracing::debug!("{} has no data for patient {}", source.name(), id);
                    continue;
                }
                Err(SourceError::Unavailable(message))
                    if source.provenance() == Provenance::PrimaryStore =>
                {
                    if on_primary_failure == OnPrimaryFailure::Degrade {
                        tracing::warn!(
                            "{} unavailable for patient {}, using remaining sources: {}",
                            source.name(),
                            id,
                            message
                        );
                        degraded = true;
                        continue;
                    }
                    tracing::error!("{} unavailable while resolving patient {}: {}", source.name(), id, message);
                    return Err(RecordError::SourceUnavailable {
                        source_name: source.name(),
                        message,
                    });
                }
                Err(e) => {
                    tracing::warn!("ignoring {} for patient {}: {}", source.name(), id, e);
                    continue;
                }
            };

            if !builder.has_clinical() {
                if let Some(clinical) = fragment.clinical {
                    tracing::debug!("clinical text for patient {} from {}", id, source.name());
                    builder.clinical(normalize_clinical(clinical), source.provenance());
                }
            }

            if !builder.has_recommendation() {
                if let Some(recommendation) = fragment.recommendation {
                    tracing::debug!("recommendation for patient {} from {}", id, source.name());
                    builder.recommendation(
                        normalize_optional(recommendation.text.as_deref()),
                        source.provenance(),
                        recommendation.trials,
                    );
                }
            }
        }

        if !builder.has_recommendation() {
            if let Some(legacy) = &self.last_resort {
                match legacy.try_load(id).await {
                    Ok(Some(fragment)) => {
                        if let Some(recommendation) = fragment.recommendation {
                            tracing::debug!("recommendation for patient {} from {}", id, legacy.name());
                            builder.recommendation(
                                normalize_optional(recommendation.text.as_deref()),
                                legacy.provenance(),
                                recommendation.trials,
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("ignoring {} for patient {}: {}", legacy.name(), id, e),
                }
            }
        }

        if let Some(baseline) = &self.baseline {
            match baseline.store.fetch(id, &baseline.model_tag).await {
                Ok(Some(text)) => {
                    if let Some(text) = normalize_optional(Some(&text)) {
                        builder.baseline(BaselineRecommendation {
                            text,
                            model_tag: baseline.model_tag.clone(),
                        });
                    }
                }
                Ok(None) => {
                    tracing::debug!("no {} baseline for patient {}", baseline.model_tag, id)
                }
                Err(e) => tracing::warn!("baseline omitted for patient {}: {}", id, e),
            }
        }

        Ok((builder.build(), degraded))
    }

    /// The union of the configured ids and every id the chained sources can enumerate.
    ///
    /// Enumeration failures are logged; the ids from the remaining sources are still returned.
    pub async fn patient_ids(&self) -> BTreeSet<PatientId> {
        let mut ids: BTreeSet<PatientId> = self.known_ids.iter().cloned().collect();

        for source in &self.chain {
            match source.known_ids().await {
                Ok(found) => ids.extend(found),
                Err(e) => tracing::warn!("could not list patients from {}: {}", source.name(), e),
            }
        }

        ids
    }

    /// Resolve every known patient, concurrently.
    ///
    /// A patient the primary store fails for is resolved from the remaining sources; the
    /// other patients are unaffected.
    pub async fn resolve_all_patients(&self) -> BTreeMap<PatientId, PatientRecord> {
        self.resolve_batch().await.records
    }

    /// Like [`Self::resolve_all_patients`], also reporting which patients were resolved
    /// without the primary store.
    pub async fn resolve_batch(&self) -> ResolvedBatch {
        let ids = self.patient_ids().await;
        tracing::info!("resolving {} patients", ids.len());

        let results = join_all(
            ids.iter()
                .map(|id| self.resolve_with(id, OnPrimaryFailure::Degrade)),
        )
        .await;

        let mut batch = ResolvedBatch::default();
        for (id, result) in ids.into_iter().zip(results) {
            let (record, degraded) = match result {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::error!("patient {} left out of the snapshot: {}", id, e);
                    continue;
                }
            };
            tracing::debug!(
                "processed patient {} (clinical={}, recommendation={})",
                id,
                record.clinical_provenance,
                record.primary_recommendation.provenance
            );
            if degraded {
                batch.degraded.insert(id.clone());
            }
            batch.records.insert(id, record);
        }

        if !batch.degraded.is_empty() {
            tracing::warn!(
                "{} of {} patients resolved without the primary store",
                batch.degraded.len(),
                batch.records.len()
            );
        }
        batch
    }
}

fn normalize_clinical(clinical: ClinicalFragment) -> ClinicalText {
    ClinicalText {
        information: normalize_optional(clinical.information.as_deref()),
        question: normalize_optional(clinical.question.as_deref()),
        expert_recommendation: normalize_optional(clinical.expert_recommendation.as_deref()),
    }
}
