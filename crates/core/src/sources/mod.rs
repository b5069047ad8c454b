//! Record sources consulted by the resolver.
//!
//! Every provider implements [`RecordSource`]: given a patient id it returns the field groups
//! it knows about, or nothing. The resolver composes providers in a fixed priority list and
//! decides per field group which one wins; providers never look at each other.
//!
//! - [`MongoWorkflowSource`]: workflow documents in MongoDB (the primary store)
//! - [`DirectoryFileSource`]: `patient_<id>/patient_<id>_complete_workflow.json`
//! - [`FlatFileSource`]: `patient_<id>_complete_workflow.json` at the root
//! - [`LegacyFileSource`]: single-step recommendation files, recommendation group only
//!
//! Baseline recommendations come from a separate store behind [`BaselineStore`].

mod files;
mod mongo;

pub use files::{DirectoryFileSource, FlatFileSource, LegacyFileSource};
pub use mongo::{connect, MongoBaselineStore, MongoWorkflowSource};

use crate::record::{Provenance, TrialReference};
use async_trait::async_trait;
use tumorboard_types::PatientId;

/// Raw clinical narrative as found in a source, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalFragment {
    pub information: Option<String>,
    pub question: Option<String>,
    pub expert_recommendation: Option<String>,
}

/// Raw recommendation text and the trials matched alongside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationFragment {
    pub text: Option<String>,
    pub trials: Vec<TrialReference>,
}

/// The field groups one source holds for one patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFragment {
    pub clinical: Option<ClinicalFragment>,
    pub recommendation: Option<RecommendationFragment>,
}

/// Why a source could not answer.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backing service could not be reached or refused the query.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// Data exists but does not match the workflow schema.
    #[error("malformed source data at {location}: {message}")]
    Malformed { location: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// One provider of patient field groups.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Provenance reported for field groups taken from this source.
    fn provenance(&self) -> Provenance;

    /// Short human-readable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Load whatever this source holds for `id`. `Ok(None)` means the source has no data.
    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>>;

    /// Ids this source can enumerate on its own.
    async fn known_ids(&self) -> SourceResult<Vec<PatientId>> {
        Ok(Vec::new())
    }
}

/// Store of recommendations produced by reference models, keyed by patient and model tag.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    async fn fetch(&self, id: &PatientId, model_tag: &str) -> SourceResult<Option<String>>;
}
