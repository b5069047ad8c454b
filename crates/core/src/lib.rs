//! # Tumorboard Core
//!
//! Core logic for the tumour board evaluation platform.
//!
//! This crate assembles normalised patient records from the output of the recommendation
//! pipeline and runs the clinician evaluation study on top of them:
//! - Per-field-group resolution over the workflow store, batch workflow files and legacy
//!   recommendation files ([`resolver`], [`sources`])
//! - Text normalisation of every narrative field ([`normalize`])
//! - A time-boxed snapshot of all patients ([`catalog`], [`cache`])
//! - Participant registration, evaluation submission and study summaries ([`evaluations`])
//! - One-time alias migration of workflow documents ([`migration`])
//!
//! **No API concerns**: HTTP routing and CLI argument handling belong in `api-rest` and `cli`.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluations;
pub mod migration;
pub mod normalize;
pub mod paths;
pub mod record;
pub mod resolver;
pub mod sources;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use catalog::PatientCatalog;
pub use config::CoreConfig;
pub use error::{RecordError, RecordResult};
pub use evaluations::{EvaluationService, MongoEvaluationStore};
pub use normalize::normalize_text;
pub use record::{PatientRecord, Provenance};
pub use tumorboard_types::{ParticipantId, PatientId};

use std::sync::Arc;

/// Build the evaluation service described by `cfg`: MongoDB-backed when an evaluation
/// database is configured, in memory otherwise.
///
/// # Errors
///
/// Returns `RecordError::InvalidInput` if the configured MongoDB URI cannot be parsed and
/// `RecordError::Database` if the unique indexes cannot be created.
pub async fn evaluation_service(cfg: &CoreConfig) -> RecordResult<EvaluationService> {
    match cfg.evaluation_store() {
        Some(store) => {
            let client = sources::connect(&store.uri).await?;
            tracing::info!("evaluation store: {}", store.database);
            let store = MongoEvaluationStore::connect(&client, store).await?;
            Ok(EvaluationService::new(Arc::new(store)))
        }
        None => {
            tracing::warn!("no evaluation database configured, evaluations are kept in memory");
            Ok(EvaluationService::in_memory())
        }
    }
}
