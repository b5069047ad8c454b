//! Constants used throughout the tumorboard core crate.
//!
//! File naming conventions of the upstream pipeline output, sentinel defaults and the
//! environment variable names read at startup.

use std::time::Duration;

/// Default root directory of the pipeline batch results when none is configured.
pub const DEFAULT_PATIENT_DATA_ROOT: &str = "patient_data";

/// Prefix of per-patient directories and files under the batch results root.
pub const PATIENT_PREFIX: &str = "patient_";

/// Suffix of the complete workflow JSON written by the recommendation pipeline.
pub const WORKFLOW_FILE_SUFFIX: &str = "_complete_workflow.json";

/// Suffix of the legacy single-step recommendation JSON.
pub const LEGACY_RECOMMENDATION_SUFFIX: &str = "_therapy_recommendation.json";

/// Suffix of the raw model response stored next to the legacy recommendation JSON.
pub const LEGACY_RAW_RESPONSE_SUFFIX: &str = "_therapy_recommendation_raw_response.txt";

/// Shown when no source supplies the clinical information narrative.
pub const NO_CLINICAL_INFORMATION: &str = "No clinical information available";

/// Shown when no source supplies the question posed to the tumour board.
pub const NO_CLINICAL_QUESTION: &str = "No clinical question provided";

/// Shown when no source supplies a therapy recommendation.
pub const NO_RECOMMENDATION: &str = "No recommendation available";

/// Default lifetime of a cached patient snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default MongoDB collection holding workflow documents.
pub const DEFAULT_WORKFLOW_COLLECTION: &str = "workflows";

/// Default MongoDB collection holding baseline recommendations.
pub const DEFAULT_BASELINE_COLLECTION: &str = "baseline_recommendations";

/// MongoDB collection for registered study participants.
pub const PARTICIPANTS_COLLECTION: &str = "users";

/// MongoDB collection for submitted evaluations.
pub const EVALUATIONS_COLLECTION: &str = "evaluations";

pub const ENV_PATIENT_DATA_ROOT: &str = "PATIENT_DATA_ROOT";
pub const ENV_PATIENT_IDS: &str = "PATIENT_IDS";
pub const ENV_CACHE_TTL_SECS: &str = "PATIENT_CACHE_TTL_SECS";
pub const ENV_WORKFLOW_MONGODB_URI: &str = "WORKFLOW_MONGODB_URI";
pub const ENV_WORKFLOW_MONGODB_DB: &str = "WORKFLOW_MONGODB_DB";
pub const ENV_WORKFLOW_COLLECTION: &str = "WORKFLOW_COLLECTION";
pub const ENV_BASELINE_MONGODB_URI: &str = "BASELINE_MONGODB_URI";
pub const ENV_BASELINE_MONGODB_DB: &str = "BASELINE_MONGODB_DB";
pub const ENV_BASELINE_COLLECTION: &str = "BASELINE_COLLECTION";
pub const ENV_BASELINE_MODEL_TAG: &str = "BASELINE_MODEL_TAG";
pub const ENV_EVALUATION_MONGODB_URI: &str = "EVALUATION_MONGODB_URI";
pub const ENV_EVALUATION_MONGODB_DB: &str = "EVALUATION_MONGODB_DB";
