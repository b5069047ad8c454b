//! # API Shared
//!
//! Request and response bodies of the tumour board REST API.
//!
//! Contains:
//! - Shared services like `HealthService`
//! - Envelope types wrapping core records for JSON responses
//!
//! Core domain types (`PatientRecord`, `Participant`, `Evaluation`, reports) are serialised
//! as-is; this crate only adds the envelopes and request bodies around them.

pub mod health;

pub use health::{HealthRes, HealthService};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tumorboard_core::evaluations::{Evaluation, EvaluationQuery, Participant};
use tumorboard_core::record::{BaselineRecommendation, Recommendation, TrialReference};
use tumorboard_core::{PatientId, PatientRecord};
use utoipa::{IntoParams, ToSchema};

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRecord>,
    pub total_patients: usize,
    /// Patients resolved without the workflow store because it failed for them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<String>)]
    pub degraded_patients: Vec<PatientId>,
    pub snapshot_built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRes {
    #[schema(value_type = String)]
    pub patient_id: PatientId,
    pub primary_recommendation: Recommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_recommendation: Option<BaselineRecommendation>,
    pub trials: Vec<TrialReference>,
}

impl From<PatientRecord> for RecommendationRes {
    fn from(record: PatientRecord) -> Self {
        Self {
            patient_id: record.id,
            primary_recommendation: record.primary_recommendation,
            baseline_recommendation: record.baseline_recommendation,
            trials: record.trials,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReloadRes {
    pub message: String,
    pub total_patients: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<String>)]
    pub degraded_patients: Vec<PatientId>,
    pub snapshot_built_at: DateTime<Utc>,
}

/// Registration form. Fields default to empty so validation can name what is missing.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterParticipantReq {
    pub user_id: String,
    pub profession: String,
    pub years_experience: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantRes {
    pub message: String,
    pub user: Participant,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsRes {
    pub users: Vec<Participant>,
    pub total_users: usize,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkCompletedReq {
    pub patient_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkCompletedRes {
    pub message: String,
    #[schema(value_type = Vec<String>)]
    pub completed_evaluations: Vec<PatientId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitEvaluationRes {
    pub message: String,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationsRes {
    pub evaluations: Vec<Evaluation>,
    pub total_evaluations: usize,
}

impl From<Vec<Evaluation>> for EvaluationsRes {
    fn from(evaluations: Vec<Evaluation>) -> Self {
        Self {
            total_evaluations: evaluations.len(),
            evaluations,
        }
    }
}

/// Query string of the evaluation listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EvaluationListParams {
    /// Page size, 1 to 1000 (default 100)
    pub limit: Option<u64>,
    /// Evaluations to skip before the page starts (default 0)
    pub skip: Option<u64>,
    /// Only evaluations of this patient case
    pub patient_id: Option<String>,
    /// Only evaluations by this participant
    pub user_id: Option<String>,
}

impl From<EvaluationListParams> for EvaluationQuery {
    fn from(params: EvaluationListParams) -> Self {
        Self {
            user_id: params.user_id,
            patient_id: params.patient_id,
            skip: params.skip,
            limit: params.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check() {
        let res = HealthService::check_health();
        assert!(res.ok);
    }

    #[test]
    fn test_register_request_tolerates_missing_fields() {
        let req: RegisterParticipantReq =
            serde_json::from_str(r#"{"userId": "dr-a"}"#).expect("partial body parses");
        assert_eq!(req.user_id, "dr-a");
        assert!(req.profession.is_empty());
        assert_eq!(req.years_experience, None);
    }

    #[test]
    fn test_envelopes_use_camel_case() {
        let json = serde_json::to_value(EvaluationsRes::from(Vec::new())).unwrap();
        assert_eq!(json["totalEvaluations"], 0);

        let json = serde_json::to_value(MarkCompletedRes {
            message: "ok".into(),
            completed_evaluations: vec![PatientId::parse("4").unwrap()],
        })
        .unwrap();
        assert_eq!(json["completedEvaluations"][0], "4");
    }
}
