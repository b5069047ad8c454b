//! Downloadable evaluation data and paginated evaluation listings.

use super::{Evaluation, Willingness};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tumorboard_types::PatientId;

pub const DEFAULT_PAGE_LIMIT: u64 = 100;
pub const MAX_PAGE_LIMIT: u64 = 1000;

/// One evaluation flattened for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExportedEvaluation {
    pub evaluation_id: String,
    pub evaluator_id: String,
    pub profession: String,
    pub years_experience: u32,
    pub overall_rating: u8,
    pub implementation_willingness: Willingness,
    pub comments: String,
    pub time_spent_seconds: Option<i64>,
    pub evaluation_date: DateTime<Utc>,
    pub evaluation_start_time: Option<DateTime<Utc>>,
    pub evaluation_end_time: DateTime<Utc>,
}

impl From<Evaluation> for ExportedEvaluation {
    fn from(e: Evaluation) -> Self {
        Self {
            evaluation_id: e.evaluation_id,
            evaluator_id: e.user_id.to_string(),
            profession: e.user_data.profession,
            years_experience: e.user_data.years_experience,
            overall_rating: e.overall_rating,
            implementation_willingness: e.implementation_willingness,
            comments: e.comments,
            time_spent_seconds: e.time_spent_seconds,
            evaluation_date: e.created_at,
            evaluation_start_time: e.evaluation_start_time,
            evaluation_end_time: e.evaluation_end_time,
        }
    }
}

/// Every evaluation of one patient case, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EvaluationExport {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub patient_id: PatientId,
    pub export_timestamp: DateTime<Utc>,
    pub total_evaluations: usize,
    pub evaluations: Vec<ExportedEvaluation>,
}

impl EvaluationExport {
    /// `evaluations` may arrive in any order.
    pub fn build(patient_id: PatientId, mut evaluations: Vec<Evaluation>, at: DateTime<Utc>) -> Self {
        evaluations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Self {
            patient_id,
            export_timestamp: at,
            total_evaluations: evaluations.len(),
            evaluations: evaluations.into_iter().map(ExportedEvaluation::from).collect(),
        }
    }

    /// Attachment file name offered to the browser.
    pub fn file_name(&self) -> String {
        format!("patient_{}_evaluations.json", self.patient_id)
    }
}

/// Which slice of the evaluation list to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationQuery {
    pub user_id: Option<String>,
    pub patient_id: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPage {
    pub evaluations: Vec<Evaluation>,
    pub total_evaluations: u64,
    /// 1-based page containing the first returned evaluation.
    pub current_page: u64,
    pub total_pages: u64,
}

impl EvaluationPage {
    pub(crate) fn new(evaluations: Vec<Evaluation>, total: u64, skip: u64, limit: u64) -> Self {
        Self {
            evaluations,
            total_evaluations: total,
            current_page: skip / limit + 1,
            total_pages: total.div_ceil(limit),
        }
    }
}
