//! Expert evaluation study: participants and their ratings of AI recommendations.
//!
//! Clinicians register once with their profession and experience, then rate the
//! recommendation shown for each patient case. [`EvaluationService`] validates input and owns
//! id and timestamp generation; persistence sits behind [`EvaluationStore`] so the service runs
//! against MongoDB in deployment and in memory in tests or when no database is configured.

mod export;
mod store;
mod summary;

pub use export::{
    EvaluationExport, EvaluationPage, EvaluationQuery, ExportedEvaluation, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};
pub use store::{EvaluationFilter, EvaluationStore, InMemoryEvaluationStore, MongoEvaluationStore};
pub use summary::{
    experience_range, EvaluationPeriod, EvaluationStatistics, PatientReport, PatientSummaries,
    PatientSummary, ProfessionStatistics, RatingStatistics, ReportSummary,
    WillingnessDistribution,
};

use crate::{RecordError, RecordResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tumorboard_types::{NonEmptyText, ParticipantId, PatientId};

/// Whether the evaluator would act on the recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Willingness {
    Yes,
    Maybe,
    No,
}

impl Willingness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Willingness::Yes => "yes",
            Willingness::Maybe => "maybe",
            Willingness::No => "no",
        }
    }
}

impl std::str::FromStr for Willingness {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Willingness::Yes),
            "maybe" => Ok(Willingness::Maybe),
            "no" => Ok(Willingness::No),
            other => Err(RecordError::InvalidWillingness(other.to_string())),
        }
    }
}

/// A registered study participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: ParticipantId,
    pub profession: String,
    pub years_experience: u32,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Patients this participant has evaluated, in completion order, without duplicates.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub completed_evaluations: Vec<PatientId>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn active_by_default() -> bool {
    true
}

/// Evaluator details copied onto each evaluation at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorProfile {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: ParticipantId,
    pub profession: String,
    pub years_experience: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub evaluation_id: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: ParticipantId,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub patient_id: PatientId,
    pub overall_rating: u8,
    pub implementation_willingness: Willingness,
    pub comments: String,
    pub user_data: EvaluatorProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_start_time: Option<DateTime<Utc>>,
    pub evaluation_end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An evaluation as submitted, before validation.
///
/// Missing fields deserialize to empty values so that validation, not deserialization,
/// reports what is wrong.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default, rename_all = "camelCase")]
pub struct NewEvaluation {
    pub user_id: String,
    pub patient_id: String,
    pub overall_rating: i64,
    pub implementation_willingness: String,
    pub comments: Option<String>,
    pub evaluation_start_time: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct EvaluationService {
    store: Arc<dyn EvaluationStore>,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn EvaluationStore>) -> Self {
        Self { store }
    }

    /// Service over a process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEvaluationStore::default()))
    }

    /// Register a new participant.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `RecordError::InvalidIdentifier` for a blank or malformed user id or blank profession,
    /// - `RecordError::InvalidInput` for negative experience,
    /// - `RecordError::ParticipantExists` if the id is taken.
    pub async fn register_participant(
        &self,
        user_id: &str,
        profession: &str,
        years_experience: i64,
    ) -> RecordResult<Participant> {
        let user_id = ParticipantId::parse(user_id)?;
        let profession = NonEmptyText::new(profession)?;
        let years_experience = u32::try_from(years_experience).map_err(|_| {
            RecordError::InvalidInput(format!(
                "yearsExperience must be a non-negative whole number (got {years_experience})"
            ))
        })?;

        if self.store.find_participant(&user_id).await?.is_some() {
            return Err(RecordError::ParticipantExists(user_id.to_string()));
        }

        let now = Utc::now();
        let participant = Participant {
            user_id,
            profession: profession.as_str().to_string(),
            years_experience,
            session_start: now,
            last_activity: now,
            completed_evaluations: Vec::new(),
            is_active: true,
            created_at: now,
        };
        self.store.insert_participant(&participant).await?;

        tracing::info!(
            "registered participant {} ({}, {} years)",
            participant.user_id,
            participant.profession,
            participant.years_experience
        );
        Ok(participant)
    }

    pub async fn participant(&self, user_id: &str) -> RecordResult<Participant> {
        let id = ParticipantId::parse(user_id)?;
        self.store
            .find_participant(&id)
            .await?
            .ok_or_else(|| RecordError::ParticipantNotFound(id.to_string()))
    }

    /// All participants, most recently registered first.
    pub async fn participants(&self) -> RecordResult<Vec<Participant>> {
        self.store.list_participants().await
    }

    /// Add `patient_id` to the participant's completed list. Repeated calls are no-ops.
    ///
    /// Returns the updated list.
    pub async fn mark_completed(&self, user_id: &str, patient_id: &str) -> RecordResult<Vec<PatientId>> {
        let user_id = ParticipantId::parse(user_id)?;
        let patient_id = PatientId::parse(patient_id)?;
        self.store
            .add_completed(&user_id, &patient_id, Utc::now())
            .await?
            .ok_or_else(|| RecordError::ParticipantNotFound(user_id.to_string()))
    }

    /// Validate and store an evaluation, then mark the patient completed for the participant.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `RecordError::InvalidIdentifier` for malformed user or patient ids,
    /// - `RecordError::InvalidRating` unless the rating is within 1..=10,
    /// - `RecordError::InvalidWillingness` unless willingness is `yes`, `maybe` or `no`,
    /// - `RecordError::ParticipantNotFound` if the participant is not registered.
    pub async fn submit_evaluation(&self, input: NewEvaluation) -> RecordResult<Evaluation> {
        let user_id = ParticipantId::parse(&input.user_id)?;
        let patient_id = PatientId::parse(&input.patient_id)?;
        let overall_rating = match input.overall_rating {
            r @ 1..=10 => r as u8,
            other => return Err(RecordError::InvalidRating(other)),
        };
        let implementation_willingness: Willingness = input.implementation_willingness.parse()?;

        let participant = self
            .store
            .find_participant(&user_id)
            .await?
            .ok_or_else(|| RecordError::ParticipantNotFound(user_id.to_string()))?;

        let now = Utc::now();
        let time_spent_seconds = input
            .evaluation_start_time
            .map(|start| ((now - start).num_milliseconds() as f64 / 1000.0).round().max(0.0) as i64);

        let evaluation = Evaluation {
            evaluation_id: format!("EVAL_{}_{}_{}", now.timestamp_millis(), user_id, patient_id),
            user_data: EvaluatorProfile {
                user_id: participant.user_id.clone(),
                profession: participant.profession.clone(),
                years_experience: participant.years_experience,
            },
            user_id,
            patient_id,
            overall_rating,
            implementation_willingness,
            comments: input.comments.unwrap_or_default(),
            evaluation_start_time: input.evaluation_start_time,
            evaluation_end_time: now,
            time_spent_seconds,
            created_at: now,
        };

        self.store.insert_evaluation(&evaluation).await?;
        self.store
            .add_completed(&evaluation.user_id, &evaluation.patient_id, now)
            .await?;

        tracing::info!(
            "evaluation {} submitted by {} for patient {}",
            evaluation.evaluation_id,
            evaluation.user_id,
            evaluation.patient_id
        );
        Ok(evaluation)
    }

    /// Evaluations by one participant, newest first.
    pub async fn evaluations_for_participant(&self, user_id: &str) -> RecordResult<Vec<Evaluation>> {
        let id = ParticipantId::parse(user_id)?;
        self.store.evaluations(EvaluationFilter::participant(id)).await
    }

    /// Evaluations of one patient case, newest first.
    pub async fn evaluations_for_patient(&self, patient_id: &PatientId) -> RecordResult<Vec<Evaluation>> {
        self.store
            .evaluations(EvaluationFilter::patient(patient_id.clone()))
            .await
    }

    pub async fn patient_report(&self, patient_id: &PatientId) -> RecordResult<PatientReport> {
        let evaluations = self.evaluations_for_patient(patient_id).await?;
        Ok(PatientReport::build(patient_id.clone(), evaluations))
    }

    /// Every evaluation of one patient case, oldest first, for download.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NoEvaluations` if nobody has evaluated the case yet.
    pub async fn export_patient(&self, patient_id: &PatientId) -> RecordResult<EvaluationExport> {
        let evaluations = self.evaluations_for_patient(patient_id).await?;
        if evaluations.is_empty() {
            return Err(RecordError::NoEvaluations(patient_id.to_string()));
        }
        tracing::info!(
            "exporting {} evaluations of patient {}",
            evaluations.len(),
            patient_id
        );
        Ok(EvaluationExport::build(patient_id.clone(), evaluations, Utc::now()))
    }

    /// One page of evaluations, newest first, optionally narrowed to a participant, a
    /// patient or both. Blank filters are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidIdentifier` for a malformed filter id and
    /// `RecordError::InvalidInput` unless the limit is within 1..=1000.
    pub async fn list_evaluations(&self, query: EvaluationQuery) -> RecordResult<EvaluationPage> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(RecordError::InvalidInput(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT} (got {limit})"
            )));
        }
        let skip = query.skip.unwrap_or(0);

        let filter = EvaluationFilter {
            participant: non_blank(query.user_id.as_deref())
                .map(ParticipantId::parse)
                .transpose()?,
            patient: non_blank(query.patient_id.as_deref())
                .map(PatientId::parse)
                .transpose()?,
        };

        let (evaluations, total) = self.store.evaluation_page(filter, skip, limit).await?;
        Ok(EvaluationPage::new(evaluations, total, skip, limit))
    }

    pub async fn patient_summaries(&self) -> RecordResult<PatientSummaries> {
        let evaluations = self.store.evaluations(EvaluationFilter::all()).await?;
        Ok(PatientSummaries::build(&evaluations))
    }

    pub async fn statistics(&self) -> RecordResult<EvaluationStatistics> {
        let evaluations = self.store.evaluations(EvaluationFilter::all()).await?;
        Ok(EvaluationStatistics::build(&evaluations))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
