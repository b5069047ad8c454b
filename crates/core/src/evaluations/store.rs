//! Persistence for participants and evaluations.

use super::{Evaluation, EvaluatorProfile, Participant, Willingness};
use crate::config::MongoDatabaseConfig;
use crate::constants::{EVALUATIONS_COLLECTION, PARTICIPANTS_COLLECTION};
use crate::{RecordError, RecordResult};
use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tumorboard_types::{ParticipantId, PatientId};

/// Which evaluations to list. Unset fields match every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationFilter {
    pub participant: Option<ParticipantId>,
    pub patient: Option<PatientId>,
}

impl EvaluationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn participant(id: ParticipantId) -> Self {
        Self {
            participant: Some(id),
            patient: None,
        }
    }

    pub fn patient(id: PatientId) -> Self {
        Self {
            participant: None,
            patient: Some(id),
        }
    }

    fn matches(&self, evaluation: &Evaluation) -> bool {
        self.participant.as_ref().map_or(true, |id| &evaluation.user_id == id)
            && self.patient.as_ref().map_or(true, |id| &evaluation.patient_id == id)
    }

    fn query(&self) -> bson::Document {
        let mut query = doc! {};
        if let Some(id) = &self.participant {
            query.insert("userId", id.as_str());
        }
        if let Some(id) = &self.patient {
            query.insert("patientId", id.as_str());
        }
        query
    }
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn find_participant(&self, id: &ParticipantId) -> RecordResult<Option<Participant>>;

    /// # Errors
    ///
    /// Returns `RecordError::ParticipantExists` if the id is already registered.
    async fn insert_participant(&self, participant: &Participant) -> RecordResult<()>;

    /// All participants, newest registration first.
    async fn list_participants(&self) -> RecordResult<Vec<Participant>>;

    /// Add a patient to the participant's completed list unless already present, touching
    /// `last_activity`. `Ok(None)` if the participant does not exist.
    async fn add_completed(
        &self,
        id: &ParticipantId,
        patient_id: &PatientId,
        at: DateTime<Utc>,
    ) -> RecordResult<Option<Vec<PatientId>>>;

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> RecordResult<()>;

    /// Matching evaluations, newest first.
    async fn evaluations(&self, filter: EvaluationFilter) -> RecordResult<Vec<Evaluation>>;

    /// One page of matching evaluations, newest first, and the number of matches overall.
    async fn evaluation_page(
        &self,
        filter: EvaluationFilter,
        skip: u64,
        limit: u64,
    ) -> RecordResult<(Vec<Evaluation>, u64)> {
        let all = self.evaluations(filter).await?;
        let total = all.len() as u64;
        let page = all
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    participants: RwLock<Vec<Participant>>,
    evaluations: RwLock<Vec<Evaluation>>,
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluationStore {
    async fn find_participant(&self, id: &ParticipantId) -> RecordResult<Option<Participant>> {
        Ok(self
            .participants
            .read()
            .iter()
            .find(|p| &p.user_id == id)
            .cloned())
    }

    async fn insert_participant(&self, participant: &Participant) -> RecordResult<()> {
        let mut participants = self.participants.write();
        if participants.iter().any(|p| p.user_id == participant.user_id) {
            return Err(RecordError::ParticipantExists(participant.user_id.to_string()));
        }
        participants.push(participant.clone());
        Ok(())
    }

    async fn list_participants(&self) -> RecordResult<Vec<Participant>> {
        let mut participants: Vec<Participant> =
            self.participants.read().iter().rev().cloned().collect();
        participants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(participants)
    }

    async fn add_completed(
        &self,
        id: &ParticipantId,
        patient_id: &PatientId,
        at: DateTime<Utc>,
    ) -> RecordResult<Option<Vec<PatientId>>> {
        let mut participants = self.participants.write();
        let Some(participant) = participants.iter_mut().find(|p| &p.user_id == id) else {
            return Ok(None);
        };
        if !participant.completed_evaluations.contains(patient_id) {
            participant.completed_evaluations.push(patient_id.clone());
        }
        participant.last_activity = at;
        Ok(Some(participant.completed_evaluations.clone()))
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> RecordResult<()> {
        self.evaluations.write().push(evaluation.clone());
        Ok(())
    }

    async fn evaluations(&self, filter: EvaluationFilter) -> RecordResult<Vec<Evaluation>> {
        let mut found: Vec<Evaluation> = self
            .evaluations
            .read()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

/// Participant as stored in the `users` collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDocument {
    user_id: String,
    profession: String,
    years_experience: i64,
    session_start: bson::DateTime,
    last_activity: bson::DateTime,
    #[serde(default)]
    completed_evaluations: Vec<String>,
    #[serde(default = "default_active")]
    is_active: bool,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

fn default_active() -> bool {
    true
}

/// Evaluation as stored in the `evaluations` collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationDocument {
    evaluation_id: String,
    user_id: String,
    patient_id: String,
    overall_rating: i32,
    implementation_willingness: Willingness,
    #[serde(default)]
    comments: String,
    user_data: ProfileDocument,
    #[serde(default)]
    evaluation_start_time: Option<bson::DateTime>,
    evaluation_end_time: bson::DateTime,
    #[serde(default)]
    time_spent_seconds: Option<i64>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDocument {
    user_id: String,
    #[serde(default)]
    profession: Option<String>,
    #[serde(default)]
    years_experience: Option<i64>,
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> RecordError {
    RecordError::Database(format!("stored {what} is invalid: {e}"))
}

fn years(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl From<&Participant> for ParticipantDocument {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.to_string(),
            profession: p.profession.clone(),
            years_experience: i64::from(p.years_experience),
            session_start: bson::DateTime::from_chrono(p.session_start),
            last_activity: bson::DateTime::from_chrono(p.last_activity),
            completed_evaluations: p
                .completed_evaluations
                .iter()
                .map(|id| id.to_string())
                .collect(),
            is_active: p.is_active,
            created_at: bson::DateTime::from_chrono(p.created_at),
            updated_at: bson::DateTime::from_chrono(p.last_activity),
        }
    }
}

impl TryFrom<ParticipantDocument> for Participant {
    type Error = RecordError;

    fn try_from(d: ParticipantDocument) -> RecordResult<Self> {
        Ok(Self {
            user_id: ParticipantId::parse(&d.user_id).map_err(|e| corrupt("participant", e))?,
            profession: d.profession,
            years_experience: years(d.years_experience),
            session_start: d.session_start.to_chrono(),
            last_activity: d.last_activity.to_chrono(),
            completed_evaluations: d
                .completed_evaluations
                .iter()
                .map(PatientId::parse)
                .collect::<Result<_, _>>()
                .map_err(|e| corrupt("participant", e))?,
            is_active: d.is_active,
            created_at: d.created_at.to_chrono(),
        })
    }
}

impl From<&Evaluation> for EvaluationDocument {
    fn from(e: &Evaluation) -> Self {
        Self {
            evaluation_id: e.evaluation_id.clone(),
            user_id: e.user_id.to_string(),
            patient_id: e.patient_id.to_string(),
            overall_rating: i32::from(e.overall_rating),
            implementation_willingness: e.implementation_willingness,
            comments: e.comments.clone(),
            user_data: ProfileDocument {
                user_id: e.user_data.user_id.to_string(),
                profession: Some(e.user_data.profession.clone()),
                years_experience: Some(i64::from(e.user_data.years_experience)),
            },
            evaluation_start_time: e.evaluation_start_time.map(bson::DateTime::from_chrono),
            evaluation_end_time: bson::DateTime::from_chrono(e.evaluation_end_time),
            time_spent_seconds: e.time_spent_seconds,
            created_at: bson::DateTime::from_chrono(e.created_at),
            updated_at: bson::DateTime::from_chrono(e.created_at),
        }
    }
}

impl TryFrom<EvaluationDocument> for Evaluation {
    type Error = RecordError;

    fn try_from(d: EvaluationDocument) -> RecordResult<Self> {
        let user_id = ParticipantId::parse(&d.user_id).map_err(|e| corrupt("evaluation", e))?;
        let profile_id = ParticipantId::parse(&d.user_data.user_id).unwrap_or_else(|_| user_id.clone());
        Ok(Self {
            evaluation_id: d.evaluation_id,
            patient_id: PatientId::parse(&d.patient_id).map_err(|e| corrupt("evaluation", e))?,
            overall_rating: u8::try_from(d.overall_rating).map_err(|e| corrupt("evaluation", e))?,
            implementation_willingness: d.implementation_willingness,
            comments: d.comments,
            user_data: EvaluatorProfile {
                user_id: profile_id,
                profession: d.user_data.profession.unwrap_or_else(|| "Unknown".to_string()),
                years_experience: d.user_data.years_experience.map(years).unwrap_or(0),
            },
            user_id,
            evaluation_start_time: d.evaluation_start_time.map(|t| t.to_chrono()),
            evaluation_end_time: d.evaluation_end_time.to_chrono(),
            time_spent_seconds: d.time_spent_seconds,
            created_at: d.created_at.to_chrono(),
        })
    }
}

fn database_error(e: mongodb::error::Error) -> RecordError {
    RecordError::Database(e.to_string())
}

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(w)) if w.code == DUPLICATE_KEY
    )
}

fn unique_index(field: &str) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { field: 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(format!("{field}_unique"))
                .build(),
        )
        .build()
}

/// Store over the `users` and `evaluations` collections of one database.
#[derive(Debug, Clone)]
pub struct MongoEvaluationStore {
    participants: Collection<ParticipantDocument>,
    evaluations: Collection<EvaluationDocument>,
}

impl MongoEvaluationStore {
    /// Open the collections and make sure their unique indexes exist.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Database` if an index cannot be created, for example because
    /// existing documents already share a `userId` or `evaluationId`.
    pub async fn connect(client: &Client, cfg: &MongoDatabaseConfig) -> RecordResult<Self> {
        let db = client.database(&cfg.database);
        let store = Self {
            participants: db.collection(PARTICIPANTS_COLLECTION),
            evaluations: db.collection(EVALUATIONS_COLLECTION),
        };
        store.apply_indexes().await?;
        Ok(store)
    }

    async fn apply_indexes(&self) -> RecordResult<()> {
        self.participants
            .create_index(unique_index("userId"))
            .await
            .map_err(|e| RecordError::Database(format!("Failed to create indexes: {e}")))?;
        self.evaluations
            .create_index(unique_index("evaluationId"))
            .await
            .map_err(|e| RecordError::Database(format!("Failed to create indexes: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl EvaluationStore for MongoEvaluationStore {
    async fn find_participant(&self, id: &ParticipantId) -> RecordResult<Option<Participant>> {
        self.participants
            .find_one(doc! { "userId": id.as_str() })
            .await
            .map_err(database_error)?
            .map(Participant::try_from)
            .transpose()
    }

    async fn insert_participant(&self, participant: &Participant) -> RecordResult<()> {
        match self
            .participants
            .insert_one(ParticipantDocument::from(participant))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(RecordError::ParticipantExists(participant.user_id.to_string()))
            }
            Err(e) => Err(database_error(e)),
        }
    }

    async fn list_participants(&self) -> RecordResult<Vec<Participant>> {
        let documents: Vec<ParticipantDocument> = self
            .participants
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(database_error)?
            .try_collect()
            .await
            .map_err(database_error)?;

        documents.into_iter().map(Participant::try_from).collect()
    }

    async fn add_completed(
        &self,
        id: &ParticipantId,
        patient_id: &PatientId,
        at: DateTime<Utc>,
    ) -> RecordResult<Option<Vec<PatientId>>> {
        let at = bson::DateTime::from_chrono(at);
        let updated = self
            .participants
            .find_one_and_update(
                doc! { "userId": id.as_str() },
                doc! {
                    "$addToSet": { "completedEvaluations": patient_id.as_str() },
                    "$set": { "lastActivity": at, "updatedAt": at },
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(database_error)?;

        updated
            .map(|d| Participant::try_from(d).map(|p| p.completed_evaluations))
            .transpose()
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> RecordResult<()> {
        self.evaluations
            .insert_one(EvaluationDocument::from(evaluation))
            .await
            .map_err(database_error)?;
        Ok(())
    }

    async fn evaluations(&self, filter: EvaluationFilter) -> RecordResult<Vec<Evaluation>> {
        let documents: Vec<EvaluationDocument> = self
            .evaluations
            .find(filter.query())
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(database_error)?
            .try_collect()
            .await
            .map_err(database_error)?;

        documents.into_iter().map(Evaluation::try_from).collect()
    }

    async fn evaluation_page(
        &self,
        filter: EvaluationFilter,
        skip: u64,
        limit: u64,
    ) -> RecordResult<(Vec<Evaluation>, u64)> {
        let query = filter.query();
        let total = self
            .evaluations
            .count_documents(query.clone())
            .await
            .map_err(database_error)?;

        let documents: Vec<EvaluationDocument> = self
            .evaluations
            .find(query)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(database_error)?
            .try_collect()
            .await
            .map_err(database_error)?;

        let page = documents
            .into_iter()
            .map(Evaluation::try_from)
            .collect::<RecordResult<_>>()?;
        Ok((page, total))
    }
}
