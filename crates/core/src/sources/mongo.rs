//! MongoDB-backed workflow and baseline stores.

use super::{BaselineStore, RecordSource, SourceError, SourceFragment, SourceResult};
use crate::config::MongoStoreConfig;
use crate::record::Provenance;
use crate::workflow::WorkflowDocument;
use crate::{RecordError, RecordResult};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::{Client, Collection};
use tumorboard_types::PatientId;

/// Upper bound on server selection and connection setup.
const TIMEOUT_OPTIONS: &str = "serverSelectionTimeoutMS=3000&connectTimeoutMS=3000";

/// Create a MongoDB client for `uri`.
///
/// The driver connects lazily, so this does not fail for an unreachable server; queries made
/// through the client will.
///
/// # Errors
///
/// Returns `RecordError::InvalidInput` if the connection string cannot be parsed.
pub async fn connect(uri: &str) -> RecordResult<Client> {
    let uri = if uri.contains("serverSelectionTimeoutMS") {
        uri.to_string()
    } else if uri.contains('?') {
        format!("{uri}&{TIMEOUT_OPTIONS}")
    } else {
        format!("{uri}?{TIMEOUT_OPTIONS}")
    };

    Client::with_uri_str(&uri)
        .await
        .map_err(|e| RecordError::InvalidInput(format!("invalid MongoDB connection string: {e}")))
}

/// Filter on `patient_id`, matching both string and numeric storage of the same id.
fn patient_filter(id: &PatientId) -> Document {
    match id.as_str().parse::<i64>() {
        Ok(n) => doc! { "$or": [ { "patient_id": id.as_str() }, { "patient_id": n } ] },
        Err(_) => doc! { "patient_id": id.as_str() },
    }
}

/// Workflow documents stored one per patient, keyed by `patient_id`.
#[derive(Debug, Clone)]
pub struct MongoWorkflowSource {
    collection: Collection<Document>,
}

impl MongoWorkflowSource {
    pub fn new(client: &Client, cfg: &MongoStoreConfig) -> Self {
        Self {
            collection: client.database(&cfg.database).collection(&cfg.collection),
        }
    }
}

#[async_trait]
impl RecordSource for MongoWorkflowSource {
    fn provenance(&self) -> Provenance {
        Provenance::PrimaryStore
    }

    fn name(&self) -> &'static str {
        "workflow store"
    }

    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>> {
        let found = self
            .collection
            .find_one(patient_filter(id))
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let Some(document) = found else {
            return Ok(None);
        };

        let location = format!("{}/{}", self.collection.name(), id);
        Ok(Some(WorkflowDocument::from_bson(document).into_fragment(&location)))
    }
}

/// Baseline recommendations keyed by `patient_id` and generating `model`, text in `text`.
#[derive(Debug, Clone)]
pub struct MongoBaselineStore {
    collection: Collection<Document>,
}

impl MongoBaselineStore {
    pub fn new(client: &Client, cfg: &MongoStoreConfig) -> Self {
        Self {
            collection: client.database(&cfg.database).collection(&cfg.collection),
        }
    }
}

#[async_trait]
impl BaselineStore for MongoBaselineStore {
    async fn fetch(&self, id: &PatientId, model_tag: &str) -> SourceResult<Option<String>> {
        let mut filter = patient_filter(id);
        filter.insert("model", model_tag);

        let found = self
            .collection
            .find_one(filter)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(found.and_then(|d| match d.get("text") {
            Some(Bson::String(text)) => Some(text.clone()),
            _ => None,
        }))
    }
}
