//! One-time rewrite of alias keys in workflow documents.
//!
//! Older pipeline runs wrote the clinical narrative under several spellings. Resolution only
//! reads the canonical keys of `guidelines_result.patient_data`, so existing documents are
//! migrated in place once with [`migrate_workflow_files`] and [`migrate_workflow_store`].

use crate::config::MongoStoreConfig;
use crate::paths::BatchLayout;
use crate::{RecordError, RecordResult};
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const PATIENT_DATA_PATH: &str = "guidelines_result.patient_data";

/// Canonical key and the alias spellings it replaces, in preference order.
const ALIASES: &[(&str, &[&str])] = &[
    (
        "clinical_information",
        &["ClinicalInformation", "clinicalInformation", "Clinical Information"],
    ),
    (
        "question_for_tumorboard",
        &["ClinicalQuestion", "Clinical Question", "clinicalQuestion", "clinical_question"],
    ),
    (
        "expert_recommendation",
        &["ExpertRecommendation", "expertRecommendation"],
    ),
];

/// One alias key removed from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRewrite {
    pub alias: &'static str,
    pub canonical: &'static str,
    /// False when the canonical key already had a value and the alias was only dropped.
    pub value_moved: bool,
}

fn has_text(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn migrate_patient_data(patient_data: &mut Map<String, Value>) -> Vec<KeyRewrite> {
    let mut rewrites = Vec::new();

    for &(canonical, aliases) in ALIASES {
        for &alias in aliases {
            let Some(value) = patient_data.remove(alias) else {
                continue;
            };
            let value_moved = !has_text(patient_data.get(canonical)) && has_text(Some(&value));
            if value_moved {
                patient_data.insert(canonical.to_string(), value);
            }
            rewrites.push(KeyRewrite {
                alias,
                canonical,
                value_moved,
            });
        }
    }

    rewrites
}

/// Rewrite alias keys under `guidelines_result.patient_data` to their canonical names.
///
/// A non-empty canonical value always wins; otherwise the first non-empty alias moves into
/// the canonical key. Every alias key is removed. Returns what changed; an empty list means
/// the document was already canonical.
pub fn migrate_aliases(document: &mut Value) -> Vec<KeyRewrite> {
    match document
        .get_mut("guidelines_result")
        .and_then(|g| g.get_mut("patient_data"))
        .and_then(Value::as_object_mut)
    {
        Some(patient_data) => migrate_patient_data(patient_data),
        None => Vec::new(),
    }
}

/// Outcome of a migration run. Locations are file paths or `collection/patient_id`.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub scanned: usize,
    pub changed: Vec<(String, Vec<KeyRewrite>)>,
    /// Documents that could not be parsed, with the parse error.
    pub skipped: Vec<(String, String)>,
}

/// Migrate every workflow file under `root`, patient directories and flat files alike.
///
/// With `dry_run` nothing is written; the report lists what would change.
///
/// # Errors
///
/// Returns `RecordError::FileRead` if the root cannot be listed or a file cannot be read, and
/// `RecordError::FileWrite` if a migrated file cannot be written back.
pub async fn migrate_workflow_files(root: &Path, dry_run: bool) -> RecordResult<MigrationReport> {
    let layout = BatchLayout::new(root);
    let mut files: Vec<PathBuf> = layout
        .discover_directory_ids()
        .await
        .map_err(RecordError::FileRead)?
        .iter()
        .map(|id| layout.directory_workflow_file(id))
        .collect();
    files.extend(
        layout
            .discover_flat_file_ids()
            .await
            .map_err(RecordError::FileRead)?
            .iter()
            .map(|id| layout.flat_workflow_file(id)),
    );

    let mut report = MigrationReport::default();

    for path in files {
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(RecordError::FileRead(e)),
        };
        report.scanned += 1;

        let mut document: Value = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("skipping unparseable workflow file {}: {}", path.display(), e);
                report.skipped.push((path.display().to_string(), e.to_string()));
                continue;
            }
        };

        let rewrites = migrate_aliases(&mut document);
        if rewrites.is_empty() {
            continue;
        }

        if dry_run {
            tracing::info!("would migrate {} alias keys in {}", rewrites.len(), path.display());
        } else {
            let mut out = serde_json::to_string_pretty(&document).map_err(RecordError::Serialization)?;
            out.push('\n');
            tokio::fs::write(&path, out)
                .await
                .map_err(RecordError::FileWrite)?;
            tracing::info!("migrated {} alias keys in {}", rewrites.len(), path.display());
        }
        report.changed.push((path.display().to_string(), rewrites));
    }

    Ok(report)
}

/// `$set`/`$unset` update applying `rewrites` to a stored document whose patient data is
/// `patient_data`. Moved values keep their stored BSON type.
fn alias_update(patient_data: &Document, rewrites: &[KeyRewrite]) -> Document {
    let mut set = Document::new();
    let mut unset = Document::new();

    for rewrite in rewrites {
        if rewrite.value_moved {
            if let Some(value) = patient_data.get(rewrite.alias) {
                set.insert(format!("{PATIENT_DATA_PATH}.{}", rewrite.canonical), value.clone());
            }
        }
        unset.insert(format!("{PATIENT_DATA_PATH}.{}", rewrite.alias), "");
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    update.insert("$unset", unset);
    update
}

/// Alias rewrites a stored workflow document needs, with the matching update.
fn plan_document(document: &Document) -> Option<(Vec<KeyRewrite>, Document)> {
    let patient_data = document
        .get_document("guidelines_result")
        .and_then(|g| g.get_document("patient_data"))
        .ok()?;

    let mut as_json = Bson::Document(patient_data.clone()).into_relaxed_extjson();
    let rewrites = migrate_patient_data(as_json.as_object_mut()?);
    if rewrites.is_empty() {
        return None;
    }
    let update = alias_update(patient_data, &rewrites);
    Some((rewrites, update))
}

fn store_location(collection: &Collection<Document>, document: &Document) -> String {
    let key = document
        .get("patient_id")
        .or_else(|| document.get("_id"))
        .map(|id| match id {
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    format!("{}/{}", collection.name(), key)
}

/// Migrate every document of the workflow store collection.
///
/// With `dry_run` nothing is written; the report lists what would change.
///
/// # Errors
///
/// Returns `RecordError::Database` if the collection cannot be read or an update fails.
pub async fn migrate_workflow_store(
    client: &Client,
    cfg: &MongoStoreConfig,
    dry_run: bool,
) -> RecordResult<MigrationReport> {
    let collection: Collection<Document> =
        client.database(&cfg.database).collection(&cfg.collection);
    let store_error = |e: mongodb::error::Error| RecordError::Database(e.to_string());

    let mut cursor = collection.find(doc! {}).await.map_err(store_error)?;
    let mut report = MigrationReport::default();

    while let Some(document) = cursor.try_next().await.map_err(store_error)? {
        report.scanned += 1;
        let Some((rewrites, update)) = plan_document(&document) else {
            continue;
        };
        let location = store_location(&collection, &document);

        if dry_run {
            tracing::info!("would migrate {} alias keys in {}", rewrites.len(), location);
        } else {
            let Some(id) = document.get("_id") else {
                tracing::warn!("skipping stored workflow without _id: {}", location);
                report.skipped.push((location, "document has no _id".to_string()));
                continue;
            };
            collection
                .update_one(doc! { "_id": id.clone() }, update)
                .await
                .map_err(store_error)?;
            tracing::info!("migrated {} alias keys in {}", rewrites.len(), location);
        }
        report.changed.push((location, rewrites));
    }

    Ok(report)
}
