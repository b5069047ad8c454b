//! File layout of the pipeline batch results directory.
//!
//! ```text
//! <root>/
//!   patient_<id>/
//!     patient_<id>_complete_workflow.json
//!     patient_<id>_therapy_recommendation.json                 # legacy
//!     patient_<id>_therapy_recommendation_raw_response.txt     # legacy
//!   patient_<id>_complete_workflow.json                        # single uploaded file
//!   patient_<id>_therapy_recommendation.json                   # legacy, root level
//! ```

use crate::constants::{
    LEGACY_RAW_RESPONSE_SUFFIX, LEGACY_RECOMMENDATION_SUFFIX, PATIENT_PREFIX,
    WORKFLOW_FILE_SUFFIX,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tumorboard_types::PatientId;

/// A legacy recommendation JSON and the raw response text stored beside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFiles {
    pub recommendation_json: PathBuf,
    pub raw_response: PathBuf,
}

/// Path derivation for one batch results root.
#[derive(Debug, Clone)]
pub struct BatchLayout {
    root: PathBuf,
}

impl BatchLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patient_dir(&self, id: &PatientId) -> PathBuf {
        self.root.join(format!("{PATIENT_PREFIX}{id}"))
    }

    /// `<root>/patient_<id>/patient_<id>_complete_workflow.json`
    pub fn directory_workflow_file(&self, id: &PatientId) -> PathBuf {
        self.patient_dir(id)
            .join(format!("{PATIENT_PREFIX}{id}{WORKFLOW_FILE_SUFFIX}"))
    }

    /// `<root>/patient_<id>_complete_workflow.json`
    pub fn flat_workflow_file(&self, id: &PatientId) -> PathBuf {
        self.root
            .join(format!("{PATIENT_PREFIX}{id}{WORKFLOW_FILE_SUFFIX}"))
    }

    /// Legacy file pairs in lookup order: patient directory first, then the root.
    pub fn legacy_files(&self, id: &PatientId) -> [LegacyFiles; 2] {
        let pair = |dir: PathBuf| LegacyFiles {
            recommendation_json: dir
                .join(format!("{PATIENT_PREFIX}{id}{LEGACY_RECOMMENDATION_SUFFIX}")),
            raw_response: dir.join(format!("{PATIENT_PREFIX}{id}{LEGACY_RAW_RESPONSE_SUFFIX}")),
        };
        [pair(self.patient_dir(id)), pair(self.root.clone())]
    }

    /// Ids of `patient_<id>/` directories under the root.
    ///
    /// A missing root yields an empty set; entries whose id is not a valid `PatientId` are
    /// skipped with a warning.
    pub async fn discover_directory_ids(&self) -> std::io::Result<BTreeSet<PatientId>> {
        self.discover(|name, is_dir| {
            if !is_dir {
                return None;
            }
            name.strip_prefix(PATIENT_PREFIX)
        })
        .await
    }

    /// Ids of `patient_<id>_complete_workflow.json` files directly under the root.
    pub async fn discover_flat_file_ids(&self) -> std::io::Result<BTreeSet<PatientId>> {
        self.discover(|name, is_dir| {
            if is_dir {
                return None;
            }
            name.strip_prefix(PATIENT_PREFIX)?
                .strip_suffix(WORKFLOW_FILE_SUFFIX)
        })
        .await
    }

    async fn discover(
        &self,
        extract: impl Fn(&str, bool) -> Option<&str>,
    ) -> std::io::Result<BTreeSet<PatientId>> {
        let mut ids = BTreeSet::new();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(raw_id) = extract(name, is_dir) else {
                continue;
            };
            match PatientId::parse(raw_id) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(e) => {
                    tracing::warn!("skipping {}: {}", entry.path().display(), e);
                }
            }
        }

        Ok(ids)
    }
}
