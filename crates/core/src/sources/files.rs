//! File-backed record sources over the batch results directory.

use super::{RecommendationFragment, RecordSource, SourceError, SourceFragment, SourceResult};
use crate::paths::{BatchLayout, LegacyFiles};
use crate::record::Provenance;
use crate::workflow::WorkflowDocument;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tumorboard_types::PatientId;

/// Read a file, mapping "not found" to `None`.
async fn read_if_exists(path: &Path) -> SourceResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SourceError::Io(e)),
    }
}

async fn read_workflow_file(path: &Path) -> SourceResult<Option<SourceFragment>> {
    let Some(raw) = read_if_exists(path).await? else {
        tracing::debug!("workflow file not found: {}", path.display());
        return Ok(None);
    };

    let location = path.display().to_string();
    let document = WorkflowDocument::from_json(&raw).map_err(|e| SourceError::Malformed {
        location: location.clone(),
        message: e.to_string(),
    })?;

    tracing::debug!("loaded workflow file {}", location);
    Ok(Some(document.into_fragment(&location)))
}

/// Complete workflow file inside the per-patient directory.
#[derive(Debug, Clone)]
pub struct DirectoryFileSource {
    layout: BatchLayout,
}

impl DirectoryFileSource {
    pub fn new(layout: BatchLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl RecordSource for DirectoryFileSource {
    fn provenance(&self) -> Provenance {
        Provenance::StructuredFile
    }

    fn name(&self) -> &'static str {
        "patient directory workflow file"
    }

    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>> {
        read_workflow_file(&self.layout.directory_workflow_file(id)).await
    }

    async fn known_ids(&self) -> SourceResult<Vec<PatientId>> {
        Ok(self.layout.discover_directory_ids().await?.into_iter().collect())
    }
}

/// Complete workflow file uploaded on its own at the root.
#[derive(Debug, Clone)]
pub struct FlatFileSource {
    layout: BatchLayout,
}

impl FlatFileSource {
    pub fn new(layout: BatchLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl RecordSource for FlatFileSource {
    fn provenance(&self) -> Provenance {
        Provenance::StructuredFile
    }

    fn name(&self) -> &'static str {
        "flat workflow file"
    }

    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>> {
        read_workflow_file(&self.layout.flat_workflow_file(id)).await
    }

    async fn known_ids(&self) -> SourceResult<Vec<PatientId>> {
        Ok(self.layout.discover_flat_file_ids().await?.into_iter().collect())
    }
}

/// Recommendation-only files written by the single-step pipeline that predates the workflow.
///
/// Only ever yields the recommendation group. Locations are tried in order (patient
/// directory, then root); a location whose JSON is unreadable is logged and skipped.
#[derive(Debug, Clone)]
pub struct LegacyFileSource {
    layout: BatchLayout,
}

impl LegacyFileSource {
    pub fn new(layout: BatchLayout) -> Self {
        Self { layout }
    }

    async fn load_pair(&self, files: &LegacyFiles) -> SourceResult<Option<RecommendationFragment>> {
        let Some(raw_json) = read_if_exists(&files.recommendation_json).await? else {
            return Ok(None);
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw_json).map_err(|e| SourceError::Malformed {
                location: files.recommendation_json.display().to_string(),
                message: e.to_string(),
            })?;

        let from_json = value
            .get("raw_response")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        let text = match from_json {
            Some(text) => Some(text),
            None => match read_if_exists(&files.raw_response).await {
                Ok(raw) => raw.filter(|s| !s.trim().is_empty()),
                Err(e) => {
                    tracing::warn!(
                        "could not read raw response {}: {}",
                        files.raw_response.display(),
                        e
                    );
                    None
                }
            },
        };

        Ok(Some(RecommendationFragment {
            text,
            trials: Vec::new(),
        }))
    }
}

#[async_trait]
impl RecordSource for LegacyFileSource {
    fn provenance(&self) -> Provenance {
        Provenance::LegacyFile
    }

    fn name(&self) -> &'static str {
        "legacy recommendation file"
    }

    async fn try_load(&self, id: &PatientId) -> SourceResult<Option<SourceFragment>> {
        for files in self.layout.legacy_files(id) {
            match self.load_pair(&files).await {
                Ok(Some(recommendation)) => {
                    return Ok(Some(SourceFragment {
                        clinical: None,
                        recommendation: Some(recommendation),
                    }));
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("skipping legacy recommendation for patient {}: {}", id, e);
                }
            }
        }
        Ok(None)
    }
}
