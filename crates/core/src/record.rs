//! Normalised patient record returned by the resolver.
//!
//! A `PatientRecord` is a read-time projection over the workflow sources. It is built in one go
//! by [`PatientRecordBuilder`] each time a patient is resolved and is never written back.

use crate::constants::{NO_CLINICAL_INFORMATION, NO_CLINICAL_QUESTION, NO_RECOMMENDATION};
use serde::{Deserialize, Serialize};
use tumorboard_types::PatientId;

/// Which source supplied a field group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    /// The MongoDB workflow collection.
    PrimaryStore,
    /// A complete workflow JSON file, either in the patient directory or at the root.
    StructuredFile,
    /// The legacy single-step recommendation files.
    LegacyFile,
    /// Nothing supplied the field; the sentinel default is used.
    None,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::PrimaryStore => "PRIMARY_STORE",
            Provenance::StructuredFile => "STRUCTURED_FILE",
            Provenance::LegacyFile => "LEGACY_FILE",
            Provenance::None => "NONE",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The AI-generated therapy recommendation shown to reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub text: String,
    pub provenance: Provenance,
}

impl Recommendation {
    /// The sentinel recommendation used when no source has one.
    pub fn unavailable() -> Self {
        Self {
            text: NO_RECOMMENDATION.to_string(),
            provenance: Provenance::None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provenance != Provenance::None
    }
}

/// Recommendation produced by a reference model, stored apart from the workflow output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BaselineRecommendation {
    pub text: String,
    pub model_tag: String,
}

/// A publication supporting a trial, flattened from the publication analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub title: String,
    pub url: String,
    /// Search channel the publication came from: `PubMed`, `OncLive` or `Congress Abstracts`.
    pub source: String,
}

/// A clinical trial matched to the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TrialReference {
    pub nct_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub publications: Vec<Publication>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: PatientId,
    pub name: String,
    pub clinical_information: String,
    pub clinical_question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_recommendation: Option<String>,
    pub clinical_provenance: Provenance,
    pub primary_recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_recommendation: Option<BaselineRecommendation>,
    #[serde(default)]
    pub trials: Vec<TrialReference>,
}

impl PatientRecord {
    /// True when at least one source knew about this patient.
    pub fn has_source_data(&self) -> bool {
        self.clinical_provenance != Provenance::None
            || self.primary_recommendation.is_available()
            || self.baseline_recommendation.is_some()
    }
}

/// Assembles a [`PatientRecord`], applying sentinel defaults for missing field groups.
///
/// Narrative handed to the builder must already be normalised.
#[derive(Debug)]
pub(crate) struct PatientRecordBuilder {
    id: PatientId,
    clinical: Option<(ClinicalText, Provenance)>,
    recommendation: Option<Recommendation>,
    trials: Vec<TrialReference>,
    baseline: Option<BaselineRecommendation>,
}

/// Normalised clinical field group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ClinicalText {
    pub information: Option<String>,
    pub question: Option<String>,
    pub expert_recommendation: Option<String>,
}

impl PatientRecordBuilder {
    pub(crate) fn new(id: PatientId) -> Self {
        Self {
            id,
            clinical: None,
            recommendation: None,
            trials: Vec::new(),
            baseline: None,
        }
    }

    pub(crate) fn clinical(&mut self, clinical: ClinicalText, provenance: Provenance) {
        self.clinical = Some((clinical, provenance));
    }

    /// Record the recommendation group. Empty text falls back to the sentinel but keeps the
    /// provenance of the source that carried the (empty) recommendation.
    pub(crate) fn recommendation(
        &mut self,
        text: Option<String>,
        provenance: Provenance,
        trials: Vec<TrialReference>,
    ) {
        self.recommendation = Some(Recommendation {
            text: text.unwrap_or_else(|| NO_RECOMMENDATION.to_string()),
            provenance,
        });
        self.trials = trials;
    }

    pub(crate) fn baseline(&mut self, baseline: BaselineRecommendation) {
        self.baseline = Some(baseline);
    }

    pub(crate) fn has_clinical(&self) -> bool {
        self.clinical.is_some()
    }

    pub(crate) fn has_recommendation(&self) -> bool {
        self.recommendation.is_some()
    }

    pub(crate) fn build(self) -> PatientRecord {
        let (clinical, clinical_provenance) = self
            .clinical
            .unwrap_or((ClinicalText::default(), Provenance::None));

        PatientRecord {
            name: format!("Patient {}", self.id),
            id: self.id,
            clinical_information: clinical
                .information
                .unwrap_or_else(|| NO_CLINICAL_INFORMATION.to_string()),
            clinical_question: clinical
                .question
                .unwrap_or_else(|| NO_CLINICAL_QUESTION.to_string()),
            expert_recommendation: clinical.expert_recommendation,
            clinical_provenance,
            primary_recommendation: self.recommendation.unwrap_or_else(Recommendation::unavailable),
            baseline_recommendation: self.baseline,
            trials: self.trials,
        }
    }
}
