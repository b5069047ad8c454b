//! Canonical schema of the workflow document written by the recommendation pipeline.
//!
//! The same document shape is read from MongoDB and from `*_complete_workflow.json` files.
//! Each field group is read on its own: a container that does not match the schema is logged
//! and treated as absent, while the other groups of the same document are still used. Trials
//! are read one by one, so a single bad entry only drops that trial.
//!
//! Key aliases produced by older pipeline versions are not recognised here; run the alias
//! migration (`crate::migration`) once over old data instead.

use crate::record::{Publication, TrialReference};
use crate::sources::{ClinicalFragment, RecommendationFragment, SourceFragment};
use bson::{Bson, Document};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Search channels under `online_search_results`: key, list key, display label.
const SEARCH_CHANNELS: [(&str, &str, &str); 3] = [
    ("pubmed", "publications", "PubMed"),
    ("onclive", "articles", "OncLive"),
    ("congress_abstracts", "abstracts", "Congress Abstracts"),
];

#[derive(Debug, Default, Deserialize)]
struct PatientData {
    #[serde(default)]
    clinical_information: Option<String>,
    #[serde(default)]
    question_for_tumorboard: Option<String>,
    #[serde(default)]
    expert_recommendation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationResult {
    #[serde(default)]
    raw_response: Option<String>,
}

/// One search result; the channels disagree on which of these fields they fill.
#[derive(Debug, Default, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl SearchHit {
    fn into_publication(self, source: &str) -> Publication {
        let first = |a: Option<String>, b: Option<String>| {
            a.filter(|s| !s.is_empty()).or(b.filter(|s| !s.is_empty()))
        };

        Publication {
            title: first(self.title, self.abstract_text).unwrap_or_else(|| "Publication".into()),
            url: first(self.url, self.link).unwrap_or_default(),
            source: source.to_string(),
        }
    }
}

/// Deserialize one field group, logging and dropping it when it does not fit the schema.
fn read_group<'a, T: Deserialize<'a>>(value: &'a Value, group: &str, location: &str) -> Option<T> {
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("ignoring malformed {} in {}: {}", group, location, e);
            None
        }
    }
}

/// Flatten one `relevant_trials` entry, or `None` when it carries no usable NCT number.
fn trial_reference(trial: &Value, location: &str) -> Option<TrialReference> {
    let nct_id = match trial.get("nct_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => return None,
        Some(other) => {
            tracing::warn!("ignoring trial with non-text nct_id {} in {}", other, location);
            return None;
        }
    };

    let url = trial
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    let mut publications = Vec::new();
    if let Some(online) = trial
        .get("publication_analysis")
        .and_then(|p| p.get("online_search_results"))
    {
        for (channel, list, label) in SEARCH_CHANNELS {
            let hits = online
                .get(channel)
                .and_then(|c| c.get(list))
                .and_then(Value::as_array);
            for hit in hits.into_iter().flatten() {
                if let Some(hit) = read_group::<SearchHit>(hit, "search hit", location) {
                    publications.push(hit.into_publication(label));
                }
            }
        }
    }

    Some(TrialReference {
        nct_id,
        url,
        publications,
    })
}

/// A workflow document kept as untyped JSON until its groups are read.
#[derive(Debug, Clone, Default)]
pub struct WorkflowDocument {
    root: Map<String, Value>,
}

impl WorkflowDocument {
    /// Parse a workflow document from JSON text.
    ///
    /// # Errors
    ///
    /// Fails only when the text is not JSON or its top level is not an object.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            root: serde_json::from_str(raw)?,
        })
    }

    /// Wrap a document fetched from MongoDB.
    pub fn from_bson(document: Document) -> Self {
        match Bson::Document(document).into_relaxed_extjson() {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Top-level container `key`, treating `null` as absent.
    fn container(&self, key: &str) -> Option<&Value> {
        self.root.get(key).filter(|v| !v.is_null())
    }

    /// Split the document into the field groups the resolver fills independently.
    ///
    /// `location` names the document in logs. Trials belong to the recommendation group: they
    /// are only taken from a document whose recommendation container is usable.
    pub fn into_fragment(self, location: &str) -> SourceFragment {
        let clinical = self
            .container("guidelines_result")
            .and_then(|g| g.get("patient_data"))
            .filter(|pd| !pd.is_null())
            .and_then(|pd| read_group::<PatientData>(pd, "patient_data", location))
            .map(|pd| ClinicalFragment {
                information: pd.clinical_information,
                question: pd.question_for_tumorboard,
                expert_recommendation: pd.expert_recommendation,
            });

        let recommendation = self
            .container("recommendation_result")
            .and_then(|r| read_group::<RecommendationResult>(r, "recommendation_result", location))
            .map(|r| RecommendationFragment {
                text: r.raw_response,
                trials: self.trials(location),
            });

        SourceFragment {
            clinical,
            recommendation,
        }
    }

    fn trials(&self, location: &str) -> Vec<TrialReference> {
        let Some(relevant) = self
            .container("trial_matching_result")
            .and_then(|t| t.get("relevant_trials"))
            .filter(|r| !r.is_null())
        else {
            return Vec::new();
        };

        match relevant.as_array() {
            Some(trials) => trials
                .iter()
                .filter_map(|t| trial_reference(t, location))
                .collect(),
            None => {
                tracing::warn!("ignoring non-list relevant_trials in {}", location);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const FULL: &str = r#"{
        "patient_id": 12,
        "guidelines_result": {
            "patient_data": {
                "clinical_information": "65yo, NET G2",
                "question_for_tumorboard": "PRRT?",
                "expert_recommendation": "Lu-177",
                "extra": true
            }
        },
        "recommendation_result": { "raw_response": "Start PRRT" },
        "trial_matching_result": {
            "relevant_trials": [
                {
                    "nct_id": "NCT01578239",
                    "url": "https://clinicaltrials.gov/study/NCT01578239",
                    "publication_analysis": {
                        "online_search_results": {
                            "pubmed": { "publications": [ { "title": "NETTER-1", "url": "https://pubmed/1" } ] },
                            "onclive": { "articles": [ { "link": "https://onclive/2" } ] },
                            "congress_abstracts": { "abstracts": [ { "abstract_text": "ASCO 2020" } ] }
                        }
                    }
                },
                { "url": "https://no-nct" }
            ]
        }
    }"#;

    fn parse(raw: &str) -> SourceFragment {
        WorkflowDocument::from_json(raw)
            .expect("document should parse")
            .into_fragment("test")
    }

    #[test]
    fn test_full_document_splits_into_groups() {
        let fragment = parse(FULL);

        let clinical = fragment.clinical.expect("clinical group present");
        assert_eq!(clinical.information.as_deref(), Some("65yo, NET G2"));
        assert_eq!(clinical.question.as_deref(), Some("PRRT?"));
        assert_eq!(clinical.expert_recommendation.as_deref(), Some("Lu-177"));

        let rec = fragment.recommendation.expect("recommendation group present");
        assert_eq!(rec.text.as_deref(), Some("Start PRRT"));
        assert_eq!(rec.trials.len(), 1, "trial without NCT id is dropped");

        let trial = &rec.trials[0];
        assert_eq!(trial.nct_id, "NCT01578239");
        let pubs: Vec<(&str, &str, &str)> = trial
            .publications
            .iter()
            .map(|p| (p.source.as_str(), p.title.as_str(), p.url.as_str()))
            .collect();
        assert_eq!(
            pubs,
            vec![
                ("PubMed", "NETTER-1", "https://pubmed/1"),
                ("OncLive", "Publication", "https://onclive/2"),
                ("Congress Abstracts", "ASCO 2020", ""),
            ]
        );
    }

    #[test]
    fn test_missing_containers_yield_no_groups() {
        let fragment = parse(r#"{"guidelines_result": {}, "recommendation_result": null}"#);
        assert!(fragment.clinical.is_none());
        assert!(fragment.recommendation.is_none());
    }

    #[test]
    fn test_trials_ignored_without_recommendation() {
        let fragment =
            parse(r#"{"trial_matching_result": {"relevant_trials": [{"nct_id": "NCT00000001"}]}}"#);
        assert!(fragment.recommendation.is_none());
    }

    #[test]
    fn test_alias_keys_are_not_read() {
        let fragment = parse(r#"{"guidelines_result": {"patient_data": {"ClinicalInformation": "old"}}}"#);
        let clinical = fragment.clinical.expect("container present");
        assert_eq!(clinical.information, None);
    }

    #[test]
    fn test_numeric_nct_id_drops_only_that_trial() {
        let fragment = parse(
            r#"{
                "guidelines_result": {"patient_data": {"clinical_information": "info"}},
                "recommendation_result": {"raw_response": "plan"},
                "trial_matching_result": {"relevant_trials": [
                    {"nct_id": 1578239},
                    {"nct_id": "NCT00000002"}
                ]}
            }"#,
        );

        assert_eq!(
            fragment.clinical.expect("clinical kept").information.as_deref(),
            Some("info")
        );
        let rec = fragment.recommendation.expect("recommendation kept");
        assert_eq!(rec.text.as_deref(), Some("plan"));
        let ids: Vec<&str> = rec.trials.iter().map(|t| t.nct_id.as_str()).collect();
        assert_eq!(ids, vec!["NCT00000002"]);
    }

    #[test]
    fn test_non_object_publication_analysis_keeps_trial() {
        let fragment = parse(
            r#"{
                "recommendation_result": {"raw_response": "plan"},
                "trial_matching_result": {"relevant_trials": [
                    {"nct_id": "NCT00000003", "publication_analysis": "not analysed"},
                    {"nct_id": "NCT00000004", "publication_analysis": {"online_search_results": {
                        "pubmed": {"publications": [7, {"title": "kept"}]}
                    }}}
                ]}
            }"#,
        );

        let rec = fragment.recommendation.expect("recommendation kept");
        assert_eq!(rec.trials.len(), 2);
        assert!(rec.trials[0].publications.is_empty());
        let titles: Vec<&str> = rec.trials[1].publications.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["kept"]);
    }

    #[test]
    fn test_malformed_group_does_not_hide_the_other() {
        let bad_clinical = parse(
            r#"{"guidelines_result": {"patient_data": {"clinical_information": 5}},
                "recommendation_result": {"raw_response": "plan"}}"#,
        );
        assert!(bad_clinical.clinical.is_none());
        assert!(bad_clinical.recommendation.is_some());

        let bad_recommendation = parse(
            r#"{"guidelines_result": {"patient_data": {"clinical_information": "info"}},
                "recommendation_result": {"raw_response": ["a", "b"]},
                "trial_matching_result": "pending"}"#,
        );
        assert!(bad_recommendation.clinical.is_some());
        assert!(bad_recommendation.recommendation.is_none());

        let bad_trials = parse(
            r#"{"recommendation_result": {"raw_response": "plan"},
                "trial_matching_result": {"relevant_trials": {"nct_id": "NCT1"}}}"#,
        );
        assert!(bad_trials.recommendation.expect("kept").trials.is_empty());
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        assert!(WorkflowDocument::from_json("[1, 2]").is_err());
        assert!(WorkflowDocument::from_json("{ broken").is_err());
    }

    #[test]
    fn test_bson_document_is_read_like_json() {
        let fragment = WorkflowDocument::from_bson(doc! {
            "patient_id": 3_i64,
            "guidelines_result": { "patient_data": { "clinical_information": "from store" } },
            "recommendation_result": { "raw_response": "store plan" },
        })
        .into_fragment("workflows/3");

        assert_eq!(
            fragment.clinical.expect("clinical").information.as_deref(),
            Some("from store")
        );
        assert_eq!(
            fragment.recommendation.expect("rec").text.as_deref(),
            Some("store plan")
        );
    }
}
