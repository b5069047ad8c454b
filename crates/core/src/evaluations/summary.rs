//! Aggregates over submitted evaluations.
//!
//! All reports are computed in process from the evaluation list, so both stores share them.

use super::{Evaluation, Willingness};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tumorboard_types::PatientId;

const UNKNOWN_PROFESSION: &str = "Unknown";

/// Experience bucket used when grouping evaluators.
pub fn experience_range(years: u32) -> &'static str {
    match years {
        0..=4 => "0-4 years",
        5..=9 => "5-9 years",
        10..=19 => "10-19 years",
        _ => "20+ years",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average_rating(evaluations: &[&Evaluation]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    let total: u32 = evaluations.iter().map(|e| u32::from(e.overall_rating)).sum();
    round2(f64::from(total) / evaluations.len() as f64)
}

fn profession_of(evaluation: &Evaluation) -> &str {
    let profession = evaluation.user_data.profession.trim();
    if profession.is_empty() {
        UNKNOWN_PROFESSION
    } else {
        profession
    }
}

/// Push `value` unless already present, keeping first-seen order.
fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WillingnessDistribution {
    pub yes: usize,
    pub maybe: usize,
    pub no: usize,
}

impl WillingnessDistribution {
    fn add(&mut self, willingness: Willingness) {
        match willingness {
            Willingness::Yes => self.yes += 1,
            Willingness::Maybe => self.maybe += 1,
            Willingness::No => self.no += 1,
        }
    }

    fn of<'a>(evaluations: impl IntoIterator<Item = &'a Evaluation>) -> Self {
        let mut distribution = Self::default();
        for evaluation in evaluations {
            distribution.add(evaluation.implementation_willingness);
        }
        distribution
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_evaluations: usize,
    /// Mean rating rounded to two decimals, `0` without evaluations.
    pub average_rating: f64,
    pub implementation_distribution: WillingnessDistribution,
    pub professions: Vec<String>,
    pub experience_ranges: Vec<String>,
}

/// Everything known about the evaluations of one patient case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PatientReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub patient_id: PatientId,
    pub summary: ReportSummary,
    pub organization_by_profession: BTreeMap<String, Vec<Evaluation>>,
    pub organization_by_experience: BTreeMap<String, Vec<Evaluation>>,
    pub all_evaluations: Vec<Evaluation>,
    pub total_evaluations: usize,
}

impl PatientReport {
    pub(crate) fn build(patient_id: PatientId, evaluations: Vec<Evaluation>) -> Self {
        let mut by_profession: BTreeMap<String, Vec<Evaluation>> = BTreeMap::new();
        let mut by_experience: BTreeMap<String, Vec<Evaluation>> = BTreeMap::new();
        let mut professions = Vec::new();
        let mut experience_ranges = Vec::new();

        for evaluation in &evaluations {
            let profession = profession_of(evaluation);
            let range = experience_range(evaluation.user_data.years_experience);

            by_profession
                .entry(profession.to_string())
                .or_default()
                .push(evaluation.clone());
            by_experience
                .entry(range.to_string())
                .or_default()
                .push(evaluation.clone());
            push_unique(&mut professions, profession);
            push_unique(&mut experience_ranges, range);
        }

        let refs: Vec<&Evaluation> = evaluations.iter().collect();
        let summary = ReportSummary {
            total_evaluations: evaluations.len(),
            average_rating: average_rating(&refs),
            implementation_distribution: WillingnessDistribution::of(&evaluations),
            professions,
            experience_ranges,
        };

        Self {
            patient_id,
            summary,
            organization_by_profession: by_profession,
            organization_by_experience: by_experience,
            total_evaluations: evaluations.len(),
            all_evaluations: evaluations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvaluationPeriod {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub patient_id: PatientId,
    pub total_evaluations: usize,
    pub average_rating: f64,
    pub professions: Vec<String>,
    pub implementation_distribution: WillingnessDistribution,
    pub evaluation_period: EvaluationPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PatientSummaries {
    pub total_unique_patients: usize,
    pub total_evaluations_across_all_patients: usize,
    /// Ordered by patient id.
    pub patient_summaries: Vec<PatientSummary>,
}

impl PatientSummaries {
    pub(crate) fn build(evaluations: &[Evaluation]) -> Self {
        let mut by_patient: BTreeMap<&PatientId, Vec<&Evaluation>> = BTreeMap::new();
        for evaluation in evaluations {
            by_patient
                .entry(&evaluation.patient_id)
                .or_default()
                .push(evaluation);
        }

        let patient_summaries: Vec<PatientSummary> = by_patient
            .into_iter()
            .filter_map(|(patient_id, group)| {
                let first = group.iter().map(|e| e.created_at).min()?;
                let last = group.iter().map(|e| e.created_at).max()?;
                let professions: BTreeSet<&str> = group.iter().map(|e| profession_of(*e)).collect();
                Some(PatientSummary {
                    patient_id: patient_id.clone(),
                    total_evaluations: group.len(),
                    average_rating: average_rating(&group),
                    professions: professions.into_iter().map(str::to_string).collect(),
                    implementation_distribution: WillingnessDistribution::of(group.iter().copied()),
                    evaluation_period: EvaluationPeriod { first, last },
                })
            })
            .collect();

        Self {
            total_unique_patients: patient_summaries.len(),
            total_evaluations_across_all_patients: evaluations.len(),
            patient_summaries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RatingStatistics {
    pub average_rating: f64,
    pub min_rating: u8,
    pub max_rating: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProfessionStatistics {
    pub profession: String,
    pub count: usize,
    pub average_rating: f64,
}

/// Study-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStatistics {
    pub total_evaluations: usize,
    pub unique_users: usize,
    pub unique_patients: usize,
    /// Absent when nothing has been evaluated yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_statistics: Option<RatingStatistics>,
    pub implementation_willingness: WillingnessDistribution,
    pub profession_distribution: Vec<ProfessionStatistics>,
}

impl EvaluationStatistics {
    pub(crate) fn build(evaluations: &[Evaluation]) -> Self {
        let refs: Vec<&Evaluation> = evaluations.iter().collect();

        let rating_statistics = match (
            evaluations.iter().map(|e| e.overall_rating).min(),
            evaluations.iter().map(|e| e.overall_rating).max(),
        ) {
            (Some(min_rating), Some(max_rating)) => Some(RatingStatistics {
                average_rating: average_rating(&refs),
                min_rating,
                max_rating,
            }),
            _ => None,
        };

        let mut by_profession: BTreeMap<&str, Vec<&Evaluation>> = BTreeMap::new();
        for evaluation in evaluations {
            by_profession
                .entry(profession_of(evaluation))
                .or_default()
                .push(evaluation);
        }

        Self {
            total_evaluations: evaluations.len(),
            unique_users: evaluations
                .iter()
                .map(|e| &e.user_id)
                .collect::<BTreeSet<_>>()
                .len(),
            unique_patients: evaluations
                .iter()
                .map(|e| &e.patient_id)
                .collect::<BTreeSet<_>>()
                .len(),
            rating_statistics,
            implementation_willingness: WillingnessDistribution::of(evaluations),
            profession_distribution: by_profession
                .into_iter()
                .map(|(profession, group)| ProfessionStatistics {
                    profession: profession.to_string(),
                    count: group.len(),
                    average_rating: average_rating(&group),
                })
                .collect(),
        }
    }
}
