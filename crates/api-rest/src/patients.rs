use crate::{api_error, ApiError, AppState};
use api_shared::{ErrorRes, ListPatientsRes, RecommendationRes, ReloadRes};
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
};
use tumorboard_core::{PatientId, PatientRecord, RecordError};

fn parse_patient_id(raw: &str) -> Result<PatientId, ApiError> {
    PatientId::parse(raw).map_err(|e| api_error(RecordError::from(e)))
}

/// Resolve a patient, treating "no source knows this id" as not found.
async fn known_patient(state: &AppState, raw_id: &str) -> Result<PatientRecord, ApiError> {
    let id = parse_patient_id(raw_id)?;
    let record = state.catalog.resolve_patient(&id).await.map_err(api_error)?;
    if !record.has_source_data() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorRes::new(format!("Patient {id} not found"))),
        ));
    }
    Ok(record)
}

#[utoipa::path(
    get,
    path = "/api/patients",
    responses(
        (status = 200, description = "All resolved patients", body = ListPatientsRes)
    )
)]
/// List every known patient
///
/// Served from the cached snapshot, which is rebuilt once its TTL has passed. Patients the
/// workflow store failed for are listed from the batch files and named in `degradedPatients`.
#[axum::debug_handler]
pub(crate) async fn list_patients(State(state): State<AppState>) -> Json<ListPatientsRes> {
    let snapshot = state.catalog.resolve_all_patients().await;
    let patients: Vec<PatientRecord> = snapshot.records().values().cloned().collect();
    Json(ListPatientsRes {
        total_patients: patients.len(),
        patients,
        degraded_patients: snapshot.degraded().iter().cloned().collect(),
        snapshot_built_at: snapshot.built_at(),
    })
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Patient record", body = PatientRecord),
        (status = 400, description = "Invalid patient identifier", body = ErrorRes),
        (status = 404, description = "No source knows the patient", body = ErrorRes),
        (status = 503, description = "Workflow store unavailable", body = ErrorRes)
    )
)]
/// Fetch one normalised patient record
#[axum::debug_handler]
pub(crate) async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientRecord>, ApiError> {
    known_patient(&state, &id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}/recommendation",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Recommendations and matched trials", body = RecommendationRes),
        (status = 400, description = "Invalid patient identifier", body = ErrorRes),
        (status = 404, description = "No source knows the patient", body = ErrorRes),
        (status = 503, description = "Workflow store unavailable", body = ErrorRes)
    )
)]
/// Fetch only the recommendation part of a patient record
#[axum::debug_handler]
pub(crate) async fn get_recommendation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<RecommendationRes>, ApiError> {
    let record = known_patient(&state, &id).await?;
    Ok(Json(RecommendationRes::from(record)))
}

#[utoipa::path(
    post,
    path = "/api/reload",
    responses(
        (status = 200, description = "Snapshot rebuilt", body = ReloadRes)
    )
)]
/// Drop the cached snapshot and rebuild it from the sources
///
/// Used after the pipeline has written a new batch.
#[axum::debug_handler]
pub(crate) async fn reload(State(state): State<AppState>) -> Json<ReloadRes> {
    let snapshot = state.catalog.reload().await;
    tracing::info!(
        "reloaded {} patients from {}",
        snapshot.len(),
        state.cfg.patient_data_root().display()
    );
    Json(ReloadRes {
        message: "Patient data reloaded".into(),
        total_patients: snapshot.len(),
        degraded_patients: snapshot.degraded().iter().cloned().collect(),
        snapshot_built_at: snapshot.built_at(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{send, state};
    use axum::http::StatusCode;
    use std::fs;
    use tempfile::TempDir;

    fn write_batch(root: &std::path::Path) {
        fs::create_dir(root.join("patient_1")).unwrap();
        fs::write(
            root.join("patient_1/patient_1_complete_workflow.json"),
            r#"{
                "guidelines_result": {"patient_data": {
                    "clinical_information": "Line 1\\nLine 2",
                    "question_for_tumorboard": "Adjuvant therapy?"
                }},
                "recommendation_result": {"raw_response": "FOLFOX"},
                "trial_matching_result": {"relevant_trials": [{"nct_id": "NCT01234567"}]}
            }"#,
        )
        .unwrap();
        fs::write(
            root.join("patient_2_therapy_recommendation.json"),
            r#"{"raw_response": "legacy plan"}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_and_get_patient() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_batch(temp_dir.path());
        let state = state(temp_dir.path()).await;

        let (status, body) = send(&state, "GET", "/api/patients", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPatients"], 1);

        let (status, body) = send(&state, "GET", "/api/patients/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clinicalInformation"], "Line 1\nLine 2");
        assert_eq!(body["primaryRecommendation"]["provenance"], "STRUCTURED_FILE");
        assert_eq!(body["trials"][0]["nctId"], "NCT01234567");
    }

    #[tokio::test]
    async fn test_legacy_only_patient_is_found_by_id() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_batch(temp_dir.path());
        let state = state(temp_dir.path()).await;

        let (status, body) = send(&state, "GET", "/api/patients/2/recommendation", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["primaryRecommendation"]["text"], "legacy plan");
        assert_eq!(body["primaryRecommendation"]["provenance"], "LEGACY_FILE");
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_ids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;

        let (status, body) = send(&state, "GET", "/api/patients/404", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("404"));

        let (status, _) = send(&state, "GET", "/api/patients/.hidden", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;

        let (_, body) = send(&state, "GET", "/api/patients", None).await;
        assert_eq!(body["totalPatients"], 0);

        write_batch(temp_dir.path());
        let (status, body) = send(&state, "POST", "/api/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPatients"], 1);
    }
}
