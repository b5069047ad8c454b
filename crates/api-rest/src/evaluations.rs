use crate::{api_error, ApiError, AppState};
use api_shared::{ErrorRes, EvaluationListParams, EvaluationsRes, SubmitEvaluationRes};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderName, StatusCode},
    response::Json,
};
use tumorboard_core::evaluations::{
    EvaluationExport, EvaluationPage, EvaluationStatistics, NewEvaluation, PatientReport,
    PatientSummaries,
};
use tumorboard_core::{PatientId, RecordError};

#[utoipa::path(
    post,
    path = "/api/evaluations",
    request_body = NewEvaluation,
    responses(
        (status = 201, description = "Evaluation stored", body = SubmitEvaluationRes),
        (status = 400, description = "Invalid rating, willingness or identifiers", body = ErrorRes),
        (status = 404, description = "Participant not registered", body = ErrorRes)
    )
)]
/// Submit a participant's evaluation of a recommendation
///
/// The patient is added to the participant's completed list as a side effect.
#[axum::debug_handler]
pub(crate) async fn submit(
    State(state): State<AppState>,
    Json(req): Json<NewEvaluation>,
) -> Result<(StatusCode, Json<SubmitEvaluationRes>), ApiError> {
    let evaluation = state
        .evaluations
        .submit_evaluation(req)
        .await
        .map_err(api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitEvaluationRes {
            message: "Evaluation submitted successfully".into(),
            evaluation,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/evaluations",
    params(EvaluationListParams),
    responses(
        (status = 200, description = "One page of evaluations, newest first", body = EvaluationPage),
        (status = 400, description = "Invalid limit or identifiers", body = ErrorRes)
    )
)]
/// Paginated evaluation listing, optionally filtered by patient and participant
#[axum::debug_handler]
pub(crate) async fn list(
    State(state): State<AppState>,
    Query(params): Query<EvaluationListParams>,
) -> Result<Json<EvaluationPage>, ApiError> {
    state
        .evaluations
        .list_evaluations(params.into())
        .await
        .map(Json)
        .map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/api/evaluations/patient/{id}/export",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Evaluations of the case as a JSON attachment, oldest first", body = EvaluationExport),
        (status = 400, description = "Invalid patient identifier", body = ErrorRes),
        (status = 404, description = "No evaluations for this patient", body = ErrorRes)
    )
)]
/// Download every evaluation of one patient case
#[axum::debug_handler]
pub(crate) async fn export(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<([(HeaderName, String); 1], Json<EvaluationExport>), ApiError> {
    let patient_id = PatientId::parse(&id).map_err(|e| api_error(RecordError::from(e)))?;
    let export = state
        .evaluations
        .export_patient(&patient_id)
        .await
        .map_err(api_error)?;

    let disposition = format!("attachment; filename=\"{}\"", export.file_name());
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

#[utoipa::path(
    get,
    path = "/api/evaluations/user/{id}",
    params(("id" = String, Path, description = "Participant identifier")),
    responses(
        (status = 200, description = "Evaluations by the participant, newest first", body = EvaluationsRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn for_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<EvaluationsRes>, ApiError> {
    let evaluations = state
        .evaluations
        .evaluations_for_participant(&id)
        .await
        .map_err(api_error)?;
    Ok(Json(EvaluationsRes::from(evaluations)))
}

#[utoipa::path(
    get,
    path = "/api/evaluations/patient/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Evaluations of the case grouped by profession and experience", body = PatientReport),
        (status = 400, description = "Invalid patient identifier", body = ErrorRes)
    )
)]
/// Evaluations of one patient case with summary statistics
#[axum::debug_handler]
pub(crate) async fn for_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientReport>, ApiError> {
    let patient_id = PatientId::parse(&id).map_err(|e| api_error(RecordError::from(e)))?;
    state
        .evaluations
        .patient_report(&patient_id)
        .await
        .map(Json)
        .map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/api/evaluations/patients/summary",
    responses(
        (status = 200, description = "Per-patient evaluation summaries", body = PatientSummaries)
    )
)]
#[axum::debug_handler]
pub(crate) async fn patient_summaries(
    State(state): State<AppState>,
) -> Result<Json<PatientSummaries>, ApiError> {
    state
        .evaluations
        .patient_summaries()
        .await
        .map(Json)
        .map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/api/evaluations/stats/summary",
    responses(
        (status = 200, description = "Study-wide statistics", body = EvaluationStatistics)
    )
)]
/// Study-wide totals, rating range and distributions
#[axum::debug_handler]
pub(crate) async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<EvaluationStatistics>, ApiError> {
    state
        .evaluations
        .statistics()
        .await
        .map(Json)
        .map_err(api_error)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{send, state};
    use crate::{router, AppState};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use serde_json::json;
    use tempfile::TempDir;

    async fn register(state: &AppState, user: &str, profession: &str, years: i64) {
        let (status, _) = send(
            state,
            "POST",
            "/api/users/register",
            Some(json!({"userId": user, "profession": profession, "yearsExperience": years})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn submit(state: &AppState, user: &str, patient: &str, rating: i64, w: &str) -> (StatusCode, serde_json::Value) {
        send(
            state,
            "POST",
            "/api/evaluations",
            Some(json!({
                "userId": user,
                "patientId": patient,
                "overallRating": rating,
                "implementationWillingness": w
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_submit_and_report() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;
        register(&state, "dr-a", "Oncologist", 12).await;
        register(&state, "dr-b", "Surgeon", 3).await;

        let (status, body) = submit(&state, "dr-a", "1", 8, "yes").await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["evaluation"]["evaluationId"]
            .as_str()
            .unwrap()
            .starts_with("EVAL_"));
        submit(&state, "dr-b", "1", 5, "no").await;
        submit(&state, "dr-b", "2", 9, "maybe").await;

        let (status, report) = send(&state, "GET", "/api/evaluations/patient/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["totalEvaluations"], 2);
        assert_eq!(report["summary"]["averageRating"], 6.5);
        assert_eq!(report["summary"]["implementationDistribution"], json!({"yes": 1, "maybe": 0, "no": 1}));
        assert_eq!(report["organizationByExperience"]["0-4 years"].as_array().unwrap().len(), 1);

        let (_, by_user) = send(&state, "GET", "/api/evaluations/user/dr-b", None).await;
        assert_eq!(by_user["totalEvaluations"], 2);

        let (_, summaries) = send(&state, "GET", "/api/evaluations/patients/summary", None).await;
        assert_eq!(summaries["totalUniquePatients"], 2);
        assert_eq!(summaries["patientSummaries"][0]["patientId"], "1");

        let (_, stats) = send(&state, "GET", "/api/evaluations/stats/summary", None).await;
        assert_eq!(stats["uniqueUsers"], 2);
        assert_eq!(stats["ratingStatistics"]["maxRating"], 9);

        let (_, user) = send(&state, "GET", "/api/users/dr-b", None).await;
        assert_eq!(user["completedEvaluations"], json!(["1", "2"]));
    }

    #[tokio::test]
    async fn test_list_is_paginated_and_filtered() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;
        register(&state, "dr-a", "Oncologist", 12).await;
        register(&state, "dr-b", "Surgeon", 3).await;
        submit(&state, "dr-a", "1", 8, "yes").await;
        submit(&state, "dr-a", "2", 6, "maybe").await;
        submit(&state, "dr-b", "1", 5, "no").await;

        let (status, body) = send(&state, "GET", "/api/evaluations?limit=2&skip=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalEvaluations"], 3);
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["evaluations"].as_array().unwrap().len(), 1);

        let (_, body) = send(&state, "GET", "/api/evaluations?patientId=1&userId=dr-b", None).await;
        assert_eq!(body["totalEvaluations"], 1);
        assert_eq!(body["evaluations"][0]["userId"], "dr-b");

        let (_, body) = send(&state, "GET", "/api/evaluations", None).await;
        assert_eq!(body["totalEvaluations"], 3);
        assert_eq!(body["currentPage"], 1);

        let (status, _) = send(&state, "GET", "/api/evaluations?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_is_an_attachment() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;
        register(&state, "dr-a", "Oncologist", 12).await;

        let (status, body) = send(&state, "GET", "/api/evaluations/patient/5/export", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("No evaluations"));

        submit(&state, "dr-a", "5", 9, "yes").await;

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/evaluations/patient/5/export")
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"patient_5_evaluations.json\""
        );

        let (_, body) = send(&state, "GET", "/api/evaluations/patient/5/export", None).await;
        assert_eq!(body["patientId"], "5");
        assert_eq!(body["totalEvaluations"], 1);
        assert_eq!(body["evaluations"][0]["evaluatorId"], "dr-a");
        assert_eq!(body["evaluations"][0]["yearsExperience"], 12);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = state(temp_dir.path()).await;
        register(&state, "dr-a", "Oncologist", 12).await;

        let (status, _) = submit(&state, "dr-a", "1", 11, "yes").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = submit(&state, "dr-a", "1", 5, "sure").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("yes, maybe, no"));
        let (status, _) = submit(&state, "nobody", "1", 5, "yes").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
