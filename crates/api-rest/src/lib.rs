//! # API REST
//!
//! REST API implementation for the tumour board evaluation platform.
//!
//! Handles:
//! - HTTP endpoints with axum, all under `/api`
//! - OpenAPI documentation served as JSON at `/api-docs/openapi.json`
//! - REST-specific concerns (JSON serialisation, status codes, CORS)
//!
//! Uses `api-shared` for request and response bodies and `tumorboard-core` for everything else.

#![warn(rust_2018_idioms)]

mod evaluations;
mod patients;
mod users;

use api_shared::{ErrorRes, HealthRes, HealthService};
use axum::{http::StatusCode, response::Json, routing::get, routing::post, routing::put, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tumorboard_core::{CoreConfig, EvaluationService, PatientCatalog, RecordError};
use utoipa::OpenApi;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers: the patient
/// catalogue, the evaluation service and the startup configuration.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub catalog: PatientCatalog,
    pub evaluations: EvaluationService,
}

/// Error half of every handler result.
pub(crate) type ApiError = (StatusCode, Json<ErrorRes>);

/// Map a core error to an HTTP status and JSON body.
///
/// Validation failures are reported verbatim; storage failures are logged and hidden.
pub(crate) fn api_error(e: RecordError) -> ApiError {
    let status = match &e {
        RecordError::InvalidInput(_)
        | RecordError::InvalidIdentifier(_)
        | RecordError::InvalidRating(_)
        | RecordError::InvalidWillingness(_) => StatusCode::BAD_REQUEST,
        RecordError::ParticipantNotFound(_) | RecordError::NoEvaluations(_) => {
            StatusCode::NOT_FOUND
        }
        RecordError::ParticipantExists(_) => StatusCode::CONFLICT,
        RecordError::SourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("request failed: {}", e);
    }

    let message = match status {
        StatusCode::INTERNAL_SERVER_ERROR => "Internal error".to_string(),
        StatusCode::SERVICE_UNAVAILABLE => "Workflow store unavailable".to_string(),
        _ => e.to_string(),
    };
    (status, Json(ErrorRes::new(message)))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        patients::list_patients,
        patients::get_patient,
        patients::get_recommendation,
        patients::reload,
        users::register,
        users::list_users,
        users::get_user,
        users::mark_completed,
        evaluations::submit,
        evaluations::list,
        evaluations::export,
        evaluations::for_user,
        evaluations::for_patient,
        evaluations::patient_summaries,
        evaluations::statistics,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        api_shared::ListPatientsRes,
        api_shared::RecommendationRes,
        api_shared::ReloadRes,
        api_shared::RegisterParticipantReq,
        api_shared::ParticipantRes,
        api_shared::ParticipantsRes,
        api_shared::MarkCompletedReq,
        api_shared::MarkCompletedRes,
        api_shared::SubmitEvaluationRes,
        api_shared::EvaluationsRes,
        tumorboard_core::PatientRecord,
        tumorboard_core::Provenance,
        tumorboard_core::record::Recommendation,
        tumorboard_core::record::BaselineRecommendation,
        tumorboard_core::record::TrialReference,
        tumorboard_core::record::Publication,
        tumorboard_core::evaluations::Participant,
        tumorboard_core::evaluations::Evaluation,
        tumorboard_core::evaluations::EvaluatorProfile,
        tumorboard_core::evaluations::NewEvaluation,
        tumorboard_core::evaluations::Willingness,
        tumorboard_core::evaluations::PatientReport,
        tumorboard_core::evaluations::ReportSummary,
        tumorboard_core::evaluations::WillingnessDistribution,
        tumorboard_core::evaluations::PatientSummaries,
        tumorboard_core::evaluations::PatientSummary,
        tumorboard_core::evaluations::EvaluationPeriod,
        tumorboard_core::evaluations::EvaluationStatistics,
        tumorboard_core::evaluations::RatingStatistics,
        tumorboard_core::evaluations::ProfessionStatistics,
        tumorboard_core::evaluations::EvaluationPage,
        tumorboard_core::evaluations::EvaluationExport,
        tumorboard_core::evaluations::ExportedEvaluation,
    ))
)]
pub struct ApiDoc;

/// Build the complete REST router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/patients", get(patients::list_patients))
        .route("/patients/:id", get(patients::get_patient))
        .route("/patients/:id/recommendation", get(patients::get_recommendation))
        .route("/reload", post(patients::reload))
        .route("/users", get(users::list_users))
        .route("/users/register", post(users::register))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/completed", put(users::mark_completed))
        .route("/evaluations", get(evaluations::list).post(evaluations::submit))
        .route("/evaluations/user/:id", get(evaluations::for_user))
        .route("/evaluations/patient/:id", get(evaluations::for_patient))
        .route("/evaluations/patient/:id/export", get(evaluations::export))
        .route(
            "/evaluations/patients/summary",
            get(evaluations::patient_summaries),
        )
        .route("/evaluations/stats/summary", get(evaluations::statistics));

    Router::new()
        .nest("/api", api)
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler(state = AppState)]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}
