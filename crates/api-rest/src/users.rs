use crate::{api_error, ApiError, AppState};
use api_shared::{
    ErrorRes, MarkCompletedReq, MarkCompletedRes, ParticipantRes, ParticipantsRes,
    RegisterParticipantReq,
};
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
};
use tumorboard_core::evaluations::Participant;
use tumorboard_core::RecordError;

#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterParticipantReq,
    responses(
        (status = 201, description = "Participant registered", body = ParticipantRes),
        (status = 400, description = "Missing or invalid fields", body = ErrorRes),
        (status = 409, description = "User id already taken", body = ErrorRes)
    )
)]
/// Register a study participant
#[axum::debug_handler]
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterParticipantReq>,
) -> Result<(StatusCode, Json<ParticipantRes>), ApiError> {
    let years_experience = req.years_experience.ok_or_else(|| {
        api_error(RecordError::InvalidInput(
            "Missing required fields: userId, profession, yearsExperience".into(),
        ))
    })?;

    let user = state
        .evaluations
        .register_participant(&req.user_id, &req.profession, years_experience)
        .await
        .map_err(api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ParticipantRes {
            message: "User registered successfully".into(),
            user,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All participants, newest first", body = ParticipantsRes)
    )
)]
/// List all participants
#[axum::debug_handler]
pub(crate) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ParticipantsRes>, ApiError> {
    let users = state.evaluations.participants().await.map_err(api_error)?;
    Ok(Json(ParticipantsRes {
        total_users: users.len(),
        users,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Participant identifier")),
    responses(
        (status = 200, description = "Participant", body = Participant),
        (status = 404, description = "Participant not found", body = ErrorRes)
    )
)]
/// Fetch one participant with their completed patients
#[axum::debug_handler]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Participant>, ApiError> {
    state
        .evaluations
        .participant(&id)
        .await
        .map(Json)
        .map_err(api_error)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/completed",
    params(("id" = String, Path, description = "Participant identifier")),
    request_body = MarkCompletedReq,
    responses(
        (status = 200, description = "Completed list updated", body = MarkCompletedRes),
        (status = 400, description = "Missing patient id", body = ErrorRes),
        (status = 404, description = "Participant not found", body = ErrorRes)
    )
)]
/// Mark a patient case as completed by the participant
#[axum::debug_handler]
pub(crate) async fn mark_completed(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<MarkCompletedReq>,
) -> Result<Json<MarkCompletedRes>, ApiError> {
    let completed_evaluations = state
        .evaluations
        .mark_completed(&id, &req.patient_id)
        .await
        .map_err(api_error)?;

    Ok(Json(MarkCompletedRes {
        message: "Completed evaluations updated".into(),
        completed_evaluations,
    }))
}
