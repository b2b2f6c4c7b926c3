use super::{data, data_with_message, list, DataResponse, Json, ListResponse, Path, Query};
use crate::{
    auth::ExtractAuth,
    error::AppResult,
    models::{FeedbackFilter, NewFeedback, Triage},
    service::feedback,
    AppState,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Deserialize)]
struct RespondRequest {
    message: String,
}

#[derive(Deserialize)]
struct RateRequest {
    rating: u8,
}

async fn list_all(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Query(filter): Query<FeedbackFilter>,
) -> AppResult<Json<ListResponse<Value>>> {
    Ok(list(feedback::list_all_feedback(&state.store, &principal, filter).await?))
}

async fn list_mine(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
) -> AppResult<Json<ListResponse<Value>>> {
    Ok(list(feedback::list_my_feedback(&state.store, &principal).await?))
}

async fn create(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Json(req): Json<NewFeedback>,
) -> AppResult<(StatusCode, Json<DataResponse<Value>>)> {
    let ticket = feedback::create_feedback(&state.store, &principal, req).await?;
    Ok((
        StatusCode::CREATED,
        data_with_message("feedback submitted successfully", ticket),
    ))
}

async fn get_one(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<Value>>> {
    Ok(data(feedback::get_feedback(&state.store, &principal, id).await?))
}

async fn triage(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<Triage>,
) -> AppResult<Json<DataResponse<Value>>> {
    Ok(data(feedback::update_feedback_status(&state.store, &principal, id, req).await?))
}

async fn respond(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> AppResult<Json<DataResponse<Value>>> {
    let ticket = feedback::respond_to_feedback(&state.store, &principal, id, req.message).await?;
    Ok(data_with_message("response added successfully", ticket))
}

async fn rate(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> AppResult<Json<DataResponse<Value>>> {
    Ok(data(feedback::rate_feedback(&state.store, &principal, id, req.rating).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/my", get(list_mine))
        .route("/:id", get(get_one).put(triage))
        .route("/:id/respond", post(respond))
        .route("/:id/rate", post(rate))
}
