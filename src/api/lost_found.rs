use super::{
    data, data_with_message, list, message, DataResponse, Form, Json, ListResponse, MessageResponse,
    Multipart, Path, Query,
};
use crate::{
    auth::ExtractAuth,
    blob::UploadKind,
    error::AppResult,
    models::{ClaimStatus, ItemFilter, ItemPatch, LostFoundItem, NewItem, Populated, MAX_ITEM_IMAGES},
    service::lost_found,
    AppState,
};
use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct ClaimRequest {
    message: String,
}

#[derive(Deserialize)]
struct ClaimDecision {
    status: ClaimStatus,
}

async fn list_items(
    Extension(state): Extension<AppState>,
    Query(filter): Query<ItemFilter>,
) -> AppResult<Json<ListResponse<LostFoundItem<Populated>>>> {
    Ok(list(lost_found::list_items(&state.store, filter).await?))
}

async fn get_item(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<LostFoundItem<Populated>>>> {
    Ok(data(lost_found::get_item(&state.store, id).await?))
}

async fn create_item(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<LostFoundItem>>)> {
    let mut form = Form::read(multipart, UploadKind::LostFoundImage, MAX_ITEM_IMAGES).await?;
    let item: NewItem = form.parse()?;
    let images = form.files("images");
    let item = lost_found::create_item(&state.store, state.blobs.as_ref(), &principal, item, images).await?;
    Ok((StatusCode::CREATED, data(item)))
}

async fn update_item(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<LostFoundItem>>> {
    let mut form = Form::read(multipart, UploadKind::LostFoundImage, MAX_ITEM_IMAGES).await?;
    let patch: ItemPatch = form.parse()?;
    let images = form.files("images");
    let item = lost_found::update_item(&state.store, state.blobs.as_ref(), &principal, id, patch, images).await?;
    Ok(data(item))
}

async fn delete_item(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    lost_found::delete_item(&state.store, &principal, id).await?;
    Ok(message("item deleted"))
}

async fn claim_item(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<ClaimRequest>,
) -> AppResult<Json<DataResponse<LostFoundItem>>> {
    let item = lost_found::claim_item(&state.store, &principal, id, req.message).await?;
    Ok(data_with_message("claim submitted successfully", item))
}

async fn decide_claim(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path((id, claim)): Path<(Uuid, Uuid)>,
    Json(req): Json<ClaimDecision>,
) -> AppResult<Json<DataResponse<LostFoundItem>>> {
    let item = lost_found::update_claim_status(&state.store, &principal, id, claim, req.status).await?;
    Ok(data_with_message("claim status updated", item))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/claim", post(claim_item))
        .route("/:id/claim/:claim_id", put(decide_claim))
}
