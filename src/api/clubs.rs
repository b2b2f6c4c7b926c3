use super::{
    data, data_with_message, list, message, DataResponse, Form, Json, ListResponse, MessageResponse,
    Multipart, Path,
};
use crate::{
    auth::ExtractAuth,
    blob::UploadKind,
    error::AppResult,
    models::{ClubPatch, ClubView, ForumPost, GalleryImage, Member, NewClub, Populated, Resource},
    service::clubs,
    AppState,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct ForumRequest {
    message: String,
}

async fn list_clubs(Extension(state): Extension<AppState>) -> AppResult<Json<ListResponse<ClubView<Populated>>>> {
    Ok(list(clubs::list_clubs(&state.store).await?))
}

async fn get_club(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ClubView<Populated>>>> {
    Ok(data(clubs::get_club(&state.store, id).await?))
}

async fn create_club(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Json(req): Json<NewClub>,
) -> AppResult<(StatusCode, Json<DataResponse<ClubView>>)> {
    let club = clubs::create_club(&state.store, &principal, req).await?;
    Ok((StatusCode::CREATED, data(club)))
}

async fn update_club(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(patch): Json<ClubPatch>,
) -> AppResult<Json<DataResponse<ClubView>>> {
    Ok(data(clubs::update_club(&state.store, &principal, id, patch).await?))
}

async fn delete_club(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    clubs::delete_club(&state.store, &principal, id).await?;
    Ok(message("club deleted"))
}

async fn join(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ClubView>>> {
    let club = clubs::join_club(&state.store, &principal, id).await?;
    Ok(data_with_message("successfully joined club", club))
}

async fn leave(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ClubView>>> {
    let club = clubs::leave_club(&state.store, &principal, id).await?;
    Ok(data_with_message("successfully left club", club))
}

async fn upload_gallery(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<Vec<GalleryImage>>>> {
    let mut form = Form::read(multipart, UploadKind::ClubImage, clubs::MAX_GALLERY_UPLOAD).await?;
    let images = form.files("images");
    let gallery = clubs::upload_gallery_images(
        &state.store,
        state.blobs.as_ref(),
        &principal,
        id,
        images,
        form.text("caption"),
    )
    .await?;
    Ok(data_with_message("images uploaded successfully", gallery))
}

async fn upload_resource(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<Vec<Resource>>>> {
    let mut form = Form::read(multipart, UploadKind::ClubResource, 1).await?;
    let resources = clubs::upload_resource(
        &state.store,
        state.blobs.as_ref(),
        &principal,
        id,
        form.file("resource"),
        form.text("name"),
    )
    .await?;
    Ok(data_with_message("resource uploaded successfully", resources))
}

async fn post_forum(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<ForumRequest>,
) -> AppResult<Json<DataResponse<Vec<ForumPost<Populated>>>>> {
    let posts = clubs::post_forum_message(&state.store, &principal, id, req.message).await?;
    Ok(data(posts))
}

async fn members(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ListResponse<Member<Populated>>>> {
    Ok(list(clubs::list_members(&state.store, &principal, id).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_clubs).post(create_club))
        .route("/:id", get(get_club).put(update_club).delete(delete_club))
        .route("/:id/join", post(join))
        .route("/:id/leave", post(leave))
        .route("/:id/gallery", post(upload_gallery))
        .route("/:id/resources", post(upload_resource))
        .route("/:id/forum", post(post_forum))
        .route("/:id/members", get(members))
}
