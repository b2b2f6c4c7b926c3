use super::{
    data, data_with_message, list, message, DataResponse, Form, Json, ListResponse, MessageResponse,
    Multipart, Path, Query,
};
use crate::{
    auth::ExtractAuth,
    blob::UploadKind,
    error::AppResult,
    models::{UserPatch, UserProfile},
    service::users::{self, UserFilter},
    AppState,
};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use uuid::Uuid;

async fn list_users(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<ListResponse<UserProfile>>> {
    Ok(list(users::list_users(&state.store, &principal, filter).await?))
}

async fn get_user(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    Ok(data(users::get_user(&state.store, &principal, id).await?))
}

async fn update_user(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    Ok(data(users::update_user(&state.store, &principal, id, patch).await?))
}

async fn deactivate_user(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    users::deactivate_user(&state.store, &principal, id).await?;
    Ok(message("user deactivated"))
}

async fn upload_profile(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    let mut form = Form::read(multipart, UploadKind::ProfilePicture, 1).await?;
    let user = users::upload_profile_picture(
        &state.store,
        state.blobs.as_ref(),
        &principal,
        form.file("profilePicture"),
    )
    .await?;
    Ok(data_with_message("profile picture uploaded", user))
}

async fn reconcile(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    Ok(data(users::reconcile_user(&state.store, &principal, id).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/upload-profile", post(upload_profile))
        .route(
            "/:id",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .route("/:id/reconcile", post(reconcile))
}
