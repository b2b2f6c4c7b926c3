use super::{data, list, message, DataResponse, Json, ListResponse, MessageResponse, Path, Query};
use crate::{
    auth::ExtractAuth,
    error::AppResult,
    models::{Announcement, AnnouncementFilter, AnnouncementPatch, NewAnnouncement, Populated},
    service::announcements,
    AppState,
};
use axum::{
    http::StatusCode,
    routing::get,
    Extension, Router,
};
use uuid::Uuid;

async fn list_announcements(
    Extension(state): Extension<AppState>,
    Query(filter): Query<AnnouncementFilter>,
) -> AppResult<Json<ListResponse<Announcement<Populated>>>> {
    Ok(list(announcements::list_announcements(&state.store, filter).await?))
}

async fn get_announcement(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<Announcement<Populated>>>> {
    Ok(data(announcements::get_announcement(&state.store, id).await?))
}

async fn create_announcement(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Json(req): Json<NewAnnouncement>,
) -> AppResult<(StatusCode, Json<DataResponse<Announcement>>)> {
    let announcement = announcements::create_announcement(&state.store, &principal, req).await?;
    Ok((StatusCode::CREATED, data(announcement)))
}

async fn update_announcement(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(patch): Json<AnnouncementPatch>,
) -> AppResult<Json<DataResponse<Announcement>>> {
    Ok(data(
        announcements::update_announcement(&state.store, &principal, id, patch).await?,
    ))
}

async fn delete_announcement(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    announcements::delete_announcement(&state.store, &principal, id).await?;
    Ok(message("announcement deleted"))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_announcements).post(create_announcement))
        .route(
            "/:id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
}
