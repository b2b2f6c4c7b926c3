use super::{
    data, data_with_message, list, message, DataResponse, Form, Json, ListResponse, MessageResponse,
    Multipart, Path, Query,
};
use crate::{
    auth::{ExtractAuth, MaybeAuth},
    blob::UploadKind,
    error::AppResult,
    models::{EventFilter, EventPatch, EventView, NewEvent, Populated, RegistrationForm},
    service::events,
    AppState,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    success: bool,
    data: EventView<Populated>,
    is_registered: bool,
}

async fn list_events(
    Extension(state): Extension<AppState>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<ListResponse<EventView<Populated>>>> {
    Ok(list(events::list_events(&state.store, filter).await?))
}

async fn get_event(
    Extension(state): Extension<AppState>,
    MaybeAuth(principal): MaybeAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EventResponse>> {
    let (event, is_registered) = events::get_event(&state.store, principal.as_ref(), id).await?;
    Ok(Json(EventResponse {
        success: true,
        data: event,
        is_registered,
    }))
}

async fn create_event(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Json(req): Json<NewEvent>,
) -> AppResult<(StatusCode, Json<DataResponse<EventView>>)> {
    let event = events::create_event(&state.store, &principal, req).await?;
    Ok((StatusCode::CREATED, data(event)))
}

async fn update_event(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> AppResult<Json<DataResponse<EventView>>> {
    Ok(data(events::update_event(&state.store, &principal, id, patch).await?))
}

async fn delete_event(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    events::delete_event(&state.store, &principal, id).await?;
    Ok(message("event deleted"))
}

async fn upload_poster(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<EventView>>> {
    let mut form = Form::read(multipart, UploadKind::EventPoster, 1).await?;
    let event = events::upload_event_poster(
        &state.store,
        state.blobs.as_ref(),
        &principal,
        id,
        form.file("poster"),
    )
    .await?;
    Ok(data(event))
}

async fn register(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
    form: Option<Json<RegistrationForm>>,
) -> AppResult<Json<DataResponse<EventView>>> {
    let form = form.map(|Json(form)| form).unwrap_or_default();
    let event = events::register_for_event(&state.store, &principal, id, form).await?;
    Ok(data_with_message("successfully registered for event", event))
}

async fn unregister(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<EventView>>> {
    let event = events::unregister_from_event(&state.store, &principal, id).await?;
    Ok(data_with_message("successfully unregistered from event", event))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route(
            "/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/:id/poster", post(upload_poster))
        .route("/:id/register", post(register).delete(unregister))
}
