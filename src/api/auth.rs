use super::{data, DataResponse, Json};
use crate::{
    auth::ExtractAuth,
    error::AppResult,
    models::{RegisterUser, UserProfile},
    service::users::{self, AuthResponse, Credentials},
    AppState,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};

async fn register(
    Extension(state): Extension<AppState>,
    Json(req): Json<RegisterUser>,
) -> AppResult<(StatusCode, Json<DataResponse<AuthResponse>>)> {
    let session = users::register_user(&state.store, &state.auth, req).await?;
    Ok((StatusCode::CREATED, data(session)))
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    Ok(data(users::login(&state.store, &state.auth, req).await?))
}

async fn me(
    Extension(state): Extension<AppState>,
    ExtractAuth(principal): ExtractAuth,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    Ok(data(users::current_user(&state.store, &principal).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
