use std::{io, path::Path, sync::Arc};

use axum::{routing::get_service, Extension, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod access;
pub mod api;
pub mod auth;
pub mod blob;
pub mod error;
pub mod models;
pub mod schema;
pub mod service;
pub mod store;

use auth::AuthService;
use blob::BlobStore;
use store::Store;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Ok(Pool::builder(db_config).build()?)
}

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: Arc<AuthService>,
    pub blobs: Arc<dyn BlobStore>,
}

pub fn app(state: AppState, upload_dir: impl AsRef<Path>) -> Router {
    let uploads = get_service(ServeDir::new(upload_dir)).handle_error(handle_error);
    Router::new()
        .nest("/api", api::app())
        .nest("/uploads", uploads)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

async fn handle_error(err: io::Error) -> error::AppError {
    anyhow::Error::new(err).context("failed to serve upload").into()
}
