use anyhow::Context;
use axum::http::{HeaderValue, Method};
use campus_portal::{
    auth::AuthService,
    blob::LocalBlobStore,
    connect_to_db,
    store::{PgStore, Store},
    AppState,
};
use envconfig::Envconfig;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,
    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "JWT_EXPIRE_HOURS", default = "168")]
    pub jwt_expire_hours: u64,
    #[envconfig(from = "UPLOAD_DIR", default = "uploads")]
    pub upload_dir: String,
    #[envconfig(from = "CLIENT_URL")]
    pub client_url: Option<String>,
}

fn cors(client_url: Option<&str>) -> anyhow::Result<CorsLayer> {
    let origin = match client_url {
        Some(url) => {
            let url = url::Url::parse(url).context("CLIENT_URL is not a valid url")?;
            let origin = url.origin().ascii_serialization();
            AllowOrigin::exact(HeaderValue::from_str(&origin)?)
        }
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(origin))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::init_from_env().context("invalid configuration")?;
    let auth = AuthService::new(
        &config.jwt_secret,
        Duration::from_secs(config.jwt_expire_hours * 60 * 60),
    )
    .context("JWT_SECRET must be valid base64")?;

    let store = match &config.db_url {
        Some(db_url) => Store::new(Arc::new(PgStore::new(connect_to_db(db_url)?))),
        None => {
            tracing::warn!("DATABASE_URL is not set, data will only be kept in memory");
            Store::memory()
        }
    };

    let state = AppState {
        store,
        auth: Arc::new(auth),
        blobs: Arc::new(LocalBlobStore::new(&config.upload_dir)),
    };
    let app = campus_portal::app(state, &config.upload_dir).layer(cors(config.client_url.as_deref())?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
