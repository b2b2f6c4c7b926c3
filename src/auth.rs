use crate::{
    access::{Principal, Role},
    error::{AppError, AppResult},
    models::User,
    AppState,
};
use argon2::Argon2;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, RequestParts},
    headers::{authorization::Bearer, Authorization},
    Extension, TypedHeader,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: u64,
}

/// Issues and checks bearer tokens.
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(base64_secret: &str, token_ttl: Duration) -> anyhow::Result<AuthService> {
        Ok(AuthService {
            encoding: EncodingKey::from_base64_secret(base64_secret)?,
            decoding: DecodingKey::from_base64_secret(base64_secret)?,
            token_ttl,
        })
    }

    pub fn issue_token(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: user_id,
                role,
                exp: jsonwebtoken::get_current_timestamp() + self.token_ttl.as_secs(),
            },
            &self.encoding,
        )?)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected bearer token");
                AppError::Unauthenticated
            })
    }
}

/// Resolves a token to the principal of a live account. Role and profile
/// come from the stored user, so deactivation and role changes apply to
/// tokens already handed out.
pub async fn resolve_principal(state: &AppState, token: &str) -> AppResult<Principal> {
    let claims = state.auth.verify_token(token)?;
    state
        .store
        .find::<User>(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .map(|user| user.principal())
        .ok_or(AppError::Unauthenticated)
}

/// The caller of a route that requires a signed-in user.
pub struct ExtractAuth(pub Principal);

/// The caller of a public route, if they sent a valid token.
pub struct MaybeAuth(pub Option<Principal>);

async fn app_state<B: Send>(req: &mut RequestParts<B>) -> AppResult<AppState> {
    let Extension(state) = Extension::<AppState>::from_request(req)
        .await
        .map_err(|_| anyhow::anyhow!("application state is not installed"))?;
    Ok(state)
}

async fn bearer<B: Send>(req: &mut RequestParts<B>) -> Option<String> {
    TypedHeader::<Authorization<Bearer>>::from_request(req)
        .await
        .ok()
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
}

#[async_trait]
impl<B> FromRequest<B> for ExtractAuth
where
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let token = bearer(req).await.ok_or(AppError::Unauthenticated)?;
        let state = app_state(req).await?;
        Ok(ExtractAuth(resolve_principal(&state, &token).await?))
    }
}

#[async_trait]
impl<B> FromRequest<B> for MaybeAuth
where
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(req).await else {
            return Ok(MaybeAuth(None));
        };
        let state = app_state(req).await?;
        match resolve_principal(&state, &token).await {
            Ok(principal) => Ok(MaybeAuth(Some(principal))),
            Err(AppError::Unauthenticated) => Ok(MaybeAuth(None)),
            Err(err) => Err(err),
        }
    }
}
