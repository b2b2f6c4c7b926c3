//! Request extractors whose rejections render as [`AppError`], so malformed
//! input gets the same `{success:false, message, field}` body as every other
//! validation failure.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{self, FromRequest, RequestParts},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

/// JSON request body, and JSON response body.
pub struct Json<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Json<T>
where
    T: DeserializeOwned + Send,
    Bytes: FromRequest<B>,
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req)
            .await
            .map_err(|_| AppError::validation("body", "failed to read request body"))?;
        serde_json::from_slice(&body)
            .map(Json)
            .map_err(|e| AppError::validation("body", e.to_string()))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

pub struct Path<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Path<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let extract::Path(value) = extract::Path::<T>::from_request(req)
            .await
            .map_err(|_| AppError::validation("id", "invalid id in path"))?;
        Ok(Path(value))
    }
}

pub struct Query<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Query<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let extract::Query(value) = extract::Query::<T>::from_request(req)
            .await
            .map_err(|_| AppError::validation("query", "invalid query parameters"))?;
        Ok(Query(value))
    }
}

/// A `multipart/form-data` body, read with [`super::Form::read`].
pub struct Multipart(pub extract::Multipart);

#[async_trait]
impl<B> FromRequest<B> for Multipart
where
    extract::Multipart: FromRequest<B>,
    B: Send,
{
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        extract::Multipart::from_request(req)
            .await
            .map(Multipart)
            .map_err(|_| AppError::validation("file", "expected a multipart form"))
    }
}
