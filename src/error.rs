use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing input, reported against the offending field.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: Cow<'static, str>,
    },
    #[error("not authorized to access this route")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(Cow<'static, str>),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Duplicate registration, membership, claim or unique name.
    #[error("{0}")]
    Conflict(Cow<'static, str>),
    #[error("event is full")]
    CapacityExceeded,
    #[error("{0}")]
    InvalidStateTransition(Cow<'static, str>),
    /// Store or blob store failure. Details are logged, never returned.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Conflict(message.into())
    }

    pub fn invalid_state(message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::InvalidStateTransition(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::CapacityExceeded | AppError::InvalidStateTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            success: bool,
            message: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            field: Option<&'static str>,
        }

        let code = self.status();
        let (message, field) = match &self {
            AppError::Upstream(err) => {
                tracing::error!(error = ?err, "upstream failure");
                ("Internal Server Error".to_string(), None)
            }
            AppError::Validation { field, message } => (message.to_string(), Some(*field)),
            other => (other.to_string(), None),
        };

        (
            code,
            Json(AppErrorResponse {
                success: false,
                message,
                field,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::validation("title", "required"), StatusCode::BAD_REQUEST)]
    #[case(AppError::Unauthenticated, StatusCode::UNAUTHORIZED)]
    #[case(AppError::InvalidCredentials, StatusCode::UNAUTHORIZED)]
    #[case(AppError::forbidden("nope"), StatusCode::FORBIDDEN)]
    #[case(AppError::NotFound("Event"), StatusCode::NOT_FOUND)]
    #[case(AppError::conflict("taken"), StatusCode::CONFLICT)]
    #[case(AppError::CapacityExceeded, StatusCode::BAD_REQUEST)]
    #[case(AppError::invalid_state("closed"), StatusCode::BAD_REQUEST)]
    #[case(AppError::Upstream(anyhow::anyhow!("db down")), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_kinds_to_status(#[case] err: AppError, #[case] expected: StatusCode) {
        assert_eq!(err.status(), expected);
        assert_eq!(err.into_response().status(), expected);
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(AppError::NotFound("Club").to_string(), "Club not found");
    }
}
