use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::models::SCIM_API_MESSAGES_ERROR;

/// SCIM `scimType` detail codes (RFC 7644 Section 3.12) used by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimType {
    InvalidFilter,
    InvalidValue,
    InvalidPath,
    InvalidSyntax,
    Uniqueness,
    Mutability,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {detail}")]
    BadRequest {
        detail: String,
        scim_type: Option<ScimType>,
    },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {detail}")]
    Conflict {
        detail: String,
        scim_type: Option<ScimType>,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: None,
        }
    }

    pub fn invalid_filter(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: Some(ScimType::InvalidFilter),
        }
    }

    pub fn invalid_value(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: Some(ScimType::InvalidValue),
        }
    }

    pub fn invalid_path(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: Some(ScimType::InvalidPath),
        }
    }

    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: Some(ScimType::InvalidSyntax),
        }
    }

    pub fn mutability(detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            detail: detail.into(),
            scim_type: Some(ScimType::Mutability),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        AppError::Conflict {
            detail: detail.into(),
            scim_type: None,
        }
    }

    pub fn uniqueness(detail: impl Into<String>) -> Self {
        AppError::Conflict {
            detail: detail.into(),
            scim_type: Some(ScimType::Uniqueness),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        AppError::NotFound(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        AppError::Internal(detail.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the SCIM error envelope. Internal causes are logged, never echoed.
    pub fn to_error_response(&self) -> ScimErrorResponse {
        let status = self.status_code();
        let (detail, scim_type) = match self {
            AppError::BadRequest { detail, scim_type } => (detail.clone(), *scim_type),
            AppError::Conflict { detail, scim_type } => (detail.clone(), *scim_type),
            AppError::Unauthorized(detail) | AppError::NotFound(detail) => (detail.clone(), None),
            AppError::Internal(cause) => {
                tracing::error!("scim: internal error: {}", cause);
                ("Internal server error".to_string(), None)
            }
        };

        ScimErrorResponse {
            schemas: vec![SCIM_API_MESSAGES_ERROR.to_string()],
            status: status.as_u16().to_string(),
            detail,
            scim_type,
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization error: {}", err))
    }
}

/// SCIM 2.0 error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    pub schemas: Vec<String>,
    pub status: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimType>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.to_error_response())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(crate::models::SCIM_CONTENT_TYPE),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_error_envelope() {
        let body = AppError::uniqueness("Group with displayName \"Eng\" already exists")
            .to_error_response();
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["status"], "409");
        assert_eq!(value["scimType"], "uniqueness");
        assert_eq!(value["schemas"][0], SCIM_API_MESSAGES_ERROR);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let body = AppError::internal("connection reset by peer").to_error_response();
        assert_eq!(body.detail, "Internal server error");
        assert_eq!(body.status, "500");
        assert!(body.scim_type.is_none());
    }

    #[test]
    fn test_directory_errors_escalate_to_internal() {
        let err: AppError = DirectoryError::not_found("user", "u-1").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
