use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body extractor for SCIM requests.
///
/// `Json` already accepts `application/json` and any `application/*+json`
/// media type, which covers `application/scim+json` (RFC 7644 Section 3.1).
/// What changes is the rejection: every failure renders as a SCIM error.
pub struct ScimJson<T>(pub T);

impl<T, S> FromRequest<S> for ScimJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ScimJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ScimJson(value)),
            Err(rejection) => Err(ScimJsonRejection(rejection)),
        }
    }
}

pub struct ScimJsonRejection(pub JsonRejection);

impl IntoResponse for ScimJsonRejection {
    fn into_response(self) -> Response {
        tracing::debug!("scim: rejected request body: {}", self.0.body_text());
        AppError::invalid_syntax("Invalid request body").into_response()
    }
}
