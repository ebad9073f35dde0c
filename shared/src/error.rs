use lambda_http::{http::StatusCode, Body, Error, Response};
use thiserror::Error;

use crate::response;
use crate::store::StoreError;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HubError::BadRequest(_) | HubError::Json(_) => StatusCode::BAD_REQUEST,
            HubError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HubError::Forbidden(_) => StatusCode::FORBIDDEN,
            HubError::NotFound(_) | HubError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            HubError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            HubError::Config(_) | HubError::Store(_) | HubError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// `{"error": message}` with the mapped status.
    pub fn into_response(self) -> Result<Response<Body>, Error> {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::info!("Request rejected ({}): {}", status, self);
        }
        response::error(status, &self.to_string())
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        HubError::Upstream {
            status: err.status().map(|s| s.as_u16()).unwrap_or(502),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_variants() {
        assert_eq!(HubError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(HubError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(HubError::Store(StoreError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            HubError::Store(StoreError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HubError::Upstream { status: 429, message: "slow down".into() }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn error_body_carries_message() {
        let resp = HubError::bad_request("Missing url").into_response().unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "Missing url");
    }
}
