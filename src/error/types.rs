//! Proxy error types

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::services::UpstreamError;
use crate::utils::TimeoutError;

/// Everything that can end a request without a relayed stream
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Unauthorized origin")]
    UnauthorizedOrigin,

    #[error("{0}")]
    InvalidRequestBody(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("API key not configured")]
    MissingCredential,

    /// Non-2xx answer from the upstream API, status mirrored verbatim
    #[error("Upstream API error: {status}")]
    Upstream { status: StatusCode, details: String },

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Proxy server error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn missing_messages() -> Self {
        ProxyError::InvalidRequestBody("Missing or invalid messages parameter".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::UnauthorizedOrigin => StatusCode::FORBIDDEN,
            ProxyError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the JSON body; `expose_details` controls internal failure details.
    ///
    /// Upstream details are always included since they are the vendor's own answer.
    pub fn to_body(&self, expose_details: bool) -> ErrorBody {
        match self {
            ProxyError::Upstream { status, details } => ErrorBody {
                error: "Upstream API error".to_string(),
                status: Some(status.as_u16()),
                details: Some(details.clone()),
            },
            ProxyError::Timeout(_) | ProxyError::Internal(_) => ErrorBody {
                error: "Proxy server error".to_string(),
                status: None,
                details: expose_details.then(|| self.to_string()),
            },
            other => ErrorBody {
                error: other.to_string(),
                status: None,
                details: None,
            },
        }
    }

    /// Build the response with an explicit detail policy
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let body = self.to_body(expose_details);
        (self.status(), Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Internal(format!("invalid JSON body: {}", err))
    }
}

impl From<BytesRejection> for ProxyError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ProxyError::PayloadTooLarge
        } else {
            ProxyError::InvalidRequestBody(rejection.body_text())
        }
    }
}

impl From<TimeoutError<UpstreamError>> for ProxyError {
    fn from(err: TimeoutError<UpstreamError>) -> Self {
        match err {
            TimeoutError::Timeout(budget) => ProxyError::Timeout(budget),
            TimeoutError::Inner(inner) => ProxyError::Internal(inner.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

/// JSON error payload: `{error, status?, details?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ProxyError::UnauthorizedOrigin.status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::missing_messages().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::MissingCredential.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ProxyError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ProxyError::Timeout(Duration::from_secs(25)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_status_is_mirrored() {
        let err = ProxyError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            details: "invalid api key".to_string(),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let body = err.to_body(false);
        assert_eq!(body.status, Some(401));
        assert_eq!(body.details.as_deref(), Some("invalid api key"));
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(ProxyError::UnauthorizedOrigin.to_body(true).error, "Unauthorized origin");
        assert_eq!(ProxyError::MissingCredential.to_body(true).error, "API key not configured");
        assert_eq!(ProxyError::PayloadTooLarge.to_body(true).error, "Request body too large");
        assert_eq!(
            ProxyError::missing_messages().to_body(true).error,
            "Missing or invalid messages parameter"
        );
    }

    #[test]
    fn test_internal_details_redaction() {
        let err = ProxyError::Internal("connection refused".to_string());
        assert!(err.to_body(false).details.is_none());
        assert!(err
            .to_body(true)
            .details
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn test_timeout_conversion() {
        let err: ProxyError = TimeoutError::<UpstreamError>::Timeout(Duration::from_secs(25)).into();
        assert!(matches!(err, ProxyError::Timeout(d) if d == Duration::from_secs(25)));

        let err: ProxyError =
            TimeoutError::Inner(UpstreamError::Stream("reset".to_string())).into();
        assert!(matches!(err, ProxyError::Internal(_)));
    }

    #[test]
    fn test_optional_fields_are_skipped() {
        let json = serde_json::to_value(ErrorBody::new("Method Not Allowed")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Method Not Allowed" }));
    }
}
