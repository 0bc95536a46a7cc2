//! Error taxonomy shared by every pipeline stage.
//!
//! A single [`GatewayError`] enum covers the stable error kinds callers can
//! observe. Kinds are never downgraded: a stage that wraps an error with
//! [`GatewayError::in_stage`] changes only the human-readable detail.
//!
//! | Kind | Retryable | HTTP | Mirrored to reporter |
//! |------|-----------|------|----------------------|
//! | `Validation` | no | 400 | no (caller mistake) |
//! | `Auth` | no | 401 | no (caller mistake) |
//! | `Unavailable` | yes | 502 | yes |
//! | `RateLimited` | yes, honoring hint | 429 | yes |
//! | `Malformed` | no | 400 | yes |
//! | `Resolution` | no (fatal) | 500 | yes, high severity |

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error kind, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Unavailable,
    RateLimited,
    Malformed,
    Resolution,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned from any gateway operation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Caller input malformed. Never retried, never reported as a system event.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Caller identity could not be resolved.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream capability unreachable or timed out. Retried with backoff.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream throttled the request. Retried honoring the hint when given.
    #[error("rate limited: {detail}")]
    RateLimited {
        detail: String,
        /// Backend-provided wait hint (e.g. from a `Retry-After` header).
        retry_after: Option<Duration>,
    },

    /// Upstream rejected the request as malformed. Non-retryable.
    #[error("request rejected by backend: {0}")]
    Malformed(String),

    /// Tenant-isolation precondition violated. Indicates a contract bug, not
    /// a caller mistake; fatal to the request.
    #[error("partition resolution contract violated: {0}")]
    Resolution(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn rate_limited(detail: impl Into<String>, retry_after: Option<Duration>) -> Self {
        GatewayError::RateLimited {
            detail: detail.into(),
            retry_after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::Auth(_) => ErrorKind::Auth,
            GatewayError::Unavailable(_) => ErrorKind::Unavailable,
            GatewayError::RateLimited { .. } => ErrorKind::RateLimited,
            GatewayError::Malformed(_) => ErrorKind::Malformed,
            GatewayError::Resolution(_) => ErrorKind::Resolution,
        }
    }

    /// Whether a bounded retry may recover this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_) | GatewayError::RateLimited { .. }
        )
    }

    /// Whether this failure is mirrored to the failure reporter.
    /// Validation and auth failures are caller mistakes, not system events.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, GatewayError::Validation(_) | GatewayError::Auth(_))
    }

    /// Backend-provided wait hint, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Prefix the detail with the originating stage, keeping the kind.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            GatewayError::Validation(d) => GatewayError::Validation(format!("{stage}: {d}")),
            GatewayError::Auth(d) => GatewayError::Auth(format!("{stage}: {d}")),
            GatewayError::Unavailable(d) => GatewayError::Unavailable(format!("{stage}: {d}")),
            GatewayError::RateLimited {
                detail,
                retry_after,
            } => GatewayError::RateLimited {
                detail: format!("{stage}: {detail}"),
                retry_after,
            },
            GatewayError::Malformed(d) => GatewayError::Malformed(format!("{stage}: {d}")),
            GatewayError::Resolution(d) => GatewayError::Resolution(format!("{stage}: {d}")),
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Malformed => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Unavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Resolution => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after();
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Some(hint) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(hint.as_secs()));
        }
        response
    }
}
