//! Protocol error classification and HTTP mapping.
//!
//! # Responsibilities
//! - One variant per terminal per-request failure the endpoints produce
//! - Map every rejection to the status class the wire protocol promises
//! - Log and count rejections in one place
//!
//! # Design Decisions
//! - A secret mismatch is reported exactly like a malformed request (same
//!   status, same body) so the endpoint does not reveal which check failed
//! - A dial failure surfaces as 502 so the uploading side fails at the
//!   HTTP layer without a session being created
//! - Wrong-method requests never reach these variants; axum method routing
//!   answers 405 before a handler runs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Terminal per-request failures produced by the tunnel endpoints.
///
/// None of these terminate the server process, and session state survives
/// them except where the variant says otherwise.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Bearer secret absent or not an exact match.
    #[error("shared secret mismatch")]
    AuthMismatch,

    /// A required request parameter is missing or unparseable.
    #[error("missing or invalid parameter `{0}`")]
    MalformedRequest(&'static str),

    /// Chunk sequence does not directly follow the last accepted chunk.
    /// The session's counter is left untouched; the stream for this id is
    /// considered broken (no resend path exists).
    #[error("chunk {got} for session {id} out of order, expected {expected}")]
    OrderingViolation { id: String, expected: u64, got: u64 },

    /// Destination unreachable on the session-creating chunk. No session
    /// is created.
    #[error("failed to dial {addr}: {reason}")]
    DialFailure { addr: String, reason: String },

    /// A second reader tried to claim a session's download stream. The
    /// original claimant is unaffected.
    #[error("download already claimed for session {0}")]
    DuplicateDownloadClaim(String),

    /// No session appeared for the id within the download wait bound.
    #[error("no session appeared for {0} within the wait bound")]
    SessionWaitTimeout(String),
}

impl TunnelError {
    /// Short label used for rejection metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TunnelError::AuthMismatch => "auth_mismatch",
            TunnelError::MalformedRequest(_) => "malformed_request",
            TunnelError::OrderingViolation { .. } => "ordering_violation",
            TunnelError::DialFailure { .. } => "dial_failure",
            TunnelError::DuplicateDownloadClaim(_) => "duplicate_download",
            TunnelError::SessionWaitTimeout(_) => "session_wait_timeout",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            TunnelError::DialFailure { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        tracing::warn!(kind = self.kind(), error = %self, "Request rejected");
        crate::observability::metrics::record_rejection(self.kind());
        (self.status(), "Bad request").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mismatch_is_indistinguishable_from_malformed() {
        assert_eq!(
            TunnelError::AuthMismatch.status(),
            TunnelError::MalformedRequest("id").status()
        );
    }

    #[test]
    fn dial_failure_is_a_gateway_error() {
        let err = TunnelError::DialFailure {
            addr: "127.0.0.1:1".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
