//! Domain error representation shared across adapters.
//!
//! Keep this module free from HTTP or framework concerns so the same error
//! shape can be mapped by any adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Stable machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// The write collides with existing state; the body carries enough
    /// context for the client to pick a resolution strategy.
    Conflict,
    /// An unexpected error occurred on the server.
    InternalError,
}

/// Domain error payload consumed by adapters.
///
/// ## Invariants
/// - `message` is non-empty once trimmed of whitespace.
/// - `trace_id`, when present, is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, ThisError)]
#[serde(rename_all = "snake_case")]
#[error("{message}")]
pub struct Error {
    #[schema(example = "invalid_request")]
    code: ErrorCode,
    #[schema(example = "Something went wrong")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl Error {
    /// Create a new error. Empty messages are replaced by the code name so
    /// the payload invariant holds without panicking in error paths.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = format!("{code:?}");
        }
        Self {
            code,
            message,
            trace_id: None,
            details: None,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to clients.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Correlation identifier for tracing this error across systems.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Supplementary structured details for clients.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach a trace identifier to the error. Blank identifiers are ignored.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.trace_id = Some(id);
        }
        self
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Redact server-side details so the payload is safe to expose to
    /// clients. Internal errors keep their code and trace identifier but
    /// replace the message and drop structured details.
    pub fn redacted_for_clients(&self) -> Self {
        if !matches!(self.code, ErrorCode::InternalError) {
            return self.clone();
        }
        let mut redacted = self.clone();
        redacted.message = "Internal server error".to_string();
        redacted.details = None;
        redacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ErrorCode::InvalidRequest, "bad input")]
    #[case(ErrorCode::Conflict, "collision")]
    #[case(ErrorCode::NotFound, "missing")]
    fn carries_code_and_message(#[case] code: ErrorCode, #[case] message: &str) {
        let err = Error::new(code, message);
        assert_eq!(err.code(), code);
        assert_eq!(err.message(), message);
    }

    #[rstest]
    fn blank_message_falls_back_to_code_name() {
        let err = Error::new(ErrorCode::InternalError, "   ");
        assert!(!err.message().trim().is_empty());
    }

    #[rstest]
    fn blank_trace_id_is_ignored() {
        let err = Error::conflict("collision").with_trace_id("  ");
        assert_eq!(err.trace_id(), None);
    }

    #[rstest]
    fn redaction_strips_internal_payloads() {
        let err = Error::internal("database password leaked")
            .with_trace_id("abc")
            .with_details(json!({"secret": true}));
        let redacted = err.redacted_for_clients();
        assert_eq!(redacted.message(), "Internal server error");
        assert_eq!(redacted.trace_id(), Some("abc"));
        assert!(redacted.details().is_none());
    }

    #[rstest]
    fn redaction_keeps_client_errors_intact() {
        let err = Error::invalid_request("age out of range").with_details(json!({"field": "age"}));
        assert_eq!(err.redacted_for_clients(), err);
    }

    #[rstest]
    fn serialises_without_empty_optionals() {
        let value = serde_json::to_value(Error::not_found("missing")).expect("serialise");
        assert!(value.get("trace_id").is_none());
        assert!(value.get("details").is_none());
        assert_eq!(value["code"], "not_found");
    }
}
