//! Unified application error model and mapping helpers.
//! One error enum is shared by the session layer, the resource router and the transport
//! frontends (HTTP, WebSocket). Each variant carries a stable machine code and a
//! human-readable message; transports map variants to their own status codes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::resource::ActionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminError {
    InvalidMessage { code: String, message: String },
    /// Never sent as-is to a client; see [`AdminError::client_facing`].
    AuthenticationFailed { code: String, message: String },
    AlreadyAuthenticated { code: String, message: String },
    SessionClosed { code: String, message: String },
    InvalidSession { code: String, message: String },
    NotFound { code: String, message: String },
    MethodNotAllowed { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    Conflict { code: String, message: String },
    Io { code: String, message: String },
    Generic { code: String, message: String },
}

impl AdminError {
    pub fn code_str(&self) -> &str {
        match self {
            AdminError::InvalidMessage { code, .. }
            | AdminError::AuthenticationFailed { code, .. }
            | AdminError::AlreadyAuthenticated { code, .. }
            | AdminError::SessionClosed { code, .. }
            | AdminError::InvalidSession { code, .. }
            | AdminError::NotFound { code, .. }
            | AdminError::MethodNotAllowed { code, .. }
            | AdminError::Unauthorized { code, .. }
            | AdminError::Forbidden { code, .. }
            | AdminError::Conflict { code, .. }
            | AdminError::Io { code, .. }
            | AdminError::Generic { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AdminError::InvalidMessage { message, .. }
            | AdminError::AuthenticationFailed { message, .. }
            | AdminError::AlreadyAuthenticated { message, .. }
            | AdminError::SessionClosed { message, .. }
            | AdminError::InvalidSession { message, .. }
            | AdminError::NotFound { message, .. }
            | AdminError::MethodNotAllowed { message, .. }
            | AdminError::Unauthorized { message, .. }
            | AdminError::Forbidden { message, .. }
            | AdminError::Conflict { message, .. }
            | AdminError::Io { message, .. }
            | AdminError::Generic { message, .. } => message.as_str(),
        }
    }

    pub fn invalid_message<S: Into<String>>(code: S, msg: S) -> Self { AdminError::InvalidMessage { code: code.into(), message: msg.into() } }
    pub fn auth_failed<S: Into<String>>(code: S, msg: S) -> Self { AdminError::AuthenticationFailed { code: code.into(), message: msg.into() } }
    pub fn already_authenticated() -> Self { AdminError::AlreadyAuthenticated { code: "already_authenticated".into(), message: "session is already authenticated".into() } }
    pub fn session_closed() -> Self { AdminError::SessionClosed { code: "session_closed".into(), message: "session is closed".into() } }
    pub fn invalid_session() -> Self { AdminError::InvalidSession { code: "invalid_session".into(), message: "unknown or expired session token".into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AdminError::NotFound { code: code.into(), message: msg.into() } }
    pub fn not_allowed<S: Into<String>>(code: S, msg: S) -> Self { AdminError::MethodNotAllowed { code: code.into(), message: msg.into() } }
    pub fn unauthorized() -> Self { AdminError::Unauthorized { code: "unauthorized".into(), message: "unauthorized".into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AdminError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AdminError::Conflict { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AdminError::Io { code: code.into(), message: msg.into() } }
    pub fn generic<S: Into<String>>(code: S, msg: S) -> Self { AdminError::Generic { code: code.into(), message: msg.into() } }

    /// Collapse internal authentication diagnostics into the single opaque outcome
    /// a client is allowed to observe. Every other variant passes through.
    pub fn client_facing(self) -> Self {
        match self {
            AdminError::AuthenticationFailed { .. } => AdminError::unauthorized(),
            other => other,
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AdminError::InvalidMessage { .. } => 400,
            AdminError::AuthenticationFailed { .. } => 401,
            AdminError::AlreadyAuthenticated { .. } => 409,
            AdminError::SessionClosed { .. } => 401,
            AdminError::InvalidSession { .. } => 401,
            AdminError::NotFound { .. } => 404,
            AdminError::MethodNotAllowed { .. } => 405,
            AdminError::Unauthorized { .. } => 401,
            AdminError::Forbidden { .. } => 403,
            AdminError::Conflict { .. } => 409,
            AdminError::Io { .. } => 503,
            AdminError::Generic { .. } => 500,
        }
    }

    /// Status used when the error is folded into an `ActionResult`.
    pub fn action_status(&self) -> ActionStatus {
        match self {
            AdminError::InvalidMessage { .. } => ActionStatus::BadRequest,
            AdminError::AuthenticationFailed { .. }
            | AdminError::SessionClosed { .. }
            | AdminError::InvalidSession { .. }
            | AdminError::Unauthorized { .. } => ActionStatus::Unauthorized,
            AdminError::Forbidden { .. } => ActionStatus::Forbidden,
            AdminError::NotFound { .. } => ActionStatus::NotFound,
            AdminError::MethodNotAllowed { .. } => ActionStatus::ActionNotAllowed,
            AdminError::AlreadyAuthenticated { .. } | AdminError::Conflict { .. } => ActionStatus::Conflict,
            AdminError::Io { .. } | AdminError::Generic { .. } => ActionStatus::GenericError,
        }
    }
}

impl Display for AdminError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AdminError {}

pub type AdminResult<T> = Result<T, AdminError>;

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        AdminError::Generic { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AdminError {
    fn from(err: std::io::Error) -> Self {
        AdminError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::InvalidMessage { code: "invalid_json".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
