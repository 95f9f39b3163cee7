use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdminError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    Ok,
    BadRequest,
    Unauthorized,
    Forbidden,
    ActionNotAllowed,
    NotFound,
    Conflict,
    GenericError,
}

impl ActionStatus {
    pub fn http_status(self) -> u16 {
        match self {
            ActionStatus::Ok => 200,
            ActionStatus::BadRequest => 400,
            ActionStatus::Unauthorized => 401,
            ActionStatus::Forbidden => 403,
            ActionStatus::NotFound => 404,
            ActionStatus::ActionNotAllowed => 405,
            ActionStatus::Conflict => 409,
            ActionStatus::GenericError => 500,
        }
    }
}

/// Uniform outcome of every dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self { status: ActionStatus::Ok, message: None, data: None }
    }

    pub fn ok_with(data: Value) -> Self {
        Self { status: ActionStatus::Ok, message: None, data: Some(data) }
    }

    pub fn error<S: Into<String>>(status: ActionStatus, message: S) -> Self {
        Self { status, message: Some(message.into()), data: None }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self { Self::error(ActionStatus::BadRequest, message) }
    pub fn not_found<S: Into<String>>(message: S) -> Self { Self::error(ActionStatus::NotFound, message) }
    pub fn conflict<S: Into<String>>(message: S) -> Self { Self::error(ActionStatus::Conflict, message) }
    pub fn not_allowed<S: Into<String>>(message: S) -> Self { Self::error(ActionStatus::ActionNotAllowed, message) }
    pub fn generic<S: Into<String>>(message: S) -> Self { Self::error(ActionStatus::GenericError, message) }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }

    pub fn http_status(&self) -> u16 {
        self.status.http_status()
    }
}

impl From<AdminError> for ActionResult {
    fn from(err: AdminError) -> Self {
        let err = err.client_facing();
        ActionResult::error(err.action_status(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let v = serde_json::to_value(ActionResult::ok()).unwrap();
        assert_eq!(v, serde_json::json!({"status":"Ok"}));
    }

    #[test]
    fn status_codes() {
        assert_eq!(ActionResult::not_allowed("x").http_status(), 405);
        assert_eq!(ActionResult::not_found("x").http_status(), 404);
        assert_eq!(ActionResult::ok().http_status(), 200);
    }

    #[test]
    fn auth_failure_does_not_leak_reason() {
        let r = ActionResult::from(AdminError::auth_failed("bad_signature", "signature mismatch"));
        assert_eq!(r.status, ActionStatus::Unauthorized);
        assert_eq!(r.message.as_deref(), Some("unauthorized"));
    }
}
