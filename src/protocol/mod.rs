//! Wire envelopes.
//!
//! Inbound messages are a closed union keyed by a fixed `type` tag; there is no
//! name-based type lookup. Outbound messages share one push envelope:
//! `{messageType, resourcePath?, data}`.

pub mod b64;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::ClientAuthenticationMessage;
use crate::resource::{ActionResult, Notification, ResourceRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start (or restart) the handshake; answered with the server hello.
    Hello,
    Authenticate(ClientAuthenticationMessage),
    Request(ResourceRequest),
    Subscribe { path: Vec<String> },
    Unsubscribe { path: Vec<String> },
    Logout,
}

impl ClientMessage {
    pub fn parse(raw: &str) -> Result<Self, crate::error::AdminError> {
        serde_json::from_str(raw).map_err(|e| crate::error::AdminError::invalid_message("invalid_message", e.to_string().as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    ActionResult,
    ResourceChanged,
    ResourceEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_path: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl PushMessage {
    pub fn action_result(result: &ActionResult) -> Self {
        Self {
            message_type: MessageType::ActionResult,
            resource_path: None,
            data: serde_json::to_value(result).unwrap_or(Value::Null),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<Notification> for PushMessage {
    fn from(n: Notification) -> Self {
        match n {
            Notification::Changed { resource_path } => Self {
                message_type: MessageType::ResourceChanged,
                resource_path: Some(resource_path),
                data: Value::Null,
            },
            Notification::Event { resource_path, data } => Self {
                message_type: MessageType::ResourceEvent,
                resource_path: Some(resource_path),
                data,
            },
        }
    }
}
