use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ActionResult;
use crate::identity::Caller;
use crate::security::SecurityRequirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            other => Err(format!("unsupported verb '{}'", other)),
        }
    }
}

/// Shape of the payload a method accepts. Checked before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// No payload (absent or JSON null).
    None,
    Any,
    Object,
    Array,
    Text,
}

impl InputKind {
    pub fn accepts(self, data: Option<&Value>) -> Result<(), String> {
        let ok = match (self, data) {
            (InputKind::Any, _) => true,
            (InputKind::None, None) | (InputKind::None, Some(Value::Null)) => true,
            (InputKind::Object, Some(Value::Object(_))) => true,
            (InputKind::Array, Some(Value::Array(_))) => true,
            (InputKind::Text, Some(Value::String(_))) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            let got = match data {
                None | Some(Value::Null) => "nothing",
                Some(Value::Object(_)) => "an object",
                Some(Value::Array(_)) => "an array",
                Some(Value::String(_)) => "a string",
                Some(_) => "a scalar",
            };
            Err(format!("expected {:?} payload, got {}", self, got))
        }
    }
}

/// Everything a handler gets to see for one call.
pub struct Invocation<'a> {
    pub caller: &'a Caller,
    pub item_id: Option<&'a str>,
    pub data: Option<Value>,
}

impl<'a> Invocation<'a> {
    /// Decode the payload into a typed request, or a ready-made BadRequest.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ActionResult> {
        let value = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ActionResult::bad_request(format!("invalid payload: {}", e)))
    }

    pub fn require_item(&self) -> Result<&'a str, ActionResult> {
        self.item_id.ok_or_else(|| ActionResult::bad_request("item id required"))
    }
}

pub type Handler = Arc<dyn Fn(Invocation<'_>) -> ActionResult + Send + Sync>;

/// A resolved, not yet authorized, operation.
#[derive(Clone)]
pub struct ResourceMethod {
    pub input: InputKind,
    pub requirement: SecurityRequirement,
    pub item_id: Option<String>,
    handler: Handler,
}

impl fmt::Debug for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMethod")
            .field("input", &self.input)
            .field("requirement", &self.requirement)
            .field("item_id", &self.item_id)
            .finish_non_exhaustive()
    }
}

impl ResourceMethod {
    pub fn new<F>(input: InputKind, requirement: SecurityRequirement, handler: F) -> Self
    where
        F: Fn(Invocation<'_>) -> ActionResult + Send + Sync + 'static,
    {
        Self { input, requirement, item_id: None, handler: Arc::new(handler) }
    }

    /// Runs `check` after the security gate and payload check; a `Some` result short-circuits
    /// the handler.
    pub fn with_precheck<F>(mut self, check: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Option<ActionResult> + Send + Sync + 'static,
    {
        let inner = self.handler;
        self.handler = Arc::new(move |inv: Invocation<'_>| match check(&inv) {
            Some(early) => early,
            None => inner(inv),
        });
        self
    }

    pub fn for_item(mut self, item_id: String) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Security gate, then payload shape, then the handler. A denied caller never reaches
    /// the handler.
    pub fn invoke(&self, caller: &Caller, data: Option<Value>) -> ActionResult {
        if let Err(denied) = self.requirement.evaluate(&caller.security) {
            return denied.into();
        }
        if let Err(msg) = self.input.accepts(data.as_ref()) {
            return ActionResult::bad_request(msg);
        }
        (self.handler)(Invocation { caller, item_id: self.item_id.as_deref(), data })
    }
}
