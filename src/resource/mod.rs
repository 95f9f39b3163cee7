//! Path-based resource tree and the method-dispatch contract.
//!
//! A [`Resource`] turns `(verb, remaining path)` into a [`ResourceMethod`]. Leaves are
//! [`SimpleResource`]s (verb maps straight to a handler) or [`CollectionResource`]s (an
//! optional trailing item id picks collection- or item-level handlers). Interior nodes are
//! [`RouterResource`]s. Builders register only the verbs a resource supports; everything
//! else resolves to `ActionNotAllowed`.

mod collection;
mod method;
mod observer;
mod path;
mod result;
mod router;
mod simple;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use collection::{CollectionResource, CollectionResourceBuilder};
pub use method::{Handler, InputKind, Invocation, ResourceMethod, Verb};
pub use observer::{Notification, Observer, ObserverRegistry};
pub use path::ResourcePath;
pub use result::{ActionResult, ActionStatus};
pub use router::{ResourceTree, RouterResource, RouterResourceBuilder};
pub use simple::{SimpleResource, SimpleResourceBuilder};

use crate::error::AdminError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no resource named '{0}'")]
    NotFound(String),
    #[error("{0} is not allowed on this resource")]
    NotAllowed(Verb),
    #[error("duplicate resource name '{0}'")]
    DuplicateName(String),
    #[error("invalid resource name '{0}'")]
    InvalidName(String),
    #[error("path left unconsumed after resolution: {0:?}")]
    Unconsumed(Vec<String>),
}

impl From<RouteError> for ActionResult {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::NotFound(_) => ActionResult::not_found(e.to_string()),
            RouteError::NotAllowed(_) => ActionResult::not_allowed(e.to_string()),
            RouteError::DuplicateName(_) | RouteError::InvalidName(_) => ActionResult::conflict(e.to_string()),
            // internal bug: do not echo the leftover path back
            RouteError::Unconsumed(_) => ActionResult::generic("internal routing error"),
        }
    }
}

impl From<RouteError> for AdminError {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::NotFound(_) => AdminError::not_found("resource_not_found", e.to_string().as_str()),
            RouteError::NotAllowed(_) => AdminError::not_allowed("method_not_allowed", e.to_string().as_str()),
            RouteError::DuplicateName(_) | RouteError::InvalidName(_) => AdminError::conflict("resource_name", e.to_string().as_str()),
            RouteError::Unconsumed(_) => AdminError::generic("routing_error", e.to_string().as_str()),
        }
    }
}

/// One addressable node of the tree.
pub trait Resource: Send + Sync {
    /// Resolve `verb` against this node, consuming the segments it owns from `path`.
    fn dispatch(&self, verb: Verb, path: &mut ResourcePath) -> Result<ResourceMethod, RouteError>;

    /// Named child, for nodes that have children.
    fn child(&self, _segment: &str) -> Option<Arc<dyn Resource>> {
        None
    }

    /// Registry of clients watching this node, for observable resources.
    fn observers(&self) -> Option<Arc<ObserverRegistry>> {
        None
    }
}

/// `{verb, path, data}` as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub verb: Verb,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResourceRequest {
    pub fn new<I, S>(verb: Verb, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { verb, path: path.into_iter().map(Into::into).collect(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), RouteError> {
    if name.is_empty() || name.contains('/') {
        return Err(RouteError::InvalidName(name.to_string()));
    }
    Ok(())
}
