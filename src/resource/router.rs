use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error};

use super::{validate_name, ActionResult, ObserverRegistry, Resource, ResourceMethod, ResourcePath, ResourceRequest, RouteError, Verb};
use crate::identity::Caller;

/// Interior node: named children plus an optional resource answering for the node itself.
pub struct RouterResource {
    children: BTreeMap<String, Arc<dyn Resource>>,
    self_resource: Option<Arc<dyn Resource>>,
}

impl RouterResource {
    pub fn builder() -> RouterResourceBuilder {
        RouterResourceBuilder::default()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }
}

impl Resource for RouterResource {
    fn dispatch(&self, verb: Verb, path: &mut ResourcePath) -> Result<ResourceMethod, RouteError> {
        match path.pop_front() {
            None => match &self.self_resource {
                Some(own) => own.dispatch(verb, path),
                None => Err(RouteError::NotAllowed(verb)),
            },
            Some(segment) => {
                let child = self.children.get(&segment).ok_or(RouteError::NotFound(segment))?;
                child.dispatch(verb, path)
            }
        }
    }

    fn child(&self, segment: &str) -> Option<Arc<dyn Resource>> {
        self.children.get(segment).cloned()
    }

    fn observers(&self) -> Option<Arc<ObserverRegistry>> {
        self.self_resource.as_ref().and_then(|r| r.observers())
    }
}

#[derive(Default)]
pub struct RouterResourceBuilder {
    children: BTreeMap<String, Arc<dyn Resource>>,
    self_resource: Option<Arc<dyn Resource>>,
}

impl RouterResourceBuilder {
    /// Sibling names must be unique.
    pub fn child<R: Resource + 'static>(self, name: &str, resource: R) -> Result<Self, RouteError> {
        self.shared_child(name, Arc::new(resource))
    }

    pub fn shared_child(mut self, name: &str, resource: Arc<dyn Resource>) -> Result<Self, RouteError> {
        validate_name(name)?;
        if self.children.contains_key(name) {
            return Err(RouteError::DuplicateName(name.to_string()));
        }
        self.children.insert(name.to_string(), resource);
        Ok(self)
    }

    pub fn self_resource<R: Resource + 'static>(mut self, resource: R) -> Self {
        self.self_resource = Some(Arc::new(resource));
        self
    }

    pub fn build(self) -> RouterResource {
        RouterResource { children: self.children, self_resource: self.self_resource }
    }
}

/// Entry point used by sessions: resolve, check consumption, authorize, invoke.
#[derive(Clone)]
pub struct ResourceTree {
    root: Arc<dyn Resource>,
}

impl ResourceTree {
    pub fn new<R: Resource + 'static>(root: R) -> Self {
        Self { root: Arc::new(root) }
    }

    pub fn resolve(&self, verb: Verb, path: &mut ResourcePath) -> Result<ResourceMethod, RouteError> {
        let method = self.root.dispatch(verb, path)?;
        path.ensure_consumed()?;
        Ok(method)
    }

    pub fn handle(&self, request: ResourceRequest, caller: &Caller) -> ActionResult {
        let mut path = ResourcePath::new(request.path);
        let shown = path.to_string();
        match self.resolve(request.verb, &mut path) {
            Ok(method) => {
                let result = method.invoke(caller, request.data);
                debug!(target: "router", verb = %request.verb, path = %shown, status = ?result.status, "dispatched");
                result
            }
            Err(e @ RouteError::Unconsumed(_)) => {
                error!(target: "router", verb = %request.verb, path = %shown, "routing bug: {}", e);
                e.into()
            }
            Err(e) => {
                debug!(target: "router", verb = %request.verb, path = %shown, "unresolved: {}", e);
                e.into()
            }
        }
    }

    pub fn find(&self, segments: &[String]) -> Option<Arc<dyn Resource>> {
        let mut cur = self.root.clone();
        for seg in segments {
            cur = cur.child(seg)?;
        }
        Some(cur)
    }

    pub fn find_observable(&self, segments: &[String]) -> Option<Arc<ObserverRegistry>> {
        self.find(segments).and_then(|r| r.observers())
    }
}
