use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ActionResult, InputKind, Invocation, ObserverRegistry, Resource, ResourceMethod, ResourcePath, RouteError, Verb};
use crate::security::SecurityRequirement;

/// Leaf resource: the verb alone selects the handler.
pub struct SimpleResource {
    methods: BTreeMap<Verb, ResourceMethod>,
    observers: Option<Arc<ObserverRegistry>>,
}

impl SimpleResource {
    pub fn builder() -> SimpleResourceBuilder {
        SimpleResourceBuilder::default()
    }

    pub fn supported_verbs(&self) -> Vec<Verb> {
        self.methods.keys().copied().collect()
    }
}

impl Resource for SimpleResource {
    fn dispatch(&self, verb: Verb, path: &mut ResourcePath) -> Result<ResourceMethod, RouteError> {
        if let Some(next) = path.peek() {
            return Err(RouteError::NotFound(next.to_string()));
        }
        self.methods.get(&verb).cloned().ok_or(RouteError::NotAllowed(verb))
    }

    fn observers(&self) -> Option<Arc<ObserverRegistry>> {
        self.observers.clone()
    }
}

#[derive(Default)]
pub struct SimpleResourceBuilder {
    methods: BTreeMap<Verb, ResourceMethod>,
    observers: Option<Arc<ObserverRegistry>>,
}

impl SimpleResourceBuilder {
    pub fn method<F>(mut self, verb: Verb, input: InputKind, requirement: SecurityRequirement, handler: F) -> Self
    where
        F: Fn(Invocation<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.methods.insert(verb, ResourceMethod::new(input, requirement, handler));
        self
    }

    /// Read with no payload.
    pub fn get<F>(self, requirement: SecurityRequirement, handler: F) -> Self
    where
        F: Fn(Invocation<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.method(Verb::Get, InputKind::None, requirement, handler)
    }

    pub fn observable(mut self, observers: Arc<ObserverRegistry>) -> Self {
        self.observers = Some(observers);
        self
    }

    pub fn build(self) -> SimpleResource {
        SimpleResource { methods: self.methods, observers: self.observers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Caller;
    use crate::resource::ActionStatus;
    use serde_json::json;

    fn status_resource() -> SimpleResource {
        SimpleResource::builder()
            .get(SecurityRequirement::Public, |_| ActionResult::ok_with(json!({"running": true})))
            .method(Verb::Put, InputKind::Object, SecurityRequirement::Admin, |_| ActionResult::ok())
            .build()
    }

    #[test]
    fn verb_selects_handler() {
        let r = status_resource();
        let m = r.dispatch(Verb::Get, &mut ResourcePath::default()).unwrap();
        assert_eq!(m.invoke(&Caller::anonymous(), None).data, Some(json!({"running": true})));
        assert_eq!(r.supported_verbs(), vec![Verb::Get, Verb::Put]);
    }

    #[test]
    fn missing_verb_is_not_allowed() {
        let r = status_resource();
        let err = r.dispatch(Verb::Delete, &mut ResourcePath::default()).unwrap_err();
        assert_eq!(err, RouteError::NotAllowed(Verb::Delete));
        assert_eq!(ActionResult::from(err).status, ActionStatus::ActionNotAllowed);
    }

    #[test]
    fn deeper_path_is_not_found() {
        let r = status_resource();
        let err = r.dispatch(Verb::Get, &mut ResourcePath::new(["extra"])).unwrap_err();
        assert_eq!(err, RouteError::NotFound("extra".into()));
    }
}
