use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ActionResult, InputKind, Invocation, ObserverRegistry, Resource, ResourceMethod, ResourcePath, RouteError, Verb};
use crate::security::SecurityRequirement;

type ItemExists = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Resource holding identifiable items.
///
/// `[]` selects collection-level methods (list/create), `[id]` selects item-level methods
/// (read/replace/update/delete one item). Anything deeper does not exist.
pub struct CollectionResource {
    collection: BTreeMap<Verb, ResourceMethod>,
    items: BTreeMap<Verb, ResourceMethod>,
    item_exists: Option<ItemExists>,
    observers: Option<Arc<ObserverRegistry>>,
}

impl CollectionResource {
    pub fn builder() -> CollectionResourceBuilder {
        CollectionResourceBuilder::default()
    }
}

impl Resource for CollectionResource {
    fn dispatch(&self, verb: Verb, path: &mut ResourcePath) -> Result<ResourceMethod, RouteError> {
        let Some(item_id) = path.pop_front() else {
            return self.collection.get(&verb).cloned().ok_or(RouteError::NotAllowed(verb));
        };
        if let Some(next) = path.peek() {
            return Err(RouteError::NotFound(next.to_string()));
        }
        let method = self.items.get(&verb).ok_or(RouteError::NotAllowed(verb))?.clone().for_item(item_id);
        // existence is only revealed to callers who pass the method's requirement
        let Some(exists) = self.item_exists.clone() else {
            return Ok(method);
        };
        Ok(method.with_precheck(move |inv| match inv.item_id {
            Some(id) if !exists(id) => Some(RouteError::NotFound(id.to_string()).into()),
            _ => None,
        }))
    }

    fn observers(&self) -> Option<Arc<ObserverRegistry>> {
        self.observers.clone()
    }
}

#[derive(Default)]
pub struct CollectionResourceBuilder {
    collection: BTreeMap<Verb, ResourceMethod>,
    items: BTreeMap<Verb, ResourceMethod>,
    item_exists: Option<ItemExists>,
    observers: Option<Arc<ObserverRegistry>>,
}

impl CollectionResourceBuilder {
    pub fn collection_method<F>(mut self, verb: Verb, input: InputKind, requirement: SecurityRequirement, handler: F) -> Self
    where
        F: Fn(Invocation<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.collection.insert(verb, ResourceMethod::new(input, requirement, handler));
        self
    }

    pub fn item_method<F>(mut self, verb: Verb, input: InputKind, requirement: SecurityRequirement, handler: F) -> Self
    where
        F: Fn(Invocation<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.items.insert(verb, ResourceMethod::new(input, requirement, handler));
        self
    }

    /// Items failing this predicate answer NotFound, checked after the security gate.
    pub fn item_exists<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.item_exists = Some(Arc::new(predicate));
        self
    }

    pub fn observable(mut self, observers: Arc<ObserverRegistry>) -> Self {
        self.observers = Some(observers);
        self
    }

    pub fn build(self) -> CollectionResource {
        CollectionResource {
            collection: self.collection,
            items: self.items,
            item_exists: self.item_exists,
            observers: self.observers,
        }
    }
}
