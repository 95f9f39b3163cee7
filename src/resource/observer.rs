//! Per-resource observer registry.
//!
//! Maps a connected client (session token) to a callback. Host code calls the `notify_*`
//! methods from any thread; callbacks are snapshotted under the read lock and invoked after
//! it is released, so a callback may register/unregister without deadlocking and a client
//! disconnecting mid-fan-out is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Readable state changed; the client is expected to re-read. Carries no value.
    Changed { resource_path: String },
    /// Opaque domain event with payload.
    Event { resource_path: String, data: Value },
}

pub type Observer = Arc<dyn Fn(Notification) + Send + Sync>;

pub struct ObserverRegistry {
    resource_path: String,
    observers: RwLock<HashMap<String, Observer>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("resource_path", &self.resource_path)
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new<S: Into<String>>(resource_path: S) -> Self {
        Self { resource_path: resource_path.into(), observers: RwLock::new(HashMap::new()) }
    }

    pub fn shared<S: Into<String>>(resource_path: S) -> Arc<Self> {
        Arc::new(Self::new(resource_path))
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Replaces any previous callback for the same client.
    pub fn register(&self, client_id: &str, observer: Observer) {
        self.observers.write().insert(client_id.to_string(), observer);
        debug!(target: "observer", resource = %self.resource_path, client = client_id, "registered");
    }

    pub fn unregister(&self, client_id: &str) -> bool {
        self.observers.write().remove(client_id).is_some()
    }

    pub fn is_registered(&self, client_id: &str) -> bool {
        self.observers.read().contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn notify_changed_for_client(&self, client_id: &str) {
        let observer = self.observers.read().get(client_id).cloned();
        if let Some(cb) = observer {
            cb(Notification::Changed { resource_path: self.resource_path.clone() });
        }
    }

    pub fn notify_changed_for_all_clients(&self) {
        for cb in self.snapshot() {
            cb(Notification::Changed { resource_path: self.resource_path.clone() });
        }
    }

    pub fn notify_event(&self, client_id: &str, data: Value) {
        let observer = self.observers.read().get(client_id).cloned();
        if let Some(cb) = observer {
            cb(Notification::Event { resource_path: self.resource_path.clone(), data });
        }
    }

    pub fn notify_event_for_all_clients(&self, data: Value) {
        for cb in self.snapshot() {
            cb(Notification::Event { resource_path: self.resource_path.clone(), data: data.clone() });
        }
    }

    fn snapshot(&self) -> Vec<Observer> {
        self.observers.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Observer, Arc<Mutex<Vec<Notification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (Arc::new(move |n| s.lock().push(n)), seen)
    }

    #[test]
    fn missing_client_is_a_no_op() {
        let reg = ObserverRegistry::new("/console");
        reg.notify_changed_for_client("nobody");
        reg.notify_event("nobody", json!({"line":"hi"}));
        assert!(reg.is_empty());
    }

    #[test]
    fn event_reaches_only_the_target() {
        let reg = ObserverRegistry::new("/console");
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        reg.register("a", a);
        reg.register("b", b);
        reg.notify_event("a", json!("boot"));
        assert_eq!(
            seen_a.lock().as_slice(),
            &[Notification::Event { resource_path: "/console".into(), data: json!("boot") }]
        );
        assert!(seen_b.lock().is_empty());
    }

    #[test]
    fn callback_may_unregister_itself_during_fan_out() {
        let reg = Arc::new(ObserverRegistry::new("/saves"));
        let r = reg.clone();
        reg.register("self-removing", Arc::new(move |_| { r.unregister("self-removing"); }));
        reg.notify_changed_for_all_clients();
        assert!(!reg.is_registered("self-removing"));
    }

    #[test]
    fn changed_for_client_reaches_only_that_client() {
        let reg = ObserverRegistry::new("/saves");
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        reg.register("a", a);
        reg.register("b", b);
        reg.notify_changed_for_client("b");
        assert!(seen_a.lock().is_empty());
        assert_eq!(seen_b.lock().as_slice(), &[Notification::Changed { resource_path: "/saves".into() }]);
    }

    #[test]
    fn event_for_all_reaches_every_client_once() {
        let reg = ObserverRegistry::new("/console");
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        reg.register("a", a);
        reg.register("b", b);
        reg.notify_event_for_all_clients(json!({"line": "saved"}));
        let expected = Notification::Event { resource_path: "/console".into(), data: json!({"line": "saved"}) };
        assert_eq!(seen_a.lock().as_slice(), &[expected.clone()]);
        assert_eq!(seen_b.lock().as_slice(), &[expected]);
    }

    #[test]
    fn registration_races_with_fan_out() {
        let reg = ObserverRegistry::new("/players");
        let (stable, seen) = recorder();
        reg.register("stable", stable);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..500 {
                    let id = format!("c{}", i % 8);
                    reg.register(&id, Arc::new(|_: Notification| {}));
                    reg.unregister(&id);
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    reg.notify_changed_for_all_clients();
                }
            });
        });
        assert_eq!(seen.lock().len(), 500);
        assert_eq!(reg.len(), 1);
    }
}
