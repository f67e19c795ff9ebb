use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::payload::{Event, Payload};
use crate::registry::{validate_name, Batch, EventKey, ListenerId, ListenerRegistry};

/// Cloneable handle to a shared [`ListenerRegistry`].
///
/// This is what a reader hands back to the application: listeners added
/// through any clone are seen by the decoder feeding the same registry.
/// Listeners are always invoked outside the lock, so a listener may call
/// `on`/`off` on the handle it was registered through.
#[derive(Clone, Default)]
pub struct Events {
    registry: Arc<RwLock<ListenerRegistry>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing registry.
    pub fn from_registry(registry: ListenerRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    /// Register a listener for one event name. Empty names are rejected.
    pub fn on<F>(&self, name: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.write().on(name, listener)
    }

    /// Register a wildcard listener.
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &Payload) + Send + Sync + 'static,
    {
        self.write().on_any(listener)
    }

    /// Shorthand for [`Events::on_any`].
    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &Payload) + Send + Sync + 'static,
    {
        self.on_any(listener)
    }

    /// See [`ListenerRegistry::off`].
    pub fn off(&self, key: &EventKey, id: Option<ListenerId>) {
        self.write().off(key, id);
    }

    /// Remove a wildcard listener, or all of them when `id` is `None`.
    pub fn off_any(&self, id: Option<ListenerId>) {
        self.write().off_any(id);
    }

    pub fn clear(&self, key: &EventKey) {
        self.write().clear(key);
    }

    pub fn clear_all(&self) {
        self.write().clear_all();
    }

    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.read().listener_count(key)
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.read().has_listeners(name)
    }

    /// Snapshot the exact-name and wildcard lists for `name` in one lock.
    pub fn snapshot_for(&self, name: &str) -> (Option<Batch>, Option<Batch>) {
        let registry = self.read();
        (
            registry.snapshot(&EventKey::named(name)),
            registry.snapshot(&EventKey::Wildcard),
        )
    }

    /// Synchronously call the exact-name listeners of `name`.
    pub fn emit(&self, name: &str, payload: &Payload) -> Result<bool> {
        validate_name(name)?;
        let batch = self.read().snapshot(&EventKey::named(name));
        Ok(invoke(batch, name, payload))
    }

    /// Synchronously call the wildcard listeners for an event named `name`.
    pub fn emit_any(&self, name: &str, payload: &Payload) -> Result<bool> {
        validate_name(name)?;
        let batch = self.read().snapshot(&EventKey::Wildcard);
        Ok(invoke(batch, name, payload))
    }

    /// Registered keys, sorted with the wildcard last.
    pub fn keys(&self) -> Vec<EventKey> {
        let mut keys: Vec<EventKey> = self.read().keys().cloned().collect();
        keys.sort_by(|a, b| match (a, b) {
            (EventKey::Named(a), EventKey::Named(b)) => a.cmp(b),
            (EventKey::Named(_), EventKey::Wildcard) => std::cmp::Ordering::Less,
            (EventKey::Wildcard, EventKey::Named(_)) => std::cmp::Ordering::Greater,
            (EventKey::Wildcard, EventKey::Wildcard) => std::cmp::Ordering::Equal,
        });
        keys
    }

    fn read(&self) -> RwLockReadGuard<'_, ListenerRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListenerRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invoke(batch: Option<Batch>, name: &str, payload: &Payload) -> bool {
    match batch {
        Some(batch) => {
            batch.invoke(&Event::new(name, payload.clone()));
            true
        }
        None => false,
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Events").field(&*self.read()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[test]
    fn clones_share_listeners() {
        let events = Events::new();
        let other = events.clone();
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let hits = Arc::clone(&hits);
            other
                .on("foo", move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        assert_eq!(events.listener_count(&"foo".into()), 1);
        assert!(events.emit("foo", &Payload::None).unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listen_registers_wildcard() {
        let events = Events::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = Arc::clone(&seen);
            events.listen(move |name, payload| {
                seen.lock().unwrap().push((name.to_string(), payload.clone()));
            })
        };

        events.emit_any("b:ok", &Payload::from(json!(200))).unwrap();
        events.off_any(Some(id));
        assert!(!events.emit_any("b:ok", &Payload::None).unwrap());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("b:ok".to_string(), Payload::from(json!(200)))]
        );
    }

    #[test]
    fn listener_may_modify_registry_during_emit() {
        let events = Events::new();
        let handle = events.clone();
        events
            .on("foo", move |_| {
                handle.on("bar", |_| {}).unwrap();
            })
            .unwrap();

        assert!(events.emit("foo", &Payload::None).unwrap());
        assert_eq!(events.listener_count(&"bar".into()), 1);
    }

    #[test]
    fn keys_are_sorted_with_wildcard_last() {
        let events = Events::new();
        events.on_any(|_, _| {});
        events.on("zeta", |_| {}).unwrap();
        events.on("alpha", |_| {}).unwrap();

        assert_eq!(
            events.keys(),
            vec![
                EventKey::named("alpha"),
                EventKey::named("zeta"),
                EventKey::Wildcard
            ]
        );
    }

    #[test]
    fn snapshot_for_returns_both_lists() {
        let events = Events::new();
        events.on("foo", |_| {}).unwrap();

        let (exact, wildcard) = events.snapshot_for("foo");
        assert_eq!(exact.map(|b| b.len()), Some(1));
        assert!(wildcard.is_none());

        events.on_any(|_, _| {});
        let (exact, wildcard) = events.snapshot_for("other");
        assert!(exact.is_none());
        assert_eq!(wildcard.map(|b| b.len()), Some(1));
    }
}
