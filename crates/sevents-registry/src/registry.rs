use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::trace;

use crate::error::{RegistryError, Result};
use crate::payload::{Event, Payload};

/// Listener callback as stored in the registry.
///
/// Every callback receives the event name and the body. Exact-name
/// listeners registered through [`ListenerRegistry::on`] are wrapped so the
/// name is dropped before the user closure is called.
pub type Callback = Arc<dyn Fn(&str, &Payload) + Send + Sync>;

/// Key a listener list is stored under.
///
/// The wildcard is its own variant, so no event name can collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Named(String),
    Wildcard,
}

impl EventKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Wildcard => f.write_str("<any>"),
        }
    }
}

/// Identity of one registration, returned by `on` and accepted by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    callback: Callback,
}

/// Snapshot of one listener list, taken when a dispatch is scheduled.
///
/// Later `on`/`off` calls do not change a batch that already exists.
#[derive(Clone)]
pub struct Batch {
    key: EventKey,
    callbacks: Vec<Callback>,
}

impl Batch {
    /// Invoke every listener in registration order with the same arguments.
    pub fn invoke(&self, event: &Event) {
        for callback in &self.callbacks {
            callback(&event.name, &event.payload);
        }
    }

    /// Invoke every listener in registration order, each under its own
    /// `catch_unwind`.
    ///
    /// A panicking listener does not stop the ones after it. `on_panic`
    /// receives the position of the listener and its panic payload.
    pub fn invoke_each<F>(&self, event: &Event, mut on_panic: F)
    where
        F: FnMut(usize, Box<dyn Any + Send>),
    {
        for (index, callback) in self.callbacks.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                callback(&event.name, &event.payload);
            }));
            if let Err(panic) = outcome {
                on_panic(index, panic);
            }
        }
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("key", &self.key)
            .field("listeners", &self.callbacks.len())
            .finish()
    }
}

/// Mapping from event key to its ordered listener list.
///
/// A key is present only while its list is non-empty.
#[derive(Default)]
pub struct ListenerRegistry {
    lists: HashMap<EventKey, Vec<Entry>>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event name.
    ///
    /// The listener receives the body only. Empty names are rejected, since
    /// no event can ever carry one.
    pub fn on<F>(&mut self, name: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        validate_name(name)?;
        let callback: Callback = Arc::new(move |_name: &str, payload: &Payload| listener(payload));
        Ok(self.insert(EventKey::named(name), callback))
    }

    /// Register a wildcard listener. It receives the event name and the body.
    pub fn on_any<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&str, &Payload) + Send + Sync + 'static,
    {
        self.insert(EventKey::Wildcard, Arc::new(listener))
    }

    /// Append an already-wrapped callback to the list for `key`.
    pub fn insert(&mut self, key: EventKey, callback: Callback) -> ListenerId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = ListenerId(self.next_id);
        trace!(key = %key, id = id.0, "listener registered");
        self.lists
            .entry(key)
            .or_default()
            .push(Entry { id, callback });
        id
    }

    /// Remove listeners for `key`.
    ///
    /// With no id the whole list goes. With an id only the first entry with
    /// that identity is removed, and the key is dropped once its list is
    /// empty. Unknown keys and ids are ignored.
    pub fn off(&mut self, key: &EventKey, id: Option<ListenerId>) {
        let Some(list) = self.lists.get_mut(key) else {
            return;
        };
        let Some(id) = id else {
            self.lists.remove(key);
            trace!(key = %key, "listener list removed");
            return;
        };
        if let Some(index) = list.iter().position(|entry| entry.id == id) {
            list.remove(index);
            trace!(key = %key, id = id.0, "listener removed");
        }
        if list.is_empty() {
            self.lists.remove(key);
        }
    }

    /// Remove a wildcard listener, or every wildcard listener when `id` is `None`.
    pub fn off_any(&mut self, id: Option<ListenerId>) {
        self.off(&EventKey::Wildcard, id);
    }

    /// Remove every listener for one key.
    pub fn clear(&mut self, key: &EventKey) {
        self.lists.remove(key);
    }

    /// Remove every listener for every key.
    pub fn clear_all(&mut self) {
        self.lists.clear();
    }

    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.lists.get(key).map_or(0, Vec::len)
    }

    /// Whether an event with this name would reach any listener.
    pub fn has_listeners(&self, name: &str) -> bool {
        self.lists.contains_key(&EventKey::Wildcard)
            || self.lists.contains_key(&EventKey::named(name))
    }

    /// Copy the current list for `key`, or `None` if nobody listens.
    pub fn snapshot(&self, key: &EventKey) -> Option<Batch> {
        self.lists.get(key).map(|list| Batch {
            key: key.clone(),
            callbacks: list.iter().map(|entry| Arc::clone(&entry.callback)).collect(),
        })
    }

    /// Keys that currently have listeners.
    pub fn keys(&self) -> impl Iterator<Item = &EventKey> {
        self.lists.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Synchronously call the exact-name listeners of `name`.
    ///
    /// Returns whether a list existed.
    pub fn emit(&self, name: &str, payload: &Payload) -> Result<bool> {
        validate_name(name)?;
        Ok(self.invoke(EventKey::named(name), name, payload))
    }

    /// Synchronously call the wildcard listeners for an event named `name`.
    pub fn emit_any(&self, name: &str, payload: &Payload) -> Result<bool> {
        validate_name(name)?;
        Ok(self.invoke(EventKey::Wildcard, name, payload))
    }

    fn invoke(&self, key: EventKey, name: &str, payload: &Payload) -> bool {
        match self.snapshot(&key) {
            Some(batch) => {
                batch.invoke(&Event::new(name, payload.clone()));
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, list) in &self.lists {
            map.entry(key, &list.len());
        }
        map.finish()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[test]
    fn on_appends_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();

        for label in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            registry
                .on("foo", move |_| log.lock().unwrap().push(label))
                .unwrap();
        }

        assert_eq!(registry.listener_count(&"foo".into()), 3);
        assert!(registry.emit("foo", &Payload::None).unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn wildcard_is_separate_from_star_name() {
        let mut registry = ListenerRegistry::new();
        registry.on_any(|_, _| {});

        assert_eq!(registry.listener_count(&EventKey::Wildcard), 1);
        assert_eq!(registry.listener_count(&"*".into()), 0);
        assert!(registry.has_listeners("anything"));
    }

    #[test]
    fn off_single_entry_removes_key() {
        let mut registry = ListenerRegistry::new();
        let id = registry.on("foo", |_| {}).unwrap();

        registry.off(&"foo".into(), Some(id));

        assert_eq!(registry.listener_count(&"foo".into()), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn off_multi_entry_keeps_remaining_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();

        let mut ids = Vec::new();
        for label in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            ids.push(
                registry
                    .on("foo", move |_| log.lock().unwrap().push(label))
                    .unwrap(),
            );
        }

        registry.off(&"foo".into(), Some(ids[1]));
        registry.emit("foo", &Payload::None).unwrap();

        assert_eq!(registry.listener_count(&"foo".into()), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn off_unknown_id_is_ignored() {
        let mut registry = ListenerRegistry::new();
        let kept = registry.on("foo", |_| {}).unwrap();
        let other = registry.on("bar", |_| {}).unwrap();

        registry.off(&"foo".into(), Some(other));

        assert_eq!(registry.listener_count(&"foo".into()), 1);
        registry.off(&"foo".into(), Some(kept));
        assert_eq!(registry.listener_count(&"foo".into()), 0);
    }

    #[test]
    fn off_without_id_removes_whole_list() {
        let mut registry = ListenerRegistry::new();
        registry.on_any(|_, _| {});
        registry.on_any(|_, _| {});
        registry.on("foo", |_| {}).unwrap();

        registry.off_any(None);

        assert_eq!(registry.listener_count(&EventKey::Wildcard), 0);
        assert_eq!(registry.listener_count(&"foo".into()), 1);
    }

    #[test]
    fn clear_one_and_all() {
        let mut registry = ListenerRegistry::new();
        registry.on("foo", |_| {}).unwrap();
        registry.on("bar", |_| {}).unwrap();
        registry.on_any(|_, _| {});

        registry.clear(&"foo".into());
        assert_eq!(registry.listener_count(&"foo".into()), 0);
        assert_eq!(registry.listener_count(&"bar".into()), 1);

        registry.clear_all();
        assert!(registry.is_empty());
        assert_eq!(registry.keys().count(), 0);
    }

    #[test]
    fn emit_passes_name_to_wildcard_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        {
            let seen = Arc::clone(&seen);
            registry
                .on("foo", move |payload| {
                    seen.lock().unwrap().push(("exact".to_string(), payload.clone()));
                })
                .unwrap();
        }
        {
            let seen = Arc::clone(&seen);
            registry.on_any(move |name, payload| {
                seen.lock().unwrap().push((name.to_string(), payload.clone()));
            });
        }

        let body = Payload::from(json!({ "ok": true }));
        assert!(registry.emit("foo", &body).unwrap());
        assert!(registry.emit_any("foo", &body).unwrap());
        assert!(!registry.emit("missing", &body).unwrap());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("exact".to_string(), body.clone()));
        assert_eq!(seen[1], ("foo".to_string(), body));
    }

    #[test]
    fn emit_rejects_empty_name() {
        let registry = ListenerRegistry::new();
        let err = registry.emit("", &Payload::None).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }));
    }

    #[test]
    fn on_rejects_empty_name() {
        let mut registry = ListenerRegistry::new();
        let err = registry.on("", |_| {}).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn invoke_each_runs_listeners_after_a_panic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.on("foo", |_| panic!("first listener")).unwrap();
        {
            let log = Arc::clone(&log);
            registry
                .on("foo", move |_| log.lock().unwrap().push("second"))
                .unwrap();
        }

        let batch = registry.snapshot(&"foo".into()).unwrap();
        let mut panicked = Vec::new();
        batch.invoke_each(&Event::new("foo", Payload::None), |index, _| {
            panicked.push(index)
        });

        assert_eq!(panicked, vec![0]);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_changes() {
        let mut registry = ListenerRegistry::new();
        let id = registry.on("foo", |_| {}).unwrap();
        let batch = registry.snapshot(&"foo".into()).unwrap();

        registry.off(&"foo".into(), Some(id));
        registry.on("foo", |_| {}).unwrap();
        registry.on("foo", |_| {}).unwrap();

        assert_eq!(batch.len(), 1);
        assert!(registry.snapshot(&"missing".into()).is_none());
    }

    #[test]
    fn ids_are_unique_per_registration() {
        let mut registry = ListenerRegistry::new();
        let first = registry.on("foo", |_| {}).unwrap();
        let second = registry.on("foo", |_| {}).unwrap();
        assert_ne!(first, second);
        assert!(second.as_u64() > first.as_u64());
    }
}
