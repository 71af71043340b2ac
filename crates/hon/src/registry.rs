//! Process-wide registry of live account sessions
//!
//! Maps a domain key to the sessions of its integration instances plus an
//! opaque coordinator namespace used by platform modules. A domain key
//! exists exactly while at least one instance is registered under it.
//!
//! All operations take a single lock, so the "last instance gone, drop the
//! domain" check in [`SessionRegistry::unregister`] cannot interleave with
//! another unload under the same domain.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Type-erased per-device helper owned by platform modules
pub type Coordinator = Arc<dyn Any + Send + Sync>;

struct DomainData<S: ?Sized> {
    sessions: HashMap<String, Arc<S>>,
    coordinators: HashMap<String, Coordinator>,
}

impl<S: ?Sized> Default for DomainData<S> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
            coordinators: HashMap::new(),
        }
    }
}

/// Registry of sessions keyed by (domain, instance id)
pub struct SessionRegistry<S: ?Sized> {
    domains: Mutex<HashMap<String, DomainData<S>>>,
}

impl<S: ?Sized> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
        }
    }

    fn domains(&self) -> MutexGuard<'_, HashMap<String, DomainData<S>>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session, creating the domain key (with an empty
    /// coordinator namespace) on first use.
    ///
    /// Returns the session it displaced, if any.
    pub fn register(&self, domain: &str, instance_id: &str, session: Arc<S>) -> Option<Arc<S>> {
        self.domains()
            .entry(domain.to_string())
            .or_default()
            .sessions
            .insert(instance_id.to_string(), session)
    }

    pub fn lookup(&self, domain: &str, instance_id: &str) -> Option<Arc<S>> {
        self.domains()
            .get(domain)?
            .sessions
            .get(instance_id)
            .cloned()
    }

    /// Remove an instance's session, dropping the whole domain key when it
    /// was the last one.
    ///
    /// Returns true if the domain key was removed.
    pub fn unregister(&self, domain: &str, instance_id: &str) -> bool {
        let mut domains = self.domains();
        let Some(data) = domains.get_mut(domain) else {
            return false;
        };
        data.sessions.remove(instance_id);
        if data.sessions.is_empty() {
            domains.remove(domain);
            return true;
        }
        false
    }

    pub fn contains_domain(&self, domain: &str) -> bool {
        self.domains().contains_key(domain)
    }

    /// Instance ids registered under a domain, sorted
    pub fn instance_ids(&self, domain: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .domains()
            .get(domain)
            .map(|data| data.sessions.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Store a coordinator; false if the domain has no live instance
    pub fn insert_coordinator(&self, domain: &str, key: &str, coordinator: Coordinator) -> bool {
        match self.domains().get_mut(domain) {
            Some(data) => {
                data.coordinators.insert(key.to_string(), coordinator);
                true
            }
            None => false,
        }
    }

    /// Fetch a coordinator of a known type
    pub fn coordinator<T: Any + Send + Sync>(&self, domain: &str, key: &str) -> Option<Arc<T>> {
        let coordinator = self.domains().get(domain)?.coordinators.get(key)?.clone();
        coordinator.downcast::<T>().ok()
    }

    /// Fetch a coordinator, creating it under the same lock if missing.
    ///
    /// `None` if the domain has no live instance or the stored coordinator
    /// has a different type.
    pub fn get_or_insert_coordinator<T, F>(&self, domain: &str, key: &str, create: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut domains = self.domains();
        let data = domains.get_mut(domain)?;
        let coordinator = data
            .coordinators
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(create()) as Coordinator)
            .clone();
        coordinator.downcast::<T>().ok()
    }

    pub fn coordinator_count(&self, domain: &str) -> usize {
        self.domains()
            .get(domain)
            .map_or(0, |data| data.coordinators.len())
    }
}

impl<S: ?Sized> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_register_and_lookup() {
        let registry: SessionRegistry<str> = SessionRegistry::new();
        assert!(registry.register("hon", "a", Arc::from("session-a")).is_none());

        assert_eq!(registry.lookup("hon", "a").as_deref(), Some("session-a"));
        assert!(registry.lookup("hon", "b").is_none());
        assert!(registry.lookup("other", "a").is_none());
    }

    #[test]
    fn test_register_replaces_live_session() {
        let registry: SessionRegistry<str> = SessionRegistry::new();
        registry.register("hon", "a", Arc::from("first"));
        let displaced = registry.register("hon", "a", Arc::from("second"));

        assert_eq!(displaced.as_deref(), Some("first"));
        assert_eq!(registry.lookup("hon", "a").as_deref(), Some("second"));
        assert_eq!(registry.instance_ids("hon"), vec!["a"]);
    }

    #[test]
    fn test_unregister_prunes_last_instance_only() {
        let registry: SessionRegistry<str> = SessionRegistry::new();
        registry.register("hon", "a", Arc::from("a"));
        registry.register("hon", "b", Arc::from("b"));

        assert!(!registry.unregister("hon", "a"));
        assert!(registry.contains_domain("hon"));
        assert!(registry.unregister("hon", "b"));
        assert!(!registry.contains_domain("hon"));
        assert!(!registry.unregister("hon", "b"));
    }

    #[test]
    fn test_coordinators_typed_access() {
        let registry: SessionRegistry<str> = SessionRegistry::new();
        assert!(!registry.insert_coordinator("hon", "dev1", Arc::new(1u32)));

        registry.register("hon", "a", Arc::from("a"));
        assert!(registry.insert_coordinator("hon", "dev1", Arc::new(7u32)));
        assert_eq!(registry.coordinator::<u32>("hon", "dev1").as_deref(), Some(&7));
        assert!(registry.coordinator::<String>("hon", "dev1").is_none());

        let created = registry
            .get_or_insert_coordinator("hon", "dev2", || "poller".to_string())
            .unwrap();
        let again = registry
            .get_or_insert_coordinator("hon", "dev2", || "other".to_string())
            .unwrap();
        assert!(Arc::ptr_eq(&created, &again));
        assert_eq!(registry.coordinator_count("hon"), 2);

        // coordinators go away with the domain
        registry.unregister("hon", "a");
        assert_eq!(registry.coordinator_count("hon"), 0);
    }

    #[test]
    fn test_concurrent_unregister_prunes_exactly_once() {
        let registry: Arc<SessionRegistry<str>> = Arc::new(SessionRegistry::new());
        let ids: Vec<String> = (0..32).map(|i| format!("instance-{i}")).collect();
        for id in &ids {
            registry.register("hon", id, Arc::from(id.as_str()));
        }

        let pruned = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for id in &ids {
                let registry = &registry;
                let pruned = &pruned;
                scope.spawn(move || {
                    if registry.unregister("hon", id) {
                        pruned.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(pruned.load(Ordering::SeqCst), 1);
        assert!(!registry.contains_domain("hon"));
    }
}
