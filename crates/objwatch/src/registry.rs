//! Identity map from observed objects to their wrappers.
//!
//! The map lives beside the objects, not inside them, so observing an object
//! never adds a property to it. Entries hold `Weak` handles: the registry
//! never keeps a wrapper alive, and a wrapper whose last handle is dropped
//! simply stops being found.
//!
//! Keys are object allocation addresses. A live entry always belongs to its
//! object, because the wrapper it upgrades to holds a strong handle to that
//! object, so the address cannot have been reused. Dead entries are pruned
//! lazily when the map grows.

use std::cell::RefCell;
use std::rc::Weak;

use ahash::AHashMap;
use tracing::trace;

use crate::value::Object;
use crate::wrapper::{Wrapper, WrapperInner};

const MIN_PRUNE_THRESHOLD: usize = 64;

struct Registry {
    entries: AHashMap<usize, Weak<WrapperInner>>,
    prune_at: usize,
}

impl Registry {
    fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
        trace!(
            message = "observe.registry.prune",
            removed = before - self.entries.len(),
            live = self.entries.len()
        );
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Live wrapper registered for `target`, if any.
pub(crate) fn lookup(target: &Object) -> Option<Wrapper> {
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .entries
            .get(&target.id())
            .and_then(Wrapper::upgrade)
    })
}

/// Register `wrapper` for `target` unless a live wrapper is already
/// registered. Returns `true` if `wrapper` was recorded.
pub(crate) fn register(target: &Object, wrapper: &Wrapper) -> bool {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let id = target.id();
        if registry
            .entries
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
        {
            return false;
        }
        registry.entries.insert(id, wrapper.downgrade());
        if registry.entries.len() >= registry.prune_at {
            registry.prune();
        }
        true
    })
}

/// Number of registered wrappers that are still alive on this thread.
#[must_use]
pub fn live_wrappers() -> usize {
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    })
}
