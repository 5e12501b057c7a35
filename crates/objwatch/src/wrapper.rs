#![forbid(unsafe_code)]

//! Interception layer over an [`Object`].
//!
//! A [`Wrapper`] routes every read, write and delete of its target through
//! an [`ObservationConfig`]:
//!
//! - **get** rebinds function values to the target, substitutes a nested
//!   wrapper for object values whose property requests nested observation,
//!   and finally lets an `on_get` hook replace the result.
//! - **set** is a no-op for strictly identical values. Otherwise it stores
//!   the raw value, then runs `on_set`, the whole-object `on_change` and the
//!   per-property `on_change`, in that order.
//! - **delete** always removes the property with its nested wrapper and
//!   always reports a [`PropertyState::Deleted`] record.
//!
//! # Invariants
//!
//! 1. At most one live wrapper is registered per target; [`wrap`] returns
//!    it instead of creating another.
//! 2. An identical re-assignment emits nothing and runs no hook.
//! 3. A nested wrapper is created only for properties that request it, on
//!    first qualifying read (or eagerly on a qualifying write), and reused
//!    while the property keeps the same object.
//! 4. Wrappers are never stored into targets; writes unwrap
//!    [`Value::Observed`] first.
//! 5. Non-configurable properties are returned untouched.
//!
//! # Re-entrancy
//!
//! No `RefCell` borrow is held while a hook runs. Hooks may read and write
//! the wrapper that invoked them.
//!
//! # Failure Modes
//!
//! Hook failures are returned as [`ObserveError::Hook`] and never
//! swallowed. Because storage happens before dispatch, a failing `on_set`
//! or `on_change` leaves the new value in place; a failing whole-object
//! `on_change` skips the per-property one.
//!
//! [`PropertyState::Deleted`]: crate::change::PropertyState::Deleted

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::{debug, trace, warn};

use crate::change::ChangeRecord;
use crate::config::{ChangeHook, ObservationConfig, PropertyOptions};
use crate::error::{HookError, ObserveError, Result};
use crate::registry;
use crate::value::{Object, Value};

/// Wrap `target` for observation.
///
/// Returns the wrapper already registered for the object if there is one
/// (ignoring `config`). Wrapping a [`Value::Observed`] returns that wrapper.
///
/// # Errors
///
/// [`ObserveError::NotAnObject`] for any other kind of value.
pub fn wrap(target: &Value, config: ObservationConfig) -> Result<Wrapper> {
    match target {
        Value::Object(object) => Ok(wrap_object(object, config)),
        Value::Observed(wrapper) => Ok(wrapper.clone()),
        other => Err(ObserveError::NotAnObject { kind: other.kind() }),
    }
}

/// Infallible form of [`wrap`] for callers holding an [`Object`].
pub fn wrap_object(target: &Object, config: ObservationConfig) -> Wrapper {
    if let Some(existing) = registry::lookup(target) {
        debug!(message = "observe.wrap.reuse", object_id = target.id());
        return existing;
    }
    let wrapper = Wrapper::create(target.clone(), config);
    registry::register(target, &wrapper);
    debug!(
        message = "observe.wrap.create",
        object_id = target.id(),
        transparent = wrapper.config().is_transparent()
    );
    wrapper
}

/// The registered wrapper of an object as [`Value::Observed`], or the input
/// unchanged when there is none.
#[must_use]
pub fn wrapper_of(target: &Value) -> Value {
    match target {
        Value::Object(object) => {
            registry::lookup(object).map_or_else(|| target.clone(), Value::Observed)
        }
        other => other.clone(),
    }
}

pub(crate) struct WrapperInner {
    target: Object,
    config: ObservationConfig,
    /// Nested wrappers keyed by property name.
    nested: RefCell<AHashMap<String, Wrapper>>,
}

/// Observing handle over an [`Object`].
///
/// Cloning a `Wrapper` creates a new handle to the **same** wrapper.
#[derive(Clone)]
pub struct Wrapper {
    inner: Rc<WrapperInner>,
}

impl Wrapper {
    /// Build a wrapper without consulting or updating the registry.
    pub(crate) fn create(target: Object, config: ObservationConfig) -> Self {
        Self {
            inner: Rc::new(WrapperInner {
                target,
                config,
                nested: RefCell::new(AHashMap::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<WrapperInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<WrapperInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// The live wrapper registered for `target`, if any.
    #[must_use]
    pub fn lookup(target: &Object) -> Option<Self> {
        registry::lookup(target)
    }

    /// The observed object.
    #[must_use]
    pub fn target(&self) -> &Object {
        &self.inner.target
    }

    #[must_use]
    pub fn config(&self) -> &ObservationConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same wrapper.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Interception ─────────────────────────────────────────────────

    /// Read a property through the wrapper.
    ///
    /// # Errors
    ///
    /// [`ObserveError::Hook`] if the property's `on_get` hook fails.
    pub fn get(&self, property: &str) -> Result<Value> {
        let raw = self.inner.target.get(property);
        let options = self.inner.config.options(property);

        let value = if raw.is_truthy() {
            self.intercept_read(property, raw, options)
        } else {
            raw
        };
        if options.is_some_and(PropertyOptions::requests_nesting)
            && !matches!(value, Value::Observed(_))
        {
            // The target no longer holds a wrappable object here.
            self.evict_nested(property);
        }
        trace!(message = "observe.get", property, kind = %value.kind());

        if let Some(on_get) = options.and_then(PropertyOptions::get_hook) {
            match on_get(&value) {
                Ok(Some(substitute)) if !substitute.is_undefined() => return Ok(substitute),
                Ok(_) => {}
                Err(source) => return Err(hook_failed(property, source)),
            }
        }
        Ok(value)
    }

    /// Write a property through the wrapper.
    ///
    /// # Errors
    ///
    /// - [`ObserveError::ReadOnly`] if the existing property is not writable
    ///   (nothing is changed).
    /// - [`ObserveError::Hook`] if `on_set` or an `on_change` hook fails. The
    ///   new value is already stored at that point.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into().into_raw();
        let target = &self.inner.target;
        let previous = target.get(property);

        if previous.strict_eq(&value) {
            trace!(message = "observe.set.unchanged", property);
            return Ok(());
        }

        let descriptor = target.descriptor(property);
        if descriptor.is_some_and(|d| !d.writable) {
            return Err(ObserveError::ReadOnly {
                property: property.to_owned(),
            });
        }

        let options = self.inner.config.options(property);
        self.evict_nested(property);
        if let (Value::Object(child), Some(options)) = (&value, options) {
            let configurable = descriptor.is_none_or(|d| d.configurable);
            if configurable && options.requests_nesting() {
                self.nested(property, child, options);
            }
        }

        target.set(property, value.clone());
        trace!(message = "observe.set", property, state = "updated");

        if let Some(on_set) = options.and_then(PropertyOptions::set_hook) {
            on_set(&value).map_err(|source| hook_failed(property, source))?;
        }

        let record = ChangeRecord::updated(property, value, previous);
        self.notify(&record, options.and_then(PropertyOptions::change_hook))
    }

    /// Delete a property through the wrapper.
    ///
    /// Deleting is unconditional: even a missing property produces a
    /// [`Deleted`](crate::change::PropertyState::Deleted) record.
    ///
    /// # Errors
    ///
    /// - [`ObserveError::NonConfigurable`] if the property cannot be removed
    ///   (nothing is changed, nothing is reported).
    /// - [`ObserveError::Hook`] if the whole-object `on_change` hook fails.
    pub fn delete(&self, property: &str) -> Result<()> {
        let target = &self.inner.target;
        let previous = target.get(property);

        if !target.delete(property) {
            return Err(ObserveError::NonConfigurable {
                property: property.to_owned(),
            });
        }
        self.evict_nested(property);
        trace!(message = "observe.delete", property, state = "deleted");

        let record = ChangeRecord::deleted(property, previous);
        self.notify(&record, None)
    }

    /// Read a function-valued property and call it with this wrapper as the
    /// receiver. Rebound functions run against the raw target instead.
    ///
    /// # Errors
    ///
    /// - [`ObserveError::NotCallable`] if the property is not a function.
    /// - [`ObserveError::Hook`] if the read or the function body fails.
    pub fn call(&self, property: &str, args: &[Value]) -> Result<Value> {
        match self.get(property)? {
            Value::Function(function) => function
                .call(&Value::Observed(self.clone()), args)
                .map_err(|source| hook_failed(property, source)),
            _ => Err(ObserveError::NotCallable {
                property: property.to_owned(),
            }),
        }
    }

    // ── Plain reads ──────────────────────────────────────────────────

    #[must_use]
    pub fn has(&self, property: &str) -> bool {
        self.inner.target.has(property)
    }

    /// Enumerable keys of the target, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.target.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.target.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.target.is_empty()
    }

    /// Cached nested wrapper for `property`, without creating one.
    #[must_use]
    pub fn nested_cached(&self, property: &str) -> Option<Self> {
        self.inner.nested.borrow().get(property).cloned()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn intercept_read(
        &self,
        property: &str,
        raw: Value,
        options: Option<&PropertyOptions>,
    ) -> Value {
        let configurable = self
            .inner
            .target
            .descriptor(property)
            .is_none_or(|d| d.configurable);
        if !configurable {
            return raw;
        }
        match raw {
            Value::Function(function) => {
                Value::Function(function.bind(Value::Object(self.inner.target.clone())))
            }
            Value::Object(child) => match options {
                Some(options) if options.requests_nesting() => {
                    Value::Observed(self.nested(property, &child, options))
                }
                _ => Value::Object(child),
            },
            other => other,
        }
    }

    /// Fetch the nested wrapper for `property`, creating it when the cache
    /// is empty or holds a wrapper of a different object.
    fn nested(&self, property: &str, child: &Object, options: &PropertyOptions) -> Self {
        let cached = self.nested_cached(property);
        if let Some(cached) = cached.filter(|w| w.target().ptr_eq(child)) {
            return cached;
        }

        let nested = Self::create(child.clone(), options.nested_config());
        let registered = registry::register(child, &nested);
        debug!(
            message = "observe.nested.create",
            property,
            object_id = child.id(),
            registered
        );
        let stale = self
            .inner
            .nested
            .borrow_mut()
            .insert(property.to_owned(), nested.clone());
        drop(stale);
        nested
    }

    fn evict_nested(&self, property: &str) {
        let stale = self.inner.nested.borrow_mut().remove(property);
        drop(stale);
    }

    fn notify(&self, record: &ChangeRecord, per_property: Option<&ChangeHook>) -> Result<()> {
        if let Some(on_change) = self.inner.config.change_hook() {
            on_change(record).map_err(|source| hook_failed(&record.name, source))?;
        }
        if let Some(on_change) = per_property {
            on_change(record).map_err(|source| hook_failed(&record.name, source))?;
        }
        Ok(())
    }
}

fn hook_failed(property: &str, source: HookError) -> ObserveError {
    warn!(message = "observe.hook.failed", property, error = %source);
    ObserveError::hook(property, source)
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nested: Vec<String> = match self.inner.nested.try_borrow() {
            Ok(nested) => {
                let mut keys: Vec<String> = nested.keys().cloned().collect();
                keys.sort();
                keys
            }
            Err(_) => Vec::new(),
        };
        f.debug_struct("Wrapper")
            .field("target", &self.inner.target)
            .field("config", &self.inner.config)
            .field("nested", &nested)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
