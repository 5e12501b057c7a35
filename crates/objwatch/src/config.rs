//! Observation configuration.
//!
//! An [`ObservationConfig`] is attached to a wrapper when it is created and
//! never changes afterwards. It holds one whole-object change hook and a
//! table of [`PropertyOptions`] keyed by property name. A lookup that misses
//! the table means "no options for this property", so options naming
//! properties the target does not have are harmless.
//!
//! Hooks are stored behind `Rc` so configurations are cheap to clone; nested
//! wrappers receive a derived copy of their parent's per-property options.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::change::ChangeRecord;
use crate::error::HookResult;
use crate::value::Value;

/// Hook receiving a change record.
pub type ChangeHook = Rc<dyn Fn(&ChangeRecord) -> HookResult>;

/// Hook receiving the value just stored.
pub type SetHook = Rc<dyn Fn(&Value) -> HookResult>;

/// Hook receiving the value about to be returned by a read. Returning
/// `Some(v)` with `v` not `Undefined` substitutes `v`.
pub type GetHook = Rc<dyn Fn(&Value) -> HookResult<Option<Value>>>;

/// Per-property options.
#[derive(Clone, Default)]
pub struct PropertyOptions {
    enable_nested_observation: bool,
    on_change: Option<ChangeHook>,
    on_set: Option<SetHook>,
    on_get: Option<GetHook>,
    config: Option<Box<ObservationConfig>>,
}

impl PropertyOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the property's object value through its own wrapper.
    #[must_use]
    pub fn nested(mut self) -> Self {
        self.enable_nested_observation = true;
        self
    }

    /// Hook for changes to this property. When the property holds an
    /// object, changes to that object's own properties are reported here
    /// too.
    #[must_use]
    pub fn on_change(mut self, hook: impl Fn(&ChangeRecord) -> HookResult + 'static) -> Self {
        self.on_change = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_set(mut self, hook: impl Fn(&Value) -> HookResult + 'static) -> Self {
        self.on_set = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_get(
        mut self,
        hook: impl Fn(&Value) -> HookResult<Option<Value>> + 'static,
    ) -> Self {
        self.on_get = Some(Rc::new(hook));
        self
    }

    /// Configuration for the nested wrapper. Implies nested observation.
    #[must_use]
    pub fn with_config(mut self, config: ObservationConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    /// Whether an object value of this property gets its own wrapper.
    #[must_use]
    pub fn requests_nesting(&self) -> bool {
        self.enable_nested_observation || self.on_change.is_some() || self.config.is_some()
    }

    #[must_use]
    pub fn change_hook(&self) -> Option<&ChangeHook> {
        self.on_change.as_ref()
    }

    #[must_use]
    pub fn set_hook(&self) -> Option<&SetHook> {
        self.on_set.as_ref()
    }

    #[must_use]
    pub fn get_hook(&self) -> Option<&GetHook> {
        self.on_get.as_ref()
    }

    /// Configuration handed to the nested wrapper: the explicit nested
    /// configuration, with this property's change hook chained after its
    /// whole-object hook.
    pub(crate) fn nested_config(&self) -> ObservationConfig {
        let mut config = self
            .config
            .as_deref()
            .cloned()
            .unwrap_or_default();
        if let Some(outer) = &self.on_change {
            let outer = Rc::clone(outer);
            config.on_change = Some(match config.on_change.take() {
                None => outer,
                Some(inner) => Rc::new(move |record: &ChangeRecord| {
                    inner(record)?;
                    outer(record)
                }),
            });
        }
        config
    }
}

impl fmt::Debug for PropertyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyOptions")
            .field("enable_nested_observation", &self.enable_nested_observation)
            .field("on_change", &self.on_change.is_some())
            .field("on_set", &self.on_set.is_some())
            .field("on_get", &self.on_get.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Whole-object change hook plus per-property options.
///
/// An empty configuration makes a wrapper fully transparent.
#[derive(Clone, Default)]
pub struct ObservationConfig {
    on_change: Option<ChangeHook>,
    properties: AHashMap<String, PropertyOptions>,
}

impl ObservationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook invoked for every update and deletion on the wrapped object.
    #[must_use]
    pub fn on_change(mut self, hook: impl Fn(&ChangeRecord) -> HookResult + 'static) -> Self {
        self.on_change = Some(Rc::new(hook));
        self
    }

    /// Set the options for one property, replacing earlier options.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, options: PropertyOptions) -> Self {
        self.properties.insert(name.into(), options);
        self
    }

    #[must_use]
    pub fn options(&self, name: &str) -> Option<&PropertyOptions> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn change_hook(&self) -> Option<&ChangeHook> {
        self.on_change.as_ref()
    }

    /// True when the configuration installs no hooks and no nesting.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.on_change.is_none() && self.properties.is_empty()
    }
}

impl fmt::Debug for ObservationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.properties.keys().collect();
        names.sort();
        f.debug_struct("ObservationConfig")
            .field("on_change", &self.on_change.is_some())
            .field("properties", &names)
            .finish()
    }
}
