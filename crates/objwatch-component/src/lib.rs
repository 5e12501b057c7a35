#![forbid(unsafe_code)]

//! Component adapter for observed state.
//!
//! A [`Component`] keeps its state in an observed [`Object`]. The [`Host`]
//! owns one instance across render cycles and wires the observation hooks:
//!
//! - any change to the state object calls [`Component::on_changes`] and
//!   then requests a re-render through the dispatch callback installed by
//!   [`Host::mount`];
//! - changes to the `props` object (or to any of its properties) call
//!   [`Component::on_props_change`];
//! - [`Host::render`] applies incoming props through the observed `props`
//!   object before calling [`Component::render`], so a parent's new props are
//!   reported like any other change.
//!
//! Re-render requests raised while a render is in progress are dropped: the
//! render already reflects them.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use objwatch::{HookResult, Object};
//! use objwatch_component::{Component, Host, View};
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     type Output = String;
//!
//!     fn render(&self, view: &View) -> HookResult<String> {
//!         let label = view.prop("label")?;
//!         let count = view.state().get("count")?;
//!         Ok(format!("{}: {}", label.as_str().unwrap_or("?"), count.as_number().unwrap_or(0.0)))
//!     }
//! }
//!
//! let renders = Rc::new(Cell::new(0));
//! let host = Host::new(Counter, &Object::new().with("label", "clicks"));
//! let counter = Rc::clone(&renders);
//! host.mount(move || counter.set(counter.get() + 1))?;
//!
//! assert_eq!(host.render(&Object::new().with("label", "clicks"))?, "clicks: 0");
//! host.view().state().set("count", 1)?;
//! assert_eq!(renders.get(), 1);
//! # Ok::<(), objwatch_component::ComponentError>(())
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use objwatch::{
    ChangeRecord, HookError, HookResult, Object, ObservationConfig, ObserveError, PropertyOptions,
    Value, Wrapper, wrap_object,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Name of the state property holding the component's props.
pub const PROPS: &str = "props";

/// Name of the state property holding the children passed with the props.
pub const CHILDREN: &str = "children";

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Observe(#[from] ObserveError),

    #[error("cannot update the view before the component is mounted")]
    NotMounted,

    #[error("component {stage} failed: {source}")]
    Component {
        stage: &'static str,
        #[source]
        source: HookError,
    },
}

impl ComponentError {
    fn stage(stage: &'static str) -> impl FnOnce(HookError) -> Self {
        move |source| Self::Component { stage, source }
    }
}

/// A unit of UI whose state lives in an observed object.
///
/// All methods but [`render`](Component::render) have empty defaults.
pub trait Component: 'static {
    type Output;

    /// Called once, when the host is mounted.
    fn on_init(&self, _view: &View) -> HookResult {
        Ok(())
    }

    /// Called for every change of the state object's own properties.
    fn on_changes(&self, _view: &View, _record: &ChangeRecord) -> HookResult {
        Ok(())
    }

    /// Called when `props` is replaced or one of its properties changes.
    fn on_props_change(&self, _view: &View, _record: &ChangeRecord) -> HookResult {
        Ok(())
    }

    /// Called at the start of every render cycle.
    fn setup_hooks(&self, _view: &View) -> HookResult {
        Ok(())
    }

    fn render(&self, view: &View) -> HookResult<Self::Output>;
}

/// Callback requesting a re-render.
pub type Dispatch = Rc<dyn Fn()>;

#[derive(Default)]
struct Mount {
    dispatch: RefCell<Option<Dispatch>>,
    rendering: Cell<bool>,
}

/// What a component sees of itself: its observed state, the props it was
/// created with, and the ability to request a re-render.
#[derive(Clone)]
pub struct View {
    state: Wrapper,
    original_props: Object,
    mount: Rc<Mount>,
}

impl View {
    /// The observed state object.
    #[must_use]
    pub fn state(&self) -> &Wrapper {
        &self.state
    }

    /// Props exactly as passed to [`Host::new`].
    #[must_use]
    pub fn original_props(&self) -> &Object {
        &self.original_props
    }

    /// Current props, observed.
    pub fn props(&self) -> objwatch::Result<Value> {
        self.state.get(PROPS)
    }

    /// One property of the current props.
    pub fn prop(&self, name: &str) -> objwatch::Result<Value> {
        self.props()?.property(name)
    }

    pub fn children(&self) -> objwatch::Result<Value> {
        self.state.get(CHILDREN)
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mount.dispatch.borrow().is_some()
    }

    /// Request a re-render.
    ///
    /// # Errors
    ///
    /// [`ComponentError::NotMounted`] before [`Host::mount`].
    pub fn update_view(&self) -> Result<(), ComponentError> {
        let dispatch = self.mount.dispatch.borrow().clone();
        match dispatch {
            Some(dispatch) => {
                trace!(message = "component.update_view");
                dispatch();
                Ok(())
            }
            None => Err(ComponentError::NotMounted),
        }
    }

    /// Re-render request raised by a state change. Dropped while unmounted
    /// or rendering.
    fn request_render(&self) {
        if self.mount.rendering.get() {
            trace!(message = "component.update_view.skipped", reason = "rendering");
            return;
        }
        let dispatch = self.mount.dispatch.borrow().clone();
        if let Some(dispatch) = dispatch {
            dispatch();
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("state", &self.state)
            .field("mounted", &self.is_mounted())
            .field("rendering", &self.mount.rendering.get())
            .finish()
    }
}

struct Shared<C> {
    component: C,
    view: View,
    rendered: Cell<bool>,
}

/// Keeps one component instance alive across render cycles.
pub struct Host<C: Component> {
    shared: Rc<Shared<C>>,
}

impl<C: Component> Host<C> {
    /// Create the component's observed state from `props`.
    ///
    /// The state holds a copy of `props` (so later prop updates never touch
    /// the caller's object) and the props' `children`, if present.
    pub fn new(component: C, props: &Object) -> Self {
        let shared = Rc::new_cyclic(|weak: &Weak<Shared<C>>| {
            let props_copy = Object::new();
            props_copy.assign(props);
            let state = Object::new().with(PROPS, props_copy);
            let children = props.get(CHILDREN);
            if !children.is_undefined() {
                state.set(CHILDREN, children);
            }

            let state = wrap_object(&state, Self::config(weak));
            Shared {
                component,
                view: View {
                    state,
                    original_props: props.clone(),
                    mount: Rc::new(Mount::default()),
                },
                rendered: Cell::new(false),
            }
        });
        Self { shared }
    }

    fn config(weak: &Weak<Shared<C>>) -> ObservationConfig {
        let on_state = weak.clone();
        let on_props = weak.clone();
        ObservationConfig::new()
            .on_change(move |record| {
                let Some(shared) = on_state.upgrade() else {
                    return Ok(());
                };
                shared.component.on_changes(&shared.view, record)?;
                shared.view.request_render();
                Ok(())
            })
            .property(
                PROPS,
                PropertyOptions::new().on_change(move |record| {
                    let Some(shared) = on_props.upgrade() else {
                        return Ok(());
                    };
                    shared.component.on_props_change(&shared.view, record)
                }),
            )
    }

    /// Install the re-render callback and run [`Component::on_init`].
    ///
    /// Mounting again replaces the callback without re-running `on_init`.
    ///
    /// # Errors
    ///
    /// Failures of `on_init`.
    pub fn mount(&self, dispatch: impl Fn() + 'static) -> Result<(), ComponentError> {
        let first = self
            .shared
            .view
            .mount
            .dispatch
            .replace(Some(Rc::new(dispatch)))
            .is_none();
        debug!(message = "component.mount", first);
        if first {
            self.shared
                .component
                .on_init(&self.shared.view)
                .map_err(ComponentError::stage("on_init"))?;
        }
        Ok(())
    }

    /// Drop the re-render callback. Later [`View::update_view`] calls fail.
    pub fn unmount(&self) {
        let dispatch = self.shared.view.mount.dispatch.borrow_mut().take();
        drop(dispatch);
        debug!(message = "component.unmount");
    }

    /// Run one render cycle.
    ///
    /// From the second cycle on, `props` is applied to the observed props
    /// first: changed keys are written, keys no longer present are deleted,
    /// and `children` is replaced.
    ///
    /// # Errors
    ///
    /// Hook failures while applying props, and failures of `setup_hooks`
    /// or `render`.
    pub fn render(&self, props: &Object) -> Result<C::Output, ComponentError> {
        let shared = &self.shared;
        let mount = &shared.view.mount;
        let was_rendering = mount.rendering.replace(true);
        let result = self.render_cycle(props);
        mount.rendering.set(was_rendering);
        shared.rendered.set(true);
        result
    }

    fn render_cycle(&self, props: &Object) -> Result<C::Output, ComponentError> {
        let shared = &self.shared;
        let view = &shared.view;
        if shared.rendered.get() {
            self.apply_props(props)?;
        }
        shared
            .component
            .setup_hooks(view)
            .map_err(ComponentError::stage("setup_hooks"))?;
        shared
            .component
            .render(view)
            .map_err(ComponentError::stage("render"))
    }

    fn apply_props(&self, props: &Object) -> Result<(), ComponentError> {
        let view = &self.shared.view;
        let current = view.props()?;
        if let Some(current) = current.as_observed() {
            for key in props.keys() {
                current.set(&key, props.get(&key))?;
            }
            for key in current.keys() {
                if !props.has(&key) {
                    current.delete(&key)?;
                }
            }
        } else {
            // Props were replaced by a non-object; start over from a copy.
            let copy = Object::new();
            copy.assign(props);
            view.state.set(PROPS, copy)?;
        }
        view.state.set(CHILDREN, props.get(CHILDREN))?;
        Ok(())
    }

    #[must_use]
    pub fn view(&self) -> &View {
        &self.shared.view
    }

    #[must_use]
    pub fn component(&self) -> &C {
        &self.shared.component
    }

    /// Whether at least one render cycle has run.
    #[must_use]
    pub fn has_rendered(&self) -> bool {
        self.shared.rendered.get()
    }
}

impl<C: Component> fmt::Debug for Host<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("view", &self.shared.view)
            .field("rendered", &self.shared.rendered.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Component for Echo {
        type Output = Value;

        fn render(&self, view: &View) -> HookResult<Value> {
            Ok(view.prop("text")?)
        }
    }

    #[test]
    fn update_view_requires_mount() {
        let host = Host::new(Echo, &Object::new());
        assert!(matches!(
            host.view().update_view(),
            Err(ComponentError::NotMounted)
        ));
        host.mount(|| {}).unwrap();
        assert!(host.view().update_view().is_ok());
        host.unmount();
        assert!(!host.view().is_mounted());
    }

    #[test]
    fn props_are_copied() {
        let props = Object::new().with("text", "hi");
        let host = Host::new(Echo, &props);
        let current = host.view().props().unwrap();
        let current = current.as_observed().expect("observed props");
        assert!(!current.target().ptr_eq(&props));
        assert!(host.view().original_props().ptr_eq(&props));
    }

    #[test]
    fn children_carried_into_state() {
        let child = Object::new();
        let host = Host::new(Echo, &Object::new().with(CHILDREN, &child));
        let children = host.view().children().unwrap();
        assert!(children.as_object().is_some_and(|o| o.ptr_eq(&child)));
    }

    #[test]
    fn render_failure_names_stage() {
        struct Broken;
        impl Component for Broken {
            type Output = ();
            fn render(&self, _view: &View) -> HookResult<()> {
                Err("no output".into())
            }
        }
        let host = Host::new(Broken, &Object::new());
        let err = host.render(&Object::new()).unwrap_err();
        assert!(matches!(err, ComponentError::Component { stage: "render", .. }));
        assert!(host.has_rendered());
        assert!(!host.view().mount.rendering.get());
    }
}
