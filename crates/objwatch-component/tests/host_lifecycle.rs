#![forbid(unsafe_code)]

//! Render-cycle behavior of [`Host`]: mount, prop propagation, state
//! changes, and re-render requests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use objwatch::{ChangeRecord, HookResult, Object, PropertyState, Value};
use objwatch_component::{CHILDREN, Component, ComponentError, Host, PROPS, View};
use proptest::prelude::*;

// ── Test component ──────────────────────────────────────────────────────

#[derive(Default)]
struct Probe {
    inits: Cell<u32>,
    hooks: Cell<u32>,
    changes: RefCell<Vec<ChangeRecord>>,
    prop_changes: RefCell<Vec<ChangeRecord>>,
}

impl Component for Probe {
    type Output = String;

    fn on_init(&self, view: &View) -> HookResult {
        self.inits.set(self.inits.get() + 1);
        view.state().set("ready", true)?;
        Ok(())
    }

    fn on_changes(&self, _view: &View, record: &ChangeRecord) -> HookResult {
        self.changes.borrow_mut().push(record.clone());
        Ok(())
    }

    fn on_props_change(&self, _view: &View, record: &ChangeRecord) -> HookResult {
        self.prop_changes.borrow_mut().push(record.clone());
        Ok(())
    }

    fn setup_hooks(&self, _view: &View) -> HookResult {
        self.hooks.set(self.hooks.get() + 1);
        Ok(())
    }

    fn render(&self, view: &View) -> HookResult<String> {
        let title = view.prop("title")?;
        Ok(title.as_str().unwrap_or_default().to_owned())
    }
}

fn counting_dispatch() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    (count, move || sink.set(sink.get() + 1))
}

// ── Lifecycle ───────────────────────────────────────────────────────────

#[test]
fn mount_runs_on_init_once() {
    let host = Host::new(Probe::default(), &Object::new().with("title", "a"));
    let (renders, dispatch) = counting_dispatch();
    host.mount(dispatch).unwrap();
    host.mount(|| {}).unwrap();

    assert_eq!(host.component().inits.get(), 1);
    // on_init wrote state while mounted: one change, one re-render request.
    assert_eq!(host.component().changes.borrow().len(), 1);
    assert_eq!(renders.get(), 1);
}

#[test]
fn first_render_uses_initial_props() {
    let host = Host::new(Probe::default(), &Object::new().with("title", "first"));
    let out = host.render(&Object::new().with("title", "ignored")).unwrap();
    assert_eq!(out, "first");
    assert_eq!(host.component().hooks.get(), 1);
    assert!(host.component().prop_changes.borrow().is_empty());
}

#[test]
fn later_renders_apply_new_props() {
    let host = Host::new(Probe::default(), &Object::new().with("title", "a").with("extra", 1));
    let (renders, dispatch) = counting_dispatch();
    host.mount(dispatch).unwrap();
    let after_mount = renders.get();

    host.render(&Object::new().with("title", "a").with("extra", 1)).unwrap();
    let out = host.render(&Object::new().with("title", "b")).unwrap();
    assert_eq!(out, "b");

    let prop_changes = host.component().prop_changes.borrow();
    assert_eq!(prop_changes.len(), 2);
    assert_eq!(
        prop_changes[0],
        ChangeRecord::updated("title", Value::from("b"), Value::from("a"))
    );
    assert_eq!(prop_changes[1].name, "extra");
    assert_eq!(prop_changes[1].state, PropertyState::Deleted);

    // Applying props during a render never requests another render.
    assert_eq!(renders.get(), after_mount);
    let original = host.view().original_props();
    assert_eq!(original.get("title"), Value::from("a"));
    assert!(original.has("extra"));
}

#[test]
fn state_change_outside_render_requests_render() {
    let host = Host::new(Probe::default(), &Object::new());
    let (renders, dispatch) = counting_dispatch();
    host.mount(dispatch).unwrap();
    let before = renders.get();

    host.view().state().set("count", 1).unwrap();
    host.view().state().set("count", 1).unwrap();
    assert_eq!(renders.get(), before + 1);
}

#[test]
fn unmounted_changes_are_not_dispatched() {
    let host = Host::new(Probe::default(), &Object::new());
    host.view().state().set("count", 1).unwrap();
    assert_eq!(host.component().changes.borrow().len(), 1);
    assert!(matches!(
        host.view().update_view(),
        Err(ComponentError::NotMounted)
    ));
}

#[test]
fn direct_prop_mutation_reaches_props_hook() {
    let host = Host::new(Probe::default(), &Object::new().with("title", "a"));
    let props = host.view().props().unwrap();
    props.as_observed().unwrap().set("title", "z").unwrap();
    assert_eq!(host.component().prop_changes.borrow().len(), 1);
    assert!(host.component().changes.borrow().is_empty());
}

#[test]
fn children_follow_render_props() {
    let host = Host::new(Probe::default(), &Object::new());
    host.render(&Object::new()).unwrap();
    let child = Object::new();
    host.render(&Object::new().with(CHILDREN, &child)).unwrap();
    let children = host.view().children().unwrap();
    assert!(children.as_object().is_some_and(|o| o.ptr_eq(&child)));
    let changes = host.component().changes.borrow();
    assert_eq!(changes.last().map(|r| r.name.as_str()), Some(CHILDREN));
}

#[test]
fn non_object_props_are_rebuilt_with_children() {
    let host = Host::new(Probe::default(), &Object::new().with("title", "a"));
    host.render(&Object::new()).unwrap();
    host.view().state().set(PROPS, Value::Null).unwrap();

    let child = Object::new();
    let out = host
        .render(&Object::new().with("title", "b").with(CHILDREN, &child))
        .unwrap();
    assert_eq!(out, "b");
    let children = host.view().children().unwrap();
    assert!(children.as_object().is_some_and(|o| o.ptr_eq(&child)));
    let props = host.view().props().unwrap();
    assert!(props.as_observed().is_some());
}

#[test]
fn failing_props_hook_aborts_render() {
    struct Picky;
    impl Component for Picky {
        type Output = ();
        fn on_props_change(&self, _view: &View, _record: &ChangeRecord) -> HookResult {
            Err("props are immutable".into())
        }
        fn render(&self, _view: &View) -> HookResult<()> {
            Ok(())
        }
    }

    let host = Host::new(Picky, &Object::new().with("a", 1));
    host.render(&Object::new()).unwrap();
    let err = host.render(&Object::new().with("a", 2)).unwrap_err();
    assert!(matches!(err, ComponentError::Observe(ref e) if e.is_hook_failure()));
}

// ── Properties ──────────────────────────────────────────────────────────

fn props_map() -> impl Strategy<Value = Vec<(u8, i32)>> {
    proptest::collection::vec((0u8..6, -2i32..2), 0..6)
}

fn to_object(entries: &[(u8, i32)]) -> Object {
    let object = Object::new();
    for (k, v) in entries {
        object.set(&format!("p{k}"), *v);
    }
    object
}

proptest! {
    #[test]
    fn observed_props_match_last_render(cycles in proptest::collection::vec(props_map(), 1..6)) {
        let host = Host::new(Probe::default(), &to_object(&cycles[0]));
        for entries in &cycles {
            host.render(&to_object(entries)).unwrap();
        }
        let last = to_object(cycles.last().unwrap());
        let props = host.view().props().unwrap();
        let props = props.as_observed().unwrap();

        let mut got = props.keys();
        let mut want = last.keys();
        got.sort();
        want.sort();
        prop_assert_eq!(got, want);
        for key in last.keys() {
            prop_assert_eq!(props.get(&key).unwrap(), last.get(&key));
        }
    }
}
