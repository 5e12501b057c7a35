#![forbid(unsafe_code)]

//! Transparent change observation for mutable object graphs.
//!
//! `objwatch` wraps an [`Object`] in a [`Wrapper`] that intercepts reads,
//! writes and deletes of its properties, including properties added,
//! replaced or removed later, and reports them as [`ChangeRecord`]s. The
//! object itself is unaware that it is observed.
//!
//! - [`wrap`] / [`wrap_object`]: obtain the (unique) wrapper of an object.
//! - [`wrapper_of`]: look a wrapper up without creating one.
//! - [`ObservationConfig`] / [`PropertyOptions`]: whole-object and
//!   per-property hooks, and nested observation of object-valued properties.
//! - [`path`]: dotted-path reads and writes routed through wrappers.
//!
//! # Architecture
//!
//! Objects and wrappers use `Rc<RefCell<..>>` for single-threaded shared
//! ownership; none of the types here are `Send`. The object-to-wrapper
//! association is a thread-local identity map holding `Weak` handles, so a
//! wrapper lives exactly as long as its callers keep it. Nested wrappers are
//! cached inside their parent wrapper.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use objwatch::{ObservationConfig, Object, Value, wrap_object};
//!
//! let changes = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&changes);
//!
//! let target = Object::new().with("a", 1);
//! let observed = wrap_object(
//!     &target,
//!     ObservationConfig::new().on_change(move |record| {
//!         sink.borrow_mut().push(record.clone());
//!         Ok(())
//!     }),
//! );
//!
//! observed.set("a", 1)?; // identical: nothing reported
//! observed.set("a", 2)?;
//! assert_eq!(changes.borrow().len(), 1);
//! assert_eq!(target.get("a"), Value::from(2));
//! # Ok::<(), objwatch::ObserveError>(())
//! ```

pub mod change;
pub mod config;
pub mod error;
#[cfg(feature = "json")]
pub mod json;
pub mod path;
pub mod registry;
pub mod value;
pub mod wrapper;

pub use change::{ChangeRecord, PropertyState};
pub use config::{ChangeHook, GetHook, ObservationConfig, PropertyOptions, SetHook};
pub use error::{HookError, HookResult, ObserveError, Result};
pub use path::{get_path, set_path};
pub use value::{Function, Object, PropertyDescriptor, Value, ValueKind};
pub use wrapper::{Wrapper, wrap, wrap_object, wrapper_of};
