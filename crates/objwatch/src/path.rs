//! Dotted-path access through wrappers.
//!
//! Every segment is read through the wrapper of the object that holds it,
//! so nested hooks fire for path writes exactly as they would for a chain
//! of [`Wrapper::get`] calls. Raw objects met along the way are looked up in
//! the registry and read transparently when they are not observed.

use crate::error::{ObserveError, Result};
use crate::value::Value;
use crate::wrapper::Wrapper;

/// Read `path` (segments separated by `.`) starting at `root`.
///
/// An empty path yields the root itself. A segment that is missing or is
/// not an object ends the walk with `Undefined`.
///
/// # Errors
///
/// Propagates hook failures from the wrappers along the path.
pub fn get_path(root: &Wrapper, path: &str) -> Result<Value> {
    let mut current = Value::Observed(root.clone());
    if path.is_empty() {
        return Ok(current);
    }
    for segment in path.split('.') {
        current = match step(&current, segment)? {
            Some(next) => next,
            None => return Ok(Value::Undefined),
        };
    }
    Ok(current)
}

/// Write `value` at `path` starting at `root`. An empty path is a no-op.
///
/// # Errors
///
/// - [`ObserveError::PathNotFound`] if an intermediate segment is not an
///   object.
/// - Any error of the final [`Wrapper::set`].
pub fn set_path(root: &Wrapper, path: &str, value: impl Into<Value>) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let Some((parent, leaf)) = path.rsplit_once('.') else {
        return root.set(path, value);
    };
    match get_path(root, parent)? {
        Value::Observed(wrapper) => wrapper.set(leaf, value),
        Value::Object(object) => match Wrapper::lookup(&object) {
            Some(wrapper) => wrapper.set(leaf, value),
            None => {
                if object.set(leaf, value) {
                    Ok(())
                } else {
                    Err(ObserveError::ReadOnly {
                        property: leaf.to_owned(),
                    })
                }
            }
        },
        _ => Err(ObserveError::PathNotFound {
            path: path.to_owned(),
        }),
    }
}

/// Read one segment. `None` when `current` has no properties.
fn step(current: &Value, segment: &str) -> Result<Option<Value>> {
    match current {
        Value::Observed(wrapper) => wrapper.get(segment).map(Some),
        Value::Object(object) => match Wrapper::lookup(object) {
            Some(wrapper) => wrapper.get(segment).map(Some),
            None => Ok(Some(object.get(segment))),
        },
        _ => Ok(None),
    }
}
