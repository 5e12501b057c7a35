//! Conversion between [`Value`] graphs and `serde_json::Value`.
//!
//! Functions have no JSON form and serialize as `null`. Observed values
//! serialize through their target. A reference cycle is cut at the first
//! repeated object, which serializes as `null`.

use std::rc::Rc;

use ahash::AHashSet;
use serde_json::{Map, Number};

use crate::value::{Object, PropertyDescriptor, Value};

impl Value {
    /// Build a fresh object graph from JSON. Arrays become objects keyed by
    /// index, with a non-enumerable `length`.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(Rc::from(s.as_str())),
            serde_json::Value::Array(items) => {
                let object = Object::new();
                for (idx, item) in items.iter().enumerate() {
                    object.set(&idx.to_string(), Self::from_json(item));
                }
                #[allow(clippy::cast_precision_loss)]
                let length = items.len() as f64;
                object.define_property(
                    "length",
                    length,
                    PropertyDescriptor::DEFAULT.enumerable(false),
                );
                Self::Object(object)
            }
            serde_json::Value::Object(map) => {
                let object = Object::new();
                for (key, item) in map {
                    object.set(key, Self::from_json(item));
                }
                Self::Object(object)
            }
        }
    }

    /// Snapshot this value as JSON. `Undefined` properties are skipped.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = AHashSet::new();
        to_json_inner(self, &mut seen)
    }
}

fn to_json_inner(value: &Value, seen: &mut AHashSet<usize>) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Object(object) => object_to_json(object, seen),
        Value::Observed(wrapper) => object_to_json(wrapper.target(), seen),
    }
}

/// Integral numbers in `i64` range are written as JSON integers so that
/// `from_json` followed by `to_json` keeps `1` as `1`. Non-finite numbers
/// have no JSON form.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return serde_json::Value::from(n as i64);
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn object_to_json(object: &Object, seen: &mut AHashSet<usize>) -> serde_json::Value {
    if !seen.insert(object.id()) {
        return serde_json::Value::Null;
    }
    let mut map = Map::new();
    for key in object.keys() {
        let item = object.get(&key);
        if item.is_undefined() {
            continue;
        }
        map.insert(key, to_json_inner(&item, seen));
    }
    seen.remove(&object.id());
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_graph_from_json() {
        let value = Value::from_json(&json!({"a": 1, "b": {"c": "x"}, "list": [true, null]}));
        let object = value.as_object().expect("object");
        assert_eq!(object.get("a"), Value::from(1));
        let b = object.get("b");
        assert_eq!(b.property("c").unwrap(), Value::from("x"));
        let list = object.get("list");
        assert_eq!(list.property("0").unwrap(), Value::Bool(true));
        assert_eq!(list.property("length").unwrap(), Value::from(2));
    }

    #[test]
    fn snapshot_skips_undefined_and_functions_become_null() {
        let object = Object::new()
            .with("n", 2.5)
            .with("u", Value::Undefined)
            .with("f", crate::value::Function::new(|_, _| Ok(Value::Undefined)));
        assert_eq!(Value::from(&object).to_json(), json!({"n": 2.5, "f": null}));
    }

    #[test]
    fn integers_survive_a_round_trip() {
        let source = json!({"count": 3, "neg": -2, "ratio": 0.5, "list": [1, 2]});
        let back = Value::from_json(&source).to_json();
        assert_eq!(back["count"], json!(3));
        assert!(back["count"].is_i64() || back["count"].is_u64());
        assert_eq!(back["neg"], json!(-2));
        assert_eq!(back["ratio"], json!(0.5));
        assert_eq!(back["list"], json!({"0": 1, "1": 2}));
        assert_eq!(Value::Number(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn cycles_are_cut() {
        let a = Object::new().with("name", "a");
        a.set("me", &a);
        assert_eq!(Value::from(&a).to_json(), json!({"name": "a", "me": null}));
        a.delete("me");
    }

    #[test]
    fn shared_subtrees_are_not_cycles() {
        let shared = Object::new().with("k", 1);
        let root = Object::new().with("x", &shared).with("y", &shared);
        assert_eq!(
            Value::from(&root).to_json(),
            json!({"x": {"k": 1}, "y": {"k": 1}})
        );
    }
}
