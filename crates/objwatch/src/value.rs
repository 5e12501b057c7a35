#![forbid(unsafe_code)]

//! Dynamic object model observed by [`Wrapper`].
//!
//! # Design
//!
//! [`Object`] is a shared, identity-bearing property bag. Cloning an
//! `Object` yields another handle to the **same** storage, and two handles
//! compare equal under [`Value::strict_eq`] only if they point at the same
//! allocation. Properties keep insertion order and carry a
//! [`PropertyDescriptor`].
//!
//! [`Function`] is a callable with a late-bound receiver. [`Function::bind`]
//! fixes the receiver and returns a new function object, so a bound function
//! is never identical to the function it was derived from.
//!
//! # Invariants
//!
//! 1. No `RefCell` borrow of an object outlives a single accessor call.
//!    Values are cloned out before they are returned, and replaced values
//!    are dropped after the borrow is released.
//! 2. `keys()` lists only enumerable properties, in insertion order.
//! 3. A non-configurable property can be neither deleted nor redefined.
//!
//! Object graphs may contain cycles. Like any `Rc` graph, a cycle keeps its
//! members alive until one edge is removed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{HookResult, Result};
use crate::wrapper::Wrapper;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed value stored in an [`Object`] or returned by a
/// [`Wrapper`] read.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Function(Function),
    /// An object seen through its wrapper. Wrapper reads return this for
    /// nested-observed properties; writes unwrap it before storing.
    Observed(Wrapper),
}

/// Coarse classification of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Object,
    Function,
    Observed,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Object => "object",
            Self::Function => "function",
            Self::Observed => "observed",
        })
    }
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Undefined => ValueKind::Undefined,
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Object(_) => ValueKind::Object,
            Self::Function(_) => ValueKind::Function,
            Self::Observed(_) => ValueKind::Observed,
        }
    }

    /// Truthiness: `undefined`, `null`, `false`, `0`, `-0`, `NaN` and the
    /// empty string are falsy; everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Function(_) | Self::Observed(_) => true,
        }
    }

    /// Strict identity comparison.
    ///
    /// Primitives compare by value (`NaN` is never identical to itself,
    /// `0` and `-0` are identical), strings by contents, and objects,
    /// functions and wrappers by reference.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Observed(a), Self::Observed(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// The raw object behind this value, looking through a wrapper.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Observed(wrapper) => Some(wrapper.target()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_observed(&self) -> Option<&Wrapper> {
        match self {
            Self::Observed(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    /// Replace a wrapper by the object it observes. Other values pass
    /// through.
    #[must_use]
    pub fn into_raw(self) -> Self {
        match self {
            Self::Observed(wrapper) => Self::Object(wrapper.target().clone()),
            other => other,
        }
    }

    /// Read a property of this value.
    ///
    /// Raw objects are read directly, wrappers are read through their
    /// interception (hooks included). Reading a property of a primitive
    /// yields `Undefined`.
    pub fn property(&self, name: &str) -> Result<Value> {
        match self {
            Self::Object(object) => Ok(object.get(name)),
            Self::Observed(wrapper) => wrapper.get(name),
            _ => Ok(Self::Undefined),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Object(object) => fmt::Debug::fmt(object, f),
            Self::Function(function) => fmt::Debug::fmt(function, f),
            Self::Observed(wrapper) => fmt::Debug::fmt(wrapper, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<&Object> for Value {
    fn from(value: &Object) -> Self {
        Self::Object(value.clone())
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

impl From<Wrapper> for Value {
    fn from(value: Wrapper) -> Self {
        Self::Observed(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Property descriptors
// ---------------------------------------------------------------------------

/// Attributes of a single own property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Whether the property may be deleted or redefined. Wrappers never
    /// rebind or nest non-configurable properties.
    pub configurable: bool,
    /// Whether the property is listed by [`Object::keys`].
    pub enumerable: bool,
    /// Whether plain assignment may change the value.
    pub writable: bool,
}

impl PropertyDescriptor {
    /// Descriptor used for properties created by plain assignment.
    pub const DEFAULT: Self = Self {
        configurable: true,
        enumerable: true,
        writable: true,
    };

    /// A property that can be neither deleted nor redefined.
    #[must_use]
    pub const fn sealed() -> Self {
        Self {
            configurable: false,
            ..Self::DEFAULT
        }
    }

    #[must_use]
    pub const fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    #[must_use]
    pub const fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    #[must_use]
    pub const fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

struct Slot {
    key: Rc<str>,
    value: Value,
    descriptor: PropertyDescriptor,
}

#[derive(Default)]
struct ObjectInner {
    slots: Vec<Slot>,
}

impl ObjectInner {
    fn position(&self, key: &str) -> Option<usize> {
        self.slots.iter().position(|slot| &*slot.key == key)
    }
}

/// Shared, identity-bearing property bag.
///
/// Cloning an `Object` creates a new handle to the **same** properties.
#[derive(Clone, Default)]
pub struct Object {
    inner: Rc<RefCell<ObjectInner>>,
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style assignment, for constructing graphs inline.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Read an own property. Missing properties read as `Undefined`.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let inner = self.inner.borrow();
        inner
            .position(key)
            .map_or(Value::Undefined, |idx| inner.slots[idx].value.clone())
    }

    /// Assign an own property, creating it with the default descriptor if
    /// absent. Returns `false` and leaves the object unchanged when the
    /// existing property is not writable.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let replaced = {
            let mut inner = self.inner.borrow_mut();
            match inner.position(key) {
                Some(idx) if !inner.slots[idx].descriptor.writable => return false,
                Some(idx) => std::mem::replace(&mut inner.slots[idx].value, value),
                None => {
                    inner.slots.push(Slot {
                        key: Rc::from(key),
                        value,
                        descriptor: PropertyDescriptor::DEFAULT,
                    });
                    Value::Undefined
                }
            }
        };
        drop(replaced);
        true
    }

    /// Define (or redefine) an own property with an explicit descriptor.
    /// Returns `false` when an existing property is not configurable.
    pub fn define_property(
        &self,
        key: &str,
        value: impl Into<Value>,
        descriptor: PropertyDescriptor,
    ) -> bool {
        let value = value.into();
        let replaced = {
            let mut inner = self.inner.borrow_mut();
            match inner.position(key) {
                Some(idx) if !inner.slots[idx].descriptor.configurable => return false,
                Some(idx) => {
                    let slot = &mut inner.slots[idx];
                    slot.descriptor = descriptor;
                    std::mem::replace(&mut slot.value, value)
                }
                None => {
                    inner.slots.push(Slot {
                        key: Rc::from(key),
                        value,
                        descriptor,
                    });
                    Value::Undefined
                }
            }
        };
        drop(replaced);
        true
    }

    #[must_use]
    pub fn descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
        let inner = self.inner.borrow();
        inner.position(key).map(|idx| inner.slots[idx].descriptor)
    }

    /// Remove an own property.
    ///
    /// Returns `true` if the property was removed or did not exist, and
    /// `false` if it is not configurable.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match inner.position(key) {
                Some(idx) if !inner.slots[idx].descriptor.configurable => return false,
                Some(idx) => Some(inner.slots.remove(idx)),
                None => None,
            }
        };
        drop(removed);
        true
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.borrow().position(key).is_some()
    }

    /// Enumerable own keys, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.descriptor.enumerable)
            .map(|slot| slot.key.to_string())
            .collect()
    }

    /// Number of own properties, enumerable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    /// Shallow-copy every enumerable own property of `source` into `self`.
    /// Non-writable destination properties are skipped.
    pub fn assign(&self, source: &Object) {
        for key in source.keys() {
            self.set(&key, source.get(&key));
        }
    }

    /// Whether both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity of the underlying allocation. Stable for the lifetime of
    /// the object; may be reused after it is dropped.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are not printed: graphs may be cyclic.
        let mut s = f.debug_struct("Object");
        s.field("id", &format_args!("{:#x}", self.id()));
        match self.inner.try_borrow() {
            Ok(inner) => {
                let keys: Vec<&str> = inner.slots.iter().map(|slot| &*slot.key).collect();
                s.field("keys", &keys);
            }
            Err(_) => {
                s.field("keys", &"<borrowed>");
            }
        }
        s.finish()
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

type NativeFn = dyn Fn(&Value, &[Value]) -> HookResult<Value>;

struct FunctionInner {
    body: Rc<NativeFn>,
    bound_this: Option<Value>,
}

/// A callable value with a late-bound receiver.
#[derive(Clone)]
pub struct Function {
    inner: Rc<FunctionInner>,
}

impl Function {
    /// Create a function from a native body. The body receives the
    /// receiver (`this`) and the call arguments.
    pub fn new(body: impl Fn(&Value, &[Value]) -> HookResult<Value> + 'static) -> Self {
        Self {
            inner: Rc::new(FunctionInner {
                body: Rc::new(body),
                bound_this: None,
            }),
        }
    }

    /// Return a new function sharing this body with the receiver fixed to
    /// `this`. Binding an already bound function keeps the first receiver.
    #[must_use]
    pub fn bind(&self, this: Value) -> Self {
        let bound_this = self.inner.bound_this.clone().unwrap_or(this);
        Self {
            inner: Rc::new(FunctionInner {
                body: Rc::clone(&self.inner.body),
                bound_this: Some(bound_this),
            }),
        }
    }

    /// Invoke the body. A bound function ignores `this` and uses its bound
    /// receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> HookResult<Value> {
        let receiver = self.inner.bound_this.as_ref().unwrap_or(this);
        (self.inner.body)(receiver, args)
    }

    #[must_use]
    pub fn bound_this(&self) -> Option<&Value> {
        self.inner.bound_this.as_ref()
    }

    /// Whether both functions run the same body, regardless of binding.
    #[must_use]
    pub fn same_body(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner.body, &other.inner.body)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("bound", &self.inner.bound_this.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
