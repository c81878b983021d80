//! Dynamic payload values carried through hooks.
//!
//! Hook arguments, contexts, and waterfall payloads are dynamic values: the
//! host and its plugins agree on their shape by convention rather than by
//! type. [`Value`] mirrors the JSON data model with one important difference:
//! arrays and objects are **shared handles**. Cloning a [`Value::Object`]
//! clones the handle, not the map, so a listener that mutates an object in
//! place is observed by every other holder of that object.
//!
//! Two notions of equality follow from that:
//!
//! - [`PartialEq`] is structural (same keys, same values).
//! - [`Value::same`] is identity (same underlying allocation), which is what
//!   waterfall hooks and the performance correlator use.
//!
//! # Example
//!
//! ```
//! use hookable_hooks::value::{Object, Value};
//!
//! let user = Object::new();
//! user.insert("name", "chen");
//!
//! let a = Value::from(user.clone());
//! let b = Value::from(user);
//! user_mutation(&a);
//!
//! assert!(a.same(&b));
//! assert_eq!(b.get("name"), Some(Value::from("wang")));
//!
//! fn user_mutation(value: &Value) {
//!     if let Some(object) = value.as_object() {
//!         object.insert("name", "wang");
//!     }
//! }
//! ```

use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Positional arguments passed to a hook invocation.
pub type Args = Vec<Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A dynamic value flowing through a hook.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A JSON number.
    Number(serde_json::Number),
    /// An immutable string.
    String(Arc<str>),
    /// A shared, mutable array.
    Array(Array),
    /// A shared, mutable object with insertion-ordered keys.
    Object(Object),
}

impl Value {
    /// Creates a value holding a fresh, empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Object::new())
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if this value is an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns `true` if this value is an array or an object, i.e. a shared
    /// handle with reference identity.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    /// Returns the object handle, if this value is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the array handle, if this value is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the string slice, if this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this value is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64`, if it is representable.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Looks up a single member: an object key, or an array index written
    /// in decimal.
    ///
    /// Returns `None` for missing members and for values that are not
    /// containers.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Self::Object(object) => object.get(key),
            Self::Array(array) => key.parse::<usize>().ok().and_then(|i| array.get(i)),
            _ => None,
        }
    }

    /// Returns `true` if both values are the same shared handle.
    ///
    /// Scalars never share identity, so this is `false` whenever either side
    /// is not an array or an object.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.same(b),
            (Self::Array(a), Self::Array(b)) => a.same(b),
            _ => false,
        }
    }

    /// Returns the address of the shared allocation behind an array or an
    /// object. Two values with the same identity are [`same`](Value::same).
    #[must_use]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::Object(object) => Some(object.addr()),
            Self::Array(array) => Some(array.addr()),
            _ => None,
        }
    }

    /// Converts into an owned `serde_json::Value` snapshot.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(array) => {
                serde_json::Value::Array(array.0.read().iter().map(Value::to_json).collect())
            }
            Self::Object(object) => serde_json::Value::Object(
                object
                    .0
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.same(b) || *a.0.read() == *b.0.read(),
            (Self::Object(a), Self::Object(b)) => a.same(b) || *a.0.read() == *b.0.read(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(array) => fmt::Debug::fmt(array, f),
            Self::Object(object) => fmt::Debug::fmt(object, f),
        }
    }
}

/// Renders scalars the way they are spelled in a correlation key:
/// `null`, `true`, `1`, `1.5`, or the raw string. Containers render as
/// comma-joined elements (arrays) or `[object Object]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Array(array) => {
                for (i, item) in array.0.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_null() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(array) => array.serialize(serializer),
            Self::Object(object) => object.serialize(serializer),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Number(serde_json::Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for Value {
    /// Whole floats collapse to integers so `1.0` and `1` correlate alike.
    /// Non-finite floats become [`Value::Null`].
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            return Self::Number(serde_json::Number::from(value as i64));
        }
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Self::Array(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(Array::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) if !n.is_i64() && !n.is_u64() => Self::from(f),
                _ => Self::Number(n),
            },
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object
// ─────────────────────────────────────────────────────────────────────────────

/// A shared, mutable, insertion-ordered map.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<IndexMap<String, Value>>>);

impl Object {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Inserts a member, returning the previous value if there was one.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.write().insert(key.into(), value.into())
    }

    /// Removes a member, preserving the order of the remaining keys.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.write().shift_remove(key)
    }

    /// Returns `true` if the object has a member named `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns `true` if the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Returns `true` if both handles point at the same map.
    #[must_use]
    pub fn same(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates an independent copy of the top-level members.
    #[must_use]
    pub fn shallow_copy(&self) -> Object {
        Object(Arc::new(RwLock::new(self.0.read().clone())))
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Object(Arc::new(RwLock::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        )))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.read().iter()).finish()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.0.read();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in map.iter() {
            out.serialize_entry(k, v)?;
        }
        out.end()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Array
// ─────────────────────────────────────────────────────────────────────────────

/// A shared, mutable list of values.
///
/// Clones share the same list.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<Value>) {
        self.0.write().push(value.into());
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Returns `true` if both handles point at the same list.
    #[must_use]
    pub fn same(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copies the elements out. Nested containers stay shared.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }
}

impl From<Vec<Value>> for Array {
    fn from(value: Vec<Value>) -> Self {
        Array(Arc::new(RwLock::new(value)))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Array::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.read().iter()).finish()
    }
}

impl Serialize for Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items = self.0.read();
        let mut out = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            out.serialize_element(item)?;
        }
        out.end()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_objects() {
        let value = Value::from(json!({ "name": "chen" }));
        let alias = value.clone();

        alias
            .as_object()
            .expect("object")
            .insert("name", "wang");

        assert!(value.same(&alias));
        assert_eq!(value.get("name"), Some(Value::from("wang")));
    }

    #[test]
    fn structural_equality_differs_from_identity() {
        let a = Value::from(json!({ "k": [1, 2] }));
        let b = Value::from(json!({ "k": [1, 2] }));

        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn scalars_have_no_identity() {
        assert_eq!(Value::from(1).identity(), None);
        assert!(!Value::from("a").same(&Value::from("a")));
        assert!(Value::object().identity().is_some());
    }

    #[test]
    fn display_spells_scalars_plainly() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(1).to_string(), "1");
        assert_eq!(Value::from(1.0).to_string(), "1");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from("n1").to_string(), "n1");
        assert_eq!(Value::object().to_string(), "[object Object]");
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let value = Value::from(json!({ "list": [{ "id": 7 }] }));

        let list = value.get("list").expect("list");
        let first = list.get("0").expect("first element");

        assert_eq!(first.get("id"), Some(Value::from(7)));
        assert_eq!(list.get("1"), None);
        assert_eq!(Value::from(3).get("anything"), None);
    }

    #[test]
    fn serializes_like_json() {
        let value = Value::from(json!({ "a": [1, null, "x"], "b": { "c": true } }));
        let out = serde_json::to_value(&value).expect("serializable");

        assert_eq!(out, json!({ "a": [1, null, "x"], "b": { "c": true } }));
        assert_eq!(value.to_json(), out);
    }

    #[test]
    fn object_keys_keep_insertion_order() {
        let object = Object::new();
        object.insert("z", 1);
        object.insert("a", 2);
        object.insert("m", 3);
        object.remove("a");

        assert_eq!(object.keys(), vec!["z".to_owned(), "m".to_owned()]);
    }
}
