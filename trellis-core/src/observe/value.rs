//! The dynamic value model.
//!
//! Observable data is a tree of [`Value`]s. Scalars are stored inline;
//! composites are handles to shared, identity-bearing targets, to observable
//! views over them, or to reference boxes.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::key::Key;
use super::target::{Container, ObjectId, Target};
use super::view::Observable;
use crate::reactive::RefBox;

/// Largest length an array may be given. Indices stay below it.
pub(crate) const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value. Also what a missing key or an array hole reads as.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw target.
    Object(Target),
    /// An observable view.
    Observable(Observable),
    /// A reference box.
    Ref(RefBox),
}

impl Value {
    /// Whether this is `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this is `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Observable(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_ref_box(&self) -> Option<&RefBox> {
        match self {
            Value::Ref(boxed) => Some(boxed),
            _ => None,
        }
    }

    /// The number as an array length, if it is a valid one.
    pub(crate) fn as_array_length(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_ARRAY_LENGTH as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Whether this is an object of any kind: target, view or box.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Observable(_) | Value::Ref(_))
    }

    /// Identity of a composite value.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(target) => Some(target.id()),
            Value::Observable(view) => Some(view.id()),
            Value::Ref(boxed) => Some(boxed.id()),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(target) => target.type_name(),
            Value::Observable(_) => "Proxy",
            Value::Ref(_) => "Ref",
        }
    }

    /// Build nested raw targets from JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Target::array_from(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(entries) => Value::Object(Target::record_from(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value))),
            )),
        }
    }

    /// Plain JSON snapshot of the value.
    ///
    /// Views and boxes are replaced by their content; a cycle back to an
    /// object already being written becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ----------------------------------------------------------------------------
// Equality
// ----------------------------------------------------------------------------

fn same_identity(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => Some(a.ptr_eq(b)),
        (Value::Observable(a), Value::Observable(b)) => Some(a.ptr_eq(b)),
        (Value::Ref(a), Value::Ref(b)) => Some(a.ptr_eq(b)),
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => Some(true),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::String(a), Value::String(b)) => Some(a == b),
        (Value::Number(_), Value::Number(_)) => None,
        _ => Some(false),
    }
}

/// `Object.is`: NaN equals NaN, `+0` differs from `-0`.
pub fn same_value(a: &Value, b: &Value) -> bool {
    same_identity(a, b).unwrap_or_else(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
        }
        _ => false,
    })
}

/// Like [`same_value`] but `+0` equals `-0`.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    same_identity(a, b).unwrap_or_else(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => false,
    })
}

/// `===`: NaN never equals itself.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    same_identity(a, b).unwrap_or_else(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => false,
    })
}

/// Whether a write of `new` over `old` is a change worth notifying.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value(new, old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Observable> for Value {
    fn from(view: Observable) -> Self {
        Value::Observable(view)
    }
}

impl From<RefBox> for Value {
    fn from(boxed: RefBox) -> Self {
        Value::Ref(boxed)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => f.write_str(s),
            other => write!(f, "[object {}]", other.type_name()),
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot serialization
// ----------------------------------------------------------------------------

/// A value being serialized, with the objects currently open on the path.
struct Snapshot<'a> {
    value: &'a Value,
    open: &'a RefCell<HashSet<ObjectId>>,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let open = RefCell::new(HashSet::new());
        Snapshot { value: self, open: &open }.serialize(serializer)
    }
}

impl Snapshot<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Snapshot<'b> {
        Snapshot { value, open: self.open }
    }
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let target = match self.value {
            Value::Undefined | Value::Null => return serializer.serialize_unit(),
            Value::Bool(value) => return serializer.serialize_bool(*value),
            Value::Number(n) => {
                return if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                };
            }
            Value::String(s) => return serializer.serialize_str(s),
            Value::Ref(boxed) => {
                let inner = boxed.get_untracked();
                return self.child(&inner).serialize(serializer);
            }
            Value::Observable(view) => view.raw_target(),
            Value::Object(target) => target.clone(),
        };

        if !self.open.borrow_mut().insert(target.id()) {
            return serializer.serialize_unit();
        }
        let result = serialize_target(self, &target, serializer);
        self.open.borrow_mut().remove(&target.id());
        result
    }
}

fn serialize_target<S: Serializer>(
    parent: &Snapshot<'_>,
    target: &Target,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let container = target.snapshot();
    match container {
        Container::Array(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in &items {
                seq.serialize_element(&parent.child(item))?;
            }
            seq.end()
        }
        Container::Record(entries) | Container::Map(entries) => {
            let mut map = serializer.serialize_map(None)?;
            for (key, value) in &entries {
                if value.is_undefined() || matches!(key, Key::Symbol(_)) {
                    continue;
                }
                map.serialize_entry(&key.to_string(), &parent.child(value))?;
            }
            map.end()
        }
        Container::Opaque(_) => serializer.serialize_unit(),
    }
}
