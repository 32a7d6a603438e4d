//! Observable Data
//!
//! This module turns plain data into observable data. Raw data is a tree
//! of [`Value`]s whose composites are [`Target`]s; wrapping a target yields
//! an [`Observable`] view that reports reads to the dependency graph and
//! propagates writes to the effects that read them.
//!
//! # Facets
//!
//! A view has two facets. A *readonly* view rejects writes and does not
//! track reads of its own. A *shallow* view only observes its own keys and
//! hands nested values back untouched; a deep view wraps them on the way
//! out, with the same readonly facet.
//!
//! # Identity
//!
//! Wrapping is idempotent: wrapping a view returns it, and wrapping the
//! same target twice returns the same view while that view is alive.

mod array;
mod key;
mod target;
mod value;
mod view;

pub use key::{Key, ReactiveFlag, Symbol};
pub use target::{Container, ObjectId, Target, TargetKind};
pub use value::{has_changed, same_value, same_value_zero, strict_equals, Value};
pub use view::Observable;

pub(crate) use target::TargetType;

use crate::diagnostics::{report, Warning};
use view::Backing;

/// Facets of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Reject writes.
    pub readonly: bool,
    /// Do not wrap nested values.
    pub shallow: bool,
}

impl ObserveOptions {
    pub const REACTIVE: Self = Self {
        readonly: false,
        shallow: false,
    };
    pub const SHALLOW_REACTIVE: Self = Self {
        readonly: false,
        shallow: true,
    };
    pub const READONLY: Self = Self {
        readonly: true,
        shallow: false,
    };
    pub const SHALLOW_READONLY: Self = Self {
        readonly: true,
        shallow: true,
    };
}

/// Wrap a value in an observable view with the given facets.
///
/// Scalars are returned unchanged with a warning. Views are returned
/// unchanged, except that a readonly wrap of a mutable view produces a
/// readonly view over it. Exempt, non-extensible and opaque targets are
/// returned unchanged, as are reference boxes.
///
/// Views are cached weakly. Wrapping the same target again returns the same
/// view only while some handle to that view is still alive; once the last
/// one is dropped, the next wrap creates a new view with a new id.
pub fn to_observable(value: &Value, options: ObserveOptions) -> Value {
    let backing = match value {
        Value::Object(target) => Backing::Target(target.clone()),
        Value::Observable(view) => {
            if !(options.readonly && !view.is_readonly()) {
                return value.clone();
            }
            Backing::View(view.clone())
        }
        Value::Ref(_) => return value.clone(),
        scalar => {
            report(Warning::NotObservable(scalar.to_string()));
            return value.clone();
        }
    };

    let backing_id = match &backing {
        Backing::Target(target) => target.id(),
        Backing::View(view) => view.id(),
    };
    if let Some(view) = Observable::cached(backing_id, options.readonly, options.shallow) {
        return Value::Observable(view);
    }

    let raw = match &backing {
        Backing::Target(target) => target.clone(),
        Backing::View(view) => view.raw_target(),
    };
    match raw.target_type() {
        TargetType::Invalid => value.clone(),
        TargetType::Collection => {
            report(Warning::CollectionUnsupported);
            value.clone()
        }
        TargetType::Common => Value::Observable(Observable::create(
            backing,
            options.readonly,
            options.shallow,
        )),
    }
}

/// Deep mutable view.
pub fn reactive(value: &Value) -> Value {
    to_observable(value, ObserveOptions::REACTIVE)
}

/// Mutable view that only observes its own keys.
pub fn shallow_reactive(value: &Value) -> Value {
    to_observable(value, ObserveOptions::SHALLOW_REACTIVE)
}

/// Deep readonly view.
pub fn readonly(value: &Value) -> Value {
    to_observable(value, ObserveOptions::READONLY)
}

/// Readonly view whose nested values are returned as is.
pub fn shallow_readonly(value: &Value) -> Value {
    to_observable(value, ObserveOptions::SHALLOW_READONLY)
}

fn read_flag(value: &Value, flag: ReactiveFlag) -> bool {
    match value {
        Value::Observable(view) => view.get(&Key::Flag(flag)).as_bool().unwrap_or(false),
        Value::Object(target) => target.get(&Key::Flag(flag)).as_bool().unwrap_or(false),
        _ => false,
    }
}

/// Whether the value is a mutable view, or a readonly view over one.
pub fn is_reactive(value: &Value) -> bool {
    if is_readonly(value) {
        if let Value::Observable(view) = value {
            return is_reactive(&view.backing());
        }
    }
    read_flag(value, ReactiveFlag::IsReactive)
}

pub fn is_readonly(value: &Value) -> bool {
    read_flag(value, ReactiveFlag::IsReadonly)
}

pub fn is_shallow(value: &Value) -> bool {
    read_flag(value, ReactiveFlag::IsShallow)
}

/// Whether the value is any kind of view.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Observable(_))
}

/// Whether the value is a reference box.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The raw target under any number of views. Other values are returned as is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Observable(view) => Value::Object(view.raw_target()),
        other => other.clone(),
    }
}

/// Exempt a target from ever being wrapped.
///
/// Non-extensible targets and non-containers are left alone with a warning.
pub fn mark_exempt(value: &Value) -> Value {
    let target = match value {
        Value::Object(target) => Some(target.clone()),
        Value::Observable(view) => Some(view.raw_target()),
        _ => None,
    };
    match target {
        Some(target) if target.is_extensible() => target.set_exempt(),
        _ => report(Warning::NotExemptable(value.type_name().to_string())),
    }
    value.clone()
}
