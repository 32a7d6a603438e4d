//! Reference boxes.
//!
//! A [`RefBox`] is a one-slot observable holder. Reading it tracks the box;
//! writing a different value re-runs its readers. Observable views unwrap
//! boxes stored in them and assign through them, so a box placed in
//! reactive data behaves like the value it holds.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::DirtyLevel;
use super::runtime;
use super::subscriber::DepId;
use crate::observe::{has_changed, is_readonly, is_shallow, reactive, to_raw, ObjectId, Value};

struct RefInner {
    id: ObjectId,
    /// The value as written, stripped of views.
    raw: RefCell<Value>,
    /// The value as read: composites are wrapped deeply unless shallow.
    value: RefCell<Value>,
    shallow: bool,
    dep: Cell<Option<DepId>>,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        runtime::drop_standalone(&self.dep);
    }
}

/// A reactive single-value holder.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{create_effect, RefBox};
/// use trellis_core::observe::Value;
///
/// let count = RefBox::new(0);
/// let seen = Rc::new(Cell::new(0.0));
/// let _effect = {
///     let (count, seen) = (count.clone(), seen.clone());
///     create_effect(move || seen.set(count.get().as_number().unwrap_or(0.0)))
/// };
///
/// count.set(5);
/// assert_eq!(seen.get(), 5.0);
/// ```
#[derive(Clone)]
pub struct RefBox {
    inner: Rc<RefInner>,
}

fn to_reactive(value: &Value) -> Value {
    if value.is_composite() {
        reactive(value)
    } else {
        value.clone()
    }
}

impl RefBox {
    fn build(raw: Value, value: Value, shallow: bool) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: ObjectId::next(),
                raw: RefCell::new(raw),
                value: RefCell::new(value),
                shallow,
                dep: Cell::new(None),
            }),
        }
    }

    /// Box a value. Composites read back as deep reactive views. Boxing a
    /// box returns it unchanged.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        if let Value::Ref(boxed) = value {
            return boxed;
        }
        Self::build(to_raw(&value), to_reactive(&value), false)
    }

    /// Box a value as is. Only replacing the whole value is observed.
    pub fn shallow(value: impl Into<Value>) -> Self {
        let value = value.into();
        if let Value::Ref(boxed) = value {
            return boxed;
        }
        Self::build(value.clone(), value, true)
    }

    /// Read the value, tracking the box.
    pub fn get(&self) -> Value {
        runtime::track_standalone(&self.inner.dep, None);
        self.get_untracked()
    }

    /// Read the value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Replace the value. Readers re-run only if it actually changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let direct = self.inner.shallow || is_shallow(&value) || is_readonly(&value);
        let value = if direct { value } else { to_raw(&value) };
        if !has_changed(&value, &self.inner.raw.borrow()) {
            return;
        }

        let observed = if direct {
            value.clone()
        } else {
            to_reactive(&value)
        };
        let old_raw = self.inner.raw.replace(value);
        let old_value = self.inner.value.replace(observed);
        drop((old_raw, old_value));
        runtime::trigger_standalone(&self.inner.dep, DirtyLevel::Dirty);
    }

    /// Replace the value with `f` applied to the current one.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let current = self.get_untracked();
        self.set(f(&current));
    }

    /// Whether the box stores values as is.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Identity of the box.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Whether both handles refer to the same box.
    pub fn ptr_eq(&self, other: &RefBox) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of effects currently reading the box.
    pub fn subscriber_count(&self) -> usize {
        runtime::standalone_subscribers(&self.inner.dep)
    }
}

impl fmt::Debug for RefBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefBox")
            .field("id", &self.inner.id)
            .field("shallow", &self.inner.shallow)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
