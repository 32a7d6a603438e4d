//! Raw targets.
//!
//! A [`Target`] is a plain keyed container with identity. Cloning a target
//! clones the handle, not the data. Reads and writes on a target are raw:
//! they never track and never trigger. Observation happens only through the
//! views built on top of it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::key::{Key, ReactiveFlag};
use super::value::{Value, MAX_ARRAY_LENGTH};
use super::view;
use crate::diagnostics::{report, Warning};
use crate::reactive::runtime;

/// Identity of a target, view or reference box.
///
/// The dependency graph and the view caches key on this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The storage behind a target.
#[derive(Debug, Clone)]
pub enum Container {
    /// String/symbol keyed record.
    Record(IndexMap<Key, Value>),
    /// Dense array. Deleted elements read back as `Undefined`.
    Array(Vec<Value>),
    /// Map-like collection. Interception of collections is left to
    /// collaborators, which drive the graph through `track`/`trigger`.
    Map(IndexMap<Key, Value>),
    /// A composite host object that is never observable.
    Opaque(&'static str),
}

/// Shape of a target, as seen by the trigger protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Record-like.
    Record,
    /// Array-like.
    Array,
    /// Map-like.
    Map,
    /// Not a container.
    Opaque,
}

/// How a target may be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetType {
    /// Never wrapped.
    Invalid,
    /// Record or array, intercepted per key.
    Common,
    /// Map-like, intercepted by an external contract.
    Collection,
}

struct TargetInner {
    id: ObjectId,
    data: RefCell<Container>,
    exempt: Cell<bool>,
    extensible: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        view::forget(self.id);
        runtime::forget_target(self.id);
    }
}

/// A raw, identity-bearing container.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    fn with_container(container: Container) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: ObjectId::next(),
                data: RefCell::new(container),
                exempt: Cell::new(false),
                extensible: Cell::new(true),
            }),
        }
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::with_container(Container::Record(IndexMap::new()))
    }

    /// A record with the given entries, in order.
    pub fn record_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        Self::with_container(Container::Record(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::with_container(Container::Array(Vec::new()))
    }

    /// An array holding the given items.
    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_container(Container::Array(items.into_iter().map(Into::into).collect()))
    }

    /// An empty map-like collection.
    pub fn map() -> Self {
        Self::with_container(Container::Map(IndexMap::new()))
    }

    /// A composite host object that is never observable.
    pub fn opaque(type_name: &'static str) -> Self {
        Self::with_container(Container::Opaque(type_name))
    }

    /// Identity of this target.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Whether two handles refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Shape of the container.
    pub fn kind(&self) -> TargetKind {
        match &*self.inner.data.borrow() {
            Container::Record(_) => TargetKind::Record,
            Container::Array(_) => TargetKind::Array,
            Container::Map(_) => TargetKind::Map,
            Container::Opaque(_) => TargetKind::Opaque,
        }
    }

    /// Name of the container type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &*self.inner.data.borrow() {
            Container::Record(_) => "Object",
            Container::Array(_) => "Array",
            Container::Map(_) => "Map",
            Container::Opaque(name) => name,
        }
    }

    pub(crate) fn target_type(&self) -> TargetType {
        if self.inner.exempt.get() || !self.inner.extensible.get() {
            return TargetType::Invalid;
        }
        match self.kind() {
            TargetKind::Record | TargetKind::Array => TargetType::Common,
            TargetKind::Map => TargetType::Collection,
            TargetKind::Opaque => TargetType::Invalid,
        }
    }

    /// Whether new keys may be added.
    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    /// Forbid adding new keys. Irreversible.
    pub fn prevent_extensions(&self) {
        self.inner.extensible.set(false);
    }

    /// Whether the target was marked exempt from observation.
    pub fn is_exempt(&self) -> bool {
        self.inner.exempt.get()
    }

    pub(crate) fn set_exempt(&self) {
        self.inner.exempt.set(true);
    }

    /// Array length, or the number of entries for records and maps.
    pub fn len(&self) -> usize {
        match &*self.inner.data.borrow() {
            Container::Record(entries) | Container::Map(entries) => entries.len(),
            Container::Array(items) => items.len(),
            Container::Opaque(_) => 0,
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw read.
    pub fn get(&self, key: &Key) -> Value {
        if let Key::Flag(flag) = key {
            return match flag {
                ReactiveFlag::Skip => Value::Bool(self.is_exempt()),
                _ => Value::Undefined,
            };
        }
        match &*self.inner.data.borrow() {
            Container::Record(entries) | Container::Map(entries) => {
                entries.get(key).cloned().unwrap_or_default()
            }
            Container::Array(items) => match key {
                Key::Index(index) => items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                _ => Value::Undefined,
            },
            Container::Opaque(_) => Value::Undefined,
        }
    }

    /// Whether the key exists. For arrays, an index exists below the length.
    pub fn has_own(&self, key: &Key) -> bool {
        match &*self.inner.data.borrow() {
            Container::Record(entries) | Container::Map(entries) => entries.contains_key(key),
            Container::Array(items) => match key {
                Key::Index(index) => *index < items.len(),
                key => key.is_length(),
            },
            Container::Opaque(_) => false,
        }
    }

    /// Raw write. Returns `false` when the container refuses the write.
    pub fn set(&self, key: Key, value: Value) -> bool {
        if matches!(key, Key::Iterate | Key::MapKeyIterate | Key::Flag(_)) {
            return false;
        }
        if self.kind() == TargetKind::Array && !key.is_index() {
            if key.is_length() {
                return self.set_length(&value);
            }
            report(Warning::InvalidArrayKey { key });
            return false;
        }
        if self.kind() == TargetKind::Array && matches!(key, Key::Index(index) if index >= MAX_ARRAY_LENGTH) {
            report(Warning::InvalidArrayKey { key });
            return false;
        }
        let extensible = self.is_extensible();
        let replaced = {
            let mut data = self.inner.data.borrow_mut();
            match &mut *data {
                Container::Record(entries) | Container::Map(entries) => {
                    if !extensible && !entries.contains_key(&key) {
                        return false;
                    }
                    entries.insert(key, value)
                }
                Container::Array(items) => {
                    let Key::Index(index) = key else {
                        return false;
                    };
                    if index >= items.len() {
                        let Some(length) = index.checked_add(1).filter(|_| extensible) else {
                            return false;
                        };
                        items.resize(length, Value::Undefined);
                    }
                    Some(std::mem::replace(&mut items[index], value))
                }
                Container::Opaque(_) => return false,
            }
        };
        drop(replaced);
        true
    }

    fn set_length(&self, value: &Value) -> bool {
        let Some(length) = value.as_array_length() else {
            report(Warning::InvalidArrayLength(value.to_string()));
            return false;
        };
        let removed: Vec<Value> = {
            let mut data = self.inner.data.borrow_mut();
            let Container::Array(items) = &mut *data else {
                return false;
            };
            if length > items.len() {
                items.resize(length, Value::Undefined);
                Vec::new()
            } else {
                items.split_off(length)
            }
        };
        drop(removed);
        true
    }

    /// Raw delete. Array elements become holes; `length` cannot be deleted.
    pub fn delete(&self, key: &Key) -> bool {
        let removed = {
            let mut data = self.inner.data.borrow_mut();
            match &mut *data {
                Container::Record(entries) | Container::Map(entries) => entries.shift_remove(key),
                Container::Array(items) => match key {
                    Key::Index(index) if *index < items.len() => {
                        Some(std::mem::take(&mut items[*index]))
                    }
                    Key::Index(_) => None,
                    key if key.is_length() => return false,
                    _ => None,
                },
                Container::Opaque(_) => None,
            }
        };
        drop(removed);
        true
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let removed = {
            let mut data = self.inner.data.borrow_mut();
            match &mut *data {
                Container::Record(entries) | Container::Map(entries) => {
                    std::mem::take(entries).into_values().collect()
                }
                Container::Array(items) => std::mem::take(items),
                Container::Opaque(_) => Vec::new(),
            }
        };
        drop(removed);
    }

    /// Own keys in order. Arrays list their indices followed by `length`.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.inner.data.borrow() {
            Container::Record(entries) | Container::Map(entries) => entries.keys().cloned().collect(),
            Container::Array(items) => (0..items.len())
                .map(Key::Index)
                .chain(std::iter::once(Key::length()))
                .collect(),
            Container::Opaque(_) => Vec::new(),
        }
    }

    /// Copy of the whole container. Nested composites are shared handles.
    pub fn snapshot(&self) -> Container {
        self.inner.data.borrow().clone()
    }

    /// Snapshot of an array's items. Empty for other containers.
    pub fn items(&self) -> Vec<Value> {
        match &*self.inner.data.borrow() {
            Container::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Snapshot of a record's or map's entries.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        match &*self.inner.data.borrow() {
            Container::Record(entries) | Container::Map(entries) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Container::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (Key::Index(index), value.clone()))
                .collect(),
            Container::Opaque(_) => Vec::new(),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("type", &self.type_name())
            .field("len", &self.len())
            .field("exempt", &self.is_exempt())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn record_reads_and_writes() {
        let target = Target::record_from([("a", 1)]);
        assert_eq!(target.get(&Key::from("a")), Value::from(1));
        assert_eq!(target.get(&Key::from("b")), Value::Undefined);

        assert!(target.set(Key::from("b"), Value::from(2)));
        assert!(target.has_own(&Key::from("b")));
        assert_eq!(target.keys(), vec![Key::from("a"), Key::from("b")]);

        assert!(target.delete(&Key::from("a")));
        assert!(!target.has_own(&Key::from("a")));
        assert_eq!(target.keys(), vec![Key::from("b")]);
        assert_eq!(target.entries(), vec![(Key::from("b"), Value::from(2))]);
    }

    #[test]
    fn array_entries_are_indexed() {
        let target = Target::array_from(["x", "y"]);
        assert_eq!(
            target.entries(),
            vec![(Key::Index(0), Value::from("x")), (Key::Index(1), Value::from("y"))]
        );
        assert!(Target::opaque("Date").entries().is_empty());
    }

    #[test]
    fn array_index_writes_grow_the_array() {
        let target = Target::array_from([1, 2]);
        assert!(target.set(Key::Index(4), Value::from(5)));
        assert_eq!(target.len(), 5);
        assert_eq!(target.get(&Key::Index(3)), Value::Undefined);
        assert_eq!(target.get(&Key::length()), Value::from(5));
    }

    #[traced_test]
    #[test]
    fn array_index_writes_past_the_length_limit_are_refused() {
        let target = Target::array_from([1, 2]);
        assert!(!target.set(Key::Index(usize::MAX), Value::from(1)));
        assert!(!target.set(Key::Index(1 << 40), Value::from(1)));
        assert!(!target.set(Key::from("18446744073709551615"), Value::from(1)));
        assert_eq!(target.len(), 2);
        assert!(logs_contain("arrays only accept index and length keys"));
    }

    #[test]
    fn records_accept_large_index_keys() {
        let target = Target::record();
        assert!(target.set(Key::Index(usize::MAX), Value::from(1)));
        assert_eq!(target.get(&Key::Index(usize::MAX)), Value::from(1));
    }

    #[test]
    fn array_length_writes_truncate_and_pad() {
        let target = Target::array_from([1, 2, 3]);
        assert!(target.set(Key::length(), Value::from(1)));
        assert_eq!(target.items(), vec![Value::from(1)]);

        assert!(target.set(Key::length(), Value::from(3)));
        assert_eq!(target.len(), 3);
        assert_eq!(target.get(&Key::Index(2)), Value::Undefined);

        assert!(!target.set(Key::length(), Value::from(-1)));
        assert!(!target.set(Key::length(), Value::from(1.5)));
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn array_delete_leaves_hole() {
        let target = Target::array_from([1, 2, 3]);
        assert!(target.delete(&Key::Index(1)));
        assert_eq!(target.len(), 3);
        assert_eq!(target.get(&Key::Index(1)), Value::Undefined);
        assert!(!target.delete(&Key::length()));
    }

    #[test]
    fn non_extensible_target_refuses_new_keys() {
        let target = Target::record_from([("a", 1)]);
        target.prevent_extensions();
        assert!(target.set(Key::from("a"), Value::from(2)));
        assert!(!target.set(Key::from("b"), Value::from(2)));
        assert_eq!(target.target_type(), TargetType::Invalid);
    }

    #[test]
    fn classification() {
        assert_eq!(Target::record().target_type(), TargetType::Common);
        assert_eq!(Target::array().target_type(), TargetType::Common);
        assert_eq!(Target::map().target_type(), TargetType::Collection);
        assert_eq!(Target::opaque("Date").target_type(), TargetType::Invalid);

        let exempt = Target::record();
        exempt.set_exempt();
        assert_eq!(exempt.target_type(), TargetType::Invalid);
        assert_eq!(exempt.get(&Key::Flag(ReactiveFlag::Skip)), Value::Bool(true));
    }

    #[test]
    fn clones_share_identity() {
        let a = Target::record();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.ptr_eq(&Target::record()));
    }
}
