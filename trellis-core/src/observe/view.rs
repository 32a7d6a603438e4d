//! Observable views.
//!
//! An [`Observable`] is the interception layer over a raw [`Target`]. Reads
//! through a mutable view record dependencies, writes notify them, and
//! nested composites come back wrapped in views of their own.
//!
//! Each backing object has at most one view per facet combination. Views
//! are cached weakly per combination, so wrapping the same object twice
//! yields the same view for as long as that view is alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::key::{Key, ReactiveFlag};
use super::target::{ObjectId, Target, TargetKind};
use super::value::{has_changed, Value};
use super::{is_readonly, is_shallow, to_observable, to_raw, ObserveOptions};
use crate::diagnostics::{report, Warning};
use crate::reactive::{track, trigger, TrackOp, TriggerOp};

type ViewCache = HashMap<ObjectId, Weak<ViewInner>>;

thread_local! {
    /// Indexed by [`facet_slot`].
    static VIEW_CACHES: RefCell<[ViewCache; 4]> = RefCell::new(Default::default());
}

fn facet_slot(readonly: bool, shallow: bool) -> usize {
    usize::from(readonly) * 2 + usize::from(shallow)
}

/// Drop every cache entry keyed by a backing object that no longer exists.
pub(crate) fn forget(backing: ObjectId) {
    let _ = VIEW_CACHES.try_with(|caches| {
        if let Ok(mut caches) = caches.try_borrow_mut() {
            for cache in caches.iter_mut() {
                cache.remove(&backing);
            }
        }
    });
}

/// What a view reads from and writes to.
#[derive(Clone)]
pub(crate) enum Backing {
    /// A raw target.
    Target(Target),
    /// Another view. Only readonly views over reactive views have this.
    View(Observable),
}

impl Backing {
    fn id(&self) -> ObjectId {
        match self {
            Backing::Target(target) => target.id(),
            Backing::View(view) => view.id(),
        }
    }

    fn raw_target(&self) -> Target {
        match self {
            Backing::Target(target) => target.clone(),
            Backing::View(view) => view.raw_target(),
        }
    }

    fn as_value(&self) -> Value {
        match self {
            Backing::Target(target) => Value::Object(target.clone()),
            Backing::View(view) => Value::Observable(view.clone()),
        }
    }
}

struct ViewInner {
    id: ObjectId,
    backing: Backing,
    readonly: bool,
    shallow: bool,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        let slot = facet_slot(self.readonly, self.shallow);
        let backing = self.backing.id();
        let _ = VIEW_CACHES.try_with(|caches| {
            if let Ok(mut caches) = caches.try_borrow_mut() {
                let cache = &mut caches[slot];
                if cache.get(&backing).is_some_and(|weak| weak.strong_count() == 0) {
                    cache.remove(&backing);
                }
            }
        });
    }
}

/// An observable view over a raw target.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ViewInner>,
}

impl Observable {
    /// Wrap a raw target with the given facets.
    ///
    /// Returns `None` for targets that are never wrapped: exempt,
    /// non-extensible, opaque and collection targets.
    pub fn wrap(target: &Target, options: ObserveOptions) -> Option<Self> {
        to_observable(&Value::Object(target.clone()), options)
            .as_observable()
            .cloned()
    }

    /// The live cached view of `backing` with the given facets.
    pub(crate) fn cached(backing: ObjectId, readonly: bool, shallow: bool) -> Option<Self> {
        VIEW_CACHES.with(|caches| {
            caches.borrow()[facet_slot(readonly, shallow)]
                .get(&backing)
                .and_then(Weak::upgrade)
        })
        .map(|inner| Self { inner })
    }

    /// Create and cache a view.
    pub(crate) fn create(backing: Backing, readonly: bool, shallow: bool) -> Self {
        let backing_id = backing.id();
        let view = Self {
            inner: Rc::new(ViewInner {
                id: ObjectId::next(),
                backing,
                readonly,
                shallow,
            }),
        };
        VIEW_CACHES.with(|caches| {
            caches.borrow_mut()[facet_slot(readonly, shallow)]
                .insert(backing_id, Rc::downgrade(&view.inner));
        });
        tracing::trace!(view = %view.id(), backing = %backing_id, readonly, shallow, "view created");
        view
    }

    /// Identity of the view itself.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Whether two handles refer to the same view.
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether writes through this view are rejected.
    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    /// Whether nested values are returned unwrapped.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// The raw target at the bottom of the view chain.
    pub fn raw_target(&self) -> Target {
        self.inner.backing.raw_target()
    }

    /// What this view wraps: a raw target, or a reactive view for a
    /// readonly view of one.
    pub fn backing(&self) -> Value {
        self.inner.backing.as_value()
    }

    /// Shape of the underlying target.
    pub fn kind(&self) -> TargetKind {
        self.raw_target().kind()
    }

    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    fn fetch(&self, key: &Key) -> Value {
        match &self.inner.backing {
            Backing::Target(target) => target.get(key),
            Backing::View(view) => view.get(key),
        }
    }

    /// Read a key.
    ///
    /// Mutable views record the read. Deep views unwrap reference boxes,
    /// except array elements, and return nested composites as views.
    pub fn get(&self, key: &Key) -> Value {
        if let Key::Flag(flag) = key {
            match flag {
                ReactiveFlag::IsReactive => return Value::Bool(!self.inner.readonly),
                ReactiveFlag::IsReadonly => return Value::Bool(self.inner.readonly),
                ReactiveFlag::IsShallow => return Value::Bool(self.inner.shallow),
                ReactiveFlag::Raw => return self.backing(),
                ReactiveFlag::Skip => return self.fetch(key),
            }
        }

        let value = self.fetch(key);
        if key.skips_tracking() {
            return value;
        }

        if let (false, Backing::Target(target)) = (self.inner.readonly, &self.inner.backing) {
            track(target, TrackOp::Get, key.clone());
        }

        if self.inner.shallow {
            return value;
        }

        match value {
            Value::Ref(boxed) => {
                if self.is_array() && key.is_index() {
                    Value::Ref(boxed)
                } else {
                    boxed.get()
                }
            }
            Value::Object(_) | Value::Observable(_) => to_observable(
                &value,
                ObserveOptions {
                    readonly: self.inner.readonly,
                    shallow: false,
                },
            ),
            value => value,
        }
    }

    /// Write a key. Returns `false` if the target refused the write.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let mut value = value.into();
        if self.inner.readonly {
            report(Warning::ReadonlySet { key });
            return true;
        }
        let Backing::Target(target) = &self.inner.backing else {
            return false;
        };
        let is_array = target.kind() == TargetKind::Array;

        let mut old_value = target.get(&key);
        if !self.inner.shallow {
            let old_is_readonly = is_readonly(&old_value);
            if !is_shallow(&value) && !is_readonly(&value) {
                old_value = to_raw(&old_value);
                value = to_raw(&value);
            }
            if !is_array {
                if let (Value::Ref(boxed), false) = (&old_value, value.as_ref_box().is_some()) {
                    if old_is_readonly {
                        return false;
                    }
                    boxed.set(value);
                    return true;
                }
            }
        }

        let had_key = target.has_own(&key);
        if !target.set(key.clone(), value.clone()) {
            return false;
        }
        if !had_key {
            trigger(target, TriggerOp::Add, Some(&key), &value, &Value::Undefined);
        } else if has_changed(&value, &old_value) {
            trigger(target, TriggerOp::Set, Some(&key), &value, &old_value);
        }
        true
    }

    /// Remove a key. Array elements become `Undefined` holes.
    pub fn delete(&self, key: &Key) -> bool {
        if self.inner.readonly {
            report(Warning::ReadonlyDelete { key: key.clone() });
            return true;
        }
        let Backing::Target(target) = &self.inner.backing else {
            return false;
        };
        let had_key = target.has_own(key);
        let old_value = target.get(key);
        let deleted = target.delete(key);
        if deleted && had_key {
            trigger(target, TriggerOp::Delete, Some(key), &Value::Undefined, &old_value);
        }
        deleted
    }

    /// Whether the key exists.
    pub fn has(&self, key: &Key) -> bool {
        match &self.inner.backing {
            Backing::View(view) => view.has(key),
            Backing::Target(target) => {
                if !self.inner.readonly && !key.is_builtin_symbol() {
                    track(target, TrackOp::Has, key.clone());
                }
                target.has_own(key)
            }
        }
    }

    /// Own keys in order.
    pub fn own_keys(&self) -> Vec<Key> {
        match &self.inner.backing {
            Backing::View(view) => view.own_keys(),
            Backing::Target(target) => {
                if !self.inner.readonly {
                    let shape = if target.kind() == TargetKind::Array {
                        Key::length()
                    } else {
                        Key::Iterate
                    };
                    track(target, TrackOp::Iterate, shape);
                }
                target.keys()
            }
        }
    }

    /// Array length, or number of own keys, read reactively.
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(&Key::length()).as_array_length().unwrap_or(0)
        } else {
            self.own_keys().len()
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("backing", &self.inner.backing.id())
            .field("readonly", &self.inner.readonly)
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{is_reactive, reactive, readonly, shallow_reactive};
    use crate::reactive::{create_effect, dep_count, RefBox};
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn view_of(value: Value) -> Observable {
        value.as_observable().cloned().unwrap()
    }

    fn count_runs(body: impl Fn() + 'static) -> Rc<Cell<i32>> {
        let runs = Rc::new(Cell::new(0));
        let effect = {
            let runs = runs.clone();
            create_effect(move || {
                body();
                runs.set(runs.get() + 1);
            })
        };
        // Kept alive by its scheduler.
        drop(effect);
        runs
    }

    #[test]
    fn views_are_cached_per_target() {
        let target = Value::from(Target::record());
        let a = view_of(reactive(&target));
        let b = view_of(reactive(&target));
        assert!(a.ptr_eq(&b));

        let again = view_of(reactive(&Value::from(a.clone())));
        assert!(again.ptr_eq(&a));
    }

    #[test]
    fn cache_entry_goes_with_the_view() {
        let target = Target::record();
        let id = view_of(reactive(&Value::from(target.clone()))).id();
        assert!(Observable::cached(target.id(), false, false).is_none());
        let fresh = view_of(reactive(&Value::from(target)));
        assert_ne!(fresh.id(), id);
    }

    #[test]
    fn nested_values_are_wrapped_on_read() {
        let inner = Target::record_from([("x", 1)]);
        let outer = Target::record_from([("inner", inner.clone())]);
        let view = view_of(reactive(&Value::from(outer)));

        let read = view.get(&Key::from("inner"));
        assert!(is_reactive(&read));
        assert_eq!(to_raw(&read), Value::from(inner));
        assert_eq!(read, view.get(&Key::from("inner")));
    }

    #[test]
    fn writes_store_raw_values() {
        let child = Target::record();
        let view = view_of(reactive(&Value::from(Target::record())));
        let child_view = reactive(&Value::from(child.clone()));

        view.set("child", child_view.clone());
        assert_eq!(view.raw_target().get(&Key::from("child")), Value::from(child));
        assert_eq!(view.get(&Key::from("child")), child_view);
    }

    #[test]
    fn add_notifies_iteration_and_set_does_not() {
        let view = view_of(reactive(&Value::from(Target::record_from([("a", 1)]))));
        let runs = {
            let view = view.clone();
            count_runs(move || {
                view.own_keys();
            })
        };

        view.set("a", 2);
        assert_eq!(runs.get(), 1);
        view.set("b", 1);
        assert_eq!(runs.get(), 2);
        view.delete(&Key::from("b"));
        assert_eq!(runs.get(), 3);
        view.delete(&Key::from("missing"));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn has_tracks_the_key() {
        let view = view_of(reactive(&Value::from(Target::record())));
        let runs = {
            let view = view.clone();
            count_runs(move || {
                view.has(&Key::from("a"));
            })
        };

        view.set("b", 1);
        assert_eq!(runs.get(), 1);
        view.set("a", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unchanged_write_does_not_notify() {
        let view = view_of(reactive(&Value::from(Target::record_from([("n", f64::NAN)]))));
        let runs = {
            let view = view.clone();
            count_runs(move || {
                view.get(&Key::from("n"));
            })
        };

        view.set("n", f64::NAN);
        assert_eq!(runs.get(), 1);
        view.set("n", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn refs_are_unwrapped_and_assigned_through() {
        let boxed = RefBox::new(1);
        let view = view_of(reactive(&Value::from(Target::record_from([("count", boxed.clone())]))));

        assert_eq!(view.get(&Key::from("count")), Value::from(1));
        view.set("count", 5);
        assert_eq!(boxed.get_untracked(), Value::from(5));
        assert!(view.raw_target().get(&Key::from("count")).as_ref_box().is_some());
    }

    #[test]
    fn refs_in_arrays_are_not_unwrapped() {
        let boxed = RefBox::new(1);
        let view = view_of(reactive(&Value::from(Target::array_from([boxed.clone()]))));
        assert_eq!(view.get(&Key::Index(0)), Value::from(boxed));
    }

    #[test]
    fn out_of_range_index_writes_are_refused() {
        let target = Target::array_from([1, 2]);
        let view = view_of(reactive(&Value::from(target.clone())));
        let runs = {
            let view = view.clone();
            count_runs(move || {
                view.get(&Key::length());
            })
        };

        assert!(!view.set(Key::Index(usize::MAX), 1));
        assert!(!view.set(Key::Index(1 << 40), 1));
        assert_eq!(target.len(), 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn shallow_views_return_values_as_is() {
        let inner = Target::record();
        let view = view_of(shallow_reactive(&Value::from(Target::record_from([("inner", inner.clone())]))));
        assert_eq!(view.get(&Key::from("inner")), Value::from(inner));
    }

    #[traced_test]
    #[test]
    fn readonly_views_reject_writes() {
        let target = Target::record_from([("a", 1)]);
        let view = view_of(readonly(&Value::from(target.clone())));

        assert!(view.set("a", 2));
        assert!(view.delete(&Key::from("a")));
        assert_eq!(target.get(&Key::from("a")), Value::from(1));
        assert!(logs_contain("target is readonly"));
    }

    #[test]
    fn readonly_views_do_not_track() {
        let target = Target::record_from([("a", 1)]);
        let view = view_of(readonly(&Value::from(target.clone())));
        let _runs = {
            let view = view.clone();
            count_runs(move || {
                view.get(&Key::from("a"));
            })
        };
        assert_eq!(dep_count(&target), 0);
    }

    #[test]
    fn readonly_over_reactive_tracks_through_the_reactive_view() {
        let target = Target::record_from([("a", 1)]);
        let state = reactive(&Value::from(target.clone()));
        let view = view_of(readonly(&state));
        assert_eq!(view.backing(), state);

        let runs = {
            let view = view.clone();
            count_runs(move || {
                view.get(&Key::from("a"));
            })
        };
        view_of(state).set("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn facet_keys_are_answered_by_the_view() {
        let target = Target::record();
        let view = view_of(reactive(&Value::from(target.clone())));
        assert_eq!(view.get(&Key::Flag(ReactiveFlag::IsReactive)), Value::Bool(true));
        assert_eq!(view.get(&Key::Flag(ReactiveFlag::IsReadonly)), Value::Bool(false));
        assert_eq!(view.get(&Key::Flag(ReactiveFlag::Raw)), Value::from(target));
    }
}
