//! Computed Implementation
//!
//! A [`Computed`] is a cached derived value that re-evaluates only when
//! something it read has actually changed.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its getter under its own effect and
//!    caches the result.
//!
//! 2. When something the getter read changes, the computed is not
//!    re-evaluated. Its readers are only told that it *may* have changed.
//!
//! 3. A reader settling that "maybe" asks the computed for its value. Only
//!    then does the getter re-run, and only a result that differs from the
//!    cache marks the readers dirty.
//!
//! A computed whose getter result did not change therefore never re-runs
//! its readers, and one that is never read never re-runs its getter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::Job;
use super::dep::ComputedSource;
use super::effect::{DirtyLevel, ReactiveEffect};
use super::runtime;
use super::subscriber::DepId;
use crate::diagnostics::{report, Warning};

type Setter<T> = Box<dyn Fn(T)>;

struct ComputedInner<T: 'static> {
    effect: ReactiveEffect<T>,
    value: RefCell<Option<T>>,
    dep: Cell<Option<DepId>>,
    setter: Option<Setter<T>>,
    this: Weak<ComputedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
    fn value(&self) -> T {
        if self.effect.dirty() {
            let fresh = self.effect.run();
            let changed = self.value.borrow().as_ref() != Some(&fresh);
            if changed {
                let stale = self.value.replace(Some(fresh));
                drop(stale);
                runtime::trigger_standalone(&self.dep, DirtyLevel::Dirty);
            }
        }

        let source: Weak<dyn ComputedSource> = self.this.clone();
        runtime::track_standalone(&self.dep, Some(source));

        if self.effect.dirty_level() >= DirtyLevel::MaybeDirtyComputedSideEffect {
            runtime::trigger_standalone(&self.dep, DirtyLevel::MaybeDirtyComputedSideEffect);
        }

        let cached = self.value.borrow().clone();
        cached.unwrap_or_else(|| self.effect.run())
    }
}

impl<T: Clone + PartialEq + 'static> ComputedSource for ComputedInner<T> {
    fn refresh(&self) {
        self.value();
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        runtime::drop_standalone(&self.dep);
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust
/// use trellis_core::observe::{Key, Observable, ObserveOptions, Target, Value};
/// use trellis_core::reactive::Computed;
///
/// let view = Observable::wrap(&Target::record_from([("a", 1)]), ObserveOptions::REACTIVE)
///     .expect("records are observable");
///
/// let plus_one = {
///     let view = view.clone();
///     Computed::new(move || view.get(&Key::from("a")).as_number().unwrap_or(0.0) + 1.0)
/// };
/// assert_eq!(plus_one.get(), 2.0);
///
/// view.set(Key::from("a"), Value::from(5));
/// assert_eq!(plus_one.get(), 6.0);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a read-only computed. The getter does not run until the first
    /// [`get`](Self::get).
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(Box::new(getter), None)
    }

    /// Create a computed whose writes are handed to `setter`.
    pub fn with_setter(getter: impl Fn() -> T + 'static, setter: impl Fn(T) + 'static) -> Self {
        Self::build(Box::new(getter), Some(Box::new(setter)))
    }

    fn build(getter: Box<dyn Fn() -> T>, setter: Option<Setter<T>>) -> Self {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let notify: Job = {
                let this = this.clone();
                Rc::new(move || {
                    let Some(inner) = this.upgrade() else {
                        return;
                    };
                    let level = match inner.effect.dirty_level() {
                        DirtyLevel::MaybeDirtyComputedSideEffect => {
                            DirtyLevel::MaybeDirtyComputedSideEffect
                        }
                        _ => DirtyLevel::MaybeDirty,
                    };
                    runtime::trigger_standalone(&inner.dep, level);
                })
            };
            ComputedInner {
                effect: ReactiveEffect::new(getter, Some(notify), None, None),
                value: RefCell::new(None),
                dep: Cell::new(None),
                setter,
                this: this.clone(),
            }
        });
        Self { inner }
    }

    /// Current value, re-evaluating the getter only if needed.
    pub fn get(&self) -> T {
        self.inner.value()
    }

    /// Hand a value to the setter. Read-only computeds report a warning.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => report(Warning::ReadonlyComputed),
        }
    }
}

impl<T: 'static> Computed<T> {
    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.inner.effect
    }

    /// Whether the computed accepts writes.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Number of effects currently reading this computed.
    pub fn subscriber_count(&self) -> usize {
        runtime::standalone_subscribers(&self.inner.dep)
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.inner.value.borrow())
            .field("dirty_level", &self.inner.effect.dirty_level())
            .field("writable", &self.is_writable())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
