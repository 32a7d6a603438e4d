//! Effect scopes.
//!
//! A scope collects the effects and computeds created while it runs, so
//! they can be stopped together. Scopes nest: a scope created inside a
//! running scope becomes its child and is stopped along with it, unless it
//! was created detached.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime;
use super::subscriber::EffectId;
use crate::diagnostics::{report, Warning};

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<EffectScope>> = const { RefCell::new(None) };
}

struct ScopeInner {
    detached: bool,
    active: Cell<bool>,
    effects: RefCell<Vec<EffectId>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    children: RefCell<Vec<EffectScope>>,
    /// Position in the parent's `children`.
    index: Cell<usize>,
}

/// A group of effects with a shared lifetime.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

/// Restores the previously active scope on drop.
struct ActiveScopeGuard {
    previous: Option<EffectScope>,
}

impl Drop for ActiveScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_SCOPE.try_with(|active| {
            if let Ok(mut active) = active.try_borrow_mut() {
                *active = previous;
            }
        });
    }
}

impl EffectScope {
    /// Create a scope. Unless `detached`, it becomes a child of the active
    /// scope and is stopped with it.
    pub fn new(detached: bool) -> Self {
        let parent = get_current_scope();
        let scope = Self {
            inner: Rc::new(ScopeInner {
                detached,
                active: Cell::new(true),
                effects: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                parent: RefCell::new(parent.as_ref().map(|p| Rc::downgrade(&p.inner))),
                children: RefCell::new(Vec::new()),
                index: Cell::new(0),
            }),
        };
        if let Some(parent) = parent.filter(|_| !detached) {
            let mut children = parent.inner.children.borrow_mut();
            scope.inner.index.set(children.len());
            children.push(scope.clone());
        }
        scope
    }

    /// Whether the scope has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether the scope was created outside its parent's lifetime.
    pub fn is_detached(&self) -> bool {
        self.inner.detached
    }

    /// Run `f` with this scope active, so effects it creates join the scope.
    ///
    /// Returns `None` without running `f` if the scope was stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            report(Warning::InactiveScopeRun);
            return None;
        }
        let previous = ACTIVE_SCOPE.with(|active| active.replace(Some(self.clone())));
        let _guard = ActiveScopeGuard { previous };
        Some(f())
    }

    /// Stop every effect, cleanup and child scope, then detach from the parent.
    pub fn stop(&self) {
        if !self.is_active() {
            report(Warning::InactiveScopeStop);
            return;
        }
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        if !self.inner.active.get() {
            return;
        }

        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        for effect in &effects {
            runtime::stop_effect(*effect);
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }

        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in &children {
            child.stop_inner(true);
        }

        let parent = self.inner.parent.borrow_mut().take();
        if !self.inner.detached && !from_parent {
            if let Some(parent) = parent.and_then(|p| p.upgrade()) {
                self.detach_from(&parent);
            }
        }

        self.inner.active.set(false);
        tracing::debug!(effects = effects.len(), children = children.len(), "scope stopped");
    }

    /// Swap-with-last removal from the parent's children list.
    fn detach_from(&self, parent: &ScopeInner) {
        let mut siblings = parent.children.borrow_mut();
        let Some(last) = siblings.pop() else {
            return;
        };
        if Rc::ptr_eq(&last.inner, &self.inner) {
            return;
        }
        let index = self.inner.index.get();
        if index < siblings.len() {
            last.inner.index.set(index);
            siblings[index] = last;
        }
    }

    /// Number of effects recorded in this scope.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Number of attached child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Whether both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("detached", &self.is_detached())
            .field("effects", &self.effect_count())
            .field("children", &self.child_count())
            .finish()
    }
}

/// Shorthand for [`EffectScope::new`].
pub fn create_scope(detached: bool) -> EffectScope {
    EffectScope::new(detached)
}

/// The scope currently running, if any.
pub fn get_current_scope() -> Option<EffectScope> {
    ACTIVE_SCOPE.with(|active| active.borrow().clone())
}

/// Register a callback to run when the active scope stops.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match get_current_scope() {
        Some(scope) => scope.inner.cleanups.borrow_mut().push(Box::new(f)),
        None => report(Warning::NoActiveScope),
    }
}

/// Record a new effect in `scope`, or in the active scope when `None`.
pub(crate) fn record_effect_scope(effect: EffectId, scope: Option<&EffectScope>) {
    let scope = scope.cloned().or_else(get_current_scope);
    if let Some(scope) = scope.filter(EffectScope::is_active) {
        scope.inner.effects.borrow_mut().push(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{reactive, Key, Target, Value};
    use crate::reactive::{create_effect, Computed};
    use tracing_test::traced_test;

    #[test]
    fn run_returns_the_result() {
        let scope = EffectScope::new(false);
        assert_eq!(scope.run(|| 42), Some(42));
    }

    #[test]
    fn effects_created_in_run_are_collected() {
        let scope = EffectScope::new(false);
        scope.run(|| {
            create_effect(|| {});
            Computed::new(|| 1);
        });
        assert_eq!(scope.effect_count(), 2);
    }

    #[test]
    fn stop_stops_collected_effects() {
        let state = reactive(&Value::from(Target::record_from([("n", 0)])));
        let view = state.as_observable().cloned().unwrap();
        let runs = Rc::new(Cell::new(0));

        let scope = EffectScope::new(false);
        scope.run(|| {
            let runs = runs.clone();
            let view = view.clone();
            create_effect(move || {
                view.get(&Key::from("n"));
                runs.set(runs.get() + 1);
            });
        });

        view.set(Key::from("n"), Value::from(1));
        assert_eq!(runs.get(), 2);

        scope.stop();
        assert!(!scope.is_active());
        view.set(Key::from("n"), Value::from(2));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_scopes_stop_with_their_parent() {
        let parent = EffectScope::new(false);
        let (child, detached) = parent
            .run(|| (EffectScope::new(false), EffectScope::new(true)))
            .unwrap();
        assert_eq!(parent.child_count(), 1);

        parent.stop();
        assert!(!child.is_active());
        assert!(detached.is_active());
    }

    #[test]
    fn stopping_a_child_detaches_it() {
        let parent = EffectScope::new(false);
        let children: Vec<EffectScope> = parent
            .run(|| (0..3).map(|_| EffectScope::new(false)).collect())
            .unwrap();
        assert_eq!(parent.child_count(), 3);

        children[0].stop();
        assert_eq!(parent.child_count(), 2);

        // The last child moved into the freed slot and can still detach.
        children[2].stop();
        assert_eq!(parent.child_count(), 1);
        children[1].stop();
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn cleanups_run_on_stop() {
        let cleaned = Rc::new(Cell::new(0));
        let scope = EffectScope::new(false);
        scope.run(|| {
            let cleaned = cleaned.clone();
            on_scope_dispose(move || cleaned.set(cleaned.get() + 1));
        });

        scope.stop();
        assert_eq!(cleaned.get(), 1);
    }

    #[test]
    fn run_restores_the_previous_scope() {
        let outer = EffectScope::new(false);
        outer.run(|| {
            let inner = EffectScope::new(false);
            inner.run(|| {
                assert!(get_current_scope().is_some_and(|s| s.ptr_eq(&inner)));
            });
            assert!(get_current_scope().is_some_and(|s| s.ptr_eq(&outer)));
        });
        assert!(get_current_scope().is_none());
    }

    #[traced_test]
    #[test]
    fn inactive_scope_warns() {
        let scope = EffectScope::new(false);
        scope.stop();

        assert_eq!(scope.run(|| 1), None);
        assert!(logs_contain("cannot run an inactive effect scope"));

        scope.stop();
        assert!(logs_contain("already inactive"));
    }

    #[traced_test]
    #[test]
    fn dispose_without_scope_warns() {
        on_scope_dispose(|| {});
        assert!(logs_contain("no active effect scope"));
    }
}
