//! Effect Implementation
//!
//! A [`ReactiveEffect`] is a re-runnable computation. Every run records the
//! observable slots the body reads; a later write to any of them marks the
//! effect dirty and offers it to its scheduler.
//!
//! # How Effects Work
//!
//! 1. A run bumps the effect's generation token and resets its dependency
//!    cursor. Each read either confirms the dep already at the cursor or
//!    replaces it, so a run that reads the same things in the same order
//!    touches no subscriber sets at all.
//!
//! 2. When the body returns (or unwinds), deps past the cursor that were not
//!    read again are released.
//!
//! 3. A write raises the effect's [`DirtyLevel`]. Writes to plain data make
//!    it `Dirty`; a computed it reads only makes it `MaybeDirty`, and
//!    [`ReactiveEffect::dirty`] settles that by refreshing the computeds.
//!
//! # Lifetime
//!
//! Handles are cheap clones of one shared effect. The effect is released
//! from the runtime when its last handle is dropped. [`create_effect`] keeps
//! a handle inside the effect's own scheduler, so those effects live until
//! they are stopped.

use std::fmt;
use std::rc::Rc;

use super::context::{Job, ReactiveContext};
use super::runtime;
use super::scope::{record_effect_scope, EffectScope};
use super::subscriber::EffectId;

/// How stale an effect is.
///
/// Ordered: a trigger only ever raises the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirtyLevel {
    /// Up to date.
    NotDirty,
    /// Upstream computeds are being refreshed to settle a "maybe".
    QueryingDirty,
    /// A computed this effect reads has a getter with side effects.
    MaybeDirtyComputedSideEffect,
    /// A computed this effect reads may have changed.
    MaybeDirty,
    /// Must re-run.
    Dirty,
}

struct EffectCell<T> {
    id: EffectId,
    body: Box<dyn Fn() -> T>,
}

impl<T> Drop for EffectCell<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

/// Closes a run on every exit path, including unwinding.
struct RunGuard {
    effect: EffectId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        runtime::finish_run(self.effect);
    }
}

/// A re-runnable computation with automatic dependency tracking.
///
/// # Example
///
/// ```rust
/// use trellis_core::observe::{Key, Observable, ObserveOptions, Target, Value};
/// use trellis_core::reactive::ReactiveEffect;
///
/// let view = Observable::wrap(&Target::record_from([("n", 1)]), ObserveOptions::REACTIVE)
///     .expect("records are observable");
///
/// let effect = ReactiveEffect::new(move || view.get(&Key::from("n")), None, None, None);
/// assert_eq!(effect.run(), Value::from(1));
/// assert_eq!(effect.dependency_count(), 1);
/// ```
pub struct ReactiveEffect<T = ()> {
    inner: Rc<EffectCell<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect.
    ///
    /// `trigger` is called synchronously whenever the effect is notified;
    /// `scheduler` is queued and called once the current batch of writes
    /// ends. The effect joins `scope`, or the ambient scope when `None`.
    /// Nothing runs until [`run`](Self::run) is called.
    pub fn new<F>(
        body: F,
        trigger: Option<Job>,
        scheduler: Option<Job>,
        scope: Option<&EffectScope>,
    ) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let id = EffectId::new();
        runtime::register_effect(id, trigger, scheduler);
        record_effect_scope(id, scope);
        tracing::debug!(effect = %id, "effect created");
        Self {
            inner: Rc::new(EffectCell {
                id,
                body: Box::new(body),
            }),
        }
    }

    /// Run the body, re-collecting dependencies.
    ///
    /// A stopped effect still runs its body, without tracking anything.
    pub fn run(&self) -> T {
        let id = self.inner.id;
        if !runtime::start_run(id) {
            return (self.inner.body)();
        }
        let _ctx = ReactiveContext::enter(id);
        let _run = RunGuard { effect: id };
        (self.inner.body)()
    }
}

impl<T> ReactiveEffect<T> {
    /// Unsubscribe from every dependency and deactivate. Irreversible.
    pub fn stop(&self) {
        runtime::stop_effect(self.inner.id);
    }

    /// Whether the effect must re-run, settling "maybe dirty" first.
    pub fn dirty(&self) -> bool {
        runtime::query_dirty(self.inner.id)
    }

    /// Force the effect dirty or clean.
    pub fn set_dirty(&self, dirty: bool) {
        let level = if dirty {
            DirtyLevel::Dirty
        } else {
            DirtyLevel::NotDirty
        };
        runtime::set_dirty_level(self.inner.id, level);
    }

    /// Current dirty level, without settling it.
    pub fn dirty_level(&self) -> DirtyLevel {
        runtime::dirty_level(self.inner.id)
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        runtime::is_active(self.inner.id)
    }

    /// Let the effect be re-queued by its own writes while it runs.
    pub fn set_allow_recurse(&self, allow: bool) {
        runtime::set_allow_recurse(self.inner.id, allow);
    }

    /// Register a callback for when the effect is stopped.
    pub fn on_stop(&self, f: impl FnOnce() + 'static) {
        runtime::set_on_stop(self.inner.id, Box::new(f));
    }

    pub(crate) fn set_scheduler(&self, scheduler: Job) {
        runtime::set_scheduler(self.inner.id, scheduler);
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Number of deps recorded by the last run.
    pub fn dependency_count(&self) -> usize {
        runtime::dependency_count(self.inner.id)
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("dirty_level", &self.dirty_level())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Custom scheduler for [`create_effect_with`].
pub type EffectScheduler = Rc<dyn Fn(&ReactiveEffect)>;

/// Options for [`create_effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Re-queue on the effect's own writes during a run.
    pub allow_recurse: bool,
    /// Called instead of "re-run if dirty" when the effect is notified.
    pub scheduler: Option<EffectScheduler>,
    /// Scope to join instead of the ambient one.
    pub scope: Option<EffectScope>,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&ReactiveEffect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn scope(mut self, scope: &EffectScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub fn on_stop(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("allow_recurse", &self.allow_recurse)
            .field("scheduler", &self.scheduler.is_some())
            .field("scope", &self.scope)
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Create an effect that runs now and re-runs whenever what it read changes.
pub fn create_effect(body: impl Fn() + 'static) -> ReactiveEffect {
    create_effect_with(body, EffectOptions::default())
}

/// [`create_effect`] with options.
pub fn create_effect_with(body: impl Fn() + 'static, options: EffectOptions) -> ReactiveEffect {
    let EffectOptions {
        lazy,
        allow_recurse,
        scheduler,
        scope,
        on_stop,
    } = options;

    let effect = ReactiveEffect::new(body, None, None, scope.as_ref());
    let job: Job = {
        let effect = effect.clone();
        match scheduler {
            Some(scheduler) => Rc::new(move || scheduler(&effect)),
            None => Rc::new(move || {
                if effect.dirty() {
                    effect.run();
                }
            }),
        }
    };
    effect.set_scheduler(job);
    effect.set_allow_recurse(allow_recurse);
    if let Some(on_stop) = on_stop {
        runtime::set_on_stop(effect.id(), on_stop);
    }

    if !lazy {
        effect.run();
    }
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
