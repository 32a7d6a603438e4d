//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observable data,
//! computed values and effects. It owns the dependency graph and decides
//! which effects to notify when data changes.
//!
//! # How It Works
//!
//! 1. Every effect registers a record with the runtime when it is created.
//!
//! 2. When an effect reads an observable slot, [`track`] records the
//!    dependency in the slot's [`Dep`] and in the effect's ordered dep list.
//!
//! 3. When a slot is written, [`trigger`]:
//!    a. Finds the deps affected by the write
//!    b. Raises each live subscriber's dirty level
//!    c. Calls the subscriber's notify callback
//!    d. Queues the subscriber's scheduler, to be flushed once the
//!       outermost scheduling pause ends
//!
//! # Storage
//!
//! Effects and deps live in two id-keyed arenas. They refer to each other by
//! id only, so removing either side is a plain map removal and there is no
//! reference cycle to break. Raw targets map to their per-key deps by
//! [`ObjectId`].
//!
//! User code is never called while the runtime is borrowed. Callbacks are
//! cloned out of the arena first, and closures removed from the arena are
//! dropped after the borrow ends.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Weak;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::{enqueue, Job, ReactiveContext, SchedulingPause, TrackingPause};
use super::dep::{ComputedSource, Dep, DepOwner};
use super::effect::DirtyLevel;
use super::subscriber::{DepId, EffectId};
use crate::observe::{Key, ObjectId, Target, TargetKind, Value};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    /// A value read.
    Get,
    /// A key existence check.
    Has,
    /// An enumeration of keys.
    Iterate,
}

/// Kind of write being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key changed value.
    Set,
    /// A new key was added.
    Add,
    /// A key was removed.
    Delete,
    /// Every key was removed.
    Clear,
}

/// Per-effect bookkeeping.
pub(crate) struct EffectRecord {
    pub(crate) dirty_level: DirtyLevel,
    /// Generation token, bumped at the start of every run.
    pub(crate) track_id: u64,
    /// Re-entrant run depth.
    pub(crate) runnings: u32,
    pub(crate) should_schedule: bool,
    /// Deps in the order this effect read them. Only the first `deps_len`
    /// entries belong to the current run while it is in progress.
    pub(crate) deps: SmallVec<[DepId; 4]>,
    pub(crate) deps_len: usize,
    pub(crate) allow_recurse: bool,
    pub(crate) active: bool,
    pub(crate) trigger: Option<Job>,
    pub(crate) scheduler: Option<Job>,
    pub(crate) on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectRecord {
    fn new(trigger: Option<Job>, scheduler: Option<Job>) -> Self {
        Self {
            dirty_level: DirtyLevel::Dirty,
            track_id: 0,
            runnings: 0,
            should_schedule: false,
            deps: SmallVec::new(),
            deps_len: 0,
            allow_recurse: false,
            active: true,
            trigger,
            scheduler,
            on_stop: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct Runtime {
    effects: HashMap<EffectId, EffectRecord>,
    deps: HashMap<DepId, Dep>,
    targets: HashMap<ObjectId, IndexMap<Key, DepId>>,
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::default());
}

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|runtime| f(&mut runtime.borrow_mut()))
}

/// Variant for drop paths: gives up quietly during thread teardown.
fn try_with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    RUNTIME
        .try_with(|runtime| runtime.try_borrow_mut().ok().map(|mut runtime| f(&mut runtime)))
        .ok()
        .flatten()
}

impl Runtime {
    fn is_live(&self, effect: EffectId) -> bool {
        self.effects.get(&effect).is_some_and(|record| record.active)
    }

    /// Record that `effect` read `dep` during its current run.
    fn track_effect(&mut self, effect: EffectId, dep_id: DepId) {
        let Some(record) = self.effects.get_mut(&effect) else {
            return;
        };
        if !record.active {
            return;
        }
        let Some(dep) = self.deps.get_mut(&dep_id) else {
            return;
        };
        let track_id = record.track_id;
        if dep.is_current(effect, track_id) {
            return;
        }
        dep.subscribers.insert(effect, track_id);

        let slot = record.deps_len;
        let previous = record.deps.get(slot).copied();
        record.deps_len += 1;
        if previous == Some(dep_id) {
            return;
        }
        if slot < record.deps.len() {
            record.deps[slot] = dep_id;
        } else {
            record.deps.push(dep_id);
        }
        if let Some(previous) = previous {
            self.cleanup_dep_effect(previous, effect, track_id);
        }
    }

    /// Unsubscribe `effect` from a dep it did not read in the current run.
    fn cleanup_dep_effect(&mut self, dep_id: DepId, effect: EffectId, track_id: u64) {
        let Some(dep) = self.deps.get_mut(&dep_id) else {
            return;
        };
        match dep.subscribers.get(&effect) {
            Some(&seen) if seen != track_id => {
                dep.subscribers.shift_remove(&effect);
                if dep.subscribers.is_empty() {
                    self.drop_dep(dep_id);
                }
            }
            _ => {}
        }
    }

    fn drop_dep(&mut self, dep_id: DepId) {
        let Some(dep) = self.deps.remove(&dep_id) else {
            return;
        };
        if let DepOwner::Property { target, key } = dep.owner {
            if let Some(keys) = self.targets.get_mut(&target) {
                if keys.get(&key) == Some(&dep_id) {
                    keys.shift_remove(&key);
                }
                if keys.is_empty() {
                    self.targets.remove(&target);
                }
            }
        }
    }

    fn pre_cleanup(record: &mut EffectRecord) {
        record.track_id += 1;
        record.deps_len = 0;
    }

    /// Drop every dep past the cursor that the current run did not read.
    fn post_cleanup(&mut self, effect: EffectId) {
        let Some(record) = self.effects.get_mut(&effect) else {
            return;
        };
        if record.deps.len() <= record.deps_len {
            return;
        }
        let track_id = record.track_id;
        let stale: SmallVec<[DepId; 4]> = record.deps.drain(record.deps_len..).collect();
        for dep_id in stale {
            self.cleanup_dep_effect(dep_id, effect, track_id);
        }
    }
}

// ----------------------------------------------------------------------------
// Effect lifecycle
// ----------------------------------------------------------------------------

pub(crate) fn register_effect(id: EffectId, trigger: Option<Job>, scheduler: Option<Job>) {
    with_runtime(|rt| {
        rt.effects.insert(id, EffectRecord::new(trigger, scheduler));
    });
}

/// Forget an effect whose last handle is gone.
pub(crate) fn release(id: EffectId) {
    let record = try_with_runtime(|rt| {
        let record = rt.effects.remove(&id)?;
        for dep_id in &record.deps {
            if let Some(dep) = rt.deps.get_mut(dep_id) {
                dep.subscribers.shift_remove(&id);
                if dep.subscribers.is_empty() {
                    rt.drop_dep(*dep_id);
                }
            }
        }
        Some(record)
    })
    .flatten();
    drop(record);
}

/// Begin a run. Returns `false` for a stopped effect, which runs untracked.
pub(crate) fn start_run(id: EffectId) -> bool {
    with_runtime(|rt| {
        let Some(record) = rt.effects.get_mut(&id) else {
            return false;
        };
        record.dirty_level = DirtyLevel::NotDirty;
        if !record.active {
            return false;
        }
        record.runnings += 1;
        Runtime::pre_cleanup(record);
        true
    })
}

/// End a run started by [`start_run`].
pub(crate) fn finish_run(id: EffectId) {
    try_with_runtime(|rt| {
        rt.post_cleanup(id);
        if let Some(record) = rt.effects.get_mut(&id) {
            record.runnings = record.runnings.saturating_sub(1);
        }
    });
}

/// Stop an effect for good. Returns `false` if it was already stopped.
pub(crate) fn stop_effect(id: EffectId) -> bool {
    let taken = with_runtime(|rt| {
        let record = rt.effects.get_mut(&id)?;
        if !record.active {
            return None;
        }
        Runtime::pre_cleanup(record);
        let taken = (
            record.on_stop.take(),
            record.trigger.take(),
            record.scheduler.take(),
        );
        rt.post_cleanup(id);
        Some(taken)
    });
    let Some((on_stop, trigger, scheduler)) = taken else {
        return false;
    };
    if let Some(on_stop) = on_stop {
        on_stop();
    }
    with_runtime(|rt| {
        if let Some(record) = rt.effects.get_mut(&id) {
            record.active = false;
        }
    });
    tracing::debug!(effect = %id, "effect stopped");
    drop((trigger, scheduler));
    true
}

pub(crate) fn is_active(id: EffectId) -> bool {
    with_runtime(|rt| rt.is_live(id))
}

pub(crate) fn dirty_level(id: EffectId) -> DirtyLevel {
    with_runtime(|rt| {
        rt.effects
            .get(&id)
            .map_or(DirtyLevel::NotDirty, |record| record.dirty_level)
    })
}

pub(crate) fn set_dirty_level(id: EffectId, level: DirtyLevel) {
    with_runtime(|rt| {
        if let Some(record) = rt.effects.get_mut(&id) {
            record.dirty_level = level;
        }
    });
}

pub(crate) fn dependency_count(id: EffectId) -> usize {
    with_runtime(|rt| rt.effects.get(&id).map_or(0, |record| record.deps.len()))
}

pub(crate) fn set_scheduler(id: EffectId, scheduler: Job) {
    let previous = with_runtime(|rt| {
        let record = rt.effects.get_mut(&id)?;
        if !record.active {
            return None;
        }
        record.scheduler.replace(scheduler)
    });
    drop(previous);
}

pub(crate) fn set_allow_recurse(id: EffectId, allow: bool) {
    with_runtime(|rt| {
        if let Some(record) = rt.effects.get_mut(&id) {
            record.allow_recurse = allow;
        }
    });
}

pub(crate) fn set_on_stop(id: EffectId, on_stop: Box<dyn FnOnce()>) {
    let previous = with_runtime(|rt| {
        let record = rt.effects.get_mut(&id)?;
        record.on_stop.replace(on_stop)
    });
    drop(previous);
}

enum Probe {
    Done,
    Skip,
    Refresh(std::rc::Rc<dyn ComputedSource>),
}

/// Settle a "maybe dirty" effect by refreshing its upstream computeds.
///
/// Returns whether the effect is dirty.
pub(crate) fn query_dirty(id: EffectId) -> bool {
    let querying = with_runtime(|rt| match rt.effects.get_mut(&id) {
        Some(record)
            if matches!(
                record.dirty_level,
                DirtyLevel::MaybeDirtyComputedSideEffect | DirtyLevel::MaybeDirty
            ) =>
        {
            record.dirty_level = DirtyLevel::QueryingDirty;
            true
        }
        _ => false,
    });

    if querying {
        let _pause = TrackingPause::new();
        let mut index = 0;
        loop {
            let probe = with_runtime(|rt| {
                let Some(record) = rt.effects.get(&id) else {
                    return Probe::Done;
                };
                if index >= record.deps_len {
                    return Probe::Done;
                }
                let Some(dep_id) = record.deps.get(index) else {
                    return Probe::Done;
                };
                match rt
                    .deps
                    .get(dep_id)
                    .and_then(|dep| dep.computed.as_ref())
                    .and_then(Weak::upgrade)
                {
                    Some(source) => Probe::Refresh(source),
                    None => Probe::Skip,
                }
            });
            match probe {
                Probe::Done => break,
                Probe::Skip => {}
                Probe::Refresh(source) => {
                    source.refresh();
                    drop(source);
                    if dirty_level(id) >= DirtyLevel::Dirty {
                        break;
                    }
                }
            }
            index += 1;
        }
        with_runtime(|rt| {
            if let Some(record) = rt.effects.get_mut(&id) {
                if record.dirty_level == DirtyLevel::QueryingDirty {
                    record.dirty_level = DirtyLevel::NotDirty;
                }
            }
        });
    }

    dirty_level(id) >= DirtyLevel::Dirty
}

// ----------------------------------------------------------------------------
// Propagation
// ----------------------------------------------------------------------------

/// Notify every live subscriber of a dep.
pub(crate) fn trigger_effects(dep_id: DepId, level: DirtyLevel) {
    let _pause = SchedulingPause::new();
    let subscribers: SmallVec<[EffectId; 8]> = with_runtime(|rt| {
        rt.deps
            .get(&dep_id)
            .map(|dep| dep.subscribers.keys().copied().collect())
            .unwrap_or_default()
    });

    for effect in subscribers {
        let notify = with_runtime(|rt| {
            let current = rt.deps.get(&dep_id)?.subscribers.get(&effect).copied();
            let record = rt.effects.get_mut(&effect)?;
            if current != Some(record.track_id) {
                return None;
            }
            if record.dirty_level < level {
                record.should_schedule |= record.dirty_level == DirtyLevel::NotDirty;
                record.dirty_level = level;
            }
            record.should_schedule.then(|| record.trigger.clone())
        });
        let Some(trigger) = notify else {
            continue;
        };
        if let Some(trigger) = trigger {
            trigger();
        }

        let scheduler = with_runtime(|rt| {
            let record = rt.effects.get_mut(&effect)?;
            let may_recurse = record.runnings == 0 || record.allow_recurse;
            if may_recurse && record.dirty_level != DirtyLevel::MaybeDirtyComputedSideEffect {
                record.should_schedule = false;
                record.scheduler.clone()
            } else {
                None
            }
        });
        if let Some(job) = scheduler {
            enqueue(job);
        }
    }
}

/// Record a read of a raw target's key by the running effect.
///
/// Does nothing unless an effect is running with tracking enabled.
pub fn track(target: &Target, op: TrackOp, key: Key) {
    let Some(effect) = ReactiveContext::tracking_effect() else {
        return;
    };
    let object = target.id();
    tracing::trace!(%effect, %object, %key, ?op, "track");

    with_runtime(|rt| {
        if !rt.is_live(effect) {
            return;
        }
        let keys = rt.targets.entry(object).or_default();
        let dep_id = match keys.get(&key).copied() {
            Some(dep_id) => dep_id,
            None => {
                let dep_id = DepId::new();
                keys.insert(key.clone(), dep_id);
                rt.deps.insert(
                    dep_id,
                    Dep::new(DepOwner::Property { target: object, key }, None),
                );
                dep_id
            }
        };
        rt.track_effect(effect, dep_id);
    });
}

/// Propagate a write to a raw target to every effect that depends on it.
///
/// `new_value` is only consulted for array `length` writes, where it is the
/// new length. `old_value` is reported in traces.
pub fn trigger(
    target: &Target,
    op: TriggerOp,
    key: Option<&Key>,
    new_value: &Value,
    old_value: &Value,
) {
    let object = target.id();
    let kind = target.kind();
    let deps: SmallVec<[DepId; 4]> = with_runtime(|rt| {
        let Some(keys) = rt.targets.get(&object) else {
            return SmallVec::new();
        };
        collect_deps(keys, kind, op, key, new_value)
    });
    if deps.is_empty() {
        return;
    }
    tracing::trace!(
        %object,
        key = ?key,
        ?op,
        new = %new_value,
        old = %old_value,
        deps = deps.len(),
        "trigger"
    );

    let _pause = SchedulingPause::new();
    for dep_id in deps {
        trigger_effects(dep_id, DirtyLevel::Dirty);
    }
}

fn collect_deps(
    keys: &IndexMap<Key, DepId>,
    kind: TargetKind,
    op: TriggerOp,
    key: Option<&Key>,
    new_value: &Value,
) -> SmallVec<[DepId; 4]> {
    if op == TriggerOp::Clear {
        return keys.values().copied().collect();
    }

    if kind == TargetKind::Array && key.is_some_and(Key::is_length) {
        let new_length = new_value.as_array_length();
        return keys
            .iter()
            .filter(|(key, _)| {
                key.is_length()
                    || matches!((key.as_index(), new_length), (Some(index), Some(length)) if index >= length)
            })
            .map(|(_, dep_id)| *dep_id)
            .collect();
    }

    let mut deps = SmallVec::new();
    let mut push = |key: &Key| deps.extend(keys.get(key).copied());
    if let Some(key) = key {
        push(key);
    }
    match op {
        TriggerOp::Add => {
            if kind != TargetKind::Array {
                push(&Key::Iterate);
                if kind == TargetKind::Map {
                    push(&Key::MapKeyIterate);
                }
            } else if key.is_some_and(Key::is_index) {
                push(&Key::length());
            }
        }
        TriggerOp::Delete => {
            if kind != TargetKind::Array {
                push(&Key::Iterate);
                if kind == TargetKind::Map {
                    push(&Key::MapKeyIterate);
                }
            }
        }
        TriggerOp::Set => {
            if kind == TargetKind::Map {
                push(&Key::Iterate);
            }
        }
        TriggerOp::Clear => {}
    }
    deps
}

/// Drop the graph entries of a raw target that no longer exists.
pub(crate) fn forget_target(object: ObjectId) {
    let removed = try_with_runtime(|rt| rt.targets.remove(&object));
    drop(removed);
}

// ----------------------------------------------------------------------------
// Standalone deps
// ----------------------------------------------------------------------------

/// Record a read of a single-slot publisher. The dep is created on first use
/// and recreated after it was cleaned up.
pub(crate) fn track_standalone(
    slot: &Cell<Option<DepId>>,
    computed: Option<Weak<dyn ComputedSource>>,
) {
    let Some(effect) = ReactiveContext::tracking_effect() else {
        return;
    };
    with_runtime(|rt| {
        if !rt.is_live(effect) {
            return;
        }
        let dep_id = match slot.get() {
            Some(dep_id) if rt.deps.contains_key(&dep_id) => dep_id,
            _ => {
                let dep_id = DepId::new();
                rt.deps
                    .insert(dep_id, Dep::new(DepOwner::Standalone, computed));
                slot.set(Some(dep_id));
                dep_id
            }
        };
        rt.track_effect(effect, dep_id);
    });
}

pub(crate) fn trigger_standalone(slot: &Cell<Option<DepId>>, level: DirtyLevel) {
    if let Some(dep_id) = slot.get() {
        trigger_effects(dep_id, level);
    }
}

pub(crate) fn drop_standalone(slot: &Cell<Option<DepId>>) {
    if let Some(dep_id) = slot.take() {
        try_with_runtime(|rt| rt.deps.remove(&dep_id));
    }
}

pub(crate) fn standalone_subscribers(slot: &Cell<Option<DepId>>) -> usize {
    slot.get().map_or(0, |dep_id| {
        with_runtime(|rt| rt.deps.get(&dep_id).map_or(0, |dep| dep.subscribers.len()))
    })
}

// ----------------------------------------------------------------------------
// Introspection
// ----------------------------------------------------------------------------

/// Number of keys of `target` that currently have subscribers.
pub fn dep_count(target: &Target) -> usize {
    with_runtime(|rt| rt.targets.get(&target.id()).map_or(0, IndexMap::len))
}

/// Number of effects subscribed to one key of `target`.
pub fn subscriber_count(target: &Target, key: &Key) -> usize {
    with_runtime(|rt| {
        rt.targets
            .get(&target.id())
            .and_then(|keys| keys.get(key))
            .and_then(|dep_id| rt.deps.get(dep_id))
            .map_or(0, |dep| dep.subscribers.len())
    })
}

/// Number of effects alive on this thread, stopped or not.
pub fn effect_count() -> usize {
    with_runtime(|rt| rt.effects.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn effect_with_record() -> EffectId {
        let id = EffectId::new();
        register_effect(id, None, None);
        id
    }

    fn run_reading(id: EffectId, reads: &[(&Target, Key)]) {
        assert!(start_run(id));
        {
            let _ctx = ReactiveContext::enter(id);
            for (target, key) in reads {
                track(target, TrackOp::Get, key.clone());
            }
        }
        finish_run(id);
    }

    #[test]
    fn track_outside_an_effect_records_nothing() {
        let target = Target::record();
        track(&target, TrackOp::Get, Key::from("a"));
        assert_eq!(dep_count(&target), 0);
    }

    #[test]
    fn reads_become_dependencies() {
        let id = effect_with_record();
        let target = Target::record();
        run_reading(id, &[(&target, Key::from("a")), (&target, Key::from("b"))]);

        assert_eq!(dep_count(&target), 2);
        assert_eq!(subscriber_count(&target, &Key::from("a")), 1);
        assert_eq!(dependency_count(id), 2);
        release(id);
    }

    #[test]
    fn repeated_reads_are_recorded_once() {
        let id = effect_with_record();
        let target = Target::record();
        let a = Key::from("a");
        run_reading(id, &[(&target, a.clone()), (&target, a.clone()), (&target, a)]);
        assert_eq!(dependency_count(id), 1);
        release(id);
    }

    #[test]
    fn stale_dependencies_are_released_after_a_run() {
        let id = effect_with_record();
        let target = Target::record();
        run_reading(id, &[(&target, Key::from("a")), (&target, Key::from("b"))]);
        run_reading(id, &[(&target, Key::from("b"))]);

        assert_eq!(dependency_count(id), 1);
        assert_eq!(subscriber_count(&target, &Key::from("a")), 0);
        assert_eq!(dep_count(&target), 1);
        release(id);
        assert_eq!(dep_count(&target), 0);
    }

    #[test]
    fn reordered_reads_keep_every_dependency() {
        let id = effect_with_record();
        let target = Target::record();
        let (a, b, c) = (Key::from("a"), Key::from("b"), Key::from("c"));
        run_reading(id, &[(&target, a.clone()), (&target, b.clone()), (&target, c.clone())]);
        run_reading(id, &[(&target, c.clone()), (&target, b.clone())]);

        assert_eq!(dependency_count(id), 2);
        assert_eq!(subscriber_count(&target, &a), 0);
        assert_eq!(subscriber_count(&target, &b), 1);
        assert_eq!(subscriber_count(&target, &c), 1);
        release(id);
    }

    #[test]
    fn trigger_queues_the_scheduler_once() {
        let count = Rc::new(Cell::new(0));
        let id = EffectId::new();
        let scheduler: Job = {
            let count = count.clone();
            Rc::new(move || count.set(count.get() + 1))
        };
        register_effect(id, None, Some(scheduler));
        let target = Target::record();
        run_reading(id, &[(&target, Key::from("a"))]);

        let a = Key::from("a");
        trigger(&target, TriggerOp::Set, Some(&a), &Value::from(1), &Value::Undefined);
        assert_eq!(count.get(), 1);
        assert_eq!(dirty_level(id), DirtyLevel::Dirty);

        // Still dirty, not re-run: no second scheduling.
        trigger(&target, TriggerOp::Set, Some(&a), &Value::from(2), &Value::from(1));
        assert_eq!(count.get(), 1);
        release(id);
    }

    #[test]
    fn stopped_effect_releases_dependencies_and_calls_on_stop() {
        let id = effect_with_record();
        let stopped = Rc::new(Cell::new(false));
        {
            let stopped = stopped.clone();
            set_on_stop(id, Box::new(move || stopped.set(true)));
        }
        let target = Target::record();
        run_reading(id, &[(&target, Key::from("a"))]);

        assert!(stop_effect(id));
        assert!(stopped.get());
        assert!(!is_active(id));
        assert_eq!(dep_count(&target), 0);
        assert!(!stop_effect(id));
        release(id);
    }

    #[test]
    fn array_length_write_notifies_truncated_indices() {
        let id = effect_with_record();
        let target = Target::array_from([1, 2, 3]);
        run_reading(id, &[(&target, Key::Index(0)), (&target, Key::Index(2))]);

        let deps = with_runtime(|rt| {
            collect_deps(
                &rt.targets[&target.id()],
                TargetKind::Array,
                TriggerOp::Set,
                Some(&Key::length()),
                &Value::from(1),
            )
        });
        assert_eq!(deps.len(), 1);
        release(id);
    }

    #[test]
    fn map_shape_keys() {
        let id = effect_with_record();
        let target = Target::map();
        run_reading(id, &[(&target, Key::Iterate), (&target, Key::MapKeyIterate)]);
        let keys = with_runtime(|rt| rt.targets[&target.id()].clone());

        let count = |op| collect_deps(&keys, TargetKind::Map, op, Some(&Key::from("k")), &Value::Undefined).len();
        assert_eq!(count(TriggerOp::Add), 2);
        assert_eq!(count(TriggerOp::Delete), 2);
        assert_eq!(count(TriggerOp::Set), 1);
        assert_eq!(count(TriggerOp::Clear), 2);
        release(id);
    }
}
