//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, whether
//! reads should be tracked at all, and whether scheduler callbacks may fire
//! right now or must wait in the queue.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing effect.
//! When an effect run starts we push a frame; when it completes we pop it.
//! Each frame remembers the tracking flag that was in force before the run
//! so that nested runs restore it exactly.
//!
//! Every piece of ambient state is acquired through a guard whose `Drop`
//! releases it. The stacks therefore stay balanced on every exit path,
//! including a panic unwinding out of user code.
//!
//! # Scheduling
//!
//! Writes notify effects inside a pause/resume pair. While the pause counter
//! is non-zero, scheduler callbacks are queued instead of called. When the
//! outermost pause ends, the queue is drained in FIFO order, one callback at
//! a time, so a callback that enqueues more work extends the same flush.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::subscriber::EffectId;

/// A deferred scheduler callback.
pub type Job = Rc<dyn Fn()>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
    static PAUSE_SCHEDULE: Cell<usize> = const { Cell::new(0) };
    static JOB_QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    /// The effect whose body is executing.
    effect: EffectId,
    /// Tracking flag in force before this run started.
    prev_should_track: bool,
}

/// Guard that marks an effect as the running effect until dropped.
///
/// While this guard is alive, reads through observable views register the
/// effect as a subscriber.
pub struct ReactiveContext {
    effect: EffectId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// Tracking is switched on for the duration of the context.
    pub(crate) fn enter(effect: EffectId) -> Self {
        let prev_should_track = SHOULD_TRACK.with(|flag| flag.replace(true));
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                effect,
                prev_should_track,
            });
        });

        Self { effect }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the effect currently running, if any.
    pub fn current_effect() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.effect))
    }

    /// The effect a read should be attributed to right now.
    ///
    /// `None` when no effect is running or tracking is paused.
    pub fn tracking_effect() -> Option<EffectId> {
        if SHOULD_TRACK.with(Cell::get) {
            Self::current_effect()
        } else {
            None
        }
    }

    /// Whether reads are currently being recorded.
    pub fn is_tracking() -> bool {
        Self::tracking_effect().is_some()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK
            .try_with(|stack| stack.try_borrow_mut().ok().and_then(|mut s| s.pop()))
            .ok()
            .flatten();

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.effect, self.effect,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect, entry.effect
            );
            let _ = SHOULD_TRACK.try_with(|flag| flag.set(entry.prev_should_track));
        }
    }
}

// ----------------------------------------------------------------------------
// Tracking switch
// ----------------------------------------------------------------------------

/// Stop recording reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    let prev = SHOULD_TRACK.with(|flag| flag.replace(false));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(prev));
}

/// Force reads to be recorded until the matching [`reset_tracking`].
pub fn enable_tracking() {
    let prev = SHOULD_TRACK.with(|flag| flag.replace(true));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(prev));
}

/// Restore the tracking flag saved by the last pause or enable.
pub fn reset_tracking() {
    let last = TRACK_STACK
        .try_with(|stack| stack.try_borrow_mut().ok().and_then(|mut s| s.pop()))
        .ok()
        .flatten();
    let _ = SHOULD_TRACK.try_with(|flag| flag.set(last.unwrap_or(true)));
}

/// Guard form of [`pause_tracking`].
pub struct TrackingPause {
    _private: (),
}

impl TrackingPause {
    /// Pause tracking until the guard is dropped.
    pub fn new() -> Self {
        pause_tracking();
        Self { _private: () }
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without recording any reads it performs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}

// ----------------------------------------------------------------------------
// Scheduling
// ----------------------------------------------------------------------------

/// Hold back scheduler callbacks until the matching [`reset_scheduling`].
pub fn pause_scheduling() {
    PAUSE_SCHEDULE.with(|count| count.set(count.get() + 1));
}

/// Release one scheduling pause. The outermost release drains the queue.
pub fn reset_scheduling() {
    let remaining = PAUSE_SCHEDULE.with(|count| {
        let next = count.get().saturating_sub(1);
        count.set(next);
        next
    });
    if remaining == 0 {
        flush_jobs();
    }
}

/// Whether scheduler callbacks are currently being held back.
pub fn is_scheduling_paused() -> bool {
    PAUSE_SCHEDULE.with(Cell::get) > 0
}

/// Number of callbacks waiting for the current pause to end.
pub fn pending_jobs() -> usize {
    JOB_QUEUE.with(|queue| queue.borrow().len())
}

/// Queue a scheduler callback. A callback already waiting is not queued twice.
pub(crate) fn enqueue(job: Job) {
    JOB_QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if !queue.iter().any(|queued| Rc::ptr_eq(queued, &job)) {
            queue.push_back(job);
        }
    });
}

fn flush_jobs() {
    while PAUSE_SCHEDULE.with(Cell::get) == 0 {
        let Some(job) = JOB_QUEUE.with(|queue| queue.borrow_mut().pop_front()) else {
            break;
        };
        job();
    }
}

/// Guard form of [`pause_scheduling`].
///
/// Dropping the guard while a panic unwinds only rebalances the counter;
/// queued callbacks wait for the next flush instead of running mid-unwind.
pub struct SchedulingPause {
    _private: (),
}

impl SchedulingPause {
    /// Pause scheduling until the guard is dropped.
    pub fn new() -> Self {
        pause_scheduling();
        Self { _private: () }
    }
}

impl Default for SchedulingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SchedulingPause {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let _ = PAUSE_SCHEDULE.try_with(|count| count.set(count.get().saturating_sub(1)));
        } else {
            reset_scheduling();
        }
    }
}

/// Run `f` with scheduling paused, so every effect it invalidates re-runs
/// at most once, after `f` returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _pause = SchedulingPause::new();
    f()
}
