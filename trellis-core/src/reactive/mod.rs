//! Reactive Primitives
//!
//! This module implements the dependency graph and the things that live on
//! it: effects, computed values, reference boxes and effect scopes.
//!
//! # Concepts
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] wraps a computation. While it runs, every tracked
//! read registers the effect as a subscriber of the key that was read. When
//! one of those keys is written, the effect is marked dirty and its
//! scheduler is queued. Reads are re-collected on every run, so an effect
//! only ever depends on what its latest run touched.
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazily evaluated, cached derivation. Writes to its
//! sources only mark it *maybe dirty*; the getter re-runs on the next read,
//! and readers of the computed re-run only if the result actually changed.
//!
//! ## Reference boxes
//!
//! A [`RefBox`] is a single observable slot.
//!
//! ## Scopes
//!
//! An [`EffectScope`] groups effects so they can be stopped together.
//!
//! # Implementation Notes
//!
//! All graph state lives in a thread-local runtime keyed by [`EffectId`] and
//! [`DepId`]. User code is never called while the runtime is borrowed, so
//! effects may freely read and write reactive data from inside their bodies.
//! Scheduling can be paused: notifications raised while paused are queued
//! and flushed, deduplicated, when the outermost pause ends.

mod computed;
mod context;
mod dep;
mod effect;
mod ref_box;
pub(crate) mod runtime;
mod scope;
mod subscriber;

pub use computed::Computed;
pub use context::{
    batch, enable_tracking, is_scheduling_paused, pause_scheduling, pause_tracking,
    pending_jobs, reset_scheduling, reset_tracking, untracked, Job, ReactiveContext,
    SchedulingPause, TrackingPause,
};
pub use effect::{
    create_effect, create_effect_with, DirtyLevel, EffectOptions, EffectScheduler,
    ReactiveEffect,
};
pub use ref_box::RefBox;
pub use runtime::{dep_count, effect_count, subscriber_count, track, trigger, TrackOp, TriggerOp};
pub use scope::{create_scope, get_current_scope, on_scope_dispose, EffectScope};
pub use subscriber::{DepId, EffectId};
