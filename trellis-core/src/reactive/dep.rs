//! Dependency records.
//!
//! A [`Dep`] is the set of effects that read one observable slot. Each
//! subscriber is stored with the generation token of the run that last read
//! the slot, which is how a run tells fresh reads from stale ones.

use std::rc::Weak;

use indexmap::IndexMap;

use super::subscriber::EffectId;
use crate::observe::{Key, ObjectId};

/// A computed value that publishes through a dep.
///
/// An effect settling a "maybe dirty" state refreshes each upstream
/// computed through this, and only re-runs if one of them changed.
pub(crate) trait ComputedSource {
    /// Bring the cached value up to date.
    fn refresh(&self);
}

/// What a dep belongs to, and therefore what its cleanup unlinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DepOwner {
    /// A key of a raw target in the graph.
    Property { target: ObjectId, key: Key },
    /// A single-slot publisher such as a computed or a reference box.
    Standalone,
}

pub(crate) struct Dep {
    /// Subscribers in the order they first read the slot.
    pub(crate) subscribers: IndexMap<EffectId, u64>,
    pub(crate) owner: DepOwner,
    pub(crate) computed: Option<Weak<dyn ComputedSource>>,
}

impl Dep {
    pub(crate) fn new(owner: DepOwner, computed: Option<Weak<dyn ComputedSource>>) -> Self {
        Self {
            subscribers: IndexMap::new(),
            owner,
            computed,
        }
    }

    /// Whether `effect` read this slot during the run with the given token.
    pub(crate) fn is_current(&self, effect: EffectId, track_id: u64) -> bool {
        self.subscribers.get(&effect) == Some(&track_id)
    }
}
