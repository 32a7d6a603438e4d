//! Usage warnings.
//!
//! Misuse of the runtime is never fatal. The operation returns a best-effort
//! value and the problem is reported here, through `tracing`, so the host
//! application decides whether and where it shows up.

use thiserror::Error;

use crate::observe::Key;

/// A non-fatal misuse of the runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("set operation on key \"{key}\" failed: target is readonly")]
    ReadonlySet { key: Key },

    #[error("delete operation on key \"{key}\" failed: target is readonly")]
    ReadonlyDelete { key: Key },

    #[error("{method} operation failed: target is readonly")]
    ReadonlyMutation { method: &'static str },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("cannot run an inactive effect scope")]
    InactiveScopeRun,

    #[error("cannot stop an effect scope that is already inactive")]
    InactiveScopeStop,

    #[error("on_scope_dispose() is called when there is no active effect scope to be associated with")]
    NoActiveScope,

    #[error("value cannot be made reactive: {0}")]
    NotObservable(String),

    #[error("value cannot be marked raw: {0}")]
    NotExemptable(String),

    #[error("collection targets are observed by an external interceptor")]
    CollectionUnsupported,

    #[error("arrays only accept index and length keys, got \"{key}\"")]
    InvalidArrayKey { key: Key },

    #[error("invalid array length: {0}")]
    InvalidArrayLength(String),

    #[error("{method} called on a non-array target")]
    NotAnArray { method: &'static str },
}

/// Report a warning.
pub fn report(warning: Warning) {
    tracing::warn!("{warning}");
}
