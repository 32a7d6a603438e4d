//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis fine-grained
//! reactivity engine. It implements:
//!
//! - Observable views over plain keyed data, with deep and shallow,
//!   mutable and readonly facets
//! - Effects that re-run when the data they read changes
//! - Lazily evaluated, cached computed values
//! - Reference boxes and effect scopes
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `observe`: raw targets, values and the observable views over them
//! - `reactive`: the dependency graph, effects, computeds, boxes and scopes
//! - `diagnostics`: non-fatal usage warnings, reported through `tracing`
//!
//! Everything is single-threaded. Each thread has its own dependency graph.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use trellis_core::observe::{Key, Observable, ObserveOptions, Target};
//! use trellis_core::reactive::{create_effect, Computed};
//!
//! // Create observable state
//! let state = Observable::wrap(&Target::record_from([("count", 1)]), ObserveOptions::REACTIVE)
//!     .expect("records are observable");
//!
//! // Create a derived value
//! let doubled = {
//!     let state = state.clone();
//!     Computed::new(move || state.get(&Key::from("count")).as_number().unwrap_or(0.0) * 2.0)
//! };
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0.0));
//! let _effect = {
//!     let (doubled, seen) = (doubled.clone(), seen.clone());
//!     create_effect(move || seen.set(doubled.get()))
//! };
//! assert_eq!(seen.get(), 2.0);
//!
//! // Update the state; the effect re-runs
//! state.set("count", 5);
//! assert_eq!(seen.get(), 10.0);
//! ```

pub mod diagnostics;
pub mod observe;
pub mod reactive;
