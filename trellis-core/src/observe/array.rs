//! Array instrumentation.
//!
//! Identity searches see through views, so a value is found whether it is
//! passed raw or wrapped. Mutators that move elements run with tracking and
//! scheduling suspended: they read `length` without subscribing to it and
//! every effect they invalidate runs once, after the whole operation.

use super::key::Key;
use super::value::{same_value_zero, strict_equals, Value};
use super::view::Observable;
use super::to_raw;
use crate::diagnostics::{report, Warning};
use crate::reactive::{track, SchedulingPause, TrackOp, TrackingPause};

impl Observable {
    fn allow_mutation(&self, method: &'static str) -> bool {
        if self.is_readonly() {
            report(Warning::ReadonlyMutation { method });
            return false;
        }
        if !self.is_array() {
            report(Warning::NotAnArray { method });
            return false;
        }
        true
    }

    /// Subscribe to `length` and every element, then return the raw items.
    fn tracked_items(&self) -> Vec<Value> {
        let target = self.raw_target();
        if !self.is_readonly() {
            let len = self.len();
            for index in 0..len {
                track(&target, TrackOp::Get, Key::Index(index));
            }
        }
        target.items()
    }

    fn search(
        &self,
        needle: &Value,
        from_end: bool,
        eq: fn(&Value, &Value) -> bool,
    ) -> Option<usize> {
        if let Value::Observable(backing) = self.backing() {
            return backing.search(needle, from_end, eq);
        }
        let items = self.tracked_items();
        let find = |matches: &dyn Fn(&Value) -> bool| {
            if from_end {
                items.iter().rposition(matches)
            } else {
                items.iter().position(matches)
            }
        };
        find(&|item: &Value| eq(item, needle)).or_else(|| {
            let needle = to_raw(needle);
            find(&|item: &Value| eq(&to_raw(item), &needle))
        })
    }

    /// Whether the array holds `needle`, raw or wrapped. `NaN` is found.
    pub fn includes(&self, needle: &Value) -> bool {
        self.search(needle, false, same_value_zero).is_some()
    }

    /// First position of `needle`, raw or wrapped.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, false, strict_equals)
    }

    /// Last position of `needle`, raw or wrapped.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, true, strict_equals)
    }

    /// Snapshot of the elements as they read through this view.
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len()).map(|index| self.get(&Key::Index(index))).collect()
    }

    fn set_length(&self, length: usize) {
        self.set(Key::length(), length);
    }

    /// Move the element at `from` to `to`, or clear `to` if `from` is a hole.
    fn move_element(&self, from: usize, to: usize) {
        let from = Key::Index(from);
        if self.has(&from) {
            self.set(Key::Index(to), self.get(&from));
        } else {
            self.delete(&Key::Index(to));
        }
    }

    /// Append values. Returns the new length.
    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> usize {
        if !self.allow_mutation("push") {
            return self.raw_target().len();
        }
        let _tracking = TrackingPause::new();
        let _scheduling = SchedulingPause::new();

        let mut len = self.len();
        for value in values {
            self.set(Key::Index(len), value);
            len += 1;
        }
        self.set_length(len);
        len
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        if !self.allow_mutation("pop") {
            return Value::Undefined;
        }
        let _tracking = TrackingPause::new();
        let _scheduling = SchedulingPause::new();

        let len = self.len();
        if len == 0 {
            self.set_length(0);
            return Value::Undefined;
        }
        let last = Key::Index(len - 1);
        let value = self.get(&last);
        self.delete(&last);
        self.set_length(len - 1);
        value
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        if !self.allow_mutation("shift") {
            return Value::Undefined;
        }
        let _tracking = TrackingPause::new();
        let _scheduling = SchedulingPause::new();

        let len = self.len();
        if len == 0 {
            self.set_length(0);
            return Value::Undefined;
        }
        let first = self.get(&Key::Index(0));
        for index in 1..len {
            self.move_element(index, index - 1);
        }
        self.delete(&Key::Index(len - 1));
        self.set_length(len - 1);
        first
    }

    /// Prepend values, keeping their order. Returns the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> usize {
        if !self.allow_mutation("unshift") {
            return self.raw_target().len();
        }
        let _tracking = TrackingPause::new();
        let _scheduling = SchedulingPause::new();

        let values: Vec<Value> = values.into_iter().collect();
        let len = self.len();
        let count = values.len();
        if count > 0 {
            for index in (0..len).rev() {
                self.move_element(index, index + count);
            }
            for (index, value) in values.into_iter().enumerate() {
                self.set(Key::Index(index), value);
            }
        }
        self.set_length(len + count);
        len + count
    }

    /// Remove `delete_count` elements at `start` (all of the rest when
    /// `None`) and insert `items` in their place. A negative `start` counts
    /// from the end. Returns the removed elements.
    pub fn splice(
        &self,
        start: isize,
        delete_count: Option<usize>,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        if !self.allow_mutation("splice") {
            return Vec::new();
        }
        let _tracking = TrackingPause::new();
        let _scheduling = SchedulingPause::new();

        let items: Vec<Value> = items.into_iter().collect();
        let len = self.len();
        let start = if start < 0 {
            len.saturating_sub(start.unsigned_abs())
        } else {
            start.unsigned_abs().min(len)
        };
        let delete_count = delete_count.unwrap_or(len - start).min(len - start);
        let item_count = items.len();

        let removed: Vec<Value> = (start..start + delete_count)
            .filter(|index| self.has(&Key::Index(*index)))
            .map(|index| self.get(&Key::Index(index)))
            .collect();

        if item_count < delete_count {
            for index in start..len - delete_count {
                self.move_element(index + delete_count, index + item_count);
            }
            for index in (len - delete_count + item_count..len).rev() {
                self.delete(&Key::Index(index));
            }
        } else if item_count > delete_count {
            for index in (start..len - delete_count).rev() {
                self.move_element(index + delete_count, index + item_count);
            }
        }

        for (offset, item) in items.into_iter().enumerate() {
            self.set(Key::Index(start + offset), item);
        }
        self.set_length(len - delete_count + item_count);
        removed
    }
}
