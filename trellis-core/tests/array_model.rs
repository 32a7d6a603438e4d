//! Property-Based Tests for Array Mutators
//!
//! Every mutator on an observable array is checked against the same
//! operation on a plain `Vec`, and a `length` reader must see each new
//! length after at most one re-run per operation.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::observe::{Key, Observable, ObserveOptions, Target, Value};
use trellis_core::reactive::create_effect;

#[derive(Debug, Clone)]
enum Op {
    Push(Vec<i32>),
    Pop,
    Shift,
    Unshift(Vec<i32>),
    Splice {
        start: isize,
        delete_count: Option<usize>,
        items: Vec<i32>,
    },
}

fn arb_items() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-50..50i32, 0..4)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_items().prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Shift),
        arb_items().prop_map(Op::Unshift),
        (-6..6isize, prop::option::of(0..5usize), arb_items()).prop_map(
            |(start, delete_count, items)| Op::Splice {
                start,
                delete_count,
                items,
            }
        ),
    ]
}

fn values(items: &[i32]) -> Vec<Value> {
    items.iter().copied().map(Value::from).collect()
}

/// Apply `op` to the model, returning what the mutator should return.
fn apply_model(model: &mut Vec<i32>, op: &Op) -> Vec<Value> {
    match op {
        Op::Push(items) => {
            model.extend(items);
            vec![Value::from(model.len())]
        }
        Op::Pop => vec![model.pop().map_or(Value::Undefined, Value::from)],
        Op::Shift => {
            if model.is_empty() {
                vec![Value::Undefined]
            } else {
                vec![Value::from(model.remove(0))]
            }
        }
        Op::Unshift(items) => {
            model.splice(0..0, items.iter().copied());
            vec![Value::from(model.len())]
        }
        Op::Splice {
            start,
            delete_count,
            items,
        } => {
            let len = model.len();
            let start = if *start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                start.unsigned_abs().min(len)
            };
            let count = delete_count.unwrap_or(len - start).min(len - start);
            model
                .splice(start..start + count, items.iter().copied())
                .map(Value::from)
                .collect()
        }
    }
}

fn apply_view(view: &Observable, op: &Op) -> Vec<Value> {
    match op {
        Op::Push(items) => vec![Value::from(view.push(values(items)))],
        Op::Pop => vec![view.pop()],
        Op::Shift => vec![view.shift()],
        Op::Unshift(items) => vec![Value::from(view.unshift(values(items)))],
        Op::Splice {
            start,
            delete_count,
            items,
        } => view.splice(*start, *delete_count, values(items)),
    }
}

proptest! {
    /// Property: mutators behave like their `Vec` counterparts
    #[test]
    fn prop_mutators_match_vec(
        initial in arb_items(),
        ops in prop::collection::vec(arb_op(), 1..12)
    ) {
        let target = Target::array_from(initial.iter().copied());
        let view = Observable::wrap(&target, ObserveOptions::REACTIVE).expect("arrays are observable");
        let mut model = initial.clone();

        for op in &ops {
            let expected = apply_model(&mut model, op);
            let returned = apply_view(&view, op);
            prop_assert_eq!(returned, expected, "return value of {:?}", op);
            prop_assert_eq!(target.items(), values(&model), "contents after {:?}", op);
        }
    }

    /// Property: a length reader re-runs at most once per mutator and sees the final length
    #[test]
    fn prop_length_reader_sees_each_length_once(
        initial in arb_items(),
        ops in prop::collection::vec(arb_op(), 1..12)
    ) {
        let target = Target::array_from(initial.iter().copied());
        let view = Observable::wrap(&target, ObserveOptions::REACTIVE).expect("arrays are observable");
        let runs = Rc::new(Cell::new(0u32));
        let seen = Rc::new(Cell::new(f64::NAN));

        let _effect = {
            let (view, runs, seen) = (view.clone(), runs.clone(), seen.clone());
            create_effect(move || {
                runs.set(runs.get() + 1);
                seen.set(view.get(&Key::length()).as_number().unwrap_or(f64::NAN));
            })
        };

        let mut model = initial.clone();
        for op in &ops {
            let before = runs.get();
            let old_len = model.len();
            apply_model(&mut model, op);
            apply_view(&view, op);

            let reran = runs.get() - before;
            prop_assert!(reran <= 1, "{:?} re-ran the reader {} times", op, reran);
            prop_assert_eq!(reran == 1, model.len() != old_len);
            prop_assert_eq!(seen.get(), model.len() as f64);
        }
    }
}
