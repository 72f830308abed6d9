//! Property-based tests for the Kont runtime.
//!
//! Uses proptest to generate random inputs and verify the interpreter laws hold.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kont_runtime::{cont, reset, Cont, ContEffect, Exit, Shifted};
use proptest::prelude::*;

/// Strategy for short-circuit payloads.
fn payload() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,!]{0,24}"
}

proptest! {
    /// A body that never shifts folds through `transform`.
    #[test]
    fn identity_for_pure_success(n in any::<i64>()) {
        let c: Cont<String, i64> = cont(move |_| Ok(n));
        prop_assert_eq!(c.fold(|_| i64::MIN, |a| a), n);
        prop_assert_eq!(c.to_result(), Ok(n));
    }

    /// A shift delivers exactly the shifted value to `recover`.
    #[test]
    fn shift_delivers_value(s in payload()) {
        let expected = s.clone();
        let c: Cont<String, i32> = cont(move |eff| eff.shift(s.clone()));
        prop_assert_eq!(c.fold(|r| r, |n| n.to_string()), expected);
    }

    /// Code after a shift never runs.
    #[test]
    fn shift_skips_remaining_body(s in payload()) {
        let after = Arc::new(AtomicUsize::new(0));
        let c: Cont<String, ()> = {
            let after = Arc::clone(&after);
            cont(move |eff| {
                eff.shift::<()>(s.clone())?;
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        prop_assert!(c.to_result().is_err());
        prop_assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    /// `ensure` shifts exactly when the condition is false.
    #[test]
    fn ensure_matches_condition(cond in any::<bool>(), s in payload()) {
        let shifted = s.clone();
        let c: Cont<String, i32> = cont(move |eff| {
            eff.ensure(cond, || shifted.clone())?;
            Ok(1)
        });
        let expected = if cond { Ok(1) } else { Err(s) };
        prop_assert_eq!(c.to_result(), expected);
    }

    /// An inner scope's shift is seen by the inner fold only.
    #[test]
    fn nested_shift_is_never_misattributed(inner_val in any::<u32>(), outer_val in any::<i16>()) {
        let c: Cont<i16, u32> = cont(move |_outer| {
            let inner: Cont<u32, ()> = cont(move |eff| eff.shift(inner_val));
            inner.try_fold(|r| r, |_| 0)
        });
        prop_assert_eq!(c.to_result(), Ok(inner_val));

        let c: Cont<i16, u32> = cont(move |outer| {
            let outer = outer.clone();
            let inner: Cont<u32, ()> = cont(move |_| outer.shift(outer_val));
            inner.try_fold(|r| r, |_| 0)
        });
        prop_assert_eq!(c.to_result(), Err(outer_val));
    }

    /// Ignoring a shift and shifting again delivers the later value.
    #[test]
    fn ignored_shift_then_second_wins(first in payload(), second in payload()) {
        let expected = second.clone();
        let c: Cont<String, ()> = cont(move |eff| {
            let _ignored: Result<(), Shifted> = eff.shift(first.clone());
            eff.shift(second.clone())
        });
        prop_assert_eq!(c.to_result(), Err(expected));
    }

    /// Folding twice runs the body twice and gives equal results.
    #[test]
    fn refold_is_repeatable(n in any::<i32>(), shift in any::<bool>()) {
        let runs = Arc::new(AtomicUsize::new(0));
        let c: Cont<i32, i32> = {
            let runs = Arc::clone(&runs);
            cont(move |eff| {
                runs.fetch_add(1, Ordering::SeqCst);
                if shift { eff.shift(n) } else { Ok(n) }
            })
        };
        let first = c.run();
        let second = c.run();
        prop_assert_eq!(first, second);
        prop_assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    /// `map` only touches the value branch.
    #[test]
    fn map_preserves_short_circuit(n in any::<i32>(), shift in any::<bool>()) {
        let c: Cont<String, i32> = cont(move |eff| {
            if shift { eff.shift(n.to_string()) } else { Ok(n) }
        });
        let mapped = c.map(|v| i64::from(v) * 2);
        let expected = if shift { Err(n.to_string()) } else { Ok(i64::from(n) * 2) };
        prop_assert_eq!(mapped.to_result(), expected);
    }

    /// `traverse` returns every value or the first shifted element.
    #[test]
    fn traverse_stops_at_first_negative(items in prop::collection::vec(-50i32..50, 0..20)) {
        let c = kont_runtime::traverse(items.clone(), |&n| {
            cont(move |eff: &ContEffect<i32>| {
                eff.ensure(n >= 0, || n)?;
                Ok(n)
            })
        });
        let expected = match items.iter().find(|n| **n < 0) {
            Some(&neg) => Err(neg),
            None => Ok(items.clone()),
        };
        prop_assert_eq!(c.to_result(), expected);
    }

    /// A body that cannot shift folds to its value.
    #[test]
    fn infallible_value(n in any::<u8>()) {
        let c: Cont<Infallible, u8> = cont(move |_| Ok(n));
        prop_assert_eq!(c.value(), n);
    }

    /// `reset` classifies its own shifts as short-circuits.
    #[test]
    fn reset_exit_matches_branch(n in any::<u16>(), shift in any::<bool>()) {
        let exit = reset(|eff: &ContEffect<u16>| if shift { eff.shift(n) } else { Ok(n) }).unwrap();
        let expected = if shift { Exit::ShortCircuit(n) } else { Exit::Value(n) };
        prop_assert_eq!(exit, expected);
    }
}
