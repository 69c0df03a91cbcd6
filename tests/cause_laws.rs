//! Property-based tests for the `Cause` semiring.
//!
//! Verifies that:
//!
//! - **Identity**: `empty` is the identity of `then` and `both`
//! - **Associativity**: `then` and `both` associate under flattening
//! - **Commutativity**: `both` commutes under flattening (as a multiset)
//! - **Map**: `map` rewrites exactly the `Fail` leaves
//! - **Squash**: the collapse preference order holds

use effectio::cause::{Cause, Defect};
use effectio::runtime::FiberId;
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

fn leaf_cause() -> impl Strategy<Value = Cause<i32>> {
    prop_oneof![
        Just(Cause::empty()),
        any::<i32>().prop_map(Cause::fail),
        any::<u16>().prop_map(|code| Cause::die(Defect::message(format!("defect {code}")))),
    ]
}

fn cause_tree() -> impl Strategy<Value = Cause<i32>> {
    leaf_cause().prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(left, right)| left.then(right)),
            (inner.clone(), inner).prop_map(|(left, right)| left.both(right)),
        ]
    })
}

fn flattened(cause: &Cause<i32>) -> (Vec<i32>, Vec<String>) {
    (
        cause.failures().into_iter().copied().collect(),
        cause
            .defects()
            .into_iter()
            .map(ToString::to_string)
            .collect(),
    )
}

// =============================================================================
// Identity
// =============================================================================

proptest! {
    #[test]
    fn prop_then_right_identity(cause in cause_tree()) {
        let composed = cause.clone().then(Cause::empty());
        prop_assert_eq!(composed, cause);
    }

    #[test]
    fn prop_then_left_identity(cause in cause_tree()) {
        let composed = Cause::empty().then(cause.clone());
        prop_assert_eq!(composed, cause);
    }

    #[test]
    fn prop_both_identity(cause in cause_tree()) {
        prop_assert_eq!(cause.clone().both(Cause::empty()), cause.clone());
        prop_assert_eq!(Cause::empty().both(cause.clone()), cause);
    }
}

// =============================================================================
// Associativity and commutativity (observable flattening)
// =============================================================================

proptest! {
    #[test]
    fn prop_then_associates(
        first in cause_tree(),
        second in cause_tree(),
        third in cause_tree(),
    ) {
        let left = first.clone().then(second.clone()).then(third.clone());
        let right = first.then(second.then(third));
        prop_assert_eq!(flattened(&left), flattened(&right));
    }

    #[test]
    fn prop_both_associates(
        first in cause_tree(),
        second in cause_tree(),
        third in cause_tree(),
    ) {
        let left = first.clone().both(second.clone()).both(third.clone());
        let right = first.both(second.both(third));
        prop_assert_eq!(flattened(&left), flattened(&right));
    }

    #[test]
    fn prop_both_commutes_as_multiset(first in cause_tree(), second in cause_tree()) {
        let (mut ab_failures, mut ab_defects) = flattened(&first.clone().both(second.clone()));
        let (mut ba_failures, mut ba_defects) = flattened(&second.both(first));
        ab_failures.sort_unstable();
        ba_failures.sort_unstable();
        ab_defects.sort();
        ba_defects.sort();
        prop_assert_eq!(ab_failures, ba_failures);
        prop_assert_eq!(ab_defects, ba_defects);
    }
}

// =============================================================================
// Map
// =============================================================================

proptest! {
    #[test]
    fn prop_map_rewrites_fail_leaves_only(cause in cause_tree()) {
        let (failures, defects) = flattened(&cause);
        let mapped = cause.map(|error| i64::from(error) * 2);
        let mapped_failures: Vec<i64> = mapped.failures().into_iter().copied().collect();
        let expected: Vec<i64> = failures.into_iter().map(|error| i64::from(error) * 2).collect();
        prop_assert_eq!(mapped_failures, expected);
        let mapped_defects: Vec<String> = mapped
            .defects()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        prop_assert_eq!(mapped_defects, defects);
    }

    #[test]
    fn prop_map_identity(cause in cause_tree()) {
        let mapped = cause.clone().map(|error| error);
        prop_assert_eq!(flattened(&mapped), flattened(&cause));
    }
}

// =============================================================================
// Squash preference
// =============================================================================

proptest! {
    #[test]
    fn prop_squash_prefers_first_defect(failure in any::<i32>(), code in any::<u16>()) {
        let defect = Defect::message(format!("defect {code}"));
        let cause = Cause::fail(failure).then(Cause::die(defect.clone()));
        prop_assert_eq!(cause.squash(), defect);
    }

    #[test]
    fn prop_squash_wraps_first_failure_without_defect(first in any::<i32>(), second in any::<i32>()) {
        let cause = Cause::fail(first).then(Cause::fail(second));
        prop_assert_eq!(cause.squash().to_string(), format!("{first:?}"));
    }
}

#[test]
fn squash_of_interrupt_names_the_fiber() {
    let fiber = FiberId::fresh();
    let cause: Cause<i32> = Cause::interrupt(fiber);
    assert!(cause.squash().to_string().contains(&format!("{fiber}")));
}

#[test]
fn squash_of_empty_is_a_generic_wrapper() {
    let cause: Cause<i32> = Cause::empty();
    assert_eq!(cause.squash().to_string(), "cause is empty");
}

#[test]
fn interruptions_flatten_in_preorder() {
    let first = FiberId::fresh();
    let second = FiberId::fresh();
    let cause: Cause<i32> = Cause::interrupt(first).then(Cause::interrupt(second));
    assert_eq!(cause.interruptions(), vec![first, second]);
    assert!(cause.is_interrupted());
}
