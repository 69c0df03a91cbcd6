//! Property-based tests for effect and exit laws.
//!
//! Laws are checked observationally: two effects are equal when running
//! them produces equal exits.
//!
//! - **Monad laws**: left identity, right identity, associativity
//! - **Failure propagation**: `map`/`flat_map` pass failures through,
//!   `catch_all` sees expected failures only, `catch_all_cause` sees
//!   everything exactly once
//! - **Exit laws**: map/flat_map ordering and failure preservation

use effectio::cause::{Cause, Defect};
use effectio::effect::Effect;
use effectio::exit::Exit;
use effectio::runtime::SyncRuntime;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn run_exit(effect: Effect<i64, String>) -> Exit<i64, String> {
    SyncRuntime::new().run_exit(effect)
}

// =============================================================================
// Monad laws
// =============================================================================

proptest! {
    #[test]
    fn prop_left_identity(value in any::<i32>()) {
        let bind = |input: i32| Effect::<i64, String>::succeed(i64::from(input).wrapping_mul(2));

        let left = run_exit(Effect::succeed(value).flat_map(bind));
        let right = run_exit(bind(value));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_right_identity(value in any::<i64>()) {
        let effect = Effect::<i64, String>::succeed(value);
        prop_assert_eq!(run_exit(effect.flat_map(Effect::succeed)), Exit::success(value));
    }

    #[test]
    fn prop_associativity(value in any::<i32>()) {
        fn add_ten(input: i64) -> Effect<i64, String> {
            Effect::succeed(input.wrapping_add(10))
        }
        fn double(input: i64) -> Effect<i64, String> {
            Effect::succeed(input.wrapping_mul(2))
        }

        let seed = i64::from(value);
        let left = run_exit(
            Effect::<i64, String>::succeed(seed).flat_map(add_ten).flat_map(double),
        );
        let right = run_exit(
            Effect::<i64, String>::succeed(seed)
                .flat_map(|input| add_ten(input).flat_map(double)),
        );
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_map_is_flat_map_with_succeed(value in any::<i64>()) {
        let mapped = run_exit(Effect::<i64, String>::succeed(value).map(|input| input.wrapping_add(1)));
        let bound = run_exit(
            Effect::<i64, String>::succeed(value)
                .flat_map(|input| Effect::succeed(input.wrapping_add(1))),
        );
        prop_assert_eq!(mapped, bound);
    }
}

// =============================================================================
// Failure propagation
// =============================================================================

proptest! {
    #[test]
    fn prop_map_preserves_failure(error in "[a-z]{1,8}") {
        let exit = run_exit(Effect::<i64, String>::fail(error.clone()).map(|value| value + 1));
        prop_assert_eq!(exit, Exit::fail(error));
    }

    #[test]
    fn prop_catch_all_recovers_expected_failures(error in "[a-z]{1,8}") {
        let recovered = Effect::<i64, String>::fail(error.clone())
            .catch_all(move |observed| {
                assert_eq!(observed, error);
                Effect::succeed(1)
            });
        prop_assert_eq!(run_exit(recovered), Exit::success(1));
    }

    #[test]
    fn prop_catch_all_skips_successes(value in any::<i64>()) {
        let untouched = Effect::<i64, String>::succeed(value)
            .catch_all(|_| Effect::succeed(-1));
        prop_assert_eq!(run_exit(untouched), Exit::success(value));
    }

    #[test]
    fn prop_map_error_rewrites_fail_leaves(error in "[a-z]{1,8}") {
        let exit = run_exit(
            Effect::<i64, String>::fail(error.clone()).map_error(|observed| observed.to_uppercase()),
        );
        prop_assert_eq!(exit, Exit::fail(error.to_uppercase()));
    }
}

#[test]
fn catch_all_does_not_see_defects() {
    let effect = Effect::<i64, String>::defect_message("broken")
        .catch_all(|_| Effect::succeed(0));
    let exit = run_exit(effect);
    let cause = exit.cause().expect("defect resurfaces");
    assert!(cause.is_die());
    assert!(!cause.is_failure());
}

#[test]
fn catch_all_cause_sees_defects_exactly_once() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let observer = Arc::clone(&invocations);
    let effect = Effect::<i64, String>::defect_message("broken").catch_all_cause(move |cause| {
        observer.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            cause.first_defect().map(ToString::to_string),
            Some("broken".to_string()),
        );
        Effect::succeed(1)
    });
    assert_eq!(run_exit(effect), Exit::success(1));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn fail_cause_is_lossless_through_catch_all_cause() {
    let original = Cause::fail("first".to_string())
        .then(Cause::die(Defect::message("second")))
        .both(Cause::fail("third".to_string()));
    let round_tripped = Effect::<i64, String>::fail_cause(original.clone())
        .catch_all_cause(Effect::fail_cause);
    let exit = SyncRuntime::new().run_exit(round_tripped);
    assert_eq!(exit, Exit::failure(original));
}

#[test]
fn or_else_falls_back_only_on_failure() {
    let fallback_hit = run_exit(Effect::<i64, String>::fail("x".to_string()).or_else(
        Effect::succeed(2),
    ));
    assert_eq!(fallback_hit, Exit::success(2));

    let fallback_skipped =
        run_exit(Effect::<i64, String>::succeed(1).or_else(Effect::succeed(2)));
    assert_eq!(fallback_skipped, Exit::success(1));
}

#[test]
fn or_die_promotes_failures_to_defects() {
    #[derive(Debug)]
    struct Broken;

    impl std::fmt::Display for Broken {
        fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(formatter, "broken")
        }
    }

    impl std::error::Error for Broken {}

    let exit: Exit<i64, String> =
        SyncRuntime::new().run_exit(Effect::<i64, Broken>::fail(Broken).or_die());
    let cause = exit.cause().expect("defect expected");
    assert!(cause.is_die());
    assert_eq!(
        cause.first_defect().map(ToString::to_string),
        Some("broken".to_string()),
    );
}

#[test]
fn refine_or_die_keeps_matching_failures() {
    #[derive(Debug)]
    struct Coded(u32);

    impl std::fmt::Display for Coded {
        fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(formatter, "code {}", self.0)
        }
    }

    impl std::error::Error for Coded {}

    let kept = SyncRuntime::new()
        .run_exit(Effect::<i64, Coded>::fail(Coded(404)).refine_or_die(|error| error.0 < 500));
    assert!(kept.cause().expect("failure").is_failure());

    let promoted = SyncRuntime::new()
        .run_exit(Effect::<i64, Coded>::fail(Coded(500)).refine_or_die(|error| error.0 < 500));
    assert!(promoted.cause().expect("defect").is_die());
}

#[test]
fn catch_tag_refines_before_handling() {
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum AppError {
        NotFound(String),
        Fatal(String),
    }

    let refine = |error: AppError| match error {
        AppError::NotFound(name) => Ok(name),
        other => Err(other),
    };

    let handled = SyncRuntime::new().run_exit(
        Effect::<i64, AppError>::fail(AppError::NotFound("user".to_string()))
            .catch_tag(refine, |name| Effect::succeed(name.len() as i64)),
    );
    assert_eq!(handled, Exit::success(4));

    let rethrown = SyncRuntime::new().run_exit(
        Effect::<i64, AppError>::fail(AppError::Fatal("disk".to_string()))
            .catch_tag(refine, |_| Effect::succeed(0)),
    );
    assert_eq!(
        rethrown,
        Exit::fail(AppError::Fatal("disk".to_string())),
    );
}

// =============================================================================
// Exit laws
// =============================================================================

proptest! {
    #[test]
    fn prop_exit_map_then_flat_map_composes(value in any::<i32>()) {
        let exit: Exit<i32, String> = Exit::success(value);
        let composed = exit.clone().map(|input| input.wrapping_add(1)).flat_map(|input| {
            Exit::success(input.wrapping_mul(2))
        });
        let fused = exit.flat_map(|input| Exit::success(input.wrapping_add(1).wrapping_mul(2)));
        prop_assert_eq!(composed, fused);
    }

    #[test]
    fn prop_exit_failure_is_map_fixed_point(error in "[a-z]{1,8}") {
        let exit: Exit<i32, String> = Exit::fail(error);
        prop_assert_eq!(exit.clone().map(|value| value + 1), exit.clone());
        prop_assert_eq!(exit.clone().flat_map(Exit::success), exit);
    }
}
