//! Acquire-use-release resource safety.
//!
//! [`bracket`] guarantees that a successfully acquired resource is released
//! exactly once, on every exit path of the use effect. Resources must be
//! `Clone` because the release step needs them on whichever path runs; in
//! practice resources are shared handles (`Arc`) where cloning is cheap.

use super::value::Effect;

/// Acquires a resource, uses it, and guarantees release.
///
/// - When `acquire` fails, `release` does not run and the failure surfaces.
/// - When `acquire` succeeds, `release` runs exactly once whether
///   `use_resource` succeeds, fails or is interrupted.
/// - A failing release composes sequentially with the use effect's failure;
///   on the success path it surfaces as the result.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::{bracket, Effect};
/// use effectio::runtime::SyncRuntime;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let released = Arc::new(AtomicUsize::new(0));
/// let observer = Arc::clone(&released);
/// let effect = bracket(
///     Effect::<Arc<AtomicUsize>, String>::succeed(observer),
///     |resource| {
///         Effect::sync(move || {
///             resource.fetch_add(1, Ordering::SeqCst);
///         })
///     },
///     |_resource| Effect::succeed("used"),
/// );
///
/// assert_eq!(SyncRuntime::new().run(effect), "used");
/// assert_eq!(released.load(Ordering::SeqCst), 1);
/// ```
pub fn bracket<R, A, E, Release, Use>(
    acquire: Effect<R, E>,
    release: Release,
    use_resource: Use,
) -> Effect<A, E>
where
    R: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    Release: Fn(R) -> Effect<(), E> + Send + Sync + 'static,
    Use: FnOnce(R) -> Effect<A, E> + Send + 'static,
{
    acquire.flat_map(move |resource| {
        let for_release = resource.clone();
        use_resource(resource).ensuring(move || release(for_release.clone()))
    })
}

/// Acquires two resources in order and releases them in LIFO order.
pub fn bracket2<R1, R2, A, E, Release1, Acquire2, Release2, Use>(
    acquire_first: Effect<R1, E>,
    release_first: Release1,
    acquire_second: Acquire2,
    release_second: Release2,
    use_resources: Use,
) -> Effect<A, E>
where
    R1: Clone + Send + Sync + 'static,
    R2: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    Release1: Fn(R1) -> Effect<(), E> + Send + Sync + 'static,
    Acquire2: FnOnce(R1) -> Effect<R2, E> + Send + 'static,
    Release2: Fn(R2) -> Effect<(), E> + Send + Sync + 'static,
    Use: FnOnce(R1, R2) -> Effect<A, E> + Send + 'static,
{
    bracket(acquire_first, release_first, move |first| {
        let for_use = first.clone();
        bracket(acquire_second(first), release_second, move |second| {
            use_resources(for_use, second)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SyncRuntime;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::sync::Arc;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn record(journal: &Journal, entry: impl Into<String>) -> Effect<(), String> {
        let journal = Arc::clone(journal);
        let entry = entry.into();
        Effect::sync(move || journal.lock().push(entry))
    }

    #[rstest]
    fn release_runs_after_failed_use() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let release_journal = Arc::clone(&journal);
        let effect = bracket(
            Effect::<i32, String>::succeed(7),
            move |resource| record(&release_journal, format!("release {resource}")),
            |_| Effect::<i32, String>::fail("x".to_string()),
        );

        let exit = SyncRuntime::new().run_exit(effect);
        assert!(exit.is_failure());
        assert_eq!(*journal.lock(), vec!["release 7".to_string()]);
    }

    #[rstest]
    fn release_does_not_run_when_acquire_fails() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let release_journal = Arc::clone(&journal);
        let effect = bracket(
            Effect::<i32, String>::fail("no resource".to_string()),
            move |_| record(&release_journal, "release"),
            Effect::succeed,
        );

        let exit = SyncRuntime::new().run_exit(effect);
        let cause = exit.cause().expect("acquire failure surfaces");
        assert_eq!(cause.first_failure(), Some(&"no resource".to_string()));
        assert!(journal.lock().is_empty());
    }

    #[rstest]
    fn bracket2_releases_in_lifo_order() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let first_release = Arc::clone(&journal);
        let second_release = Arc::clone(&journal);
        let effect = bracket2(
            Effect::<&str, String>::succeed("outer"),
            move |resource| record(&first_release, format!("release {resource}")),
            |_| Effect::succeed("inner"),
            move |resource| record(&second_release, format!("release {resource}")),
            |_, _| Effect::succeed(()),
        );

        SyncRuntime::new().run(effect);
        assert_eq!(
            *journal.lock(),
            vec!["release inner".to_string(), "release outer".to_string()],
        );
    }

    #[rstest]
    fn failing_release_composes_with_use_failure() {
        let effect = bracket(
            Effect::<i32, String>::succeed(1),
            |_| Effect::fail("release failed".to_string()),
            |_| Effect::<i32, String>::fail("use failed".to_string()),
        );

        let exit = SyncRuntime::new().run_exit(effect);
        let cause = exit.cause().expect("failure expected");
        let failures = cause.failures();
        assert_eq!(
            failures,
            vec![&"use failed".to_string(), &"release failed".to_string()],
        );
    }
}
