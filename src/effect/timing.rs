//! Clock-related combinators.
//!
//! Delays block the executing fiber's host thread; there is no timer wheel.
//! Deadlines are best-effort: [`timeout`] checks the monotonic clock at the
//! reduction boundary where the child's success is delivered, so a thunk
//! that blocks the host is never preempted.

use std::error::Error;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use super::value::Effect;

/// Sleeps for `milliseconds`, then yields unit. Zero is a no-op.
pub fn delay<E>(milliseconds: u64) -> Effect<(), E>
where
    E: Send + 'static,
{
    if milliseconds == 0 {
        Effect::unit()
    } else {
        Effect::sync(move || thread::sleep(Duration::from_millis(milliseconds)))
    }
}

/// Sleeps for `seconds`, rounded to whole milliseconds. Non-positive
/// durations are a no-op.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sleep<E>(seconds: f64) -> Effect<(), E>
where
    E: Send + 'static,
{
    if seconds.is_finite() && seconds > 0.0 {
        delay((seconds * 1_000.0).round() as u64)
    } else {
        delay(0)
    }
}

/// Runs the effect and pairs its result with the elapsed wall-clock
/// milliseconds, measured with a monotonic clock.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::{timed, Effect};
/// use effectio::runtime::SyncRuntime;
///
/// let (value, elapsed_ms) = SyncRuntime::new().run(timed(
///     Effect::<i32, String>::succeed(42),
/// ));
/// assert_eq!(value, 42);
/// assert!(elapsed_ms < 1_000);
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn timed<A, E>(effect: Effect<A, E>) -> Effect<(A, u64), E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    Effect::sync(Instant::now).flat_map(move |started| {
        effect.map(move |value| (value, started.elapsed().as_millis() as u64))
    })
}

/// The expected failure produced by [`timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    /// The deadline that was exceeded, in milliseconds.
    pub limit_ms: u64,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "timed out after {}ms", self.limit_ms)
    }
}

impl Error for TimeoutError {}

/// Fails with a [`TimeoutError`] when the deadline has passed at the point
/// the child's success would be delivered.
///
/// Failures of the child pass through untouched. The deadline is checked at
/// reduction boundaries only; a blocking thunk is not interrupted.
#[allow(clippy::cast_possible_truncation)]
pub fn timeout<A, E>(effect: Effect<A, E>, limit_ms: u64) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + From<TimeoutError> + 'static,
{
    Effect::sync(Instant::now).flat_map(move |started| {
        effect.flat_map(move |value| {
            if started.elapsed().as_millis() as u64 > limit_ms {
                Effect::fail(E::from(TimeoutError { limit_ms }))
            } else {
                Effect::succeed(value)
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SyncRuntime;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum TaskError {
        TimedOut(TimeoutError),
    }

    impl From<TimeoutError> for TaskError {
        fn from(error: TimeoutError) -> Self {
            Self::TimedOut(error)
        }
    }

    #[rstest]
    fn delay_zero_is_a_no_op() {
        let (_, elapsed_ms) = SyncRuntime::new().run(timed(delay::<String>(0)));
        assert!(elapsed_ms < 100);
    }

    #[rstest]
    fn delay_sleeps_at_least_the_requested_time() {
        let (_, elapsed_ms) = SyncRuntime::new().run(timed(delay::<String>(30)));
        assert!(elapsed_ms >= 30);
    }

    #[rstest]
    fn sleep_rounds_to_milliseconds() {
        let (_, elapsed_ms) = SyncRuntime::new().run(timed(sleep::<String>(0.02)));
        assert!(elapsed_ms >= 20);
    }

    #[rstest]
    fn timeout_passes_fast_successes_through() {
        let effect = timeout(Effect::<i32, TaskError>::succeed(5), 1_000);
        assert_eq!(SyncRuntime::new().run(effect), 5);
    }

    #[rstest]
    fn timeout_fails_slow_effects() {
        let slow = delay::<TaskError>(40).as_value(5);
        let exit = SyncRuntime::new().run_exit(timeout(slow, 10));
        let cause = exit.cause().expect("deadline exceeded");
        assert_eq!(
            cause.first_failure(),
            Some(&TaskError::TimedOut(TimeoutError { limit_ms: 10 })),
        );
    }

    #[rstest]
    fn timeout_passes_child_failures_through() {
        let failing = Effect::<i32, TaskError>::try_sync(|| {
            Err(TaskError::TimedOut(TimeoutError { limit_ms: 99 }))
        });
        let exit = SyncRuntime::new().run_exit(timeout(failing, 1_000));
        let cause = exit.cause().expect("failure expected");
        assert_eq!(
            cause.first_failure(),
            Some(&TaskError::TimedOut(TimeoutError { limit_ms: 99 })),
        );
    }
}
