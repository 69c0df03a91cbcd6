//! Retrying with exponential backoff.
//!
//! A [`RetryPolicy`] is a plain record describing how many times to retry,
//! how long to wait between attempts and, optionally, which errors are worth
//! retrying. [`retry`] takes a factory closure — the effect under retry is
//! rebuilt for every attempt, following the factory shape the library uses
//! for all re-running combinators.

use std::fmt;
use std::sync::Arc;

use super::timing::delay;
use super::value::Effect;

type RetryPredicate<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Describes how failed attempts are retried.
///
/// The delay before retry `k` (zero-based) is
/// `min(base_delay_ms × backoff_multiplier^k, max_delay_ms)`.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::RetryPolicy;
///
/// let policy: RetryPolicy<String> = RetryPolicy::new(5, 100, 2.0, 1_000);
/// assert_eq!(policy.delay_for(0), 100);
/// assert_eq!(policy.delay_for(2), 400);
/// assert_eq!(policy.delay_for(6), 1_000);
/// ```
pub struct RetryPolicy<E> {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Upper bound on the delay, in milliseconds.
    pub max_delay_ms: u64,
    should_retry: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// A policy with explicit backoff parameters and no retry predicate.
    #[must_use]
    pub fn new(
        max_retries: u32,
        base_delay_ms: u64,
        backoff_multiplier: f64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            backoff_multiplier,
            max_delay_ms,
            should_retry: None,
        }
    }

    /// A policy that retries up to `max_retries` times without delay.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, 0, 1.0, 0)
    }

    /// Restricts retrying to errors accepted by `predicate`, which also
    /// receives the zero-based attempt number.
    #[must_use]
    pub fn with_should_retry(
        mut self,
        predicate: impl Fn(&E, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// The delay before retry `attempt`, in milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[allow(clippy::cast_precision_loss)]
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let scaled = (self.base_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        if scaled.is_finite() && scaled < self.max_delay_ms as f64 {
            scaled.max(0.0) as u64
        } else {
            self.max_delay_ms
        }
    }

    pub(crate) fn allows(&self, error: &E, attempt: u32) -> bool {
        self.should_retry
            .as_ref()
            .map_or(true, |predicate| predicate(error, attempt))
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
            max_delay_ms: self.max_delay_ms,
            should_retry: self.should_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

/// Retries the effect built by `factory` according to `policy`.
///
/// The first attempt always runs; after an expected failure the policy
/// decides whether another attempt follows, waiting out the backoff delay in
/// between. Defects and interruptions are never retried. When the retries
/// are exhausted the last failure surfaces.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::{retry, Effect, RetryPolicy};
/// use effectio::runtime::SyncRuntime;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let attempts = Arc::new(AtomicU32::new(0));
/// let observer = Arc::clone(&attempts);
/// let effect = retry(
///     move || {
///         let observer = Arc::clone(&observer);
///         Effect::<u32, String>::try_sync(move || {
///             let attempt = observer.fetch_add(1, Ordering::SeqCst);
///             if attempt < 3 {
///                 Err(format!("attempt {attempt} failed"))
///             } else {
///                 Ok(attempt)
///             }
///         })
///     },
///     RetryPolicy::immediate(3),
/// );
///
/// assert_eq!(SyncRuntime::new().run(effect), 3);
/// ```
pub fn retry<A, E, F>(factory: F, policy: RetryPolicy<E>) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Effect<A, E> + Send + Sync + 'static,
{
    retry_step(Arc::new(factory), Arc::new(policy), 0)
}

/// Retries up to `max_retries` times without delay.
pub fn retry_n<A, E, F>(factory: F, max_retries: u32) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Effect<A, E> + Send + Sync + 'static,
{
    retry(factory, RetryPolicy::immediate(max_retries))
}

fn retry_step<A, E>(
    factory: Arc<dyn Fn() -> Effect<A, E> + Send + Sync>,
    policy: Arc<RetryPolicy<E>>,
    attempt: u32,
) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    factory().catch_all(move |error| {
        if attempt < policy.max_retries && policy.allows(&error, attempt) {
            let wait = policy.delay_for(attempt);
            delay(wait).flat_map(move |()| {
                Effect::suspend(move || retry_step(factory, policy, attempt + 1))
            })
        } else {
            Effect::fail(error)
        }
    })
}

/// Re-runs a successful effect until `predicate` accepts its value, up to
/// `max_attempts` extra runs.
///
/// Unlike [`retry`] this drives on success: a rejected value triggers
/// another run, and when the attempts are exhausted the last value is
/// returned rather than an error. Failures are not retried.
pub fn retry_until<A, E, F, P>(factory: F, predicate: P, max_attempts: u32) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Effect<A, E> + Send + Sync + 'static,
    P: Fn(&A) -> bool + Send + Sync + 'static,
{
    retry_until_step(Arc::new(factory), Arc::new(predicate), max_attempts)
}

fn retry_until_step<A, E>(
    factory: Arc<dyn Fn() -> Effect<A, E> + Send + Sync>,
    predicate: Arc<dyn Fn(&A) -> bool + Send + Sync>,
    remaining: u32,
) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    factory().flat_map(move |value| {
        if remaining == 0 || predicate(&value) {
            Effect::succeed(value)
        } else {
            Effect::suspend(move || retry_until_step(factory, predicate, remaining - 1))
        }
    })
}
