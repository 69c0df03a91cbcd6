//! Collection and repetition combinators.
//!
//! Everything here is expressed purely in terms of the effect algebra:
//! sequencing is `flat_map`, alternatives are `or_else`, and repetition
//! re-enters through `suspend` so deep loops stay off the host stack.
//!
//! Combinators that run an effect more than once ([`repeat_n`],
//! [`forever`]) take a factory closure, because effect values are one-shot.

use std::sync::Arc;

use crate::cause::{Cause, Defect};

use super::value::Effect;

pub(crate) type EffectFactory<A, E> = Arc<dyn Fn() -> Effect<A, E> + Send + Sync>;

/// Runs the effects in input order, collecting their results.
///
/// Fail-fast: the first failure short-circuits the sequence and no later
/// effect is evaluated.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::{collect_all, Effect};
/// use effectio::runtime::SyncRuntime;
///
/// let effects = (1..=3).map(|value| Effect::<i32, String>::succeed(value));
/// assert_eq!(SyncRuntime::new().run(collect_all(effects)), vec![1, 2, 3]);
/// ```
pub fn collect_all<A, E>(effects: impl IntoIterator<Item = Effect<A, E>>) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    effects
        .into_iter()
        .fold(Effect::succeed(Vec::new()), |collected, effect| {
            collected.flat_map(move |mut values| {
                effect.map(move |value| {
                    values.push(value);
                    values
                })
            })
        })
}

/// Applies `function` to every item and runs the resulting effects in order.
///
/// Equivalent to `collect_all(items.map(function))`.
pub fn traverse<T, A, E>(
    items: impl IntoIterator<Item = T>,
    function: impl FnMut(T) -> Effect<A, E>,
) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    collect_all(items.into_iter().map(function))
}

/// Tries the effects in order, succeeding with the first success.
///
/// Later alternatives are only evaluated after an expected failure; defects
/// and interruptions are not retried. An empty input is a programmer error
/// and surfaces as a defect.
pub fn first_success<A, E>(effects: impl IntoIterator<Item = Effect<A, E>>) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    let mut alternatives = effects.into_iter();
    let Some(first) = alternatives.next() else {
        return Effect::fail_cause(Cause::die(Defect::message(
            "first_success requires at least one effect",
        )));
    };
    alternatives.fold(first, Effect::or_else)
}

/// Sequences two effects into a pair. Sugar over [`Effect::zip`].
pub fn tuple2<A, B, E>(first: Effect<A, E>, second: Effect<B, E>) -> Effect<(A, B), E>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    first.zip(second)
}

/// Sequences three effects into a triple.
pub fn tuple3<A, B, C, E>(
    first: Effect<A, E>,
    second: Effect<B, E>,
    third: Effect<C, E>,
) -> Effect<(A, B, C), E>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
{
    first
        .zip(second)
        .zip(third)
        .map(|((first, second), third)| (first, second, third))
}

/// Runs the effect built by `factory` `times` times sequentially, collecting
/// the results in order. Zero repetitions succeed with an empty list.
pub fn repeat_n<A, E, F>(factory: F, times: usize) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Effect<A, E> + Send + Sync + 'static,
{
    repeat_step(Arc::new(factory), times, Vec::new())
}

fn repeat_step<A, E>(
    factory: EffectFactory<A, E>,
    remaining: usize,
    mut collected: Vec<A>,
) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    if remaining == 0 {
        return Effect::succeed(collected);
    }
    factory().flat_map(move |value| {
        collected.push(value);
        Effect::suspend(move || repeat_step(factory, remaining - 1, collected))
    })
}

/// Runs the effect built by `factory` indefinitely.
///
/// The resulting effect never succeeds; it terminates only when an
/// iteration fails or the fiber is interrupted. Under the synchronous
/// runtime the iteration cap turns an endless loop into a defect.
pub fn forever<A, E, F>(factory: F) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Effect<A, E> + Send + Sync + 'static,
{
    forever_step(Arc::new(factory))
}

fn forever_step<A, E>(factory: EffectFactory<A, E>) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    factory().flat_map(move |_| Effect::suspend(move || forever_step(factory)))
}
