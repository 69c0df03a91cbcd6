//! The `Effect` value and its combinators.
//!
//! An [`Effect<A, E>`] is an immutable description of a computation that may
//! need services from a [`Context`], may fail with a typed error `E` (or a
//! defect, or an interruption), and produces an `A` when run by one of the
//! runtimes. Building an effect performs no side effects; everything is
//! deferred until a runtime walks the description.
//!
//! Effects are one-shot values: they own the closures they were built from
//! and are consumed by the run. Combinators that conceptually re-run an
//! effect (retry, repeat, forever) therefore take a factory closure instead
//! of an effect value.
//!
//! # Examples
//!
//! ```rust
//! use effectio::effect::Effect;
//! use effectio::runtime::SyncRuntime;
//!
//! let program = Effect::<i32, String>::succeed(5)
//!     .map(|value| value * 2)
//!     .flat_map(|value| Effect::succeed(value + 1));
//!
//! assert_eq!(SyncRuntime::new().run(program), 11);
//! ```
//!
//! # Failure channels
//!
//! ```rust
//! use effectio::effect::Effect;
//! use effectio::runtime::SyncRuntime;
//!
//! let recovered = Effect::<&str, String>::fail("boom".to_string())
//!     .catch_all(|error: String| Effect::succeed("recovered"));
//!
//! assert_eq!(SyncRuntime::new().run::<_, String>(recovered), "recovered");
//! ```

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cause::{Cause, Defect};
use crate::context::{Context, Tag};
use crate::exit::Exit;

use super::ir::{
    boxed, lift_cause, lift_exit, lower_cause, unbox, unbox_error, AnyCause, AnyError, Ir,
    IrCallback,
};

/// An immutable, one-shot description of an effectful computation.
///
/// See the [module documentation](self) for an overview. The type parameters
/// are the success type `A` and the expected-failure type `E`; defects and
/// interruptions travel outside the typed channel in the [`Cause`] tree.
pub struct Effect<A, E> {
    ir: Ir,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> fmt::Debug for Effect<A, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Effect").field(&self.ir).finish()
    }
}

impl<A, E> Effect<A, E> {
    pub(crate) fn from_ir(ir: Ir) -> Self {
        Self {
            ir,
            _marker: PhantomData,
        }
    }

    pub(crate) fn into_ir(self) -> Ir {
        self.ir
    }
}

// =============================================================================
// Smart constructors
// =============================================================================

impl<A, E> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// An effect that immediately succeeds with `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    ///
    /// let effect = Effect::<i32, String>::succeed(42);
    /// assert_eq!(SyncRuntime::new().run(effect), 42);
    /// ```
    pub fn succeed(value: A) -> Self {
        Self::from_ir(Ir::Succeed(boxed(value)))
    }

    /// An effect that immediately fails with the expected error `error`.
    pub fn fail(error: E) -> Self {
        Self::fail_cause(Cause::fail(error))
    }

    /// An effect that immediately fails with the full `cause`, losslessly.
    pub fn fail_cause(cause: Cause<E>) -> Self {
        Self::from_ir(Ir::FailCause(lift_cause(cause)))
    }

    /// An effect that immediately dies with the given host error.
    ///
    /// Defects bypass the typed error channel: `catch_all` will not see
    /// them, only `catch_all_cause` does.
    pub fn defect(error: impl Error + Send + Sync + 'static) -> Self {
        Self::fail_cause(Cause::die(Defect::new(error)))
    }

    /// An effect that immediately dies with a message-only defect.
    pub fn defect_message(message: impl Into<String>) -> Self {
        Self::fail_cause(Cause::die(Defect::message(message)))
    }

    /// Defers a side-effecting thunk; a panic inside the thunk becomes a
    /// defect.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    ///
    /// let effect = Effect::<u32, String>::sync(|| 40 + 2);
    /// assert_eq!(SyncRuntime::new().run(effect), 42);
    /// ```
    pub fn sync(thunk: impl FnOnce() -> A + Send + 'static) -> Self {
        Self::from_ir(Ir::Sync(Box::new(move || boxed(thunk()))))
    }

    /// Defers a fallible thunk; `Err` surfaces as an expected failure, a
    /// panic becomes a defect.
    pub fn try_sync(thunk: impl FnOnce() -> Result<A, E> + Send + 'static) -> Self {
        Self::from_ir(Ir::TrySync {
            thunk: Box::new(move || thunk().map(boxed).map_err(|error| boxed(error) as AnyError)),
            catch: None,
        })
    }

    /// Defers a thunk and maps any panic it raises into the typed error
    /// channel through `catch`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    ///
    /// let effect = Effect::<i32, String>::try_catch(
    ///     || panic!("x"),
    ///     |defect| defect.to_string(),
    /// );
    /// let exit = SyncRuntime::new().run_exit(effect);
    /// let cause = exit.cause().expect("panic surfaces as failure");
    /// assert_eq!(cause.first_failure(), Some(&"x".to_string()));
    /// ```
    pub fn try_catch(
        thunk: impl FnOnce() -> A + Send + 'static,
        catch: impl FnOnce(Defect) -> E + Send + 'static,
    ) -> Self {
        Self::from_ir(Ir::TrySync {
            thunk: Box::new(move || Ok(boxed(thunk()))),
            catch: Some(Box::new(move |defect| boxed(catch(defect)) as AnyError)),
        })
    }

    /// A suspendable effect completed by a callback.
    ///
    /// `register` receives an [`EffectCallback`] and must arrange for it to
    /// be completed exactly once, immediately or from another thread. Later
    /// completions are silently ignored. Only the fiber runtime can park on
    /// this node; the synchronous runtime reports a defect.
    pub fn async_callback(
        register: impl FnOnce(EffectCallback<A, E>) + Send + 'static,
    ) -> Self {
        Self::from_ir(Ir::Async(Box::new(move |inner| {
            register(EffectCallback {
                inner,
                _marker: PhantomData,
            });
        })))
    }

    /// Lazily builds an effect when the runtime reaches this node.
    pub fn suspend(thunk: impl FnOnce() -> Self + Send + 'static) -> Self {
        Self::from_ir(Ir::Suspend(Box::new(move || thunk().into_ir())))
    }

    /// An effect that never completes; only interruption releases it.
    pub fn never() -> Self {
        Self::from_ir(Ir::Never)
    }

    /// An effect that interrupts the executing fiber.
    pub fn interrupt() -> Self {
        Self::from_ir(Ir::Interrupt)
    }
}

impl<E> Effect<(), E>
where
    E: Send + 'static,
{
    /// The unit effect.
    pub fn unit() -> Self {
        Self::succeed(())
    }

    /// Registers a finalizer on the executing run.
    ///
    /// The finalizer effect runs exactly once when the run reaches its
    /// terminal exit — success, failure or interruption — in LIFO order
    /// relative to other registered finalizers. Its own failures are
    /// swallowed.
    pub fn add_finalizer<EF>(finalizer: Effect<(), EF>) -> Self
    where
        EF: Send + 'static,
    {
        Self::from_ir(Ir::AddFinalizer(Box::new(finalizer.into_ir())))
    }
}

/// Reads the service bound under `tag`, shared behind `Arc`.
///
/// A missing or wrong-typed binding surfaces as a defect when the effect is
/// run.
///
/// # Examples
///
/// ```rust
/// use effectio::context::{Context, Tag};
/// use effectio::effect::get_service;
/// use effectio::runtime::SyncRuntime;
///
/// struct Config {
///     value: &'static str,
/// }
///
/// let tag: Tag<Config> = Tag::new("config");
/// let context = Context::new().add(&tag, Config { value: "hello" });
/// let effect = get_service::<Config, String>(&tag).map(|config| config.value);
/// assert_eq!(SyncRuntime::with_context(context).run(effect), "hello");
/// ```
pub fn get_service<S, E>(tag: &Tag<S>) -> Effect<Arc<S>, E>
where
    S: Send + Sync + 'static,
    E: Send + 'static,
{
    let key = tag.key_arc();
    let mismatch_key = Arc::clone(&key);
    Effect::from_ir(Ir::Access {
        key,
        project: Box::new(move |service| {
            service
                .downcast::<S>()
                .map(|service| boxed(service))
                .map_err(|_| {
                    Defect::message(format!(
                        "Service bound under {mismatch_key} has an unexpected type",
                    ))
                })
        }),
    })
}

/// Reads the service bound under `tag` and projects a value out of it.
pub fn service<S, B, E>(
    tag: &Tag<S>,
    project: impl FnOnce(&S) -> B + Send + 'static,
) -> Effect<B, E>
where
    S: Send + Sync + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    get_service(tag).map(move |service| project(&service))
}

// =============================================================================
// Combinators
// =============================================================================

impl<A, E> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// Transforms the success value; failures pass through untouched.
    pub fn map<B>(self, function: impl FnOnce(A) -> B + Send + 'static) -> Effect<B, E>
    where
        B: Send + 'static,
    {
        Effect::from_ir(Ir::Map {
            source: Box::new(self.ir),
            mapper: Box::new(move |value| boxed(function(unbox::<A>(value)))),
        })
    }

    /// Replaces the success value.
    pub fn as_value<B>(self, value: B) -> Effect<B, E>
    where
        B: Send + 'static,
    {
        self.map(move |_| value)
    }

    /// Discards the success value.
    pub fn as_unit(self) -> Effect<(), E> {
        self.map(|_| ())
    }

    /// Continues with the effect returned by `function` on success; failures
    /// pass through untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    ///
    /// let effect = Effect::<i32, String>::succeed(1)
    ///     .flat_map(|value| Effect::succeed(value + 3));
    /// assert_eq!(SyncRuntime::new().run(effect), 4);
    /// ```
    pub fn flat_map<B>(
        self,
        function: impl FnOnce(A) -> Effect<B, E> + Send + 'static,
    ) -> Effect<B, E>
    where
        B: Send + 'static,
    {
        Effect::from_ir(Ir::FlatMap {
            source: Box::new(self.ir),
            continuation: Box::new(move |value| function(unbox::<A>(value)).into_ir()),
        })
    }

    /// Alias for [`Effect::flat_map`].
    pub fn and_then<B>(
        self,
        function: impl FnOnce(A) -> Effect<B, E> + Send + 'static,
    ) -> Effect<B, E>
    where
        B: Send + 'static,
    {
        self.flat_map(function)
    }

    /// Observes the success value without changing it.
    pub fn tap(self, observe: impl FnOnce(&A) + Send + 'static) -> Self {
        self.map(move |value| {
            observe(&value);
            value
        })
    }

    /// Runs a dependent effect for its side effects and restores the
    /// original success value.
    pub fn tap_effect<B>(
        self,
        function: impl FnOnce(&A) -> Effect<B, E> + Send + 'static,
    ) -> Self
    where
        B: Send + 'static,
    {
        self.flat_map(move |value| {
            let inner = function(&value);
            inner.as_value(value)
        })
    }

    /// Sequences two effects, pairing their results.
    pub fn zip<B>(self, other: Effect<B, E>) -> Effect<(A, B), E>
    where
        B: Send + 'static,
    {
        self.flat_map(move |left| other.map(move |right| (left, right)))
    }

    /// Sequences two effects, combining their results with `function`.
    pub fn zip_with<B, C>(
        self,
        other: Effect<B, E>,
        function: impl FnOnce(A, B) -> C + Send + 'static,
    ) -> Effect<C, E>
    where
        B: Send + 'static,
        C: Send + 'static,
    {
        self.zip(other).map(move |(left, right)| function(left, right))
    }

    /// Sequences two effects, keeping the left result.
    pub fn zip_left<B>(self, other: Effect<B, E>) -> Effect<A, E>
    where
        B: Send + 'static,
    {
        self.zip(other).map(|(left, _)| left)
    }

    /// Sequences two effects, keeping the right result.
    pub fn zip_right<B>(self, other: Effect<B, E>) -> Effect<B, E>
    where
        B: Send + 'static,
    {
        self.zip(other).map(|(_, right)| right)
    }

    /// The universal handler: exactly one of the two continuations runs,
    /// with the success value or the full cause.
    ///
    /// This is the only combinator that observes failure; everything below
    /// (`catch_all`, `map_error`, `or_else`, ...) derives from it.
    pub fn fold<B, E2>(
        self,
        on_success: impl FnOnce(A) -> Effect<B, E2> + Send + 'static,
        on_failure: impl FnOnce(Cause<E>) -> Effect<B, E2> + Send + 'static,
    ) -> Effect<B, E2>
    where
        B: Send + 'static,
        E2: Send + 'static,
    {
        Effect::from_ir(Ir::Fold {
            source: Box::new(self.ir),
            on_success: Box::new(move |value| on_success(unbox::<A>(value)).into_ir()),
            on_failure: Box::new(move |cause| on_failure(lower_cause::<E>(cause)).into_ir()),
        })
    }

    /// Recovers from the first expected failure; defects and interruptions
    /// resurface unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    ///
    /// let effect = Effect::<&str, String>::fail("boom".to_string())
    ///     .catch_all(|_| Effect::succeed("ok"));
    /// assert_eq!(SyncRuntime::new().run::<_, String>(effect), "ok");
    /// ```
    pub fn catch_all<E2>(
        self,
        handler: impl FnOnce(E) -> Effect<A, E2> + Send + 'static,
    ) -> Effect<A, E2>
    where
        E2: Send + 'static,
    {
        Effect::from_ir(Ir::Fold {
            source: Box::new(self.ir),
            on_success: Box::new(Ir::Succeed),
            on_failure: Box::new(move |cause: AnyCause| match cause.take_first_failure() {
                Ok(error) => handler(unbox_error::<E>(error)).into_ir(),
                Err(untouched) => Ir::FailCause(untouched),
            }),
        })
    }

    /// Recovers from the entire cause, including defects and interruptions.
    pub fn catch_all_cause<E2>(
        self,
        handler: impl FnOnce(Cause<E>) -> Effect<A, E2> + Send + 'static,
    ) -> Effect<A, E2>
    where
        E2: Send + 'static,
    {
        self.fold(Effect::succeed, handler)
    }

    /// Recovers from the subset of expected failures accepted by `refine`;
    /// rejected errors fail again unchanged.
    ///
    /// # Errors in `refine`
    ///
    /// `refine` returns `Ok(narrowed)` for errors the handler should see and
    /// `Err(original)` for errors to re-raise.
    pub fn catch_tag<N>(
        self,
        refine: impl FnOnce(E) -> Result<N, E> + Send + 'static,
        handler: impl FnOnce(N) -> Effect<A, E> + Send + 'static,
    ) -> Self
    where
        N: Send + 'static,
    {
        self.catch_all(move |error| match refine(error) {
            Ok(narrowed) => handler(narrowed),
            Err(original) => Effect::fail(original),
        })
    }

    /// Rewrites the expected failures of the cause; defects and
    /// interruptions are fixed points.
    pub fn map_error<E2>(
        self,
        mut function: impl FnMut(E) -> E2 + Send + 'static,
    ) -> Effect<A, E2>
    where
        E2: Send + 'static,
    {
        Effect::from_ir(Ir::Fold {
            source: Box::new(self.ir),
            on_success: Box::new(Ir::Succeed),
            on_failure: Box::new(move |cause: AnyCause| {
                Ir::FailCause(
                    cause.map(|error| boxed(function(unbox_error::<E>(error))) as AnyError),
                )
            }),
        })
    }

    /// Falls back to `fallback` on any expected failure.
    pub fn or_else<E2>(self, fallback: Effect<A, E2>) -> Effect<A, E2>
    where
        E2: Send + 'static,
    {
        self.catch_all(move |_| fallback)
    }

    /// Replaces any expected failure with a constant success.
    pub fn or_else_succeed(self, value: A) -> Effect<A, E> {
        self.catch_all(move |_| Effect::succeed(value))
    }

    /// Promotes expected failures to defects, carrying the error unchanged.
    ///
    /// Running the resulting effect terminates the program (through the
    /// squashed cause) unless the defect is deliberately recovered with
    /// `catch_all_cause`.
    pub fn or_die<E2>(self) -> Effect<A, E2>
    where
        E: Error + Sync,
        E2: Send + 'static,
    {
        self.catch_all(|error| Effect::fail_cause(Cause::die(Defect::new(error))))
    }

    /// Promotes expected failures to defects through an explicit coercion,
    /// for error types that are not `std::error::Error` themselves.
    pub fn or_die_with<E2>(
        self,
        coerce: impl FnOnce(E) -> Defect + Send + 'static,
    ) -> Effect<A, E2>
    where
        E2: Send + 'static,
    {
        self.catch_all(move |error| Effect::fail_cause(Cause::die(coerce(error))))
    }

    /// Keeps expected failures matching `predicate`; everything else is
    /// promoted to a defect.
    pub fn refine_or_die(self, predicate: impl FnOnce(&E) -> bool + Send + 'static) -> Self
    where
        E: Error + Sync,
    {
        self.catch_all(move |error| {
            if predicate(&error) {
                Effect::fail(error)
            } else {
                Effect::fail_cause(Cause::die(Defect::new(error)))
            }
        })
    }

    /// Runs this effect with the ambient context overlaid by `context`.
    pub fn provide(self, context: Context) -> Self {
        Effect::from_ir(Ir::Provide {
            source: Box::new(self.ir),
            context,
        })
    }

    /// Runs this effect with a single extra service bound.
    pub fn provide_service<S>(self, tag: &Tag<S>, service: S) -> Self
    where
        S: Send + Sync + 'static,
    {
        self.provide(Context::new().add(tag, service))
    }

    /// Attaches a finalizer that runs exactly once, whether this effect
    /// succeeds or fails.
    ///
    /// `finalizer` is a factory because only one of the two paths runs and
    /// effects are one-shot. On the failure path a failing finalizer
    /// composes sequentially with the original cause; on the success path a
    /// failing finalizer surfaces as the result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::effect::Effect;
    /// use effectio::runtime::SyncRuntime;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let released = Arc::new(AtomicUsize::new(0));
    /// let observer = Arc::clone(&released);
    /// let effect = Effect::<i32, String>::succeed(1).ensuring(move || {
    ///     let observer = Arc::clone(&observer);
    ///     Effect::sync(move || {
    ///         observer.fetch_add(1, Ordering::SeqCst);
    ///     })
    /// });
    ///
    /// assert_eq!(SyncRuntime::new().run(effect), 1);
    /// assert_eq!(released.load(Ordering::SeqCst), 1);
    /// ```
    pub fn ensuring(
        self,
        finalizer: impl Fn() -> Effect<(), E> + Send + Sync + 'static,
    ) -> Self {
        let on_failure_finalizer = Arc::new(finalizer);
        let on_success_finalizer = Arc::clone(&on_failure_finalizer);
        self.fold(
            move |value| (*on_success_finalizer)().as_value(value),
            move |cause| {
                // Only one branch of the inner fold runs, so the original
                // cause is parked in a take-once slot both can reach.
                let parked = Arc::new(Mutex::new(Some(cause)));
                let on_finalizer_failure = Arc::clone(&parked);
                (*on_failure_finalizer)().fold(
                    move |()| {
                        Effect::fail_cause(
                            parked.lock().take().expect("cause consumed twice"),
                        )
                    },
                    move |finalizer_cause| {
                        let original = on_finalizer_failure
                            .lock()
                            .take()
                            .expect("cause consumed twice");
                        Effect::fail_cause(original.then(finalizer_cause))
                    },
                )
            },
        )
    }
}

// =============================================================================
// Typed async callback
// =============================================================================

/// The one-shot completion callback handed to
/// [`Effect::async_callback`] registrations.
///
/// Cloneable so it can be moved to another thread or stored; the first
/// completion wins and later ones are silently ignored.
pub struct EffectCallback<A, E> {
    inner: IrCallback,
    _marker: PhantomData<fn(A, E)>,
}

impl<A, E> Clone for EffectCallback<A, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, E> EffectCallback<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// Completes the suspended effect with the given exit.
    pub fn complete(&self, exit: Exit<A, E>) {
        self.inner.complete(lift_exit(exit));
    }

    /// Completes the suspended effect with a success value.
    pub fn succeed(&self, value: A) {
        self.complete(Exit::success(value));
    }

    /// Completes the suspended effect with an expected failure.
    pub fn fail(&self, error: E) {
        self.complete(Exit::fail(error));
    }
}

impl<A, E> fmt::Debug for EffectCallback<A, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("EffectCallback")
    }
}
