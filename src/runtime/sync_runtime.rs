//! The synchronous, suspension-free interpreter.

use std::fmt;

use crate::context::Context;
use crate::effect::ir::lower_exit;
use crate::effect::Effect;
use crate::exit::Exit;

use super::fiber_id::FiberId;
use super::machine::{drive, SyncSuspender, DEFAULT_ITERATION_LIMIT};

/// Runs effects on the calling thread with no suspension mechanism.
///
/// Every reduction runs to completion before the run returns. Reaching an
/// `Async` or `Never` node is a defect — programs that suspend belong on
/// the [`FiberRuntime`](super::FiberRuntime). A hard iteration cap (default
/// 100 000 steps) defends against runaway recursion in user combinators;
/// raise it with [`SyncRuntime::iteration_limit`] for legitimately deep
/// programs.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::Effect;
/// use effectio::runtime::SyncRuntime;
///
/// let runtime = SyncRuntime::new();
/// let effect = Effect::<i32, String>::succeed(5).map(|n| n * 2);
/// assert_eq!(runtime.run(effect), 10);
/// ```
#[derive(Clone, Debug)]
pub struct SyncRuntime {
    context: Context,
    iteration_limit: usize,
}

impl Default for SyncRuntime {
    fn default() -> Self {
        Self {
            context: Context::new(),
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }
}

impl SyncRuntime {
    /// A runtime with an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose effects see `context` as the ambient environment.
    #[must_use]
    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }

    /// Overrides the iteration cap for runs on this runtime.
    #[must_use]
    pub fn iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Runs the effect and returns its [`Exit`]. Total: user-visible
    /// failures come back as values, never as panics.
    pub fn run_exit<A, E>(&self, effect: Effect<A, E>) -> Exit<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let exit = drive(
            effect.into_ir(),
            self.context.clone(),
            FiberId::fresh(),
            self.iteration_limit,
            &mut SyncSuspender,
        );
        lower_exit(exit)
    }

    /// Runs the effect and returns its success value.
    ///
    /// # Panics
    ///
    /// Panics with the squashed cause when the effect fails.
    pub fn run<A, E>(&self, effect: Effect<A, E>) -> A
    where
        A: Send + 'static,
        E: Send + fmt::Debug + 'static,
    {
        self.run_exit(effect).unwrap()
    }
}
