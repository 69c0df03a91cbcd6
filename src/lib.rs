//! # effectio
//!
//! A value-oriented algebraic effects runtime for Rust.
//!
//! ## Overview
//!
//! Programs are built by composing immutable *effect descriptions* — plain
//! values that say what should happen, not when. A *runtime* later walks the
//! description, evaluates the side-effecting leaves and produces an *exit*:
//! the success value or a lossless [`Cause`](cause::Cause) tree recording
//! every failure, defect and interruption on the way. The library provides:
//!
//! - **Effect values**: typed, composable descriptions with a closed
//!   instruction set underneath ([`effect`])
//! - **Causes and exits**: a semiring of failure reasons and the terminal
//!   result type ([`cause`], [`exit`])
//! - **Dependency injection**: an immutable, type-indexed service context
//!   ([`context`])
//! - **Two interpreters**: a stack-safe synchronous trampoline and a
//!   cooperative fiber runtime with suspension, interruption and finalizers
//!   ([`runtime`])
//! - **Derived combinators**: retry with backoff, bracket, timing,
//!   traversal, and do-notation via [`flow!`]
//!
//! ## Example
//!
//! ```rust
//! use effectio::effect::Effect;
//! use effectio::flow;
//! use effectio::runtime::SyncRuntime;
//!
//! let program = flow! {
//!     a <= Effect::<i32, String>::succeed(1);
//!     b <= Effect::succeed(2);
//!     Effect::succeed(a + b)
//! };
//!
//! assert_eq!(SyncRuntime::new().run(program), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Effect combinators move closures by design; the suggested borrows would
// change ownership semantics.
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod cause;
pub mod context;
pub mod effect;
pub mod exit;
pub mod runtime;

mod flow;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use effectio::prelude::*;
///
/// let exit = SyncRuntime::new().run_exit(Effect::<i32, String>::succeed(1));
/// assert!(exit.is_success());
/// ```
pub mod prelude {
    pub use crate::cause::{Cause, Defect};
    pub use crate::context::{Context, ContextError, Tag};
    pub use crate::effect::{
        bracket, bracket2, collect_all, delay, first_success, forever, get_service, repeat_n,
        retry, retry_n, retry_until, service, sleep, timed, timeout, traverse, tuple2, tuple3,
        Effect, EffectCallback, RetryPolicy, TimeoutError,
    };
    pub use crate::exit::Exit;
    pub use crate::runtime::{Deferred, FiberId, FiberRuntime, SyncRuntime};
}
