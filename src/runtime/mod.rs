//! Interpreters for effect values.
//!
//! Two runtimes share one reduction machine:
//!
//! - [`SyncRuntime`] — a pure trampoline on the calling thread. No
//!   suspension: `Async` and `Never` nodes are defects.
//! - [`FiberRuntime`] — cooperative fibers. A fiber owns a host thread,
//!   parks at suspension points, honours interruption and drains its
//!   finalizer list exactly once at terminal exit.
//!
//! Supporting types: [`FiberId`] names fibers, [`Deferred`] hands a fiber's
//! exit to other threads.
//!
//! # Examples
//!
//! ```rust
//! use effectio::effect::Effect;
//! use effectio::runtime::SyncRuntime;
//!
//! let exit = SyncRuntime::new().run_exit(Effect::<i32, String>::succeed(1));
//! assert_eq!(exit.value(), Some(&1));
//! ```

mod deferred;
mod fiber_id;
mod fiber_runtime;
pub(crate) mod machine;
mod sync_runtime;

pub use deferred::Deferred;
pub use fiber_id::FiberId;
pub use fiber_runtime::FiberRuntime;
pub use sync_runtime::SyncRuntime;
