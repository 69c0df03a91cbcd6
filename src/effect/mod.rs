//! Effect values: construction and composition.
//!
//! The centrepiece is [`Effect`], an immutable description of a computation.
//! Constructors ([`Effect::succeed`], [`Effect::sync`],
//! [`Effect::async_callback`], ...) build leaf descriptions; combinators
//! ([`Effect::map`], [`Effect::flat_map`], [`Effect::catch_all`], ...) build
//! bigger ones; the [`runtime`](crate::runtime) module runs them.
//!
//! Free functions cover the derived vocabulary: sequential collection
//! ([`collect_all`], [`traverse`], [`first_success`]), repetition
//! ([`repeat_n`], [`forever`]), retrying ([`retry`], [`RetryPolicy`]),
//! clocked combinators ([`delay`], [`timed`], [`timeout`]) and resource
//! safety ([`bracket`]).
//!
//! # Examples
//!
//! ```rust
//! use effectio::effect::{collect_all, Effect};
//! use effectio::runtime::SyncRuntime;
//!
//! let program = collect_all((1..=3).map(|n| Effect::<i32, String>::succeed(n * n)));
//! assert_eq!(SyncRuntime::new().run(program), vec![1, 4, 9]);
//! ```

pub(crate) mod ir;

mod bracket;
mod combinator;
mod retry;
mod timing;
mod value;

pub use bracket::{bracket, bracket2};
pub use combinator::{collect_all, first_success, forever, repeat_n, traverse, tuple2, tuple3};
pub use retry::{retry, retry_n, retry_until, RetryPolicy};
pub use timing::{delay, sleep, timed, timeout, TimeoutError};
pub use value::{get_service, service, Effect, EffectCallback};
