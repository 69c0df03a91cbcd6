//! Terminal results of an effect run.
//!
//! An [`Exit`] is what a runtime hands back once an effect has been driven to
//! completion: either a success value or the [`Cause`] tree explaining the
//! failure. `Exit` is a plain value; inspecting it never panics, and the only
//! escape hatch that does ([`Exit::unwrap`]) is explicit about it.
//!
//! # Examples
//!
//! ```rust
//! use effectio::exit::Exit;
//!
//! let exit: Exit<i32, String> = Exit::success(21);
//! assert_eq!(exit.map(|value| value * 2), Exit::success(42));
//! ```

use std::fmt;

use crate::cause::Cause;

/// The terminal result of running an effect.
///
/// # Laws
///
/// `Exit` forms a monad in its success channel and leaves failures untouched:
///
/// - `Exit::success(a).flat_map(f) == f(a)`
/// - `exit.map(f).flat_map(g) == exit.flat_map(|a| g(f(a)))`
/// - `Exit::failure(c).map(f) == Exit::failure(c)`
/// - `Exit::failure(c).map_error(f) == Exit::failure(c.map(f))`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exit<A, E> {
    /// The effect produced a value.
    Success(A),
    /// The effect terminated for the recorded cause.
    Failure(Cause<E>),
}

impl<A, E> Exit<A, E> {
    /// A successful exit.
    pub const fn success(value: A) -> Self {
        Self::Success(value)
    }

    /// A failed exit with an explicit cause.
    pub const fn failure(cause: Cause<E>) -> Self {
        Self::Failure(cause)
    }

    /// A failed exit with a single expected failure.
    pub const fn fail(error: E) -> Self {
        Self::Failure(Cause::Fail(error))
    }

    /// Whether this exit is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this exit is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Borrows the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&A> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Borrows the failure cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }

    /// Collapses the exit with one handler per case.
    pub fn fold<B>(
        self,
        on_success: impl FnOnce(A) -> B,
        on_failure: impl FnOnce(Cause<E>) -> B,
    ) -> B {
        match self {
            Self::Success(value) => on_success(value),
            Self::Failure(cause) => on_failure(cause),
        }
    }

    /// Transforms the success value; failures pass through untouched.
    pub fn map<B>(self, function: impl FnOnce(A) -> B) -> Exit<B, E> {
        match self {
            Self::Success(value) => Exit::Success(function(value)),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Chains another exit-producing step on success; failures pass through.
    pub fn flat_map<B>(self, function: impl FnOnce(A) -> Exit<B, E>) -> Exit<B, E> {
        match self {
            Self::Success(value) => function(value),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Rewrites the expected failures of the cause; defects and interruptions
    /// are fixed points.
    pub fn map_error<E2>(self, function: impl FnMut(E) -> E2) -> Exit<A, E2> {
        match self {
            Self::Success(value) => Exit::Success(value),
            Self::Failure(cause) => Exit::Failure(cause.map(function)),
        }
    }

    /// Converts into a `Result`, keeping the full cause on the error side.
    ///
    /// # Errors
    ///
    /// Returns the failure cause when the exit is a failure.
    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(cause) => Err(cause),
        }
    }
}

impl<A, E: fmt::Debug> Exit<A, E> {
    /// Returns the success value, panicking with the squashed cause on
    /// failure.
    ///
    /// # Panics
    ///
    /// Panics with [`Cause::squash`] when the exit is a failure.
    #[track_caller]
    pub fn unwrap(self) -> A {
        match self {
            Self::Success(value) => value,
            Self::Failure(cause) => panic!("effect failed: {}", cause.squash()),
        }
    }
}

impl<A, E> From<Result<A, E>> for Exit<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::fail(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::Defect;
    use rstest::rstest;

    #[rstest]
    fn map_transforms_success() {
        let exit: Exit<i32, String> = Exit::success(5);
        assert_eq!(exit.map(|value| value * 2), Exit::success(10));
    }

    #[rstest]
    fn map_preserves_failure() {
        let exit: Exit<i32, &str> = Exit::fail("boom");
        assert_eq!(exit.map(|value| value * 2), Exit::fail("boom"));
    }

    #[rstest]
    fn flat_map_chains_success() {
        let exit: Exit<i32, &str> = Exit::success(5);
        assert_eq!(
            exit.flat_map(|value| Exit::success(value + 1)),
            Exit::success(6),
        );
    }

    #[rstest]
    fn map_error_rewrites_fail_leaves_only() {
        let cause = Cause::fail("boom").then(Cause::die(Defect::message("broken")));
        let exit: Exit<i32, &str> = Exit::failure(cause);
        let mapped = exit.map_error(str::to_uppercase);
        let rewritten = mapped.cause().expect("failure expected");
        assert_eq!(rewritten.failures(), vec![&"BOOM".to_string()]);
        assert_eq!(rewritten.defects().len(), 1);
    }

    #[rstest]
    fn unwrap_returns_success() {
        let exit: Exit<i32, String> = Exit::success(3);
        assert_eq!(exit.unwrap(), 3);
    }

    #[rstest]
    #[should_panic(expected = "effect failed")]
    fn unwrap_panics_on_failure() {
        let exit: Exit<i32, &str> = Exit::fail("boom");
        let _ = exit.unwrap();
    }

    #[rstest]
    fn from_result_round_trip() {
        let ok: Exit<i32, &str> = Ok(1).into();
        assert_eq!(ok, Exit::success(1));
        let err: Exit<i32, &str> = Err("boom").into();
        assert_eq!(err, Exit::fail("boom"));
    }
}
