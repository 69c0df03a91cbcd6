//! Composed failure reasons.
//!
//! A [`Cause`] records *why* an effect terminated without producing a value,
//! losslessly. Instead of a single error value, a cause is a small tree whose
//! leaves are expected failures ([`Cause::Fail`]), unexpected host errors
//! ([`Cause::Die`]) and cooperative cancellations ([`Cause::Interrupt`]), and
//! whose branches record whether two causes happened one after the other
//! ([`Cause::then`]) or side by side ([`Cause::both`]).
//!
//! The two compositions form a semiring with [`Cause::empty`] as identity:
//! `then` and `both` are associative, `both` is commutative, and composing
//! with the empty cause is a no-op. The laws are observable through the
//! flattening accessors ([`Cause::failures`], [`Cause::defects`]), not through
//! structural equality.
//!
//! # Examples
//!
//! ```rust
//! use effectio::cause::Cause;
//!
//! let cause = Cause::fail("primary").then(Cause::fail("cleanup"));
//! assert_eq!(cause.failures(), vec![&"primary", &"cleanup"]);
//! assert_eq!(cause.first_failure(), Some(&"primary"));
//! ```

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::runtime::FiberId;

// =============================================================================
// Defect
// =============================================================================

/// An unexpected host-level error carried by a cause.
///
/// A defect wraps an arbitrary [`std::error::Error`] behind an `Arc`, so
/// causes stay cheap to clone and the original error remains retrievable via
/// [`Defect::downcast_ref`]. Defects are what panics inside effect thunks are
/// converted into; they are observable only through `catch_all_cause`, never
/// through the typed error channel.
///
/// # Examples
///
/// ```rust
/// use effectio::cause::Defect;
///
/// let defect = Defect::message("service unavailable");
/// assert_eq!(defect.to_string(), "service unavailable");
/// ```
#[derive(Clone, Debug)]
pub struct Defect {
    inner: Arc<dyn Error + Send + Sync>,
}

impl Defect {
    /// Wraps an existing error value unchanged.
    pub fn new<T>(error: T) -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Creates a defect from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(DefectMessage(message.into()))
    }

    /// Converts a caught panic payload into a defect.
    ///
    /// Panic payloads are usually `&str` or `String`; anything else is
    /// reported as an unknown panic.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::message(message)
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn as_error(&self) -> &(dyn Error + Send + Sync) {
        &*self.inner
    }

    /// Attempts to view the wrapped error as a concrete type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::cause::Defect;
    /// use std::fmt;
    ///
    /// #[derive(Debug)]
    /// struct Broken;
    ///
    /// impl fmt::Display for Broken {
    ///     fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
    ///         write!(formatter, "broken")
    ///     }
    /// }
    ///
    /// impl std::error::Error for Broken {}
    ///
    /// let defect = Defect::new(Broken);
    /// assert!(defect.downcast_ref::<Broken>().is_some());
    /// ```
    #[must_use]
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.inner)
    }
}

impl Error for Defect {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        let inner: &(dyn Error + 'static) = &*self.inner;
        Some(inner)
    }
}

/// Equality compares the rendered message, which is what tests can observe.
impl PartialEq for Defect {
    fn eq(&self, other: &Self) -> bool {
        self.inner.to_string() == other.inner.to_string()
    }
}

impl Eq for Defect {}

/// A defect carrying nothing but a message.
#[derive(Debug)]
struct DefectMessage(String);

impl fmt::Display for DefectMessage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl Error for DefectMessage {}

/// The error produced when an interrupted cause is squashed.
#[derive(Debug)]
struct InterruptedError(FiberId);

impl fmt::Display for InterruptedError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "interrupted by {}", self.0)
    }
}

impl Error for InterruptedError {}

// =============================================================================
// Cause
// =============================================================================

/// A lossless record of why an effect failed.
///
/// See the [module documentation](self) for the semiring structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cause<E> {
    /// The identity cause: nothing went wrong.
    Empty,
    /// An expected, typed failure.
    Fail(E),
    /// An unexpected host error (panic, broken invariant).
    Die(Defect),
    /// Cooperative cancellation, tagged with the fiber that was interrupted.
    Interrupt(FiberId),
    /// Two causes that happened one after the other.
    Sequential(Box<Cause<E>>, Box<Cause<E>>),
    /// Two causes that happened side by side.
    Parallel(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Cause<E> {
    /// The identity cause.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// A single expected failure.
    pub const fn fail(error: E) -> Self {
        Self::Fail(error)
    }

    /// A single defect.
    #[must_use]
    pub fn die(defect: Defect) -> Self {
        Self::Die(defect)
    }

    /// A single interruption.
    #[must_use]
    pub fn interrupt(fiber: FiberId) -> Self {
        Self::Interrupt(fiber)
    }

    /// Sequential composition. [`Cause::Empty`] is the identity on both
    /// sides, so no `Sequential` node ever carries an empty child.
    #[must_use]
    pub fn then(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, other) => other,
            (this, Self::Empty) => this,
            (this, other) => Self::Sequential(Box::new(this), Box::new(other)),
        }
    }

    /// Parallel composition. [`Cause::Empty`] is the identity on both sides.
    #[must_use]
    pub fn both(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, other) => other,
            (this, Self::Empty) => this,
            (this, other) => Self::Parallel(Box::new(this), Box::new(other)),
        }
    }

    /// Whether this is the identity cause.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the tree contains at least one [`Cause::Fail`] leaf.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Fail(_) => true,
            Self::Sequential(left, right) | Self::Parallel(left, right) => {
                left.is_failure() || right.is_failure()
            }
            Self::Empty | Self::Die(_) | Self::Interrupt(_) => false,
        }
    }

    /// Whether the tree contains at least one [`Cause::Die`] leaf.
    pub fn is_die(&self) -> bool {
        match self {
            Self::Die(_) => true,
            Self::Sequential(left, right) | Self::Parallel(left, right) => {
                left.is_die() || right.is_die()
            }
            Self::Empty | Self::Fail(_) | Self::Interrupt(_) => false,
        }
    }

    /// Whether the tree contains at least one [`Cause::Interrupt`] leaf.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupt(_) => true,
            Self::Sequential(left, right) | Self::Parallel(left, right) => {
                left.is_interrupted() || right.is_interrupted()
            }
            Self::Empty | Self::Fail(_) | Self::Die(_) => false,
        }
    }

    /// All expected failures, flattened left-to-right in pre-order.
    pub fn failures(&self) -> Vec<&E> {
        let mut collected = Vec::new();
        self.visit(&mut |leaf| {
            if let Self::Fail(error) = leaf {
                collected.push(error);
            }
        });
        collected
    }

    /// All defects, flattened left-to-right in pre-order.
    pub fn defects(&self) -> Vec<&Defect> {
        let mut collected = Vec::new();
        self.visit(&mut |leaf| {
            if let Self::Die(defect) = leaf {
                collected.push(defect);
            }
        });
        collected
    }

    /// All interrupting fiber ids, flattened left-to-right in pre-order.
    pub fn interruptions(&self) -> Vec<FiberId> {
        let mut collected = Vec::new();
        self.visit(&mut |leaf| {
            if let Self::Interrupt(fiber) = leaf {
                collected.push(*fiber);
            }
        });
        collected
    }

    /// The first expected failure in pre-order, if any.
    pub fn first_failure(&self) -> Option<&E> {
        self.failures().into_iter().next()
    }

    /// The first defect in pre-order, if any.
    pub fn first_defect(&self) -> Option<&Defect> {
        self.defects().into_iter().next()
    }

    fn visit<'cause>(&'cause self, visitor: &mut impl FnMut(&'cause Self)) {
        match self {
            Self::Sequential(left, right) | Self::Parallel(left, right) => {
                left.visit(visitor);
                right.visit(visitor);
            }
            leaf => visitor(leaf),
        }
    }

    /// Rewrites the [`Cause::Fail`] leaves; defects, interruptions and the
    /// empty cause are fixed points.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::cause::Cause;
    ///
    /// let cause = Cause::fail(4).then(Cause::fail(5));
    /// let mapped = cause.map(|code: i32| format!("error {code}"));
    /// assert_eq!(
    ///     mapped.failures(),
    ///     vec![&"error 4".to_string(), &"error 5".to_string()],
    /// );
    /// ```
    pub fn map<E2, F>(self, mut function: F) -> Cause<E2>
    where
        F: FnMut(E) -> E2,
    {
        self.map_with(&mut function)
    }

    fn map_with<E2, F>(self, function: &mut F) -> Cause<E2>
    where
        F: FnMut(E) -> E2,
    {
        match self {
            Self::Empty => Cause::Empty,
            Self::Fail(error) => Cause::Fail(function(error)),
            Self::Die(defect) => Cause::Die(defect),
            Self::Interrupt(fiber) => Cause::Interrupt(fiber),
            Self::Sequential(left, right) => Cause::Sequential(
                Box::new(left.map_with(function)),
                Box::new(right.map_with(function)),
            ),
            Self::Parallel(left, right) => Cause::Parallel(
                Box::new(left.map_with(function)),
                Box::new(right.map_with(function)),
            ),
        }
    }

    /// Extracts the first expected failure by value, or returns the cause
    /// unchanged when it carries no failure leaf.
    ///
    /// # Errors
    ///
    /// Returns the original cause when no [`Cause::Fail`] leaf exists.
    pub fn take_first_failure(self) -> Result<E, Self> {
        if self.is_failure() {
            Ok(self
                .extract_first_failure()
                .expect("cause reported a failure leaf but none was found"))
        } else {
            Err(self)
        }
    }

    fn extract_first_failure(self) -> Option<E> {
        match self {
            Self::Fail(error) => Some(error),
            Self::Sequential(left, right) | Self::Parallel(left, right) => left
                .extract_first_failure()
                .or_else(|| right.extract_first_failure()),
            Self::Empty | Self::Die(_) | Self::Interrupt(_) => None,
        }
    }
}

impl<E: fmt::Debug> Cause<E> {
    /// Collapses the cause to a single [`Defect`].
    ///
    /// Preference order: the first defect, else the first expected failure
    /// (wrapped via its `Debug` rendering), else an interruption error naming
    /// the interrupted fiber, else a generic empty-cause wrapper.
    pub fn squash(&self) -> Defect {
        if let Some(defect) = self.first_defect() {
            return defect.clone();
        }
        if let Some(error) = self.first_failure() {
            return Defect::message(format!("{error:?}"));
        }
        if let Some(fiber) = self.interruptions().into_iter().next() {
            return Defect::new(InterruptedError(fiber));
        }
        Defect::message("cause is empty")
    }
}

impl<E: fmt::Debug> fmt::Display for Cause<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(formatter, "<empty>"),
            Self::Fail(error) => write!(formatter, "fail({error:?})"),
            Self::Die(defect) => write!(formatter, "die({defect})"),
            Self::Interrupt(fiber) => write!(formatter, "interrupt({fiber})"),
            Self::Sequential(left, right) => write!(formatter, "({left} then {right})"),
            Self::Parallel(left, right) => write!(formatter, "({left} both {right})"),
        }
    }
}
