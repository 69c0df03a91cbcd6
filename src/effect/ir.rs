//! The crate-private effect instruction set.
//!
//! Public [`Effect`](super::Effect) values are thin typed wrappers around the
//! type-erased [`Ir`] tree defined here. Payloads travel as
//! `Box<dyn Any + Send>` and continuations as boxed `FnOnce`s; the typed
//! boundary downcasts on the way out and treats a mismatch as a bug in the
//! wrapper layer. Erasure keeps the interpreters monomorphic: one reduction
//! loop serves every `Effect<A, E>` instantiation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cause::Cause;
use crate::cause::Defect;
use crate::context::{Context, Service};
use crate::exit::Exit;

/// A type-erased success value.
pub(crate) type AnyValue = Box<dyn Any + Send>;

/// A type-erased expected-failure payload.
pub(crate) type AnyError = Box<dyn Any + Send>;

/// A cause whose failure leaves are type-erased.
pub(crate) type AnyCause = Cause<AnyError>;

/// The untyped exit the interpreters produce.
pub(crate) type AnyExit = Result<AnyValue, AnyCause>;

pub(crate) const TYPE_MISMATCH_VALUE: &str = "value type mismatch in effect continuation";
pub(crate) const TYPE_MISMATCH_ERROR: &str = "error type mismatch in effect continuation";

/// One node of the effect instruction tree.
///
/// Nodes are immutable once built and consumed by evaluation. `Fold` is the
/// only node whose continuation observes a cause.
pub(crate) enum Ir {
    /// Constant success.
    Succeed(AnyValue),
    /// Constant failure with a full cause. Expected failures, defects and
    /// interruptions all lower to this node, which keeps `fail_cause`
    /// lossless.
    FailCause(AnyCause),
    /// Run a side-effecting thunk; a panic becomes a defect.
    Sync(Box<dyn FnOnce() -> AnyValue + Send>),
    /// Run a fallible thunk; `Err` becomes an expected failure, a panic is
    /// routed through `catch` when present.
    TrySync {
        thunk: Box<dyn FnOnce() -> Result<AnyValue, AnyError> + Send>,
        catch: Option<Box<dyn FnOnce(Defect) -> AnyError + Send>>,
    },
    /// Suspendable leaf: `register` receives a one-shot callback that
    /// supplies the node's exit, now or later.
    Async(Box<dyn FnOnce(IrCallback) + Send>),
    /// Lazily produce the next node.
    Suspend(Box<dyn FnOnce() -> Ir + Send>),
    /// Completes only through interruption.
    Never,
    /// Immediate interruption of the executing fiber.
    Interrupt,
    /// Rewrite the source's success value.
    Map {
        source: Box<Ir>,
        mapper: Box<dyn FnOnce(AnyValue) -> AnyValue + Send>,
    },
    /// Continue with a new node on the source's success.
    FlatMap {
        source: Box<Ir>,
        continuation: Box<dyn FnOnce(AnyValue) -> Ir + Send>,
    },
    /// Universal handler; the only consumer of a cause.
    Fold {
        source: Box<Ir>,
        on_success: Box<dyn FnOnce(AnyValue) -> Ir + Send>,
        on_failure: Box<dyn FnOnce(AnyCause) -> Ir + Send>,
    },
    /// Project a service out of the ambient context. A missing or
    /// wrong-typed service is a defect, not an expected failure.
    Access {
        key: Arc<str>,
        project: Box<dyn FnOnce(Service) -> Result<AnyValue, Defect> + Send>,
    },
    /// Run the source with the ambient context overlaid by `context`.
    Provide { source: Box<Ir>, context: Context },
    /// Push a finalizer onto the executing run's finalizer list and succeed
    /// with unit.
    AddFinalizer(Box<Ir>),
}

impl Ir {
    pub(crate) const fn tag(&self) -> &'static str {
        match self {
            Self::Succeed(_) => "Succeed",
            Self::FailCause(_) => "FailCause",
            Self::Sync(_) => "Sync",
            Self::TrySync { .. } => "TrySync",
            Self::Async(_) => "Async",
            Self::Suspend(_) => "Suspend",
            Self::Never => "Never",
            Self::Interrupt => "Interrupt",
            Self::Map { .. } => "Map",
            Self::FlatMap { .. } => "FlatMap",
            Self::Fold { .. } => "Fold",
            Self::Access { .. } => "Access",
            Self::Provide { .. } => "Provide",
            Self::AddFinalizer(_) => "AddFinalizer",
        }
    }
}

impl fmt::Debug for Ir {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Ir::{}", self.tag())
    }
}

// =============================================================================
// One-shot callback for Async nodes
// =============================================================================

/// The untyped one-shot completion callback handed to `Async` registrations.
///
/// The first completion wins; later calls are silently ignored. Completing
/// stores the exit in the waiting fiber's slot and wakes the fiber.
#[derive(Clone)]
pub(crate) struct IrCallback {
    slot: Arc<Mutex<Option<AnyExit>>>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl IrCallback {
    pub(crate) fn new(slot: Arc<Mutex<Option<AnyExit>>>, wake: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { slot, wake }
    }

    pub(crate) fn complete(&self, exit: AnyExit) {
        {
            let mut guard = self.slot.lock();
            if guard.is_some() {
                return;
            }
            *guard = Some(exit);
        }
        (self.wake)();
    }
}

// =============================================================================
// Typed boundary helpers
// =============================================================================

pub(crate) fn boxed<A: Send + 'static>(value: A) -> AnyValue {
    Box::new(value)
}

pub(crate) fn unbox<A: 'static>(value: AnyValue) -> A {
    *value.downcast::<A>().expect(TYPE_MISMATCH_VALUE)
}

pub(crate) fn unbox_error<E: 'static>(error: AnyError) -> E {
    *error.downcast::<E>().expect(TYPE_MISMATCH_ERROR)
}

pub(crate) fn lift_cause<E: Send + 'static>(cause: Cause<E>) -> AnyCause {
    cause.map(|error| Box::new(error) as AnyError)
}

pub(crate) fn lower_cause<E: 'static>(cause: AnyCause) -> Cause<E> {
    cause.map(unbox_error)
}

pub(crate) fn lift_exit<A, E>(exit: Exit<A, E>) -> AnyExit
where
    A: Send + 'static,
    E: Send + 'static,
{
    match exit {
        Exit::Success(value) => Ok(boxed(value)),
        Exit::Failure(cause) => Err(lift_cause(cause)),
    }
}

pub(crate) fn lower_exit<A, E>(exit: AnyExit) -> Exit<A, E>
where
    A: 'static,
    E: 'static,
{
    match exit {
        Ok(value) => Exit::Success(unbox(value)),
        Err(cause) => Exit::Failure(lower_cause(cause)),
    }
}
