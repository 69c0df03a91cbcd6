//! The shared reduction machine.
//!
//! Both runtimes walk the same instruction set with the same rules; they
//! differ only in what happens at a suspension point. That difference is
//! behind the [`Suspender`] seam: the synchronous runtime reports suspension
//! as a defect, the fiber runtime parks the host thread.
//!
//! The machine is a trampoline. `Map`/`FlatMap`/`Fold` push continuation
//! frames onto an explicit stack (inline up to eight frames, spilling to the
//! heap beyond that) and every reduction happens inside one host-level loop,
//! so composition depth never touches the host call stack. Panics raised by
//! user closures are caught at each call site and recorded as defects; they
//! never unwind through the machine.

use std::panic::{catch_unwind, AssertUnwindSafe};

use smallvec::SmallVec;

use crate::cause::{Cause, Defect};
use crate::context::Context;
use crate::effect::ir::{boxed, AnyCause, AnyExit, AnyValue, Ir, IrCallback};

use super::fiber_id::FiberId;

/// Iteration cap applied to every top-level run unless overridden.
pub(crate) const DEFAULT_ITERATION_LIMIT: usize = 100_000;

const FRAME_INLINE_CAPACITY: usize = 8;

type FrameStack = SmallVec<[Frame; FRAME_INLINE_CAPACITY]>;

/// A continuation suspended on the explicit stack.
///
/// `FlatMap` and `Fold` capture the context that was current when the frame
/// was pushed and restore it when their continuation resumes, so a
/// `Provide` overlay never leaks past the node it wraps through a resumed
/// continuation.
enum Frame {
    Map(Box<dyn FnOnce(AnyValue) -> AnyValue + Send>),
    FlatMap {
        continuation: Box<dyn FnOnce(AnyValue) -> Ir + Send>,
        context: Context,
    },
    Fold {
        on_success: Box<dyn FnOnce(AnyValue) -> Ir + Send>,
        on_failure: Box<dyn FnOnce(AnyCause) -> Ir + Send>,
        context: Context,
    },
}

enum Unwound {
    Complete(AnyExit),
    Continue { ir: Ir, context: Context },
}

enum Reduced {
    Exit(AnyExit),
    Continue(Ir),
    ParkAsync(Box<dyn FnOnce(IrCallback) + Send>),
    ParkNever,
}

/// How a runtime reacts to suspension points and cancellation.
pub(crate) trait Suspender {
    /// Checked at the top of every step; `Some` delivers an interrupt
    /// failure for the given fiber.
    fn poll_interrupt(&mut self) -> Option<FiberId>;

    /// Reduce an `Async` node: invoke the registration and produce its exit,
    /// parking if necessary.
    fn park_async(&mut self, register: Box<dyn FnOnce(IrCallback) + Send>) -> AnyExit;

    /// Reduce a `Never` node.
    fn park_never(&mut self) -> AnyExit;
}

/// The synchronous runtime offers no suspension mechanism: reaching a
/// suspension point is a fatal defect, and interruption is never delivered.
pub(crate) struct SyncSuspender;

impl Suspender for SyncSuspender {
    fn poll_interrupt(&mut self) -> Option<FiberId> {
        None
    }

    fn park_async(&mut self, _register: Box<dyn FnOnce(IrCallback) + Send>) -> AnyExit {
        Err(Cause::Die(Defect::message(
            "Async effects are not supported by SyncRuntime",
        )))
    }

    fn park_never(&mut self) -> AnyExit {
        Err(Cause::Die(Defect::message(
            "Never cannot complete in SyncRuntime",
        )))
    }
}

/// Finalizers run during terminal handling regardless of cancellation, so
/// interrupt delivery is muted while they drain. Parking still honours the
/// sticky flag of the wrapped suspender.
struct DrainSuspender<'run, S: Suspender>(&'run mut S);

impl<S: Suspender> Suspender for DrainSuspender<'_, S> {
    fn poll_interrupt(&mut self) -> Option<FiberId> {
        None
    }

    fn park_async(&mut self, register: Box<dyn FnOnce(IrCallback) + Send>) -> AnyExit {
        self.0.park_async(register)
    }

    fn park_never(&mut self) -> AnyExit {
        self.0.park_never()
    }
}

struct MachineState {
    context: Context,
    stack: FrameStack,
    finalizers: Vec<Ir>,
    fiber: FiberId,
}

/// Runs one effect tree to its exit, then drains registered finalizers in
/// LIFO order with their failures swallowed.
pub(crate) fn drive(
    ir: Ir,
    context: Context,
    fiber: FiberId,
    iteration_limit: usize,
    suspender: &mut impl Suspender,
) -> AnyExit {
    let mut state = MachineState {
        context,
        stack: SmallVec::new(),
        finalizers: Vec::new(),
        fiber,
    };
    let exit = run_loop(ir, &mut state, iteration_limit, suspender);

    while let Some(finalizer) = state.finalizers.pop() {
        let mut drain_state = MachineState {
            context: state.context.clone(),
            stack: SmallVec::new(),
            finalizers: Vec::new(),
            fiber,
        };
        let _ = run_loop(
            finalizer,
            &mut drain_state,
            iteration_limit,
            &mut DrainSuspender(&mut *suspender),
        );
        state.finalizers.append(&mut drain_state.finalizers);
    }

    exit
}

fn run_loop(
    ir: Ir,
    state: &mut MachineState,
    iteration_limit: usize,
    suspender: &mut impl Suspender,
) -> AnyExit {
    let mut current = ir;
    let mut iterations: usize = 0;

    loop {
        iterations += 1;
        if iterations > iteration_limit {
            return Err(Cause::Die(Defect::message(format!(
                "Maximum iterations ({iteration_limit}) exceeded; possible infinite effect loop",
            ))));
        }

        let step = if let Some(fiber) = suspender.poll_interrupt() {
            Err(Cause::Interrupt(fiber))
        } else {
            match reduce(current, state) {
                Reduced::Exit(exit) => exit,
                Reduced::Continue(next) => {
                    current = next;
                    continue;
                }
                Reduced::ParkAsync(register) => suspender.park_async(register),
                Reduced::ParkNever => suspender.park_never(),
            }
        };

        match unwind(&mut state.stack, step) {
            Unwound::Complete(exit) => return exit,
            Unwound::Continue { ir: next, context } => {
                current = next;
                state.context = context;
            }
        }
    }
}

fn reduce(ir: Ir, state: &mut MachineState) -> Reduced {
    match ir {
        Ir::Succeed(value) => Reduced::Exit(Ok(value)),
        Ir::FailCause(cause) => Reduced::Exit(Err(cause)),
        Ir::Sync(thunk) => Reduced::Exit(match catch_unwind(AssertUnwindSafe(thunk)) {
            Ok(value) => Ok(value),
            Err(payload) => Err(Cause::Die(Defect::from_panic(&*payload))),
        }),
        Ir::TrySync { thunk, catch } => {
            Reduced::Exit(match catch_unwind(AssertUnwindSafe(thunk)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(Cause::Fail(error)),
                Err(payload) => {
                    let defect = Defect::from_panic(&*payload);
                    match catch {
                        Some(catcher) => {
                            match catch_unwind(AssertUnwindSafe(move || catcher(defect))) {
                                Ok(error) => Err(Cause::Fail(error)),
                                Err(inner) => Err(Cause::Die(Defect::from_panic(&*inner))),
                            }
                        }
                        None => Err(Cause::Die(defect)),
                    }
                }
            })
        }
        Ir::Suspend(thunk) => match catch_unwind(AssertUnwindSafe(thunk)) {
            Ok(next) => Reduced::Continue(next),
            Err(payload) => Reduced::Exit(Err(Cause::Die(Defect::from_panic(&*payload)))),
        },
        Ir::Access { key, project } => match state.context.lookup_raw(&key) {
            Some(found) => {
                Reduced::Exit(match catch_unwind(AssertUnwindSafe(move || project(found))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(defect)) => Err(Cause::Die(defect)),
                    Err(payload) => Err(Cause::Die(Defect::from_panic(&*payload))),
                })
            }
            None => Reduced::Exit(Err(Cause::Die(Defect::message(format!(
                "Service not found: {key}",
            ))))),
        },
        Ir::Provide { source, context } => {
            state.context = state.context.merge(&context);
            Reduced::Continue(*source)
        }
        Ir::Map { source, mapper } => {
            state.stack.push(Frame::Map(mapper));
            Reduced::Continue(*source)
        }
        Ir::FlatMap {
            source,
            continuation,
        } => {
            state.stack.push(Frame::FlatMap {
                continuation,
                context: state.context.clone(),
            });
            Reduced::Continue(*source)
        }
        Ir::Fold {
            source,
            on_success,
            on_failure,
        } => {
            state.stack.push(Frame::Fold {
                on_success,
                on_failure,
                context: state.context.clone(),
            });
            Reduced::Continue(*source)
        }
        Ir::Interrupt => Reduced::Exit(Err(Cause::Interrupt(state.fiber))),
        Ir::AddFinalizer(finalizer) => {
            state.finalizers.push(*finalizer);
            Reduced::Exit(Ok(boxed(())))
        }
        Ir::Async(register) => Reduced::ParkAsync(register),
        Ir::Never => Reduced::ParkNever,
    }
}

fn unwind(stack: &mut FrameStack, mut exit: AnyExit) -> Unwound {
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Map(mapper) => {
                exit = match exit {
                    Ok(value) => match catch_unwind(AssertUnwindSafe(move || mapper(value))) {
                        Ok(mapped) => Ok(mapped),
                        Err(payload) => Err(Cause::Die(Defect::from_panic(&*payload))),
                    },
                    Err(cause) => Err(cause),
                };
            }
            Frame::FlatMap {
                continuation,
                context,
            } => match exit {
                Ok(value) => {
                    match catch_unwind(AssertUnwindSafe(move || continuation(value))) {
                        Ok(ir) => return Unwound::Continue { ir, context },
                        Err(payload) => {
                            exit = Err(Cause::Die(Defect::from_panic(&*payload)));
                        }
                    }
                }
                Err(cause) => exit = Err(cause),
            },
            Frame::Fold {
                on_success,
                on_failure,
                context,
            } => {
                let handled = match exit {
                    Ok(value) => catch_unwind(AssertUnwindSafe(move || on_success(value))),
                    Err(cause) => catch_unwind(AssertUnwindSafe(move || on_failure(cause))),
                };
                match handled {
                    Ok(ir) => return Unwound::Continue { ir, context },
                    Err(payload) => {
                        exit = Err(Cause::Die(Defect::from_panic(&*payload)));
                    }
                }
            }
        }
    }
    Unwound::Complete(exit)
}
