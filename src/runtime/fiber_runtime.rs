//! The cooperative fiber interpreter.
//!
//! A fiber executes one effect tree to its exit on a host thread. The
//! reduction rules are the synchronous runtime's; the difference is that
//! `Async` and `Never` are real operations — the fiber parks on a
//! `parking_lot` mutex/condvar pair until a callback or an interruption
//! wakes it.
//!
//! Interruption is a one-way sticky flag. It is delivered as an interrupt
//! failure at the next reduction step (once, so failure handlers such as
//! `ensuring` finalizers can still run), it wakes a parked fiber
//! immediately, and it prevents any further parking. Finalizers registered
//! on the fiber run during terminal handling regardless of how the fiber
//! ended.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::cause::{Cause, Defect};
use crate::context::Context;
use crate::effect::ir::{lower_exit, AnyExit, Ir, IrCallback};
use crate::effect::Effect;
use crate::exit::Exit;

use super::deferred::Deferred;
use super::fiber_id::FiberId;
use super::machine::{drive, Suspender, DEFAULT_ITERATION_LIMIT};

// =============================================================================
// Per-fiber shared state
// =============================================================================

struct FiberShared {
    interrupted: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

impl FiberShared {
    fn new() -> Self {
        Self {
            interrupted: AtomicBool::new(false),
            lock: Mutex::new(()),
            signal: Condvar::new(),
        }
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Takes the park lock before notifying, so a fiber between its state
    /// check and its wait cannot miss the wakeup.
    fn wake(&self) {
        let _guard = self.lock.lock();
        self.signal.notify_all();
    }
}

struct FiberSuspender {
    shared: Arc<FiberShared>,
    fiber: FiberId,
    interrupt_delivered: bool,
}

impl Suspender for FiberSuspender {
    fn poll_interrupt(&mut self) -> Option<FiberId> {
        if !self.interrupt_delivered && self.shared.is_interrupted() {
            self.interrupt_delivered = true;
            Some(self.fiber)
        } else {
            None
        }
    }

    fn park_async(&mut self, register: Box<dyn FnOnce(IrCallback) + Send>) -> AnyExit {
        let slot = Arc::new(Mutex::new(None));
        let wake_target = Arc::clone(&self.shared);
        let callback = IrCallback::new(Arc::clone(&slot), Arc::new(move || wake_target.wake()));

        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || register(callback))) {
            return Err(Cause::Die(Defect::from_panic(&*payload)));
        }

        loop {
            let mut guard = self.shared.lock.lock();
            if let Some(exit) = slot.lock().take() {
                return exit;
            }
            if self.shared.is_interrupted() {
                // Counts as the one delivery, so failure handlers and
                // finalizers keep running afterwards.
                self.interrupt_delivered = true;
                return Err(Cause::Interrupt(self.fiber));
            }
            self.shared.signal.wait(&mut guard);
        }
    }

    fn park_never(&mut self) -> AnyExit {
        loop {
            let mut guard = self.shared.lock.lock();
            if self.shared.is_interrupted() {
                self.interrupt_delivered = true;
                return Err(Cause::Interrupt(self.fiber));
            }
            self.shared.signal.wait(&mut guard);
        }
    }
}

// =============================================================================
// Runtime
// =============================================================================

type FiberRegistry = Arc<Mutex<HashMap<u64, Arc<FiberShared>>>>;

/// Runs effects as cooperative fibers.
///
/// `run_sync`/`run_sync_exit` execute the fiber on the calling thread and
/// block until it terminates; `run_callback` and `run_deferred` start the
/// fiber on its own thread and hand the exit over asynchronously. Live
/// fibers are tracked in a registry so [`FiberRuntime::interrupt`] can
/// deliver cancellation by id; clones of the runtime share the registry.
///
/// # Examples
///
/// ```rust
/// use effectio::effect::Effect;
/// use effectio::runtime::FiberRuntime;
/// use std::thread;
///
/// let effect = Effect::<i32, String>::async_callback(|callback| {
///     thread::spawn(move || callback.succeed(7));
/// });
/// assert_eq!(FiberRuntime::new().run_sync(effect), 7);
/// ```
#[derive(Clone)]
pub struct FiberRuntime {
    context: Context,
    iteration_limit: usize,
    registry: FiberRegistry,
}

impl Default for FiberRuntime {
    fn default() -> Self {
        Self {
            context: Context::new(),
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl FiberRuntime {
    /// A runtime with an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose fibers see `context` as the ambient environment.
    #[must_use]
    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    /// Overrides the iteration cap for fibers started on this runtime.
    #[must_use]
    pub fn iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Runs the effect as a fiber on the calling thread and returns its
    /// [`Exit`]. Total: user-visible failures come back as values.
    pub fn run_sync_exit<A, E>(&self, effect: Effect<A, E>) -> Exit<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let fiber = FiberId::fresh();
        let shared = Arc::new(FiberShared::new());
        self.registry
            .lock()
            .insert(fiber.sequence(), Arc::clone(&shared));

        let mut suspender = FiberSuspender {
            shared,
            fiber,
            interrupt_delivered: false,
        };
        let exit = drive(
            effect.into_ir(),
            self.context.clone(),
            fiber,
            self.iteration_limit,
            &mut suspender,
        );
        self.registry.lock().remove(&fiber.sequence());
        lower_exit(exit)
    }

    /// Runs the effect as a fiber on the calling thread and returns its
    /// success value.
    ///
    /// # Panics
    ///
    /// Panics with the squashed cause when the effect fails.
    pub fn run_sync<A, E>(&self, effect: Effect<A, E>) -> A
    where
        A: Send + 'static,
        E: Send + fmt::Debug + 'static,
    {
        self.run_sync_exit(effect).unwrap()
    }

    /// Starts the effect as a fiber on its own thread; `callback` receives
    /// the exit after the fiber's finalizers have run.
    ///
    /// # Panics
    ///
    /// Panics when the host refuses to spawn a thread.
    pub fn run_callback<A, E>(
        &self,
        effect: Effect<A, E>,
        callback: impl FnOnce(Exit<A, E>) + Send + 'static,
    ) -> FiberId
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let fiber = FiberId::fresh();
        let shared = Arc::new(FiberShared::new());
        self.registry
            .lock()
            .insert(fiber.sequence(), Arc::clone(&shared));

        let context = self.context.clone();
        let iteration_limit = self.iteration_limit;
        let registry = Arc::clone(&self.registry);
        let ir: Ir = effect.into_ir();

        thread::Builder::new()
            .name(fiber.to_string())
            .spawn(move || {
                let mut suspender = FiberSuspender {
                    shared,
                    fiber,
                    interrupt_delivered: false,
                };
                let exit = drive(ir, context, fiber, iteration_limit, &mut suspender);
                registry.lock().remove(&fiber.sequence());
                callback(lower_exit(exit));
            })
            .expect("failed to spawn fiber thread");
        fiber
    }

    /// Starts the effect as a fiber on its own thread and returns its id
    /// together with a [`Deferred`] that the fiber's exit completes.
    pub fn run_deferred<A, E>(&self, effect: Effect<A, E>) -> (FiberId, Arc<Deferred<A, E>>)
    where
        A: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let deferred = Arc::new(Deferred::new());
        let completer = Arc::clone(&deferred);
        let fiber = self.run_callback(effect, move |exit| {
            let _ = completer.complete(exit);
        });
        (fiber, deferred)
    }

    /// Marks the fiber as interrupted and wakes it if parked. Idempotent;
    /// returns whether a live fiber with that id was found.
    pub fn interrupt(&self, fiber: FiberId) -> bool {
        let shared = self.registry.lock().get(&fiber.sequence()).map(Arc::clone);
        match shared {
            Some(shared) => {
                shared.interrupt();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for FiberRuntime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FiberRuntime")
            .field("context", &self.context)
            .field("iteration_limit", &self.iteration_limit)
            .field("live_fibers", &self.registry.lock().len())
            .finish()
    }
}
