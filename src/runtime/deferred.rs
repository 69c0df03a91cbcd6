//! Single-assignment result cells.

use std::mem;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::exit::Exit;

type Callback<A, E> = Box<dyn FnOnce(&Exit<A, E>) + Send>;

enum State<A, E> {
    Pending(Vec<Callback<A, E>>),
    Completed(Arc<Exit<A, E>>),
}

/// A single-assignment cell holding an eventual [`Exit`].
///
/// The first [`Deferred::complete`] wins; later completions are ignored.
/// Callbacks registered before completion fire in registration order when
/// the cell completes; callbacks registered afterwards fire immediately.
/// [`Deferred::wait`] blocks the calling thread until the cell completes.
///
/// # Examples
///
/// ```rust
/// use effectio::exit::Exit;
/// use effectio::runtime::Deferred;
///
/// let deferred: Deferred<i32, String> = Deferred::new();
/// assert!(deferred.complete(Exit::success(1)));
/// assert!(!deferred.complete(Exit::success(2)));
/// assert_eq!(*deferred.wait(), Exit::success(1));
/// ```
pub struct Deferred<A, E> {
    state: Mutex<State<A, E>>,
    completed: Condvar,
}

impl<A, E> Deferred<A, E> {
    /// An empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
            completed: Condvar::new(),
        }
    }

    /// Writes the exit if the cell is still pending and runs the callbacks
    /// registered so far, in registration order. Returns whether this call
    /// was the completing one.
    pub fn complete(&self, exit: Exit<A, E>) -> bool {
        let pending = {
            let mut guard = self.state.lock();
            match &mut *guard {
                State::Completed(_) => return false,
                State::Pending(callbacks) => {
                    let callbacks = mem::take(callbacks);
                    *guard = State::Completed(Arc::new(exit));
                    callbacks
                }
            }
        };
        self.completed.notify_all();

        if !pending.is_empty() {
            let exit = self
                .try_exit()
                .expect("deferred completed above");
            for callback in pending {
                callback(&exit);
            }
        }
        true
    }

    /// Runs `callback` with the exit: immediately when the cell is already
    /// completed, otherwise when it completes.
    pub fn on_complete(&self, callback: impl FnOnce(&Exit<A, E>) + Send + 'static) {
        let completed = {
            let mut guard = self.state.lock();
            match &mut *guard {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Completed(exit) => Arc::clone(exit),
            }
        };
        callback(&completed);
    }

    /// Whether the cell has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(&*self.state.lock(), State::Completed(_))
    }

    /// The exit, if the cell has completed.
    #[must_use]
    pub fn try_exit(&self) -> Option<Arc<Exit<A, E>>> {
        match &*self.state.lock() {
            State::Pending(_) => None,
            State::Completed(exit) => Some(Arc::clone(exit)),
        }
    }

    /// Blocks the calling thread until the cell completes.
    pub fn wait(&self) -> Arc<Exit<A, E>> {
        let mut guard = self.state.lock();
        loop {
            if let State::Completed(exit) = &*guard {
                return Arc::clone(exit);
            }
            self.completed.wait(&mut guard);
        }
    }
}

impl<A, E> Default for Deferred<A, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[rstest]
    fn first_completion_wins() {
        let deferred: Deferred<i32, String> = Deferred::new();
        assert!(deferred.complete(Exit::success(1)));
        assert!(!deferred.complete(Exit::success(2)));
        assert_eq!(*deferred.wait(), Exit::success(1));
    }

    #[rstest]
    fn callbacks_fire_in_registration_order() {
        let deferred: Deferred<i32, String> = Deferred::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            deferred.on_complete(move |_| order.lock().push(label));
        }
        deferred.complete(Exit::success(0));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[rstest]
    fn late_callbacks_fire_immediately() {
        let deferred: Deferred<i32, String> = Deferred::new();
        deferred.complete(Exit::success(9));

        let fired = Arc::new(AtomicUsize::new(0));
        let observer = Arc::clone(&fired);
        deferred.on_complete(move |exit| {
            assert_eq!(exit.value(), Some(&9));
            observer.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn try_exit_reports_pending() {
        let deferred: Deferred<i32, String> = Deferred::new();
        assert!(deferred.try_exit().is_none());
        assert!(!deferred.is_completed());
    }
}
