//! Fiber identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The identity of a fiber: a process-wide monotonic sequence number,
/// annotated with the wall-clock instant the fiber started.
///
/// Identities are never reused. Equality, ordering and hashing consider the
/// sequence number only; the start time is a diagnostic annotation.
///
/// # Examples
///
/// ```rust
/// use effectio::runtime::FiberId;
///
/// let first = FiberId::fresh();
/// let second = FiberId::fresh();
/// assert!(first.sequence() < second.sequence());
/// assert_ne!(first, second);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FiberId {
    sequence: u64,
    started_at: SystemTime,
}

impl FiberId {
    /// Allocates the next fiber identity.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::SeqCst),
            started_at: SystemTime::now(),
        }
    }

    /// The monotonic sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the fiber started.
    #[must_use]
    pub const fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

impl PartialEq for FiberId {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for FiberId {}

impl PartialOrd for FiberId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FiberId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

impl Hash for FiberId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sequence.hash(state);
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "fiber-{}", self.sequence)
    }
}
