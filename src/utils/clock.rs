use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Source of "now" for expiry and cooldown window arithmetic.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Starts at the instant it was created and advances by explicit offsets,
/// so expiry and cooldown tests do not depend on real elapsed time.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// The instant this clock reads as time zero.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Moves the clock to `origin + offset`. Going backwards is allowed.
    pub fn set(&self, offset: Duration) {
        *self.offset.lock() = offset;
    }

    /// The instant `offset` after the origin, without moving the clock.
    pub fn at(&self, offset: Duration) -> Instant {
        self.origin + offset
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}
