//! Per-key fixed-window cooldowns.

use crate::error::ConfigError;
use crate::utils::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// `limit` permits per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    limit: u32,
    period: Duration,
}

impl Rate {
    pub fn new(limit: u32, period: Duration) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(Self { limit, period })
    }

    pub fn per_seconds(limit: u32, seconds: u64) -> Result<Self, ConfigError> {
        Self::new(limit, Duration::from_secs(seconds))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Window state for one key.
#[derive(Debug, Clone)]
pub struct CooldownBucket {
    rate: Rate,
    window_start: Instant,
    count: u32,
}

impl CooldownBucket {
    fn new(rate: Rate, now: Instant) -> Self {
        Self {
            rate,
            window_start: now,
            count: 0,
        }
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// `None` when the window end does not fit in an `Instant`.
    fn window_end(&self) -> Option<Instant> {
        self.window_start.checked_add(self.rate.period)
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.window_end().is_some_and(|end| now >= end)
    }

    fn roll(&mut self, now: Instant) {
        if self.window_elapsed(now) {
            self.window_start = now;
            self.count = 0;
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.roll(now);
        if self.count >= self.rate.limit {
            return false;
        }
        self.count += 1;
        true
    }

    fn retry_after(&self, now: Instant) -> Option<Duration> {
        if self.window_elapsed(now) || self.count < self.rate.limit {
            return None;
        }
        Some(self.window_end()?.saturating_duration_since(now))
    }
}

/// Lazily created cooldown buckets, one per key.
///
/// The rate a key is first seen with sticks to it: later calls passing a
/// different limit or period reuse the stored bucket unchanged. The registry
/// knows nothing about who is calling; privileged callers are expected to
/// skip it.
#[derive(Debug)]
pub struct CooldownRegistry<K> {
    buckets: Mutex<HashMap<K, CooldownBucket>>,
    clock: Arc<dyn Clock>,
}

impl<K> CooldownRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Consumes a permit for `key` at `now`, returning whether one was available.
    ///
    /// Fails with [`ConfigError::ZeroPeriod`] for a zero `period`. A `limit`
    /// of zero always denies.
    pub fn check_and_consume(
        &self,
        key: K,
        limit: u32,
        period: Duration,
        now: Instant,
    ) -> Result<bool, ConfigError> {
        let rate = Rate::new(limit, period)?;
        Ok(self.consume(key, rate, now))
    }

    /// [`check_and_consume`](Self::check_and_consume) with a validated rate and the registry's clock.
    pub fn try_acquire(&self, key: K, rate: Rate) -> bool {
        self.consume(key, rate, self.clock.now())
    }

    /// Time left before `key` can be granted again, or `None` if it can be now.
    pub fn retry_after(&self, key: &K, now: Instant) -> Option<Duration> {
        self.buckets.lock().get(key)?.retry_after(now)
    }

    /// Snapshot of the bucket for `key`, if one exists.
    pub fn bucket(&self, key: &K) -> Option<CooldownBucket> {
        self.buckets.lock().get(key).cloned()
    }

    /// Drops buckets whose window started at least `idle_windows` periods before `now`.
    ///
    /// Only buckets with an elapsed window are candidates, and such a bucket
    /// would be reset on its next use anyway, so sweeping never changes the
    /// outcome of a later call. An `idle_windows` of zero is treated as one.
    pub fn sweep_idle(&self, now: Instant, idle_windows: u32) -> usize {
        let idle_windows = idle_windows.max(1);
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            let idle_for = bucket.rate.period.saturating_mul(idle_windows);
            bucket
                .window_start
                .checked_add(idle_for)
                .map_or(true, |idle_until| now < idle_until)
        });
        let removed = before - buckets.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.len(), "swept idle cooldown buckets");
        }
        removed
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    fn consume(&self, key: K, rate: Rate, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| CooldownBucket::new(rate, now));
        let allowed = bucket.try_consume(now);
        if !allowed {
            debug!(?key, count = bucket.count, limit = bucket.rate.limit, "cooldown denied");
        }
        allowed
    }
}

impl<K> Default for CooldownRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
