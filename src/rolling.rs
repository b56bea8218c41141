//! # Rolling Window
//! Thread-safe sliding window of transaction statistics (fixed 60s).
//!
//! Wraps a `BucketRing` in a reader/writer lock together with a clock.
//! `record` takes the write lock for one slot update; `snapshot` folds all
//! 60 slots under the read lock and only upgrades to the write lock when it
//! saw stale slots worth clearing. Expiry happens here, on access, never on
//! a timer.

use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::amount;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StatsError};
use crate::statistics::StatisticsSnapshot;
use crate::window::{self, BucketRing, SlotUse, WindowInfo, WINDOW_MILLIS};

pub struct SlidingWindowAggregator {
    ring: RwLock<BucketRing>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SlidingWindowAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowAggregator")
            .field("now_millis", &self.clock.now_millis())
            .finish_non_exhaustive()
    }
}

impl Default for SlidingWindowAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowAggregator {
    /// Window driven by the system UTC clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            ring: RwLock::new(BucketRing::new()),
            clock,
        }
    }

    /// Record a transaction against the current clock.
    ///
    /// Returns the instant (epoch millis) at which its contribution expires,
    /// `timestamp + 60_000`.
    pub fn record(&self, amount: Decimal, timestamp: i64) -> Result<i64> {
        self.record_at(amount, timestamp, self.clock.now_millis())
    }

    /// Same as [`record`](Self::record) with an explicit `now`.
    ///
    /// Accepts `now - 60_000 <= timestamp <= now`. A transaction accepted on
    /// the very edge may belong to a second that is already outside the 60
    /// live buckets; it is acknowledged but not merged, since no snapshot at
    /// or after `now` could include it. The same holds when its slot already
    /// carries a newer second written by a caller with a later `now`.
    pub fn record_at(&self, amount: Decimal, timestamp: i64, now: i64) -> Result<i64> {
        let result = self.try_record(amount, timestamp, now);
        if let Err(e) = &result {
            counter!("transactions_rejected_total", "reason" => e.reason()).increment(1);
        }
        result
    }

    fn try_record(&self, amount: Decimal, timestamp: i64, now: i64) -> Result<i64> {
        if timestamp > now || timestamp < now.saturating_sub(WINDOW_MILLIS) {
            debug!(timestamp, now, "transaction outside accepted window");
            return Err(StatsError::InvalidTimestamp);
        }
        let expires_at = timestamp.saturating_add(WINDOW_MILLIS);

        let second = window::second_of(timestamp);
        let now_second = window::second_of(now);
        if !window::is_live(second, now_second) {
            debug!(timestamp, now, second, "transaction expired on arrival");
            counter!("transactions_expired_on_arrival_total").increment(1);
            return Ok(expires_at);
        }

        // Rounded before the lock; the ring only ever sees final values.
        let amount = amount::round_currency(amount);
        let used = {
            let mut ring = self.ring.write();
            ring.merge(second, amount)
        };

        match used {
            Some(SlotUse::Superseded { newer_second }) => {
                debug!(timestamp, now, second, newer_second, "transaction expired on arrival");
                counter!("transactions_expired_on_arrival_total").increment(1);
                Ok(expires_at)
            }
            Some(used) => {
                if let SlotUse::Recycled { previous_second } = used {
                    trace!(second, previous_second, "bucket recycled");
                }
                trace!(second, expires_at, "transaction recorded");
                counter!("transactions_recorded_total").increment(1);
                Ok(expires_at)
            }
            None => Err(StatsError::AggregateOverflow { second }),
        }
    }

    /// Statistics for the window ending at the current clock.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.snapshot_at(self.clock.now_millis())
    }

    /// Statistics for transactions whose second lies in
    /// `[second(now) - 59, second(now)]`.
    pub fn snapshot_at(&self, now: i64) -> StatisticsSnapshot {
        let now_second = window::second_of(now);
        let fold = self.ring.read().fold(now_second);

        if fold.stale > 0 {
            // Re-checked under the write lock; another reader may have won.
            let cleared = self.ring.write().clear_stale(now_second);
            if cleared > 0 {
                trace!(cleared, now_second, "stale buckets cleared");
                counter!("window_stale_buckets_cleared_total").increment(cleared as u64);
            }
        }

        counter!("statistics_queries_total").increment(1);
        fold.into_snapshot()
    }

    pub fn window_info(&self) -> WindowInfo {
        self.window_info_at(self.clock.now_millis())
    }

    pub fn window_info_at(&self, now: i64) -> WindowInfo {
        self.ring.read().info(window::second_of(now))
    }
}
