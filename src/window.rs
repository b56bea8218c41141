//! # Bucket ring
//! Fixed ring of per-second aggregates covering the trailing window.
//!
//! Slot `i` holds the aggregate for the most recent second `s` with
//! `s mod 60 == i`. A slot is trusted only when its stored second lies in
//! `[now_second - 59, now_second]`. Seconds at or before `now_second - 60` are
//! stale and are reset before reuse; seconds after `now_second` are kept but
//! not counted. Not thread-safe on its own; `rolling::SlidingWindowAggregator`
//! puts it behind a lock.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::amount;
use crate::statistics::StatisticsSnapshot;

/// Length of the window in seconds, which is also the number of buckets.
pub const WINDOW_SECS: i64 = 60;
/// Length of the window in milliseconds.
pub const WINDOW_MILLIS: i64 = WINDOW_SECS * 1_000;
/// Slots in the ring, one per second of the window.
pub const BUCKET_COUNT: usize = WINDOW_SECS as usize;

const UNUSED_SECOND: i64 = i64::MIN;

/// Epoch second a millisecond timestamp belongs to (floor, also for negatives).
#[inline]
pub fn second_of(ts_millis: i64) -> i64 {
    ts_millis.div_euclid(1_000)
}

#[inline]
fn slot_of(second: i64) -> usize {
    second.rem_euclid(WINDOW_SECS) as usize
}

/// Whether `second` is one of the 60 live seconds ending at `now_second`.
#[inline]
pub fn is_live(second: i64, now_second: i64) -> bool {
    second <= now_second && !is_expired(second, now_second)
}

/// Whether `second` has left the window for good as of `now_second`.
/// Seconds after `now_second` are not expired, only not yet visible.
#[inline]
pub fn is_expired(second: i64, now_second: i64) -> bool {
    second <= now_second - WINDOW_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    second: i64,
    count: u64,
    sum: Decimal,
    min: Decimal,
    max: Decimal,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        second: UNUSED_SECOND,
        count: 0,
        sum: Decimal::ZERO,
        min: Decimal::ZERO,
        max: Decimal::ZERO,
    };

    fn first(second: i64, amount: Decimal) -> Self {
        Bucket {
            second,
            count: 1,
            sum: amount,
            min: amount,
            max: amount,
        }
    }

    pub fn second(&self) -> i64 {
        self.second
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The bucket after adding `amount` at `second`. `self` is not modified,
    /// so an overflow leaves the stored aggregate as it was.
    fn merged(&self, second: i64, amount: Decimal) -> Option<Bucket> {
        if self.is_empty() || self.second != second {
            return Some(Bucket::first(second, amount));
        }
        Some(Bucket {
            second,
            count: self.count.checked_add(1)?,
            sum: self.sum.checked_add(amount)?,
            min: self.min.min(amount),
            max: self.max.max(amount),
        })
    }
}

/// What happened to the slot a transaction landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUse {
    /// Joined an existing aggregate for the same second.
    Joined,
    /// Took an empty slot.
    Claimed,
    /// Overwrote an aggregate from an older second.
    Recycled { previous_second: i64 },
    /// Left untouched: the slot already holds a newer second, so the
    /// incoming one has expired. Nothing was merged.
    Superseded { newer_second: i64 },
}

/// Partial fold over the ring for one instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fold {
    pub count: u64,
    pub sum: Decimal,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    /// Non-empty slots that have expired. Slots ahead of the fold's
    /// instant are skipped but not counted here.
    pub stale: usize,
}

impl Fold {
    fn absorb(&mut self, b: &Bucket) {
        self.count = self.count.saturating_add(b.count);
        self.sum = self.sum.saturating_add(b.sum);
        self.min = Some(self.min.map_or(b.min, |m| m.min(b.min)));
        self.max = Some(self.max.map_or(b.max, |m| m.max(b.max)));
    }

    pub fn into_snapshot(self) -> StatisticsSnapshot {
        if self.count == 0 {
            return StatisticsSnapshot::EMPTY;
        }
        StatisticsSnapshot {
            count: self.count,
            sum: amount::round_currency(self.sum),
            avg: amount::average(self.sum, self.count),
            min: self.min.unwrap_or_default(),
            max: self.max.unwrap_or_default(),
        }
    }
}

/// Occupancy summary for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowInfo {
    pub window_secs: i64,
    pub bucket_capacity: usize,
    pub live_buckets: usize,
    pub oldest_second: Option<i64>,
    pub newest_second: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BucketRing {
    slots: [Bucket; BUCKET_COUNT],
}

impl Default for BucketRing {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketRing {
    pub fn new() -> Self {
        Self {
            slots: [Bucket::EMPTY; BUCKET_COUNT],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Add `amount` to the aggregate for `second`, resetting the slot first
    /// when it holds an older second. A slot holding a newer second is never
    /// overwritten.
    pub fn merge(&mut self, second: i64, amount: Decimal) -> Option<SlotUse> {
        let slot = &mut self.slots[slot_of(second)];
        if !slot.is_empty() && slot.second > second {
            return Some(SlotUse::Superseded {
                newer_second: slot.second,
            });
        }
        let merged = slot.merged(second, amount)?;
        let used = if slot.is_empty() {
            SlotUse::Claimed
        } else if slot.second == second {
            SlotUse::Joined
        } else {
            SlotUse::Recycled {
                previous_second: slot.second,
            }
        };
        *slot = merged;
        Some(used)
    }

    pub fn fold(&self, now_second: i64) -> Fold {
        let mut fold = Fold::default();
        for b in self.slots.iter().filter(|b| !b.is_empty()) {
            if is_live(b.second, now_second) {
                fold.absorb(b);
            } else if is_expired(b.second, now_second) {
                fold.stale += 1;
            }
        }
        fold
    }

    /// Reset every non-empty slot that has expired as of `now_second`.
    /// Slots ahead of `now_second` are kept. Returns how many were reset.
    pub fn clear_stale(&mut self, now_second: i64) -> usize {
        let mut cleared = 0;
        for b in self.slots.iter_mut() {
            if !b.is_empty() && is_expired(b.second, now_second) {
                *b = Bucket::EMPTY;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn info(&self, now_second: i64) -> WindowInfo {
        let live = self
            .slots
            .iter()
            .filter(|b| !b.is_empty() && is_live(b.second, now_second));
        let mut info = WindowInfo {
            window_secs: WINDOW_SECS,
            bucket_capacity: self.capacity(),
            live_buckets: 0,
            oldest_second: None,
            newest_second: None,
        };
        for b in live {
            info.live_buckets += 1;
            info.oldest_second = Some(info.oldest_second.map_or(b.second, |s| s.min(b.second)));
            info.newest_second = Some(info.newest_second.map_or(b.second, |s| s.max(b.second)));
        }
        info
    }

    #[cfg(test)]
    fn slot(&self, second: i64) -> &Bucket {
        &self.slots[slot_of(second)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn second_of_floors_negative_timestamps() {
        assert_eq!(second_of(1_999), 1);
        assert_eq!(second_of(2_000), 2);
        assert_eq!(second_of(-1), -1);
        assert_eq!(slot_of(-1), 59);
    }

    #[test]
    fn live_range_is_sixty_seconds_inclusive_of_now() {
        assert!(is_live(100, 100));
        assert!(is_live(41, 100));
        assert!(!is_live(40, 100));
        assert!(!is_live(101, 100));
    }

    #[test]
    fn merge_joins_same_second_and_tracks_extremes() {
        let mut ring = BucketRing::new();
        assert_eq!(ring.merge(1_000, d(5)), Some(SlotUse::Claimed));
        assert_eq!(ring.merge(1_000, d(-2)), Some(SlotUse::Joined));
        assert_eq!(ring.merge(1_000, d(9)), Some(SlotUse::Joined));

        let b = ring.slot(1_000);
        assert_eq!(b.count(), 3);
        assert_eq!(b.sum, d(12));
        assert_eq!(b.min, d(-2));
        assert_eq!(b.max, d(9));
    }

    #[test]
    fn reused_slot_is_reset_before_merge() {
        let mut ring = BucketRing::new();
        ring.merge(1_000, d(50));
        ring.merge(1_000, d(70));
        // 1_060 maps onto the same slot as 1_000
        assert_eq!(
            ring.merge(1_060, d(1)),
            Some(SlotUse::Recycled {
                previous_second: 1_000
            })
        );
        let b = ring.slot(1_060);
        assert_eq!(b.second(), 1_060);
        assert_eq!(b.count(), 1);
        assert_eq!(b.max, d(1));
    }

    #[test]
    fn overflow_leaves_slot_untouched() {
        let mut ring = BucketRing::new();
        ring.merge(7, Decimal::MAX);
        let before = *ring.slot(7);
        assert_eq!(ring.merge(7, Decimal::MAX), None);
        assert_eq!(*ring.slot(7), before);
    }

    #[test]
    fn fold_skips_and_counts_stale_slots() {
        let mut ring = BucketRing::new();
        ring.merge(100, d(10));
        ring.merge(130, d(20));
        ring.merge(159, d(30));

        let f = ring.fold(159);
        assert_eq!((f.count, f.stale), (3, 0));

        let f = ring.fold(160);
        assert_eq!((f.count, f.stale), (2, 1));
        assert_eq!(f.sum, d(50));
        assert_eq!(f.min, Some(d(20)));

        assert_eq!(ring.clear_stale(160), 1);
        assert_eq!(ring.fold(160).stale, 0);
    }

    #[test]
    fn future_slots_do_not_contribute_and_are_kept() {
        let mut ring = BucketRing::new();
        ring.merge(200, d(1));
        ring.merge(100, d(2));
        let f = ring.fold(199);
        assert_eq!(f.count, 0);
        assert_eq!(f.stale, 1);

        // Only the expired second is reset; 200 is merely ahead of 199.
        assert_eq!(ring.clear_stale(199), 1);
        let f = ring.fold(200);
        assert_eq!((f.count, f.sum), (1, d(1)));
    }

    #[test]
    fn older_second_never_overwrites_newer_slot() {
        let mut ring = BucketRing::new();
        ring.merge(1_060, d(7));
        // 1_000 maps onto the same slot as 1_060
        assert_eq!(
            ring.merge(1_000, d(1)),
            Some(SlotUse::Superseded {
                newer_second: 1_060
            })
        );
        let b = ring.slot(1_060);
        assert_eq!(b.second(), 1_060);
        assert_eq!(b.count(), 1);
        assert_eq!(b.sum, d(7));
    }

    #[test]
    fn expired_and_live_are_disjoint_below_now() {
        assert!(is_expired(40, 100));
        assert!(!is_expired(41, 100));
        assert!(!is_expired(101, 100));
        assert!(!is_live(101, 100));
    }

    #[test]
    fn empty_fold_is_the_zero_snapshot() {
        let ring = BucketRing::new();
        assert_eq!(ring.fold(12_345).into_snapshot(), StatisticsSnapshot::EMPTY);
    }

    #[test]
    fn info_reports_live_span() {
        let mut ring = BucketRing::new();
        ring.merge(10, d(1));
        ring.merge(40, d(1));
        ring.merge(69, d(1));
        let info = ring.info(69);
        assert_eq!(info.bucket_capacity, 60);
        assert_eq!(info.live_buckets, 3);
        assert_eq!(info.oldest_second, Some(10));
        assert_eq!(info.newest_second, Some(69));

        let info = ring.info(70);
        assert_eq!(info.live_buckets, 2);
        assert_eq!(info.oldest_second, Some(40));
    }
}
