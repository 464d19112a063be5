//! Shared per-key usage counters
//!
//! [`AggregationStore`] is the only state shared between the listener thread
//! and the render/flush side. Every operation takes the store's single lock
//! for its whole duration, so a [`Snapshot`] always reflects one instant.

use crate::keyboard::KeyId;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Accumulated usage of one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateRecord {
    /// Number of distinct presses (auto-repeat excluded)
    pub press_count: u64,
    /// Sum of all press-to-release intervals
    pub total_held: Duration,
}

impl AggregateRecord {
    pub fn new(press_count: u64, total_held: Duration) -> Self {
        Self {
            press_count,
            total_held,
        }
    }

    pub fn held_micros(&self) -> u64 {
        u64::try_from(self.total_held.as_micros()).unwrap_or(u64::MAX)
    }

    /// Mean hold time per press, if the key was pressed at all
    pub fn average_hold(&self) -> Option<Duration> {
        if self.press_count == 0 {
            return None;
        }
        Some(Duration::from_micros(self.held_micros() / self.press_count))
    }
}

/// Immutable point-in-time copy of all aggregated statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// Per-key records
    pub records: BTreeMap<KeyId, AggregateRecord>,
}

impl Snapshot {
    pub fn new(created_at: DateTime<Utc>, records: BTreeMap<KeyId, AggregateRecord>) -> Self {
        Self {
            created_at,
            records,
        }
    }

    pub fn get(&self, key: KeyId) -> Option<&AggregateRecord> {
        self.records.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_presses(&self) -> u64 {
        self.records
            .values()
            .fold(0u64, |acc, r| acc.saturating_add(r.press_count))
    }

    pub fn total_held(&self) -> Duration {
        self.records
            .values()
            .fold(Duration::ZERO, |acc, r| acc.saturating_add(r.total_held))
    }

    /// Keys ordered by press count, most used first
    pub fn most_pressed(&self, limit: usize) -> Vec<(KeyId, u64)> {
        let mut keys: Vec<(KeyId, u64)> = self
            .records
            .iter()
            .map(|(k, r)| (*k, r.press_count))
            .collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        keys.truncate(limit);
        keys
    }
}

/// Snapshot timestamps carry the microsecond precision of the file format
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn truncate_to_micros(d: Duration) -> Duration {
    Duration::new(d.as_secs(), d.subsec_micros() * 1_000)
}

/// Thread-safe press/duration accumulator
#[derive(Debug, Default)]
pub struct AggregationStore {
    records: Mutex<BTreeMap<KeyId, AggregateRecord>>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one press of `key`
    pub fn record_press(&self, key: KeyId) {
        let mut records = self.records.lock();
        let record = records.entry(key).or_default();
        record.press_count = record.press_count.saturating_add(1);
    }

    /// Add a measured hold interval to `key`.
    ///
    /// Intervals are truncated to whole microseconds, the precision snapshots
    /// are stored with.
    pub fn record_duration(&self, key: KeyId, elapsed: Duration) {
        let elapsed = truncate_to_micros(elapsed);
        let mut records = self.records.lock();
        let record = records.entry(key).or_default();
        record.total_held = record.total_held.saturating_add(elapsed);
    }

    /// Consistent copy of the current counters
    pub fn snapshot(&self) -> Snapshot {
        let records = self.records.lock();
        Snapshot::new(now(), records.clone())
    }

    /// Take the counters and leave the store empty
    pub fn drain(&self) -> Snapshot {
        let mut records = self.records.lock();
        Snapshot::new(now(), std::mem::take(&mut *records))
    }

    /// Number of keys with a record
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn total_presses(&self) -> u64 {
        self.records
            .lock()
            .values()
            .fold(0u64, |acc, r| acc.saturating_add(r.press_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const A: KeyId = KeyId::new(30);
    const S: KeyId = KeyId::new(31);

    #[test]
    fn press_creates_record() {
        let store = AggregationStore::new();
        store.record_press(A);
        store.record_press(A);

        let snap = store.snapshot();
        assert_eq!(snap.get(A), Some(&AggregateRecord::new(2, Duration::ZERO)));
        assert_eq!(snap.get(S), None);
    }

    #[test]
    fn duration_without_press_keeps_count_zero() {
        let store = AggregationStore::new();
        store.record_duration(S, Duration::from_millis(40));

        let snap = store.snapshot();
        let record = snap.get(S).expect("record created");
        assert_eq!(record.press_count, 0);
        assert_eq!(record.total_held, Duration::from_millis(40));
        assert_eq!(record.average_hold(), None);
    }

    #[test]
    fn durations_accumulate() {
        let store = AggregationStore::new();
        store.record_press(A);
        store.record_duration(A, Duration::from_millis(100));
        store.record_press(A);
        store.record_duration(A, Duration::from_millis(50));

        let record = *store.snapshot().get(A).expect("record");
        assert_eq!(record.total_held, Duration::from_millis(150));
        assert_eq!(record.held_micros(), 150_000);
        assert_eq!(record.average_hold(), Some(Duration::from_millis(75)));
    }

    #[test]
    fn durations_keep_microsecond_precision() {
        let store = AggregationStore::new();
        store.record_duration(A, Duration::from_nanos(1_234_567));
        store.record_duration(A, Duration::from_nanos(999));

        let record = *store.snapshot().get(A).expect("record");
        assert_eq!(record.total_held, Duration::from_micros(1_234));
        assert_eq!(record.held_micros(), 1_234);
    }

    #[test]
    fn snapshot_does_not_alias_store() {
        let store = AggregationStore::new();
        store.record_press(A);
        let before = store.snapshot();
        store.record_press(A);

        assert_eq!(before.get(A).map(|r| r.press_count), Some(1));
        assert_eq!(store.snapshot().get(A).map(|r| r.press_count), Some(2));
    }

    #[test]
    fn drain_empties_store() {
        let store = AggregationStore::new();
        store.record_press(A);
        store.record_press(S);

        let drained = store.drain();
        assert_eq!(drained.records.len(), 2);
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn concurrent_presses_are_all_counted() {
        let store = Arc::new(AggregationStore::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.record_press(A);
                        store.record_duration(A, Duration::from_micros(1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let record = *store.snapshot().get(A).expect("record");
        assert_eq!(record.press_count, 4000);
        assert_eq!(record.total_held, Duration::from_micros(4000));
    }

    #[test]
    fn snapshot_summaries() {
        let store = AggregationStore::new();
        for _ in 0..3 {
            store.record_press(S);
        }
        store.record_press(A);
        store.record_duration(A, Duration::from_millis(5));
        store.record_duration(S, Duration::from_millis(7));

        let snap = store.snapshot();
        assert_eq!(snap.total_presses(), 4);
        assert_eq!(store.total_presses(), 4);
        assert_eq!(snap.total_held(), Duration::from_millis(12));
        assert_eq!(snap.most_pressed(1), vec![(S, 3)]);
        assert_eq!(snap.most_pressed(5), vec![(S, 3), (A, 1)]);
    }
}
