//! Time-boxed snapshot of every resolved patient.
//!
//! Resolving all patients walks the batch directory and queries the stores once per patient,
//! so the full result is kept for a configurable TTL. The snapshot is immutable and replaced
//! wholesale: readers either see the previous snapshot or the new one, never a mix.

use crate::record::PatientRecord;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tumorboard_types::PatientId;

/// Source of monotonic time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Every patient record resolved in one pass.
#[derive(Debug)]
pub struct Snapshot {
    records: BTreeMap<PatientId, PatientRecord>,
    degraded: BTreeSet<PatientId>,
    built_at: Instant,
    built_at_utc: DateTime<Utc>,
}

impl Snapshot {
    pub fn records(&self) -> &BTreeMap<PatientId, PatientRecord> {
        &self.records
    }

    pub fn get(&self, id: &PatientId) -> Option<&PatientRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Patients resolved without the primary store because it failed for them.
    pub fn degraded(&self) -> &BTreeSet<PatientId> {
        &self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Wall-clock time the snapshot was built, for display.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at_utc
    }
}

pub struct SnapshotCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            current: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current snapshot, if one exists and is younger than the TTL.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        let current = self.current.read().clone()?;
        let age = self.clock.now().saturating_duration_since(current.built_at);
        if age < self.ttl {
            Some(current)
        } else {
            tracing::debug!("patient snapshot expired after {:?}", age);
            None
        }
    }

    /// Replace the current snapshot with `records`.
    pub fn store(&self, records: BTreeMap<PatientId, PatientRecord>) -> Arc<Snapshot> {
        let snapshot = self.transient(records, BTreeSet::new());
        *self.current.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// A snapshot handed to the caller without replacing the cached one.
    pub fn transient(
        &self,
        records: BTreeMap<PatientId, PatientRecord>,
        degraded: BTreeSet<PatientId>,
    ) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            records,
            degraded,
            built_at: self.clock.now(),
            built_at_utc: Utc::now(),
        })
    }

    pub fn invalidate(&self) {
        *self.current.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;

    #[test]
    fn test_snapshot_expires_after_ttl() {
        let clock = ManualClock::new();
        let cache = SnapshotCache::with_clock(Duration::from_secs(60), clock.clone());
        assert!(cache.get().is_none());

        cache.store(BTreeMap::new());
        assert!(cache.get().is_some());

        clock.advance(Duration::from_secs(59));
        assert!(cache.get().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_drops_snapshot() {
        let cache = SnapshotCache::new(Duration::from_secs(300));
        cache.store(BTreeMap::new());
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_transient_snapshot_is_not_cached() {
        let cache = SnapshotCache::new(Duration::from_secs(300));
        let degraded: BTreeSet<PatientId> = [PatientId::parse("1").unwrap()].into();

        let snapshot = cache.transient(BTreeMap::new(), degraded);

        assert!(snapshot.is_degraded());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = SnapshotCache::new(Duration::ZERO);
        let stored = cache.store(BTreeMap::new());
        assert!(stored.is_empty());
        assert!(cache.get().is_none());
    }
}
