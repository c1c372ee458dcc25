// libs/appointment-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type BucketKey = (Uuid, NaiveDate);

/// In-process registry of per `(doctor, day)` booking locks.
///
/// Every writer that reads a doctor's bookings for a set of days holds the
/// locks of all those days across its check and its write.
#[derive(Default)]
pub struct SlotLocks {
    buckets: Mutex<HashMap<BucketKey, Arc<AsyncMutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks all buckets of `doctor_id` for `days`. Keys are taken in sorted
    /// order so overlapping requests cannot deadlock.
    pub async fn acquire(self: &Arc<Self>, doctor_id: Uuid, days: &[NaiveDate]) -> SlotGuard {
        let mut keys: Vec<BucketKey> = days.iter().map(|day| (doctor_id, *day)).collect();
        keys.sort();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let bucket = self.bucket(key);
            held.push((key, bucket.lock_owned().await));
        }

        debug!("Holding {} slot lock(s) for doctor {}", held.len(), doctor_id);
        SlotGuard { locks: Arc::clone(self), held }
    }

    fn bucket(&self, key: BucketKey) -> Arc<AsyncMutex<()>> {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(buckets.entry(key).or_default())
    }

    /// Number of buckets currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn release(&self, held: Vec<(BucketKey, OwnedMutexGuard<()>)>) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        for (key, guard) in held {
            drop(guard);
            // Only the registry itself still references an idle bucket.
            if buckets.get(&key).is_some_and(|bucket| Arc::strong_count(bucket) == 1) {
                buckets.remove(&key);
            }
        }
    }
}

/// Releases its buckets on drop.
pub struct SlotGuard {
    locks: Arc<SlotLocks>,
    held: Vec<(BucketKey, OwnedMutexGuard<()>)>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let held = std::mem::take(&mut self.held);
        self.locks.release(held);
    }
}
