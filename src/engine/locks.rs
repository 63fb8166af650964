use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::attendance::AttendanceKey;

/// Per-key async mutexes. Entries that go unused for `idle` are evicted so
/// the table only holds keys with recent traffic.
pub struct KeyLocks {
    locks: Cache<AttendanceKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// Waits for exclusive access to `key`. Held until the guard drops.
    pub async fn lock(&self, key: AttendanceKey) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .get_with(key, async { Arc::new(Mutex::new(())) })
            .await;
        mutex.lock_owned().await
    }
}
