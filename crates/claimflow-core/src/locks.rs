//! Per-key async mutexes used to serialize read-modify-write on one claim.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
  inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
  /// Wait for exclusive access to `key`. Released when the guard drops.
  pub(crate) async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
    let mutex = {
      let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      // Entries nobody holds or waits on can go.
      map.retain(|_, m| Arc::strong_count(m) > 1);
      map.entry(key).or_default().clone()
    };
    mutex.lock_owned().await
  }
}
