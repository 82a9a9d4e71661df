use tracing::{debug, info};

use super::retention_cutoff;
use crate::ports::{AlertStore, StoreError, TimeProvider};

/// Deletes alerts older than the retention window.
#[derive(Debug, Clone)]
pub struct RetentionSweeper<S, T> {
    store: S,
    time: T,
    retention: time::Duration,
}

impl<S, T> RetentionSweeper<S, T>
where
    S: AlertStore,
    T: TimeProvider,
{
    pub fn new(store: S, time: T, retention: time::Duration) -> Self {
        Self {
            store,
            time,
            retention,
        }
    }

    /// Removes every alert created strictly before `now - retention`. An alert
    /// exactly at the boundary is kept. Returns the number deleted.
    pub async fn run(&self) -> Result<u64, StoreError> {
        let cutoff = retention_cutoff(self.time.now(), self.retention);
        let deleted = self.store.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, %cutoff, "expired alerts removed");
        } else {
            debug!(%cutoff, "no alerts past retention");
        }
        Ok(deleted)
    }
}
