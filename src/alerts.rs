//! Alert lifecycle: the daily generator, delivery to sessions and mail,
//! retention, and the read/unread actions behind the HTTP API.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::broker::{ConnectionRegistry, SessionStream, StreamEvent};
use crate::ports::{AlertStore, StoreError, TimeProvider};
use crate::types::alert::{AlertId, AlertList, UserId};

mod dispatcher;
mod generator;
pub(crate) mod mail;
mod retention;

pub use dispatcher::{Dispatched, NotificationDispatcher};
pub use generator::{AlertGenerator, ItemOutcome, RunSummary};
pub use retention::RetentionSweeper;

// Saturates for windows reaching past the supported date range.
pub(crate) fn retention_cutoff(now: OffsetDateTime, retention: time::Duration) -> OffsetDateTime {
    now.checked_sub(retention)
        .unwrap_or(time::PrimitiveDateTime::MIN.assume_utc())
}

pub(crate) async fn refresh_unread_count<S: AlertStore>(
    store: &S,
    registry: &ConnectionRegistry,
    user_id: UserId,
) {
    if !registry.is_connected(user_id) {
        return;
    }
    match store.count_unread(user_id).await {
        Ok(count) => {
            registry.send_to_user(user_id, &StreamEvent::UnreadCount(count));
        }
        Err(err) => warn!(user_id = %user_id, "failed to refresh unread count: {err}"),
    }
}

#[derive(Debug, Clone)]
pub struct AlertService<S, T> {
    store: S,
    registry: Arc<ConnectionRegistry>,
    time: T,
    retention: time::Duration,
}

impl<S, T> AlertService<S, T>
where
    S: AlertStore,
    T: TimeProvider,
{
    pub fn new(
        store: S,
        registry: Arc<ConnectionRegistry>,
        time: T,
        retention: time::Duration,
    ) -> Self {
        Self {
            store,
            registry,
            time,
            retention,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Opens a push session after pruning the user's dead sessions. Without an
    /// identity the stream is closed immediately and nothing is registered.
    pub async fn subscribe(&self, user_id: Option<UserId>) -> SessionStream {
        let Some(user_id) = user_id else {
            debug!("rejecting stream subscription without identity");
            return self.registry.closed_stream();
        };
        let pruned = self.registry.probe_user(user_id);
        if pruned > 0 {
            debug!(user_id = %user_id, pruned, "pruned dead sessions before subscribe");
        }
        let unread = match self.store.count_unread(user_id).await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(user_id = %user_id, "unread count unavailable for new session: {err}");
                None
            }
        };
        self.registry.subscribe(user_id, unread)
    }

    pub async fn list(&self, user_id: UserId) -> Result<AlertList, StoreError> {
        let since = retention_cutoff(self.time.now(), self.retention);
        let alerts = self.store.list_since(user_id, since).await?;
        let unread_count = self.store.count_unread(user_id).await?;
        Ok(AlertList {
            alerts,
            unread_count,
        })
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError> {
        self.store.count_unread(user_id).await
    }

    pub async fn mark_read(&self, user_id: UserId, alert_id: AlertId) -> Result<bool, StoreError> {
        let updated = self
            .store
            .mark_read(user_id, alert_id, self.time.now())
            .await?;
        if updated {
            self.refresh(user_id).await;
        }
        Ok(updated)
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StoreError> {
        let updated = self.store.mark_all_read(user_id, self.time.now()).await?;
        self.refresh(user_id).await;
        Ok(updated)
    }

    pub async fn delete(&self, user_id: UserId, alert_id: AlertId) -> Result<bool, StoreError> {
        let deleted = self.store.delete(user_id, alert_id).await?;
        if deleted {
            self.refresh(user_id).await;
        }
        Ok(deleted)
    }

    async fn refresh(&self, user_id: UserId) {
        refresh_unread_count(&self.store, &self.registry, user_id).await;
    }
}
