use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::ports::{AlertStore, StoreError};
use crate::types::alert::{Alert, AlertId, AlertKind, NewAlert, SubjectId, UserId};

/// Process-local alert rows. Contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: AlertId,
    alerts: Vec<Alert>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Alert> {
        self.inner.lock().alerts.clone()
    }
}

impl AlertStore for MemoryAlertStore {
    async fn insert(&self, alert: NewAlert) -> Result<Alert, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let stored = Alert {
            id: inner.next_id,
            user_id: alert.user_id,
            subject_id: alert.subject_id,
            kind: alert.kind,
            title: alert.title,
            message: alert.message,
            read: false,
            created_at: alert.created_at,
            read_at: None,
        };
        inner.alerts.push(stored.clone());
        Ok(stored)
    }

    async fn exists_created_between(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        kind: AlertKind,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.alerts.iter().any(|alert| {
            alert.user_id == user_id
                && alert.subject_id == Some(subject_id)
                && alert.kind == kind
                && alert.created_at >= from
                && alert.created_at < until
        }))
    }

    async fn list_since(
        &self,
        user_id: UserId,
        since: OffsetDateTime,
    ) -> Result<Vec<Alert>, StoreError> {
        let inner = self.inner.lock();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .iter()
            .filter(|alert| alert.user_id == user_id && alert.created_at >= since)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn count_unread(&self, user_id: UserId) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        let count = inner
            .alerts
            .iter()
            .filter(|alert| alert.user_id == user_id && !alert.read)
            .count();
        Ok(count as u64)
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        alert_id: AlertId,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(alert) = inner
            .alerts
            .iter_mut()
            .find(|alert| alert.id == alert_id && alert.user_id == user_id)
        else {
            return Ok(false);
        };
        if !alert.read {
            alert.read = true;
            alert.read_at = Some(at);
        }
        Ok(true)
    }

    async fn mark_all_read(&self, user_id: UserId, at: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let mut updated = 0;
        for alert in inner
            .alerts
            .iter_mut()
            .filter(|alert| alert.user_id == user_id && !alert.read)
        {
            alert.read = true;
            alert.read_at = Some(at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, user_id: UserId, alert_id: AlertId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.alerts.len();
        inner
            .alerts
            .retain(|alert| !(alert.id == alert_id && alert.user_id == user_id));
        Ok(inner.alerts.len() != before)
    }

    async fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.alerts.len();
        inner.alerts.retain(|alert| alert.created_at >= cutoff);
        Ok((before - inner.alerts.len()) as u64)
    }
}
