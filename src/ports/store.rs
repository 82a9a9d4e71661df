use thiserror::Error;
use time::OffsetDateTime;

use crate::types::alert::{Alert, AlertId, AlertKind, NewAlert, SubjectId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert store unavailable: {0}")]
    Unavailable(String),
    #[error("alert store query failed: {0}")]
    Query(String),
}

/// Persistence for alert rows.
///
/// Ranges are half-open: `from` inclusive, `until` exclusive. Mutations are
/// scoped to `user_id` and report whether (or how many) rows they touched.
pub trait AlertStore: Clone + Send + Sync + 'static {
    fn insert(&self, alert: NewAlert) -> impl Future<Output = Result<Alert, StoreError>> + Send;

    fn exists_created_between(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        kind: AlertKind,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Alerts created at or after `since`, newest first.
    fn list_since(
        &self,
        user_id: UserId,
        since: OffsetDateTime,
    ) -> impl Future<Output = Result<Vec<Alert>, StoreError>> + Send;

    fn count_unread(&self, user_id: UserId)
    -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn mark_read(
        &self,
        user_id: UserId,
        alert_id: AlertId,
        at: OffsetDateTime,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn mark_all_read(
        &self,
        user_id: UserId,
        at: OffsetDateTime,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn delete(
        &self,
        user_id: UserId,
        alert_id: AlertId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes every alert created strictly before `cutoff`.
    fn delete_older_than(
        &self,
        cutoff: OffsetDateTime,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
