use thiserror::Error;
use time::Date;

use crate::types::alert::{ExpiringItem, UserContact, UserId};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Inventory of tracked items, owned outside this crate.
pub trait ExpirySource: Clone + Send + Sync + 'static {
    /// Every item, across all users, whose distance from `today` in whole days
    /// is one of `days`.
    fn expiring_items(
        &self,
        today: Date,
        days: &[i64],
    ) -> impl Future<Output = Result<Vec<ExpiringItem>, SourceError>> + Send;
}

pub trait UserDirectory: Clone + Send + Sync + 'static {
    fn contact(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<UserContact>, SourceError>> + Send;
}
