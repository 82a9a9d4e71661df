use std::time::Duration;

use time::OffsetDateTime;

use crate::ports;

mod inventory;
mod mailer;
mod memory;

pub use inventory::{Inventory, InventoryError};
pub use mailer::LogMailer;
pub use memory::MemoryAlertStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}
