use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use time::{Date, OffsetDateTime};
use tokio::sync::oneshot;

use crate::adapters::MemoryAlertStore;
use crate::ports::{
    self, AlertStore, ExpirySource, MailError, MailMessage, SourceError, StoreError, UserDirectory,
};
use crate::types::alert::{
    Alert, AlertId, AlertKind, ExpiringItem, NewAlert, SubjectId, UserContact, UserId,
};

#[derive(Clone)]
pub(crate) struct TestTime {
    now: Arc<Mutex<OffsetDateTime>>,
    sleeps: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    durations: Arc<Mutex<Vec<Duration>>>,
}

impl TestTime {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            durations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn set_now(&self, now: OffsetDateTime) {
        *self.now.lock() = now;
    }

    pub(crate) fn sleep_durations(&self) -> Vec<Duration> {
        self.durations.lock().clone()
    }

    pub(crate) fn trigger_all(&self) {
        let mut sends = self.sleeps.lock();
        for sender in sends.drain(..) {
            let _ = sender.send(());
        }
    }
}

pub(crate) struct ManualSleep {
    receiver: oneshot::Receiver<()>,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl ports::TimeProvider for TestTime {
    type Sleep<'a>
        = ManualSleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        let (sender, receiver) = oneshot::channel();
        self.durations.lock().push(duration);
        self.sleeps.lock().push(sender);
        ManualSleep { receiver }
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingMailer {
    pub(crate) sent: Arc<Mutex<Vec<MailMessage>>>,
    pub(crate) reject: Arc<Mutex<Vec<String>>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }
}

impl ports::MailChannel for RecordingMailer {
    type Error = MailError;
    type Fut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;

    fn send<'a>(&'a self, message: &'a MailMessage) -> Self::Fut<'a> {
        if self.reject.lock().contains(&message.to) {
            return std::future::ready(Err(MailError::Transport("rejected".to_string())));
        }
        self.sent.lock().push(message.clone());
        std::future::ready(Ok(()))
    }
}

#[derive(Clone, Default)]
pub(crate) struct StaticSource {
    pub(crate) items: Arc<Mutex<Vec<ExpiringItem>>>,
    pub(crate) requested: Arc<Mutex<Vec<(Date, Vec<i64>)>>>,
    pub(crate) unavailable: Arc<Mutex<bool>>,
}

impl StaticSource {
    pub(crate) fn set_items(&self, items: Vec<ExpiringItem>) {
        *self.items.lock() = items;
    }
}

impl ExpirySource for StaticSource {
    async fn expiring_items(
        &self,
        today: Date,
        days: &[i64],
    ) -> Result<Vec<ExpiringItem>, SourceError> {
        self.requested.lock().push((today, days.to_vec()));
        if *self.unavailable.lock() {
            return Err(SourceError::Unavailable("inventory offline".to_string()));
        }
        Ok(self.items.lock().clone())
    }
}

#[derive(Clone, Default)]
pub(crate) struct StaticDirectory {
    pub(crate) contacts: Arc<Mutex<HashMap<UserId, UserContact>>>,
    pub(crate) failing: Arc<Mutex<Vec<UserId>>>,
    pub(crate) lookups: Arc<Mutex<Vec<UserId>>>,
}

impl StaticDirectory {
    pub(crate) fn with_contact(self, user_id: u64, email: &str, email_alerts: bool) -> Self {
        self.contacts.lock().insert(
            UserId(user_id),
            UserContact {
                user_id: UserId(user_id),
                name: format!("user-{user_id}"),
                email: Some(email.to_string()),
                email_alerts,
            },
        );
        self
    }

    pub(crate) fn lookups(&self) -> Vec<UserId> {
        self.lookups.lock().clone()
    }
}

impl UserDirectory for StaticDirectory {
    async fn contact(&self, user_id: UserId) -> Result<Option<UserContact>, SourceError> {
        self.lookups.lock().push(user_id);
        if self.failing.lock().contains(&user_id) {
            return Err(SourceError::Unavailable("directory offline".to_string()));
        }
        Ok(self.contacts.lock().get(&user_id).cloned())
    }
}

/// Memory store whose dedup lookups fail for chosen subjects and whose reads
/// can be switched off entirely. With `slow_lookups` set, every dedup lookup
/// yields to the runtime before answering.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryAlertStore,
    pub(crate) failing_subjects: Arc<Mutex<Vec<SubjectId>>>,
    pub(crate) offline: Arc<Mutex<bool>>,
    pub(crate) slow_lookups: Arc<Mutex<bool>>,
}

impl FlakyStore {
    fn check_online(&self) -> Result<(), StoreError> {
        if *self.offline.lock() {
            return Err(StoreError::Unavailable("database offline".to_string()));
        }
        Ok(())
    }
}

impl AlertStore for FlakyStore {
    async fn insert(&self, alert: NewAlert) -> Result<Alert, StoreError> {
        self.check_online()?;
        self.inner.insert(alert).await
    }

    async fn exists_created_between(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        kind: AlertKind,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        if self.failing_subjects.lock().contains(&subject_id) {
            return Err(StoreError::Query(format!("lock timeout on subject {subject_id}")));
        }
        let exists = self
            .inner
            .exists_created_between(user_id, subject_id, kind, from, until)
            .await?;
        let slow = *self.slow_lookups.lock();
        if slow {
            tokio::task::yield_now().await;
        }
        Ok(exists)
    }

    async fn list_since(
        &self,
        user_id: UserId,
        since: OffsetDateTime,
    ) -> Result<Vec<Alert>, StoreError> {
        self.check_online()?;
        self.inner.list_since(user_id, since).await
    }

    async fn count_unread(&self, user_id: UserId) -> Result<u64, StoreError> {
        self.check_online()?;
        self.inner.count_unread(user_id).await
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        alert_id: AlertId,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        self.inner.mark_read(user_id, alert_id, at).await
    }

    async fn mark_all_read(&self, user_id: UserId, at: OffsetDateTime) -> Result<u64, StoreError> {
        self.check_online()?;
        self.inner.mark_all_read(user_id, at).await
    }

    async fn delete(&self, user_id: UserId, alert_id: AlertId) -> Result<bool, StoreError> {
        self.check_online()?;
        self.inner.delete(user_id, alert_id).await
    }

    async fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        self.check_online()?;
        self.inner.delete_older_than(cutoff).await
    }
}

pub(crate) fn expiring(user: u64, subject: SubjectId, name: &str, days: i64) -> ExpiringItem {
    ExpiringItem {
        user_id: UserId(user),
        subject_id: subject,
        item_name: name.to_string(),
        days_until_expiry: days,
    }
}
