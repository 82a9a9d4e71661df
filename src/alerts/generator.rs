use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::NotificationDispatcher;
use crate::config::{EmailMode, ExpiryThreshold, NotifyConfig};
use crate::ports::{AlertStore, ExpirySource, MailChannel, SourceError, TimeProvider, UserDirectory};
use crate::types::alert::{Alert, ExpiringItem, NewAlert, UserContact, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub ignored: usize,
    pub emails_requested: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Created(Alert),
    /// An alert with the same user, subject and kind already exists today.
    Duplicate,
    Ignored,
    Failed,
}

#[derive(Debug, Default)]
struct ContactCache {
    contacts: HashMap<UserId, Option<UserContact>>,
}

impl ContactCache {
    async fn get<D: UserDirectory>(
        &mut self,
        directory: &D,
        user_id: UserId,
    ) -> Option<UserContact> {
        if let Some(cached) = self.contacts.get(&user_id) {
            return cached.clone();
        }
        let contact = match directory.contact(user_id).await {
            Ok(contact) => contact,
            Err(err) => {
                warn!(user_id = %user_id, "contact lookup failed, skipping mail: {err}");
                None
            }
        };
        self.contacts.insert(user_id, contact.clone());
        contact
    }
}

/// `[start, end)` of `day` at `offset`.
pub(crate) fn day_bounds(day: Date, offset: UtcOffset) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_offset(offset);
    (start, start + time::Duration::DAY)
}

pub struct AlertGenerator<S, X, D, M, T> {
    store: S,
    source: X,
    directory: D,
    dispatcher: NotificationDispatcher<S, M>,
    time: T,
    thresholds: Vec<ExpiryThreshold>,
    offset: UtcOffset,
    email_mode: EmailMode,
    run_lock: tokio::sync::Mutex<()>,
}

impl<S, X, D, M, T> AlertGenerator<S, X, D, M, T>
where
    S: AlertStore,
    X: ExpirySource,
    D: UserDirectory,
    M: MailChannel,
    T: TimeProvider,
{
    pub fn new(
        store: S,
        source: X,
        directory: D,
        dispatcher: NotificationDispatcher<S, M>,
        time: T,
        config: &NotifyConfig,
    ) -> Self {
        Self {
            store,
            source,
            directory,
            dispatcher,
            time,
            thresholds: config.thresholds.clone(),
            offset: config.utc_offset,
            email_mode: config.email_mode,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn threshold_for(&self, days: i64) -> Option<&ExpiryThreshold> {
        self.thresholds.iter().find(|threshold| threshold.days == days)
    }

    /// Runs one pass over the source. Concurrent calls are serialized. Only a
    /// source failure aborts the run; per-item failures are counted.
    pub async fn run(&self) -> Result<RunSummary, SourceError> {
        let (summary, _mail) = self.run_pass().await?;
        Ok(summary)
    }

    /// Like [`run`](Self::run), but also waits for the mails it requested.
    pub async fn run_and_flush_mail(&self) -> Result<RunSummary, SourceError> {
        let (summary, mail) = self.run_pass().await?;
        for handle in mail {
            if let Err(err) = handle.await {
                warn!("mail task did not complete: {err}");
            }
        }
        Ok(summary)
    }

    async fn run_pass(&self) -> Result<(RunSummary, Vec<JoinHandle<()>>), SourceError> {
        let _running = self.run_lock.lock().await;
        let started = self.time.now();
        let today = started.to_offset(self.offset).date();
        let days: Vec<i64> = self.thresholds.iter().map(|threshold| threshold.days).collect();

        let items = self.source.expiring_items(today, &days).await?;
        debug!(%today, items = items.len(), "expiry scan started");

        let mut summary = RunSummary::default();
        let mut contacts = ContactCache::default();
        let mut digests: BTreeMap<UserId, Vec<Alert>> = BTreeMap::new();
        let mut mail = Vec::new();

        for item in &items {
            let alert = match self.process_item(item, today, started).await {
                ItemOutcome::Created(alert) => alert,
                ItemOutcome::Duplicate => {
                    summary.duplicates += 1;
                    continue;
                }
                ItemOutcome::Ignored => {
                    summary.ignored += 1;
                    continue;
                }
                ItemOutcome::Failed => {
                    summary.failed += 1;
                    continue;
                }
            };
            summary.created += 1;

            let contact = if self.dispatcher.mail_enabled() {
                contacts.get(&self.directory, alert.user_id).await
            } else {
                None
            };
            match self.email_mode {
                EmailMode::PerAlert => {
                    let dispatched = self.dispatcher.dispatch(&alert, contact.as_ref()).await;
                    if let Some(handle) = dispatched.mail {
                        summary.emails_requested += 1;
                        mail.push(handle);
                    }
                }
                EmailMode::Digest => {
                    self.dispatcher.push(&alert).await;
                    if contact.as_ref().and_then(UserContact::mail_address).is_some() {
                        digests.entry(alert.user_id).or_default().push(alert);
                    }
                }
            }
        }

        for (user_id, alerts) in digests {
            let Some(contact) = contacts.get(&self.directory, user_id).await else {
                continue;
            };
            if let Some(handle) = self.dispatcher.email_digest(&contact, &alerts) {
                summary.emails_requested += 1;
                mail.push(handle);
            }
        }

        info!(
            %today,
            created = summary.created,
            duplicates = summary.duplicates,
            failed = summary.failed,
            ignored = summary.ignored,
            emails = summary.emails_requested,
            "expiry alert run finished"
        );
        Ok((summary, mail))
    }

    /// Classifies one item and persists its alert unless one already exists
    /// for `today`. `at` becomes the alert's creation time.
    pub async fn process_item(
        &self,
        item: &ExpiringItem,
        today: Date,
        at: OffsetDateTime,
    ) -> ItemOutcome {
        let Some(threshold) = self.threshold_for(item.days_until_expiry) else {
            return ItemOutcome::Ignored;
        };
        let (from, until) = day_bounds(today, self.offset);

        match self
            .store
            .exists_created_between(item.user_id, item.subject_id, threshold.kind, from, until)
            .await
        {
            Ok(true) => {
                debug!(
                    user_id = %item.user_id,
                    subject_id = item.subject_id,
                    kind = %threshold.kind,
                    "alert already issued today"
                );
                return ItemOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(
                    user_id = %item.user_id,
                    subject_id = item.subject_id,
                    "dedup lookup failed: {err}"
                );
                return ItemOutcome::Failed;
            }
        }

        let new_alert = NewAlert {
            user_id: item.user_id,
            subject_id: Some(item.subject_id),
            kind: threshold.kind,
            title: threshold.title.clone(),
            message: threshold.render_message(&item.item_name),
            created_at: at,
        };
        match self.store.insert(new_alert).await {
            Ok(alert) => ItemOutcome::Created(alert),
            Err(err) => {
                warn!(
                    user_id = %item.user_id,
                    subject_id = item.subject_id,
                    "failed to store alert: {err}"
                );
                ItemOutcome::Failed
            }
        }
    }
}
