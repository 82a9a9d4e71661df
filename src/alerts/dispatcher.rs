use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::mail;
use super::refresh_unread_count;
use crate::broker::{ConnectionRegistry, StreamEvent};
use crate::ports::{AlertStore, MailChannel, MailMessage};
use crate::types::alert::{Alert, UserContact, UserId};

#[derive(Debug, Clone)]
struct MailSettings<M> {
    channel: M,
    from: String,
}

#[derive(Debug)]
pub struct Dispatched {
    pub delivered: usize,
    pub mail: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct NotificationDispatcher<S, M> {
    store: S,
    registry: Arc<ConnectionRegistry>,
    mail: Option<MailSettings<M>>,
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: AlertStore,
    M: MailChannel,
{
    pub fn new(store: S, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            store,
            registry,
            mail: None,
        }
    }

    pub fn with_mail(mut self, channel: M, from: impl Into<String>) -> Self {
        self.mail = Some(MailSettings {
            channel,
            from: from.into(),
        });
        self
    }

    pub fn mail_enabled(&self) -> bool {
        self.mail.is_some()
    }

    /// Pushes `alert` and a fresh unread count to the owner's open sessions,
    /// then mails `contact` when one is given and eligible.
    pub async fn dispatch(&self, alert: &Alert, contact: Option<&UserContact>) -> Dispatched {
        let delivered = self.push(alert).await;
        let mail = contact.and_then(|contact| self.email_alert(contact, alert));
        Dispatched { delivered, mail }
    }

    pub async fn push(&self, alert: &Alert) -> usize {
        let event = StreamEvent::Notification(Arc::new(alert.clone()));
        let delivered = self.registry.send_to_user(alert.user_id, &event);
        if delivered > 0 {
            refresh_unread_count(&self.store, &self.registry, alert.user_id).await;
        }
        debug!(
            user_id = %alert.user_id,
            alert_id = alert.id,
            delivered,
            "alert pushed"
        );
        delivered
    }

    pub fn email_alert(&self, contact: &UserContact, alert: &Alert) -> Option<JoinHandle<()>> {
        let settings = self.mail.as_ref()?;
        let to = eligible_address(contact)?;
        match mail::render_alert_mail(&settings.from, to, contact, alert) {
            Ok(message) => Some(spawn_mail(settings.channel.clone(), contact.user_id, message)),
            Err(err) => {
                warn!(
                    user_id = %contact.user_id,
                    alert_id = alert.id,
                    "failed to render alert mail: {err}"
                );
                None
            }
        }
    }

    pub fn email_digest(&self, contact: &UserContact, alerts: &[Alert]) -> Option<JoinHandle<()>> {
        if alerts.is_empty() {
            return None;
        }
        let settings = self.mail.as_ref()?;
        let to = eligible_address(contact)?;
        match mail::render_digest_mail(&settings.from, to, contact, alerts) {
            Ok(message) => Some(spawn_mail(settings.channel.clone(), contact.user_id, message)),
            Err(err) => {
                warn!(
                    user_id = %contact.user_id,
                    alerts = alerts.len(),
                    "failed to render digest mail: {err}"
                );
                None
            }
        }
    }
}

fn eligible_address(contact: &UserContact) -> Option<&str> {
    let address = contact.mail_address();
    if address.is_none() {
        debug!(user_id = %contact.user_id, "user has no address or opted out of mail");
    }
    address
}

fn spawn_mail<M: MailChannel>(channel: M, user_id: UserId, message: MailMessage) -> JoinHandle<()> {
    tokio::spawn(async move {
        match channel.send(&message).await {
            Ok(()) => info!(user_id = %user_id, subject = %message.subject, "alert mail sent"),
            Err(err) => warn!(user_id = %user_id, to = %message.to, "alert mail failed: {err}"),
        }
    })
}
