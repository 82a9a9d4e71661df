use askama::Template;

use crate::ports::MailMessage;
use crate::templates::{AlertMailTemplate, DigestEntry, DigestMailTemplate, TestMailTemplate};
use crate::types::alert::{Alert, AlertKind, UserContact};

pub(crate) const APP_NAME: &str = "Larder";

pub(crate) fn subject_for(alert: &Alert) -> String {
    match alert.kind {
        AlertKind::ExpireToday => format!("[{APP_NAME}] Today is the expiry date!"),
        AlertKind::ExpireIn1 => format!("[{APP_NAME}] An item expires tomorrow"),
        AlertKind::ExpireIn3 => format!("[{APP_NAME}] 3 days until expiry"),
        AlertKind::System => format!("[{APP_NAME}] {}", alert.title),
    }
}

fn accent_for(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::ExpireToday => "#dc3545",
        AlertKind::ExpireIn1 => "#fd7e14",
        AlertKind::ExpireIn3 => "#28a745",
        AlertKind::System => "#6c757d",
    }
}

pub(crate) fn render_alert_mail(
    from: &str,
    to: &str,
    contact: &UserContact,
    alert: &Alert,
) -> Result<MailMessage, askama::Error> {
    let html_body = AlertMailTemplate {
        app_name: APP_NAME,
        recipient: &contact.name,
        accent: accent_for(alert.kind),
        title: &alert.title,
        message: &alert.message,
    }
    .render()?;
    Ok(MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: subject_for(alert),
        html_body,
    })
}

pub(crate) fn render_digest_mail(
    from: &str,
    to: &str,
    contact: &UserContact,
    alerts: &[Alert],
) -> Result<MailMessage, askama::Error> {
    let entries = alerts
        .iter()
        .map(|alert| DigestEntry {
            accent: accent_for(alert.kind),
            title: &alert.title,
            message: &alert.message,
        })
        .collect();
    let html_body = DigestMailTemplate {
        app_name: APP_NAME,
        recipient: &contact.name,
        entries,
    }
    .render()?;
    let subject = match alerts {
        [single] => subject_for(single),
        _ => format!(
            "[{APP_NAME}] {} items are close to their expiry date",
            alerts.len()
        ),
    };
    Ok(MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject,
        html_body,
    })
}

pub(crate) fn render_test_mail(from: &str, to: &str) -> Result<MailMessage, askama::Error> {
    let html_body = TestMailTemplate { app_name: APP_NAME }.render()?;
    Ok(MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("[{APP_NAME}] Test mail"),
        html_body,
    })
}
