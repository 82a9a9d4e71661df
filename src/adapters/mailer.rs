use std::future::Ready;

use tracing::info;

use crate::ports::{MailChannel, MailError, MailMessage};

/// Records outgoing mail in the log instead of handing it to an MTA.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl MailChannel for LogMailer {
    type Error = MailError;
    type Fut<'a>
        = Ready<Result<(), Self::Error>>
    where
        Self: 'a;

    fn send<'a>(&'a self, message: &'a MailMessage) -> Self::Fut<'a> {
        if !message.to.contains('@') {
            return std::future::ready(Err(MailError::InvalidRecipient(message.to.clone())));
        }
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body_bytes = message.html_body.len(),
            "mail sent"
        );
        std::future::ready(Ok(()))
    }
}
