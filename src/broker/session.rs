use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::StreamEvent;
use super::registry::ConnectionRegistry;
use crate::ports::TimeProvider;
use crate::types::alert::UserId;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Completed,
    TimedOut,
    WriteFailed,
    Unauthenticated,
    Shutdown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("session is closed")]
    Closed,
    #[error("client disconnected")]
    Disconnected,
    #[error("client is not draining its stream")]
    Backlogged,
}

/// Server side of one push channel.
///
/// `Open` until [`StreamSession::close`] succeeds once; `Closed` is terminal.
/// Closing drops the outbox sender, which ends the client's [`SessionStream`].
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    user_id: Option<UserId>,
    created_at: OffsetDateTime,
    outbox: Mutex<Option<mpsc::Sender<StreamEvent>>>,
    closed: OnceLock<CloseReason>,
}

impl StreamSession {
    pub(crate) fn open(
        id: SessionId,
        user_id: UserId,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<StreamEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let session = Arc::new(Self {
            id,
            user_id: Some(user_id),
            created_at: OffsetDateTime::now_utc(),
            outbox: Mutex::new(Some(sender)),
            closed: OnceLock::new(),
        });
        (session, receiver)
    }

    pub(crate) fn closed(id: SessionId, reason: CloseReason) -> Arc<Self> {
        let closed = OnceLock::new();
        let _ = closed.set(reason);
        Arc::new(Self {
            id,
            user_id: None,
            created_at: OffsetDateTime::now_utc(),
            outbox: Mutex::new(None),
            closed,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        if self.closed.get().is_some() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed.get().copied()
    }

    /// Moves the session to `Closed`. Returns `false` when it was already closed.
    pub fn close(&self, reason: CloseReason) -> bool {
        if self.closed.set(reason).is_err() {
            return false;
        }
        self.outbox.lock().take();
        debug!(
            session_id = self.id,
            user_id = ?self.user_id,
            ?reason,
            "stream session closed"
        );
        true
    }

    pub fn deliver(&self, event: StreamEvent) -> Result<(), DeliveryError> {
        let outbox = self.outbox.lock();
        let Some(sender) = outbox.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Backlogged,
            TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }
}

/// Client side of a session. Dropping it closes and unregisters the session.
pub struct SessionStream {
    session: Arc<StreamSession>,
    inbox: Option<mpsc::Receiver<StreamEvent>>,
    registry: Option<Arc<ConnectionRegistry>>,
}

impl SessionStream {
    pub(crate) fn new(
        session: Arc<StreamSession>,
        inbox: mpsc::Receiver<StreamEvent>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            session,
            inbox: Some(inbox),
            registry: Some(registry),
        }
    }

    pub(crate) fn ended(session: Arc<StreamSession>) -> Self {
        Self {
            session,
            inbox: None,
            registry: None,
        }
    }

    pub fn session(&self) -> &Arc<StreamSession> {
        &self.session
    }

    /// Waits for the next event. Returns `None` once the session is closed or
    /// no event arrived within `idle_timeout`; the latter closes the session.
    pub async fn next_event<T: TimeProvider>(
        &mut self,
        time: &T,
        idle_timeout: Duration,
    ) -> Option<StreamEvent> {
        let inbox = self.inbox.as_mut()?;
        let received = tokio::select! {
            event = inbox.recv() => Some(event),
            _ = time.sleep(idle_timeout) => None,
        };
        match received {
            Some(Some(event)) => Some(event),
            Some(None) => {
                self.finish(CloseReason::Completed);
                None
            }
            None => {
                self.finish(CloseReason::TimedOut);
                None
            }
        }
    }

    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.inbox.as_mut()?.try_recv().ok()
    }

    pub fn into_events<T: TimeProvider>(
        self,
        time: T,
        idle_timeout: Duration,
    ) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold((self, time), move |(mut stream, time)| async move {
            let event = stream.next_event(&time, idle_timeout).await?;
            Some((event, (stream, time)))
        })
    }

    fn finish(&mut self, reason: CloseReason) {
        self.inbox = None;
        self.session.close(reason);
        if let Some(registry) = self.registry.take() {
            registry.unregister(&self.session);
        }
    }

    #[cfg(test)]
    pub(crate) fn disconnect(&mut self) {
        self.inbox = None;
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.finish(CloseReason::Completed);
    }
}
