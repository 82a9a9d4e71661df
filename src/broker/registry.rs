use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, trace};

use super::StreamEvent;
use super::session::{CloseReason, SessionId, SessionStream, StreamSession};
use crate::types::alert::UserId;

/// Open push sessions keyed by user. Entry locks are only held to copy or
/// edit a session list; events are delivered after the lock is released.
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: DashMap<UserId, Vec<Arc<StreamSession>>>,
    next_id: AtomicU64,
    buffer: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStatus {
    pub users: usize,
    pub sessions: usize,
    pub per_user: BTreeMap<UserId, usize>,
}

impl ConnectionRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer,
        }
    }

    fn next_session_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a new session for `user_id` and queues the initial `connect`
    /// and (when known) `unread-count` events.
    pub fn subscribe(self: &Arc<Self>, user_id: UserId, unread_count: Option<u64>) -> SessionStream {
        let (session, inbox) = StreamSession::open(self.next_session_id(), user_id, self.buffer);
        self.sessions
            .entry(user_id)
            .or_default()
            .push(Arc::clone(&session));

        let mut initial = vec![StreamEvent::Connect];
        initial.extend(unread_count.map(StreamEvent::UnreadCount));
        for event in initial {
            if let Err(err) = session.deliver(event) {
                debug!(user_id = %user_id, session_id = session.id(), "initial event failed: {err}");
                self.evict(std::slice::from_ref(&session), CloseReason::WriteFailed);
                break;
            }
        }

        debug!(
            user_id = %user_id,
            session_id = session.id(),
            open_sessions = self.session_count(user_id),
            "stream session opened"
        );
        SessionStream::new(session, inbox, Arc::clone(self))
    }

    pub fn closed_stream(&self) -> SessionStream {
        let session = StreamSession::closed(self.next_session_id(), CloseReason::Unauthenticated);
        SessionStream::ended(session)
    }

    /// Delivers `event` to every session `user_id` has open right now.
    /// Sessions that fail delivery are closed and removed. Returns the number
    /// of sessions that accepted the event.
    pub fn send_to_user(&self, user_id: UserId, event: &StreamEvent) -> usize {
        let targets = self.sessions_of(user_id);
        if targets.is_empty() {
            trace!(user_id = %user_id, event = event.name(), "no open sessions");
            return 0;
        }

        let mut delivered = 0;
        let mut dead = Vec::new();
        for session in targets {
            match session.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    debug!(
                        user_id = %user_id,
                        session_id = session.id(),
                        event = event.name(),
                        "dropping session: {err}"
                    );
                    dead.push(session);
                }
            }
        }
        self.evict(&dead, CloseReason::WriteFailed);
        delivered
    }

    /// Sends a heartbeat to the sessions of one user and evicts the ones that
    /// fail. Returns the number evicted.
    pub fn probe_user(&self, user_id: UserId) -> usize {
        let dead: Vec<_> = self
            .sessions_of(user_id)
            .into_iter()
            .filter(|session| session.deliver(StreamEvent::Heartbeat).is_err())
            .collect();
        self.evict(&dead, CloseReason::WriteFailed)
    }

    pub fn unregister(&self, session: &StreamSession) -> bool {
        match session.user_id() {
            Some(user_id) => self.remove(user_id, &[session.id()]) > 0,
            None => false,
        }
    }

    pub fn evict(&self, sessions: &[Arc<StreamSession>], reason: CloseReason) -> usize {
        let mut by_user: BTreeMap<UserId, Vec<SessionId>> = BTreeMap::new();
        for session in sessions {
            session.close(reason);
            if let Some(user_id) = session.user_id() {
                by_user.entry(user_id).or_default().push(session.id());
            }
        }
        by_user
            .into_iter()
            .map(|(user_id, ids)| self.remove(user_id, &ids))
            .sum()
    }

    fn remove(&self, user_id: UserId, ids: &[SessionId]) -> usize {
        let removed = match self.sessions.get_mut(&user_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|session| !ids.contains(&session.id()));
                before - entry.len()
            }
            None => 0,
        };
        self.sessions
            .remove_if(&user_id, |_, sessions| sessions.is_empty());
        removed
    }

    fn sessions_of(&self, user_id: UserId) -> Vec<Arc<StreamSession>> {
        self.sessions
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<(UserId, Vec<Arc<StreamSession>>)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn session_count(&self, user_id: UserId) -> usize {
        self.sessions.get(&user_id).map_or(0, |entry| entry.len())
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.session_count(user_id) > 0
    }

    pub fn total_sessions(&self) -> usize {
        self.sessions.iter().map(|entry| entry.len()).sum()
    }

    pub fn status(&self) -> ConnectionStatus {
        let per_user: BTreeMap<UserId, usize> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.len()))
            .collect();
        ConnectionStatus {
            users: per_user.len(),
            sessions: per_user.values().sum(),
            per_user,
        }
    }

    pub fn close_all(&self) -> usize {
        let sessions: Vec<_> = self
            .snapshot()
            .into_iter()
            .flat_map(|(_, sessions)| sessions)
            .collect();
        let closed = self.evict(&sessions, CloseReason::Shutdown);
        info!(closed, "closed all stream sessions");
        closed
    }
}
