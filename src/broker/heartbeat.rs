use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace};

use super::StreamEvent;
use super::registry::ConnectionRegistry;
use super::session::CloseReason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: usize,
}

/// Pings every open session and evicts the ones that cannot be written to.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Probes a snapshot of the registry. Failed sessions are evicted after
    /// the whole snapshot has been probed.
    pub fn sweep(&self) -> SweepReport {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return SweepReport::default();
        }

        let mut probed = 0;
        let mut failed = Vec::new();
        for (user_id, sessions) in snapshot {
            for session in sessions {
                probed += 1;
                match session.deliver(StreamEvent::Heartbeat) {
                    Ok(()) => {
                        trace!(user_id = %user_id, session_id = session.id(), "heartbeat sent")
                    }
                    Err(err) => {
                        debug!(
                            user_id = %user_id,
                            session_id = session.id(),
                            "heartbeat failed: {err}"
                        );
                        failed.push(session);
                    }
                }
            }
        }

        let evicted = self.registry.evict(&failed, CloseReason::WriteFailed);
        let status = self.registry.status();
        if evicted > 0 {
            info!(
                probed,
                evicted,
                users = status.users,
                sessions = status.sessions,
                "heartbeat sweep evicted dead sessions"
            );
        } else {
            debug!(
                probed,
                users = status.users,
                sessions = status.sessions,
                "heartbeat sweep finished"
            );
        }
        SweepReport { probed, evicted }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::broker::SessionStream;
    use crate::types::alert::UserId;

    #[test]
    fn sweep__should_evict_exactly_the_failing_sessions() {
        // Given
        let registry = Arc::new(ConnectionRegistry::new(4));
        let mut streams: Vec<SessionStream> = (0..100)
            .map(|n| registry.subscribe(UserId(n % 20), Some(0)))
            .collect();
        let failing: Vec<_> = streams
            .iter()
            .step_by(20)
            .map(|stream| stream.session().id())
            .collect();
        for stream in streams.iter_mut().step_by(20) {
            stream.disconnect();
        }
        let monitor = HeartbeatMonitor::new(Arc::clone(&registry));

        // When
        let report = monitor.sweep();

        // Then
        assert_eq!(failing.len(), 5);
        assert_eq!(report, SweepReport { probed: 100, evicted: 5 });
        assert_eq!(registry.total_sessions(), 95);
        let remaining: Vec<_> = registry
            .snapshot()
            .into_iter()
            .flat_map(|(_, sessions)| sessions)
            .map(|session| session.id())
            .collect();
        assert!(failing.iter().all(|id| !remaining.contains(id)));
    }

    #[test]
    fn sweep__should_evict_clients_that_stopped_reading() {
        // Given
        let registry = Arc::new(ConnectionRegistry::new(3));
        let mut reader = registry.subscribe(UserId(1), Some(0));
        let _stalled = registry.subscribe(UserId(2), Some(0));
        let monitor = HeartbeatMonitor::new(Arc::clone(&registry));

        // When
        let first = monitor.sweep();
        while reader.try_next_event().is_some() {}
        let second = monitor.sweep();

        // Then
        assert_eq!(first, SweepReport { probed: 2, evicted: 0 });
        assert_eq!(second, SweepReport { probed: 2, evicted: 1 });
        assert!(registry.is_connected(UserId(1)));
        assert!(!registry.is_connected(UserId(2)));
    }

    #[test]
    fn sweep__should_do_nothing_without_sessions() {
        let monitor = HeartbeatMonitor::new(Arc::new(ConnectionRegistry::new(4)));

        assert_eq!(monitor.sweep(), SweepReport::default());
    }
}
