//! Session registry and idle-session janitor.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Session, random_id};
use crate::error::GatewayError;

/// Concurrent map from session id to session.
///
/// The map has its own sharded locking, separate from each session's
/// internal locks, so lookups never wait on a session's handle table or
/// outbox.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<u64, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session under a fresh random id.
    pub fn create(&self) -> Arc<Session> {
        loop {
            let id = random_id();
            // The entry API holds the shard lock, so two concurrent creates
            // cannot both claim the same id.
            if let Entry::Vacant(slot) = self.sessions.entry(id) {
                let session = Arc::new(Session::new(id));
                slot.insert(session.clone());
                info!(session_id = id, "Session created");
                return session;
            }
            debug!(session_id = id, "Session id collision, retrying");
        }
    }

    /// Find a live session. Sessions being destroyed are reported as absent.
    pub fn find(&self, id: u64) -> Option<Arc<Session>> {
        self.find_any(id).filter(|s| !s.is_destroying())
    }

    /// Find a session even if it is being destroyed.
    pub fn find_any(&self, id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Lazily destroy a session.
    ///
    /// The session is flagged, its handles are detached and a blocked long
    /// poll is woken. It leaves the registry right away when nobody is
    /// polling it, otherwise once the reader lets go (see [`Self::release`]).
    pub fn destroy(&self, id: u64) -> Result<(), GatewayError> {
        let session = self.find(id).ok_or(GatewayError::SessionNotFound(id))?;
        if !session.mark_destroying() {
            return Err(GatewayError::SessionNotFound(id));
        }
        info!(session_id = id, "Session destroyed");
        self.release(id);
        Ok(())
    }

    /// Remove a destroyed session once no long poll is registered on it.
    /// Returns whether the session left the registry.
    pub fn release(&self, id: u64) -> bool {
        let removed = self
            .sessions
            .remove_if(&id, |_, s| s.is_destroying() && !s.events().is_polled())
            .is_some();
        if removed {
            debug!(session_id = id, "Session released");
        }
        removed
    }

    /// One janitor pass: expire idle sessions and release destroyed ones.
    /// Returns the number of sessions that left the registry.
    pub fn reap(&self, idle_timeout: Option<Duration>) -> usize {
        // Snapshot first so no shard lock is held while sessions are mutated.
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut released = 0;
        for session in sessions {
            if let Some(timeout) = idle_timeout
                && !session.is_destroying()
                && !session.events().is_polled()
                && session.idle_for() >= timeout
                && session.mark_destroying()
            {
                info!(session_id = session.id(), "Session timed out");
            }
            if session.is_destroying() && self.release(session.id()) {
                released += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Spawn the periodic janitor. Returns its handle for shutdown.
pub fn spawn_janitor(
    registry: SessionRegistry,
    interval: Duration,
    idle_timeout: Option<Duration>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let released = registry.reap(idle_timeout);
                    if released > 0 {
                        debug!(released, remaining = registry.len(), "Janitor pass");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    })
}
