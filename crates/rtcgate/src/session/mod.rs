//! Client sessions.
//!
//! A [`Session`] owns the handles a client attached to plugins and the outbox
//! of events waiting for the long poll. Sessions live in the
//! [`SessionRegistry`] and are shared as `Arc<Session>`: destroying a session
//! only flips its `destroying` flag and wakes the reader, the memory goes away
//! once the registry and every in-flight request have dropped their reference.

mod queue;
mod registry;

pub use queue::{Event, EventQueue, KEEPALIVE_PAYLOAD, PollGuard, PollOutcome};
pub use registry::{SessionRegistry, spawn_janitor};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtcgate_protocol::error_codes;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::plugin::{HandleRef, Plugin, PluginRegistry};

/// Largest id handed out for sessions and handles (ids fit in 63 bits).
const MAX_ID: u64 = i64::MAX as u64;

/// Draw a random non-zero 63-bit id.
pub(crate) fn random_id() -> u64 {
    loop {
        let id = rand::random::<u64>() & MAX_ID;
        if id != 0 {
            return id;
        }
    }
}

/// Binding between a session and one plugin instance.
#[derive(Clone)]
pub struct Handle {
    pub id: u64,
    pub plugin: Arc<dyn Plugin>,
}

impl Handle {
    pub fn package(&self) -> &str {
        self.plugin.package()
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("plugin", &self.package())
            .finish()
    }
}

#[derive(Default)]
struct HandleTable {
    handles: HashMap<u64, Handle>,
    /// Ids reserved by attaches still waiting on the plugin.
    reserved: HashSet<u64>,
}

pub struct Session {
    id: u64,
    handles: Mutex<HandleTable>,
    events: EventQueue,
    destroying: AtomicBool,
    last_activity: Mutex<Instant>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("destroying", &self.is_destroying())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            handles: Mutex::new(HandleTable::default()),
            events: EventQueue::new(),
            destroying: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn push_event(&self, event: Event) {
        self.events.push(event);
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::Acquire)
    }

    /// Refresh the idle timer.
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    pub fn handle_count(&self) -> usize {
        self.table().handles.len()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HandleTable> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a handle by id.
    pub fn handle(&self, handle_id: u64) -> Result<Handle, GatewayError> {
        self.table()
            .handles
            .get(&handle_id)
            .cloned()
            .ok_or(GatewayError::HandleNotFound {
                session_id: self.id,
                handle_id,
            })
    }

    /// Attach a new handle to the plugin registered under `package`.
    pub async fn attach(&self, plugins: &PluginRegistry, package: &str) -> Result<u64, GatewayError> {
        let plugin = plugins
            .find(package)
            .ok_or_else(|| GatewayError::PluginNotFound(package.to_string()))?;

        let handle_id = {
            let mut table = self.table();
            if self.is_destroying() {
                return Err(GatewayError::SessionNotFound(self.id));
            }
            let id = loop {
                let candidate = random_id();
                if !table.handles.contains_key(&candidate) && !table.reserved.contains(&candidate) {
                    break candidate;
                }
            };
            table.reserved.insert(id);
            id
        };

        let handle_ref = HandleRef::new(self.id, handle_id);
        if let Err(e) = plugin.create_handle(handle_ref).await {
            self.table().reserved.remove(&handle_id);
            warn!(session_id = self.id, plugin = package, error = %e, "Plugin refused attach");
            return Err(GatewayError::PluginRejected {
                code: error_codes::PLUGIN_ATTACH,
                reason: e.to_string(),
            });
        }

        let raced_with_destroy = {
            let mut table = self.table();
            table.reserved.remove(&handle_id);
            if self.is_destroying() {
                true
            } else {
                table.handles.insert(
                    handle_id,
                    Handle {
                        id: handle_id,
                        plugin: plugin.clone(),
                    },
                );
                false
            }
        };
        if raced_with_destroy {
            release_handle(
                self.id,
                Handle {
                    id: handle_id,
                    plugin,
                },
            );
            return Err(GatewayError::SessionNotFound(self.id));
        }

        info!(session_id = self.id, handle_id, plugin = package, "Handle attached");
        Ok(handle_id)
    }

    /// Remove a handle and tell its plugin to release the bridge state.
    pub fn detach(&self, handle_id: u64) -> Result<(), GatewayError> {
        let handle = self
            .table()
            .handles
            .remove(&handle_id)
            .ok_or(GatewayError::HandleNotFound {
                session_id: self.id,
                handle_id,
            })?;
        info!(session_id = self.id, handle_id, plugin = handle.package(), "Handle detached");
        release_handle(self.id, handle);
        Ok(())
    }

    /// Start lazy destruction: reject new work, detach every handle and wake
    /// the long-poll reader. Returns `false` if destruction had already begun.
    pub fn mark_destroying(&self) -> bool {
        let handles: Vec<Handle> = {
            let mut table = self.table();
            if self.destroying.swap(true, Ordering::AcqRel) {
                return false;
            }
            table.handles.drain().map(|(_, handle)| handle).collect()
        };
        debug!(session_id = self.id, handles = handles.len(), "Session marked for destruction");
        for handle in handles {
            release_handle(self.id, handle);
        }
        self.events.close();
        true
    }
}

/// Notify the plugin off the caller's path that a handle is gone.
///
/// The detach or destroy has already succeeded by the time this runs, so a
/// plugin failure is only logged.
fn release_handle(session_id: u64, handle: Handle) {
    let handle_ref = HandleRef::new(session_id, handle.id);
    tokio::spawn(async move {
        if let Err(e) = handle.plugin.destroy_handle(handle_ref).await {
            warn!(
                session_id,
                handle_id = handle.id,
                plugin = handle.package(),
                error = %e,
                "Plugin failed to release handle"
            );
        }
    });
}
