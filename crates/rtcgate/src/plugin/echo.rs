//! Bundled echo plugin.
//!
//! `{"request": "ping"}` is answered synchronously with `{"echo": "pong"}`.
//! Any other body is acknowledged right away and echoed back later as an
//! event, together with the `jsep` that came with it.

use std::sync::OnceLock;

use async_trait::async_trait;
use dashmap::DashMap;
use rtcgate_protocol::PluginDescriptor;
use serde_json::json;
use tracing::{debug, warn};

use super::{EventSink, HandleRef, Plugin, PluginError, PluginMessage, PluginResult};

pub const ECHO_PACKAGE: &str = "rtcgate.plugin.echo";

#[derive(Default)]
pub struct EchoPlugin {
    sink: OnceLock<EventSink>,
    /// Messages received per attached handle.
    handles: DashMap<HandleRef, u64>,
}

impl EchoPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn package(&self) -> &str {
        ECHO_PACKAGE
    }

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: "Echo plugin".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Echoes every message back to the sender".to_string(),
        }
    }

    async fn init(&self, sink: EventSink) -> Result<(), PluginError> {
        self.sink.set(sink).map_err(|_| PluginError::Init {
            package: ECHO_PACKAGE.to_string(),
            reason: "already initialized".to_string(),
        })
    }

    async fn create_handle(&self, handle: HandleRef) -> Result<(), PluginError> {
        self.handles.insert(handle, 0);
        debug!(session_id = handle.session_id, handle_id = handle.handle_id, "Echo handle created");
        Ok(())
    }

    async fn handle_message(
        &self,
        handle: HandleRef,
        message: PluginMessage,
    ) -> Result<PluginResult, PluginError> {
        let seq = {
            let mut count = self
                .handles
                .get_mut(&handle)
                .ok_or(PluginError::UnknownHandle(handle))?;
            *count += 1;
            *count
        };

        if message.body.get("request").and_then(|r| r.as_str()) == Some("ping") {
            return Ok(PluginResult::Ok(json!({ "echo": "pong", "seq": seq })));
        }

        let sink = self
            .sink
            .get()
            .cloned()
            .ok_or_else(|| PluginError::Rejected("plugin not initialized".to_string()))?;
        tokio::spawn(async move {
            let data = json!({ "echo": "event", "seq": seq, "result": message.body });
            if let Err(e) = sink.push_event(handle, message.transaction, data, message.jsep) {
                warn!(
                    session_id = handle.session_id,
                    handle_id = handle.handle_id,
                    error = %e,
                    "Dropping echo event"
                );
            }
        });
        Ok(PluginResult::OkWait(Some("echo queued".to_string())))
    }

    async fn destroy_handle(&self, handle: HandleRef) -> Result<(), PluginError> {
        self.handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(PluginError::UnknownHandle(handle))
    }

    async fn destroy(&self) {
        self.handles.clear();
    }
}
