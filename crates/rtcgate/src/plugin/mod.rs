//! Plugin interface and registry.
//!
//! The gateway itself implements no application logic: every handle a client
//! attaches is bound to a [`Plugin`], which receives the client's messages and
//! answers either synchronously or later through the [`EventSink`]. Plugins
//! are linked into the binary and listed in [`builtin`]; the
//! [`PluginRegistry`] initializes them at startup and tears them down at
//! shutdown.

mod echo;
mod registry;
mod sink;
#[cfg(test)]
pub(crate) mod testing;

pub use echo::{ECHO_PACKAGE, EchoPlugin};
pub use registry::PluginRegistry;
pub use sink::EventSink;

use std::sync::Arc;

use async_trait::async_trait;
use rtcgate_protocol::PluginDescriptor;
use serde_json::Value;
use thiserror::Error;

/// Key identifying one handle: the only thing the gateway and a plugin share
/// about the plugin's per-handle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleRef {
    pub session_id: u64,
    pub handle_id: u64,
}

impl HandleRef {
    pub fn new(session_id: u64, handle_id: u64) -> Self {
        Self {
            session_id,
            handle_id,
        }
    }
}

/// A client `message` forwarded to a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMessage {
    pub transaction: Option<String>,
    pub body: Value,
    /// Opaque session description, passed through untouched.
    pub jsep: Option<Value>,
}

/// How a plugin answered a message.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginResult {
    /// Synchronous reply, returned in the HTTP response.
    Ok(Value),
    /// Accepted; the outcome will be pushed as an event. The optional hint is
    /// relayed in the acknowledgement.
    OkWait(Option<String>),
}

#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("unknown handle {}/{}", .0.session_id, .0.handle_id)]
    UnknownHandle(HandleRef),

    #[error("plugin '{package}' failed to initialize: {reason}")]
    Init { package: String, reason: String },

    #[error("duplicate plugin package '{0}'")]
    DuplicatePackage(String),
}

/// Capability set every plugin implements.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique package name handles attach to.
    fn package(&self) -> &str;

    fn descriptor(&self) -> PluginDescriptor;

    /// Called once at startup with the sink for asynchronous events.
    async fn init(&self, _sink: EventSink) -> Result<(), PluginError> {
        Ok(())
    }

    async fn create_handle(&self, handle: HandleRef) -> Result<(), PluginError>;

    async fn handle_message(
        &self,
        handle: HandleRef,
        message: PluginMessage,
    ) -> Result<PluginResult, PluginError>;

    async fn destroy_handle(&self, handle: HandleRef) -> Result<(), PluginError>;

    /// Called once at shutdown.
    async fn destroy(&self) {}
}

/// Plugins compiled into this binary.
pub fn builtin() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(EchoPlugin::new())]
}
