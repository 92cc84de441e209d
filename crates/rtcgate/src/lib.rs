//! rtcgate - signaling core of a WebRTC gateway.
//!
//! Browsers speak a JSON request/response protocol over plain HTTP: POSTs
//! create sessions, attach handles to plugins and forward messages, while a
//! long-polling GET collects the events plugins push asynchronously. This
//! crate holds the session and handle bookkeeping, the per-session event
//! queues, the plugin registry and the axum transport tying them together.

pub mod config;
pub mod error;
pub mod handlers;
pub mod info;
pub mod plugin;
pub mod response;
pub mod server;
pub mod session;

pub use error::{ErrorKind, GatewayError};
