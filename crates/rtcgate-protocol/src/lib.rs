//! Wire types for the rtcgate long-poll signaling protocol.
//!
//! Clients talk to the gateway with JSON objects carrying a `janus` verb and an
//! optional `transaction` id. Requests are parsed with [`Request`]; everything
//! the gateway sends back (synchronous replies as well as events delivered over
//! the long poll) is a [`GatewayMessage`].
//!
//! # Requests
//!
//! ```json
//! {"janus": "create", "transaction": "t1"}
//! {"janus": "attach", "transaction": "t2", "plugin": "rtcgate.plugin.echo"}
//! {"janus": "message", "transaction": "t3", "handle_id": 42, "body": {...}, "jsep": {...}}
//! {"janus": "detach", "transaction": "t4", "handle_id": 42}
//! {"janus": "destroy", "transaction": "t5"}
//! {"janus": "keepalive", "transaction": "t6"}
//! ```
//!
//! # Responses
//!
//! Every message carries a `janus` tag (`success`, `ack`, `error`, `event`,
//! `keepalive` or `server_info`). Errors use the stable codes in
//! [`error_codes`].

mod message;
mod request;

pub use message::{
    Certificates, ErrorBody, GatewayMessage, PluginData, PluginDescriptor, ServerInfo,
};
pub use request::{Command, ProtocolError, Request};

/// Stable numeric error codes reported in `error.code`.
pub mod error_codes {
    pub const UNKNOWN: i32 = 490;
    pub const MISSING_REQUEST: i32 = 452;
    pub const UNKNOWN_REQUEST: i32 = 453;
    pub const INVALID_JSON: i32 = 454;
    pub const INVALID_JSON_OBJECT: i32 = 455;
    pub const MISSING_MANDATORY_ELEMENT: i32 = 456;
    pub const INVALID_REQUEST_PATH: i32 = 457;
    pub const SESSION_NOT_FOUND: i32 = 458;
    pub const HANDLE_NOT_FOUND: i32 = 459;
    pub const PLUGIN_NOT_FOUND: i32 = 460;
    pub const PLUGIN_ATTACH: i32 = 461;
    pub const PLUGIN_MESSAGE: i32 = 462;
    /// Not sent by this gateway: plugins release handles in the background
    /// after `detach` has been acknowledged, and failures are only logged.
    pub const PLUGIN_DETACH: i32 = 463;
    pub const INVALID_ELEMENT_TYPE: i32 = 467;
    pub const SESSION_CONFLICT: i32 = 468;

    /// Default human-readable reason for a code.
    pub fn reason(code: i32) -> &'static str {
        match code {
            MISSING_REQUEST => "Missing request",
            UNKNOWN_REQUEST => "Unknown request",
            INVALID_JSON => "Invalid JSON",
            INVALID_JSON_OBJECT => "Invalid JSON Object",
            MISSING_MANDATORY_ELEMENT => "Missing mandatory element",
            INVALID_REQUEST_PATH => "Invalid path for this request",
            SESSION_NOT_FOUND => "Session not found",
            HANDLE_NOT_FOUND => "Handle not found",
            PLUGIN_NOT_FOUND => "Plugin not found",
            PLUGIN_ATTACH => "Error attaching plugin",
            PLUGIN_MESSAGE => "Error sending message to plugin",
            PLUGIN_DETACH => "Error detaching from plugin",
            INVALID_ELEMENT_TYPE => "Invalid element type",
            SESSION_CONFLICT => "Session conflict",
            _ => "Unknown error",
        }
    }
}
