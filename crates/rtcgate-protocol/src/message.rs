//! Outgoing messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_codes;

/// Any message the gateway sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "janus", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Synchronous success reply.
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        plugindata: Option<PluginData>,
    },
    /// Request accepted, the result will arrive later as an event.
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
        error: ErrorBody,
    },
    /// Asynchronous plugin event delivered over the long poll.
    Event {
        session_id: u64,
        sender: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction: Option<String>,
        plugindata: PluginData,
        #[serde(skip_serializing_if = "Option::is_none")]
        jsep: Option<Value>,
    },
    /// Long poll timed out with nothing to deliver.
    Keepalive,
    ServerInfo(ServerInfo),
}

impl GatewayMessage {
    /// Reply to `create`.
    pub fn session_created(transaction: Option<String>, session_id: u64) -> Self {
        GatewayMessage::Success {
            transaction,
            session_id: Some(session_id),
            sender: None,
            data: Some(serde_json::json!({ "id": session_id })),
            plugindata: None,
        }
    }

    /// Reply to `attach`.
    pub fn handle_attached(transaction: Option<String>, session_id: u64, handle_id: u64) -> Self {
        GatewayMessage::Success {
            transaction,
            session_id: Some(session_id),
            sender: None,
            data: Some(serde_json::json!({ "id": handle_id })),
            plugindata: None,
        }
    }

    /// Bare success for commands without a payload.
    pub fn success(transaction: Option<String>, session_id: u64) -> Self {
        GatewayMessage::Success {
            transaction,
            session_id: Some(session_id),
            sender: None,
            data: None,
            plugindata: None,
        }
    }

    /// Synchronous plugin reply to `message`.
    pub fn plugin_success(
        transaction: Option<String>,
        session_id: u64,
        sender: u64,
        plugindata: PluginData,
    ) -> Self {
        GatewayMessage::Success {
            transaction,
            session_id: Some(session_id),
            sender: Some(sender),
            data: None,
            plugindata: Some(plugindata),
        }
    }

    pub fn ack(transaction: Option<String>, session_id: u64, hint: Option<String>) -> Self {
        GatewayMessage::Ack {
            transaction,
            session_id: Some(session_id),
            hint,
        }
    }

    /// Error reply. An empty `reason` falls back to the code's default text.
    pub fn error(
        transaction: Option<String>,
        session_id: Option<u64>,
        code: i32,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let reason = if reason.is_empty() {
            error_codes::reason(code).to_string()
        } else {
            reason
        };
        GatewayMessage::Error {
            transaction,
            session_id,
            error: ErrorBody { code, reason },
        }
    }

    /// The `janus` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayMessage::Success { .. } => "success",
            GatewayMessage::Ack { .. } => "ack",
            GatewayMessage::Error { .. } => "error",
            GatewayMessage::Event { .. } => "event",
            GatewayMessage::Keepalive => "keepalive",
            GatewayMessage::ServerInfo(_) => "server_info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub reason: String,
}

/// Plugin-originated payload, tagged with the plugin's package name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginData {
    pub plugin: String,
    pub data: Value,
}

/// Out-of-band configuration report returned by the info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    pub certificates: Certificates,
    /// Idle session timeout in seconds (0 when reaping is disabled).
    pub session_timeout: u64,
    pub plugins: BTreeMap<String, PluginDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_pem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_key: Option<String>,
}

/// Metadata a plugin reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
}
