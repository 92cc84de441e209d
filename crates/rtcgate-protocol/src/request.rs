//! Incoming request envelope.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error_codes;

/// Errors raised while decoding a request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The request body was empty.
    #[error("missing request body")]
    MissingRequest,

    /// The body is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The body is valid JSON but not an object.
    #[error("request is not a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("missing mandatory element ({0})")]
    MissingElement(&'static str),

    /// A field has the wrong JSON type.
    #[error("invalid element type ({0})")]
    InvalidElementType(&'static str),

    /// The `janus` verb is not one the gateway understands.
    #[error("unknown request '{0}'")]
    UnknownRequest(String),
}

impl ProtocolError {
    /// Stable numeric code for this error.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::MissingRequest => error_codes::MISSING_REQUEST,
            ProtocolError::InvalidJson(_) => error_codes::INVALID_JSON,
            ProtocolError::NotAnObject => error_codes::INVALID_JSON_OBJECT,
            ProtocolError::MissingElement(_) => error_codes::MISSING_MANDATORY_ELEMENT,
            ProtocolError::InvalidElementType(_) => error_codes::INVALID_ELEMENT_TYPE,
            ProtocolError::UnknownRequest(_) => error_codes::UNKNOWN_REQUEST,
        }
    }
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create,
    Attach {
        plugin: String,
    },
    Message {
        handle_id: u64,
        body: Value,
        jsep: Option<Value>,
    },
    Detach {
        handle_id: u64,
    },
    Destroy,
    Keepalive,
}

impl Command {
    /// The `janus` verb this command was decoded from.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::Attach { .. } => "attach",
            Command::Message { .. } => "message",
            Command::Detach { .. } => "detach",
            Command::Destroy => "destroy",
            Command::Keepalive => "keepalive",
        }
    }

    /// Whether the command addresses an existing session (`POST /{id}`)
    /// rather than the gateway root (`POST /`).
    pub fn targets_session(&self) -> bool {
        !matches!(self, Command::Create)
    }
}

/// A request body that parsed as a JSON object.
///
/// The transaction id is extracted up front so that errors raised while
/// decoding the command can still be correlated by the client.
#[derive(Debug, Clone)]
pub struct Request {
    transaction: Option<String>,
    fields: Map<String, Value>,
}

impl Request {
    /// Parse a raw request body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::MissingRequest);
        }
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let transaction = match fields.get("transaction") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) => Some(t.clone()),
            Some(_) => return Err(ProtocolError::InvalidElementType("transaction")),
        };
        Ok(Self {
            transaction,
            fields,
        })
    }

    /// The client-supplied transaction id, if any.
    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }

    /// Decode the `janus` verb and its arguments.
    pub fn command(&self) -> Result<Command, ProtocolError> {
        let verb = self.required_str("janus")?;
        match verb {
            "create" => Ok(Command::Create),
            "attach" => Ok(Command::Attach {
                plugin: self.required_str("plugin")?.to_string(),
            }),
            "message" => {
                let handle_id = self.required_u64("handle_id")?;
                let body = match self.fields.get("body") {
                    None => return Err(ProtocolError::MissingElement("body")),
                    Some(b @ Value::Object(_)) => b.clone(),
                    Some(_) => return Err(ProtocolError::InvalidElementType("body")),
                };
                let jsep = match self.fields.get("jsep") {
                    None | Some(Value::Null) => None,
                    Some(j @ Value::Object(_)) => Some(j.clone()),
                    Some(_) => return Err(ProtocolError::InvalidElementType("jsep")),
                };
                Ok(Command::Message {
                    handle_id,
                    body,
                    jsep,
                })
            }
            "detach" => Ok(Command::Detach {
                handle_id: self.required_u64("handle_id")?,
            }),
            "destroy" => Ok(Command::Destroy),
            "keepalive" => Ok(Command::Keepalive),
            other => Err(ProtocolError::UnknownRequest(other.to_string())),
        }
    }

    fn required_str(&self, key: &'static str) -> Result<&str, ProtocolError> {
        match self.fields.get(key) {
            None => Err(ProtocolError::MissingElement(key)),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ProtocolError::InvalidElementType(key)),
        }
    }

    fn required_u64(&self, key: &'static str) -> Result<u64, ProtocolError> {
        match self.fields.get(key) {
            None => Err(ProtocolError::MissingElement(key)),
            Some(v) => v.as_u64().ok_or(ProtocolError::InvalidElementType(key)),
        }
    }
}
