//! Error types for busbind.
//!
//! Two families live here:
//!
//! - [`BusError`]: everything a caller of this crate can observe locally
//!   (arity and type problems, encoding failures, transport failures) plus
//!   [`BusError::Remote`], which carries an error reply sent by the peer.
//! - [`DbusError`]: a protocol error reply (`name` + `message`) as it travels
//!   on the bus. Service-side handler faults are turned into these and never
//!   surface as `BusError`s inside the dispatcher.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Well-known error names from the `org.freedesktop.DBus.Error` namespace.
pub mod names {
    pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
    pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
    pub const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";
    pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
    pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
    pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
    pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
    pub const UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
    pub const PROPERTY_READ_ONLY: &str = "org.freedesktop.DBus.Error.PropertyReadOnly";
    pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
}

/// D-Bus error reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbusError {
    /// Error name (e.g., "org.freedesktop.DBus.Error.ServiceUnknown")
    pub name: String,

    /// Error message
    pub message: String,
}

impl DbusError {
    /// Create a new D-Bus error
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(names::FAILED, message)
    }

    /// The peer never completed the call
    pub fn no_reply(method: &str) -> Self {
        Self::new(
            names::NO_REPLY,
            format!("Method {method} was dropped without a reply"),
        )
    }

    /// Create a service unknown error
    pub fn service_unknown(service: &str) -> Self {
        Self::new(
            names::SERVICE_UNKNOWN,
            format!("The name {service} is not owned by anyone on this bus"),
        )
    }

    /// No object is exported at the path
    pub fn unknown_object(path: &str) -> Self {
        Self::new(names::UNKNOWN_OBJECT, format!("No such object path '{path}'"))
    }

    /// The object exists but does not implement the interface
    pub fn unknown_interface(path: &str, interface: &str) -> Self {
        Self::new(
            names::UNKNOWN_INTERFACE,
            format!("No such interface '{interface}' on object at path {path}"),
        )
    }

    /// Create a method not found error
    pub fn unknown_method(interface: &str, method: &str) -> Self {
        Self::new(
            names::UNKNOWN_METHOD,
            format!("No such method '{method}' in interface '{interface}'"),
        )
    }

    pub fn unknown_property(interface: &str, property: &str) -> Self {
        Self::new(
            names::UNKNOWN_PROPERTY,
            format!("No such property '{property}' in interface '{interface}'"),
        )
    }

    pub fn property_read_only(property: &str) -> Self {
        Self::new(
            names::PROPERTY_READ_ONLY,
            format!("Property '{property}' is not writable"),
        )
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(names::INVALID_ARGS, message)
    }
}

impl std::fmt::Display for DbusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for DbusError {}

/// Main error type for proxy, service and transport operations
#[derive(Debug, Error)]
pub enum BusError {
    // ─────────────────────────────────────────────────────────────────────
    // Local call errors (raised before any transport activity)
    // ─────────────────────────────────────────────────────────────────────
    #[error("{0}")]
    Arity(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid signature {signature:?}: {reason}")]
    Signature { signature: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Interface errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("invalid interface descriptor: {0}")]
    Descriptor(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("property {name} is not {access}")]
    PropertyAccess { name: String, access: &'static str },

    // ─────────────────────────────────────────────────────────────────────
    // Remote and transport errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("{0}")]
    Remote(#[from] DbusError),

    #[error("call cancelled")]
    Cancelled,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("object is not exported")]
    NotExported,

    #[error("an object implementing {interface} is already exported at {path}")]
    AlreadyExported { path: String, interface: String },

    #[error("transport error: {0}")]
    Transport(String),

    // ─────────────────────────────────────────────────────────────────────
    // Infrastructure errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    pub(crate) fn encoding(message: impl Into<String>) -> Self {
        BusError::Encoding(message.into())
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        BusError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Error name of a remote error reply, if this is one.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            BusError::Remote(err) => Some(&err.name),
            _ => None,
        }
    }

    /// Convert into the error reply a peer would see.
    pub fn to_dbus_error(&self) -> DbusError {
        match self {
            BusError::Remote(err) => err.clone(),
            BusError::Arity(msg) | BusError::TypeMismatch(msg) | BusError::Encoding(msg) => {
                DbusError::invalid_args(msg.clone())
            }
            BusError::Timeout(_) => DbusError::new(names::TIMEOUT, self.to_string()),
            other => DbusError::failed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Descriptor(err.to_string())
    }
}

impl From<config::ConfigError> for BusError {
    fn from(err: config::ConfigError) -> Self {
        BusError::Config(err.to_string())
    }
}

/// Result type alias for busbind operations
pub type Result<T> = std::result::Result<T, BusError>;
