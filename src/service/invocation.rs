use std::fmt;

use thiserror::Error;

use crate::bus::ReplyHandle;
use crate::error::{BusError, DbusError};
use crate::interface::MethodInfo;
use crate::variant::{encode_tuple, Value, Variant};

/// Message of the error reply sent when a handler's return value does not
/// fit the declared outputs.
pub const FORMAT_FAULT_MESSAGE: &str =
    "The return value from the method handler was not in the correct format";

/// Error raised by a method handler or property store.
///
/// Names without a `.` are prefixed with the service's error namespace
/// before they go on the bus; dotted names are sent unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct HandlerError {
    pub name: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn into_dbus_error(self, namespace: &str) -> DbusError {
        let name = if self.name.contains('.') {
            self.name
        } else {
            format!("{namespace}.{}", self.name)
        };
        DbusError::new(name, self.message)
    }
}

impl From<DbusError> for HandlerError {
    fn from(err: DbusError) -> Self {
        Self::new(err.name, err.message)
    }
}

impl From<BusError> for HandlerError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Remote(remote) => remote.into(),
            other => other.to_dbus_error().into(),
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DbusError>() {
            Ok(dbus) => dbus.into(),
            Err(err) => Self::new("Error", format!("{err:#}")),
        }
    }
}

/// What a method handler hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    /// Nothing; becomes the empty tuple.
    Void,
    /// A single value. Wrapped when exactly one output is declared;
    /// otherwise an `Array` or `Struct` supplies the tuple items.
    Value(Value),
    /// The tuple items.
    Values(Vec<Value>),
    /// A ready-made reply tuple, sent as-is.
    Encoded(Variant),
}

impl From<()> for Returned {
    fn from(_: ()) -> Self {
        Returned::Void
    }
}

impl From<Value> for Returned {
    fn from(v: Value) -> Self {
        Returned::Value(v)
    }
}

impl From<Option<Value>> for Returned {
    fn from(v: Option<Value>) -> Self {
        v.map_or(Returned::Void, Returned::Value)
    }
}

impl From<Vec<Value>> for Returned {
    fn from(v: Vec<Value>) -> Self {
        Returned::Values(v)
    }
}

impl From<Variant> for Returned {
    fn from(v: Variant) -> Self {
        Returned::Encoded(v)
    }
}

macro_rules! impl_returned_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Returned {
                fn from(v: $ty) -> Self {
                    Returned::Value(v.into())
                }
            }
        )*
    };
}

impl_returned_value!(bool, u8, i16, u16, i32, u32, i64, u64, f64, String, &str);

/// Shape a handler's return into the reply tuple of `method`.
pub(crate) fn shape_reply(
    method: &MethodInfo,
    returned: Returned,
) -> std::result::Result<Variant, String> {
    let outputs = method.out_types();
    let encoded = match returned {
        Returned::Void if outputs.is_empty() => encode_tuple(outputs, Vec::new()),
        Returned::Void => {
            return Err(format!(
                "no value returned, expected '{}'",
                method.out_signature()
            ))
        }
        Returned::Value(value) if outputs.len() == 1 => encode_tuple(outputs, vec![value]),
        Returned::Value(Value::Array(items)) | Returned::Value(Value::Struct(items)) => {
            encode_tuple(outputs, items)
        }
        Returned::Value(other) => {
            return Err(format!(
                "a single {} cannot fill '{}'",
                other.kind(),
                method.out_signature()
            ))
        }
        Returned::Values(items) => encode_tuple(outputs, items),
        Returned::Encoded(variant) if variant.signature() == method.out_signature() => Ok(variant),
        Returned::Encoded(variant) => {
            return Err(format!(
                "encoded reply has signature '{}', expected '{}'",
                variant.signature(),
                method.out_signature()
            ))
        }
    };
    encoded.map_err(|e| e.to_string())
}

pub(crate) fn format_fault(namespace: &str, method: &str, detail: &str) -> DbusError {
    tracing::error!(method = %method, detail = %detail, "handler returned a malformed value");
    DbusError::new(format!("{namespace}.ValueError"), FORMAT_FAULT_MESSAGE)
}

/// An incoming call handed to an async handler.
///
/// Complete it exactly once. Dropping it uncompleted replies
/// `org.freedesktop.DBus.Error.NoReply`.
pub struct MethodInvocation {
    sender: String,
    object_path: String,
    method: MethodInfo,
    namespace: String,
    reply: ReplyHandle,
}

impl MethodInvocation {
    pub(crate) fn new(
        sender: String,
        object_path: String,
        method: MethodInfo,
        namespace: String,
        reply: ReplyHandle,
    ) -> Self {
        Self {
            sender,
            object_path,
            method,
            namespace,
            reply,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn method_name(&self) -> &str {
        &self.method.name
    }

    /// Reply with a value, shaped like a synchronous handler's return.
    pub fn return_value(self, value: impl Into<Returned>) {
        match shape_reply(&self.method, value.into()) {
            Ok(body) => self.reply.return_value(body),
            Err(detail) => {
                let err = format_fault(&self.namespace, &self.method.name, &detail);
                self.reply.return_error(err);
            }
        }
    }

    pub fn return_values(self, values: Vec<Value>) {
        self.return_value(Returned::Values(values));
    }

    pub fn return_error(self, error: HandlerError) {
        let err = error.into_dbus_error(&self.namespace);
        self.reply.return_error(err);
    }

    /// Reply with an error name sent unchanged.
    pub fn return_dbus_error(self, name: impl Into<String>, message: impl Into<String>) {
        self.reply.return_error(DbusError::new(name, message));
    }
}

impl fmt::Debug for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("sender", &self.sender)
            .field("object_path", &self.object_path)
            .field("method", &self.method.name)
            .finish()
    }
}
