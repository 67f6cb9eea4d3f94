//! Native values and typed variants.

use std::fmt;

use crate::error::{BusError, Result};

use super::codec;
use super::signature::Signature;

/// A native dynamic value.
///
/// Values carry no signature of their own; they are type-checked and
/// normalized when encoded against one (see [`codec::encode`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    ObjectPath(String),
    Signature(String),
    Array(Vec<Value>),
    /// Dictionary entries in insertion order.
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    /// An already typed value, as carried by a `v` slot.
    Variant(Box<Variant>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn object_path(path: impl Into<String>) -> Self {
        Value::ObjectPath(path.into())
    }

    /// Build a dictionary from string keys.
    pub fn dict<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::ObjectPath(s) | Value::Signature(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer kind that fits in an i64.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|n| i64::try_from(n).ok())
    }

    /// Any integer kind that fits in a u64.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|n| u64::try_from(n).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&Variant> {
        match self {
            Value::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a string key in a dictionary value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Recursively unwrap variants, including those nested in containers.
    pub fn recursive_unpack(self) -> Value {
        match self {
            Value::Variant(v) => v.into_value().recursive_unpack(),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::recursive_unpack).collect())
            }
            Value::Struct(items) => {
                Value::Struct(items.into_iter().map(Value::recursive_unpack).collect())
            }
            Value::Dict(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.recursive_unpack(), v.recursive_unpack()))
                    .collect(),
            ),
            other => other,
        }
    }

    pub(crate) fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Byte(n) => Some(n.into()),
            Value::Int16(n) => Some(n.into()),
            Value::UInt16(n) => Some(n.into()),
            Value::Int32(n) => Some(n.into()),
            Value::UInt32(n) => Some(n.into()),
            Value::Int64(n) => Some(n.into()),
            Value::UInt64(n) => Some(n.into()),
            _ => None,
        }
    }

    /// Short kind name, used in encoding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Int16(_) => "int16",
            Value::UInt16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::ObjectPath(_) => "object path",
            Value::Signature(_) => "signature",
            Value::Array(_) => "array",
            Value::Dict(_) => "dictionary",
            Value::Struct(_) => "struct",
            Value::Variant(_) => "variant",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Int16(n) => write!(f, "{n}"),
            Value::UInt16(n) => write!(f, "{n}"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::UInt32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::UInt64(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::ObjectPath(s) => write!(f, "objectpath {s:?}"),
            Value::Signature(s) => write!(f, "signature {s:?}"),
            Value::Array(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Value::Struct(items) => {
                f.write_str("(")?;
                join(f, items)?;
                f.write_str(")")
            }
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Variant(v) => write!(f, "<{}>", v.value()),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    String => String,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Variant> for Value {
    fn from(v: Variant) -> Self {
        Value::Variant(Box::new(v))
    }
}

/// A value together with the signature it was encoded against.
///
/// Only produced by encoding, so the value always matches the signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    signature: Signature,
    value: Value,
}

impl Variant {
    /// Encode `value` against a single complete type signature.
    pub fn new(signature: &str, value: impl Into<Value>) -> Result<Self> {
        let signature = Signature::new(signature)?;
        codec::encode(&signature, value.into())
    }

    pub(crate) fn from_parts(signature: Signature, value: Value) -> Self {
        Self { signature, value }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// One-level unpack; nested variants stay variants.
    pub fn unpack(&self) -> Value {
        codec::decode(self)
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Elements of a tuple variant.
    pub fn into_tuple(self) -> Result<Vec<Value>> {
        match (self.signature.tuple_fields().is_some(), self.value) {
            (true, Value::Struct(items)) => Ok(items),
            _ => Err(BusError::encoding(format!(
                "expected a tuple, got signature '{}'",
                self.signature
            ))),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.value, self.signature)
    }
}
