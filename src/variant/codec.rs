//! Type-checking encoder and decoder between [`Value`] and [`Variant`].

use crate::error::{BusError, Result};

use super::signature::{parse_signature, Signature, SignatureType};
use super::value::{Value, Variant};

/// Encode a value against a single complete type signature.
pub fn encode(signature: &Signature, value: Value) -> Result<Variant> {
    let ty = signature.single().ok_or_else(|| {
        BusError::encoding(format!(
            "signature '{signature}' is not a single complete type"
        ))
    })?;
    let value = encode_value(ty, value)?;
    Ok(Variant::from_parts(signature.clone(), value))
}

/// Encode a list of values as one tuple, `"(..)"` over `types`.
pub fn encode_tuple(types: &[SignatureType], values: Vec<Value>) -> Result<Variant> {
    if types.len() != values.len() {
        return Err(BusError::encoding(format!(
            "tuple {} expects {} values, got {}",
            Signature::tuple_of(types),
            types.len(),
            values.len()
        )));
    }

    let items = types
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (ty, value))| {
            encode_value(ty, value).map_err(|e| match e {
                BusError::Encoding(msg) => BusError::Encoding(format!("argument {i}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Variant::from_parts(
        Signature::tuple_of(types),
        Value::Struct(items),
    ))
}

/// Unpack a variant into a native value.
///
/// Containers are unpacked all the way down, but values held in nested `v`
/// slots stay [`Value::Variant`].
pub fn decode(variant: &Variant) -> Value {
    variant.value().clone()
}

fn mismatch(ty: &SignatureType, value: &Value) -> BusError {
    BusError::encoding(format!(
        "expected {} ('{}'), got {}",
        ty.describe(),
        ty,
        value.kind()
    ))
}

fn encode_value(ty: &SignatureType, value: Value) -> Result<Value> {
    match ty {
        SignatureType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::Byte => integer(ty, &value, |n| u8::try_from(n).ok().map(Value::Byte)),
        SignatureType::Int16 => integer(ty, &value, |n| i16::try_from(n).ok().map(Value::Int16)),
        SignatureType::UInt16 => {
            integer(ty, &value, |n| u16::try_from(n).ok().map(Value::UInt16))
        }
        SignatureType::Int32 => integer(ty, &value, |n| i32::try_from(n).ok().map(Value::Int32)),
        SignatureType::UInt32 => {
            integer(ty, &value, |n| u32::try_from(n).ok().map(Value::UInt32))
        }
        SignatureType::Int64 => integer(ty, &value, |n| i64::try_from(n).ok().map(Value::Int64)),
        SignatureType::UInt64 => {
            integer(ty, &value, |n| u64::try_from(n).ok().map(Value::UInt64))
        }
        SignatureType::Double => match value {
            Value::Double(d) => Ok(Value::Double(d)),
            other => match other.as_integer() {
                Some(n) => Ok(Value::Double(n as f64)),
                None => Err(mismatch(ty, &other)),
            },
        },
        SignatureType::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::ObjectPath => match value {
            Value::String(s) | Value::ObjectPath(s) => {
                validate_object_path(&s)?;
                Ok(Value::ObjectPath(s))
            }
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::Signature => match value {
            Value::String(s) | Value::Signature(s) => {
                parse_signature(&s).map_err(|e| BusError::encoding(e.to_string()))?;
                Ok(Value::Signature(s))
            }
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::UnixFd => Err(BusError::encoding("unix fds are not supported")),
        SignatureType::Variant => match value {
            Value::Variant(v) => Ok(Value::Variant(v)),
            other => Err(BusError::encoding(format!(
                "expected an encoded variant for 'v', got {}",
                other.kind()
            ))),
        },
        SignatureType::Array(elem) => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| encode_value(elem, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::Dict(key_ty, value_ty) => match value {
            Value::Dict(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((encode_value(key_ty, k)?, encode_value(value_ty, v)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Dict),
            other => Err(mismatch(ty, &other)),
        },
        SignatureType::Struct(fields) => match value {
            Value::Struct(items) | Value::Array(items) => {
                if items.len() != fields.len() {
                    return Err(BusError::encoding(format!(
                        "struct '{}' expects {} fields, got {}",
                        ty,
                        fields.len(),
                        items.len()
                    )));
                }
                fields
                    .iter()
                    .zip(items)
                    .map(|(field, item)| encode_value(field, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Struct)
            }
            other => Err(mismatch(ty, &other)),
        },
    }
}

fn integer(
    ty: &SignatureType,
    value: &Value,
    narrow: impl FnOnce(i128) -> Option<Value>,
) -> Result<Value> {
    let n = value.as_integer().ok_or_else(|| mismatch(ty, value))?;
    narrow(n).ok_or_else(|| {
        BusError::encoding(format!("{} out of range for {}", n, ty.describe()))
    })
}

/// Check D-Bus object path syntax: `/` or `/elem(/elem)*` with
/// `[A-Za-z0-9_]` elements.
pub fn validate_object_path(path: &str) -> Result<()> {
    let invalid = || BusError::encoding(format!("invalid object path '{path}'"));

    if path == "/" {
        return Ok(());
    }
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    for element in rest.split('/') {
        if element.is_empty()
            || !element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(invalid());
        }
    }
    Ok(())
}
