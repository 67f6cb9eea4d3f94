//! D-Bus type signatures.
//!
//! A signature is a string of single complete types, e.g. `"sia{sv}"` holds
//! three complete types: `s`, `i` and `a{sv}`. Parsing produces a
//! [`SignatureType`] tree per complete type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};

/// Maximum signature length in bytes.
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Maximum array nesting, and separately, maximum struct nesting.
pub const MAX_NESTING_DEPTH: usize = 32;

/// A single complete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureType {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    ObjectPath,
    Signature,
    UnixFd,
    Variant,
    Array(Box<SignatureType>),
    /// Dictionary, `a{kv}`. The key is always a basic type.
    Dict(Box<SignatureType>, Box<SignatureType>),
    Struct(Vec<SignatureType>),
}

impl SignatureType {
    /// Basic types are the only ones allowed as dictionary keys.
    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            SignatureType::Variant
                | SignatureType::Array(_)
                | SignatureType::Dict(_, _)
                | SignatureType::Struct(_)
        )
    }

    /// Human readable name, used in encoding errors.
    pub fn describe(&self) -> &'static str {
        match self {
            SignatureType::Byte => "byte",
            SignatureType::Boolean => "boolean",
            SignatureType::Int16 => "int16",
            SignatureType::UInt16 => "uint16",
            SignatureType::Int32 => "int32",
            SignatureType::UInt32 => "uint32",
            SignatureType::Int64 => "int64",
            SignatureType::UInt64 => "uint64",
            SignatureType::Double => "double",
            SignatureType::String => "string",
            SignatureType::ObjectPath => "object path",
            SignatureType::Signature => "signature",
            SignatureType::UnixFd => "unix fd",
            SignatureType::Variant => "variant",
            SignatureType::Array(_) => "array",
            SignatureType::Dict(_, _) => "dictionary",
            SignatureType::Struct(_) => "struct",
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            SignatureType::Byte => out.push('y'),
            SignatureType::Boolean => out.push('b'),
            SignatureType::Int16 => out.push('n'),
            SignatureType::UInt16 => out.push('q'),
            SignatureType::Int32 => out.push('i'),
            SignatureType::UInt32 => out.push('u'),
            SignatureType::Int64 => out.push('x'),
            SignatureType::UInt64 => out.push('t'),
            SignatureType::Double => out.push('d'),
            SignatureType::String => out.push('s'),
            SignatureType::ObjectPath => out.push('o'),
            SignatureType::Signature => out.push('g'),
            SignatureType::UnixFd => out.push('h'),
            SignatureType::Variant => out.push('v'),
            SignatureType::Array(elem) => {
                out.push('a');
                elem.write_to(out);
            }
            SignatureType::Dict(key, value) => {
                out.push_str("a{");
                key.write_to(out);
                value.write_to(out);
                out.push('}');
            }
            SignatureType::Struct(fields) => {
                out.push('(');
                for field in fields {
                    field.write_to(out);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

/// A validated signature string together with its parsed complete types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature {
    text: String,
    types: Vec<SignatureType>,
}

impl Signature {
    /// Parse and validate a signature string.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let types = parse_signature(&text)?;
        Ok(Self { text, types })
    }

    /// Tuple signature `"(..)"` over the given element types.
    ///
    /// Unlike a struct in a regular signature, a tuple may be empty: `"()"` is
    /// the body of a call or reply without arguments.
    pub fn tuple_of(types: &[SignatureType]) -> Self {
        let mut text = String::from("(");
        for ty in types {
            ty.write_to(&mut text);
        }
        text.push(')');
        Self {
            text,
            types: vec![SignatureType::Struct(types.to_vec())],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn types(&self) -> &[SignatureType] {
        &self.types
    }

    /// The complete type, when the signature holds exactly one.
    pub fn single(&self) -> Option<&SignatureType> {
        match self.types.as_slice() {
            [ty] => Some(ty),
            _ => None,
        }
    }

    /// Element types when this is a tuple signature.
    pub fn tuple_fields(&self) -> Option<&[SignatureType]> {
        match self.single() {
            Some(SignatureType::Struct(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Number of complete types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Signature {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Signature {
    type Error = BusError;

    fn try_from(text: String) -> Result<Self> {
        Self::new(text)
    }
}

impl TryFrom<&str> for Signature {
    type Error = BusError;

    fn try_from(text: &str) -> Result<Self> {
        Self::new(text)
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.text
    }
}

/// Parse a signature into its complete types.
pub fn parse_signature(signature: &str) -> Result<Vec<SignatureType>> {
    if signature.len() > MAX_SIGNATURE_LEN {
        return Err(BusError::Signature {
            signature: signature.to_string(),
            reason: format!("longer than {MAX_SIGNATURE_LEN} bytes"),
        });
    }

    let mut parser = Parser::new(signature);
    let mut types = Vec::new();
    while !parser.at_end() {
        types.push(parser.complete_type()?);
    }
    Ok(types)
}

/// Count the complete types in a signature.
pub fn count_complete_types(signature: &str) -> Result<usize> {
    parse_signature(signature).map(|types| types.len())
}

struct Parser<'a> {
    signature: &'a str,
    bytes: &'a [u8],
    pos: usize,
    array_depth: usize,
    struct_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(signature: &'a str) -> Self {
        Self {
            signature,
            bytes: signature.as_bytes(),
            pos: 0,
            array_depth: 0,
            struct_depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, reason: impl Into<String>) -> BusError {
        BusError::Signature {
            signature: self.signature.to_string(),
            reason: reason.into(),
        }
    }

    fn complete_type(&mut self) -> Result<SignatureType> {
        let code = self
            .next()
            .ok_or_else(|| self.error("unexpected end of signature"))?;

        let ty = match code {
            b'y' => SignatureType::Byte,
            b'b' => SignatureType::Boolean,
            b'n' => SignatureType::Int16,
            b'q' => SignatureType::UInt16,
            b'i' => SignatureType::Int32,
            b'u' => SignatureType::UInt32,
            b'x' => SignatureType::Int64,
            b't' => SignatureType::UInt64,
            b'd' => SignatureType::Double,
            b's' => SignatureType::String,
            b'o' => SignatureType::ObjectPath,
            b'g' => SignatureType::Signature,
            b'h' => SignatureType::UnixFd,
            b'v' => SignatureType::Variant,
            b'a' => self.array()?,
            b'(' => self.structure()?,
            b'{' => return Err(self.error("dict entry outside of an array")),
            other => {
                return Err(self.error(format!(
                    "unexpected '{}' at offset {}",
                    other as char,
                    self.pos - 1
                )))
            }
        };
        Ok(ty)
    }

    fn array(&mut self) -> Result<SignatureType> {
        self.array_depth += 1;
        if self.array_depth > MAX_NESTING_DEPTH {
            return Err(self.error("arrays nested too deeply"));
        }

        let ty = if self.peek() == Some(b'{') {
            self.pos += 1;
            let key = self.complete_type()?;
            if !key.is_basic() {
                return Err(self.error(format!("dict key must be a basic type, not {}", key)));
            }
            let value = self.complete_type()?;
            if self.next() != Some(b'}') {
                return Err(self.error("dict entry must hold exactly two types"));
            }
            SignatureType::Dict(Box::new(key), Box::new(value))
        } else {
            SignatureType::Array(Box::new(self.complete_type()?))
        };

        self.array_depth -= 1;
        Ok(ty)
    }

    fn structure(&mut self) -> Result<SignatureType> {
        self.struct_depth += 1;
        if self.struct_depth > MAX_NESTING_DEPTH {
            return Err(self.error("structs nested too deeply"));
        }

        let mut fields = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => fields.push(self.complete_type()?),
                None => return Err(self.error("unterminated struct")),
            }
        }
        if fields.is_empty() {
            return Err(self.error("empty struct"));
        }

        self.struct_depth -= 1;
        Ok(SignatureType::Struct(fields))
    }
}
