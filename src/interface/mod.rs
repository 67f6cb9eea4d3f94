//! Interface descriptions.
//!
//! An [`InterfaceDescriptor`] is the declarative, serializable description of
//! one interface (methods, properties, signals with their signatures). It is
//! parsed and validated once into a [`SignatureTable`], which proxies and
//! services share read-only.
//!
//! ```ignore
//! let descriptor = InterfaceDescriptor::new("org.example.Player")
//!     .method("Seek", "x", "")
//!     .property("Volume", "d", PropertyAccess::ReadWrite)
//!     .signal("Seeked", "x");
//! let table = SignatureTable::new(descriptor)?;
//! ```

mod table;

pub use table::{ArgInfo, MethodInfo, PropertyInfo, SignalInfo, SignatureTable};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::variant::parse_signature;

/// One argument: optional name plus a single complete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub signature: String,
}

impl ArgDescriptor {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            name: None,
            signature: signature.into(),
        }
    }

    pub fn named(name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            signature: signature.into(),
        }
    }
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,

    #[serde(default)]
    pub in_args: Vec<ArgDescriptor>,

    #[serde(default)]
    pub out_args: Vec<ArgDescriptor>,
}

/// Property access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyAccess {
    Read,
    Write,
    #[serde(alias = "read-write")]
    ReadWrite,
}

impl PropertyAccess {
    pub fn is_readable(self) -> bool {
        matches!(self, PropertyAccess::Read | PropertyAccess::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, PropertyAccess::Write | PropertyAccess::ReadWrite)
    }
}

impl std::fmt::Display for PropertyAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyAccess::Read => write!(f, "read"),
            PropertyAccess::Write => write!(f, "write"),
            PropertyAccess::ReadWrite => write!(f, "readwrite"),
        }
    }
}

/// Property declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub signature: String,
    pub access: PropertyAccess,
}

/// Signal declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub name: String,

    #[serde(default)]
    pub args: Vec<ArgDescriptor>,
}

/// Declarative description of one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface name (e.g., "org.busbind.Test")
    pub name: String,

    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,

    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,

    #[serde(default)]
    pub signals: Vec<SignalDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            properties: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Parse the JSON form of a descriptor.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a method whose in and out arguments are the complete types of the
    /// given signatures, unnamed.
    pub fn method(mut self, name: impl Into<String>, in_sig: &str, out_sig: &str) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.into(),
            in_args: split_args(in_sig),
            out_args: split_args(out_sig),
        });
        self
    }

    pub fn method_with_args(
        mut self,
        name: impl Into<String>,
        in_args: Vec<ArgDescriptor>,
        out_args: Vec<ArgDescriptor>,
    ) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.into(),
            in_args,
            out_args,
        });
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        signature: impl Into<String>,
        access: PropertyAccess,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            signature: signature.into(),
            access,
        });
        self
    }

    pub fn signal(mut self, name: impl Into<String>, sig: &str) -> Self {
        self.signals.push(SignalDescriptor {
            name: name.into(),
            args: split_args(sig),
        });
        self
    }
}

// A malformed signature is kept whole so that table construction reports it.
fn split_args(signature: &str) -> Vec<ArgDescriptor> {
    match parse_signature(signature) {
        Ok(types) => types
            .iter()
            .map(|ty| ArgDescriptor::new(ty.to_string()))
            .collect(),
        Err(_) => vec![ArgDescriptor::new(signature)],
    }
}
