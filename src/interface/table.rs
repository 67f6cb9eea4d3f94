use std::collections::HashMap;

use crate::error::{BusError, Result};
use crate::variant::{Signature, SignatureType};

use super::{ArgDescriptor, InterfaceDescriptor, PropertyAccess};

const MAX_NAME_LEN: usize = 255;

/// A parsed argument
#[derive(Debug, Clone)]
pub struct ArgInfo {
    pub name: Option<String>,
    pub ty: SignatureType,
}

/// A parsed method
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub in_args: Vec<ArgInfo>,
    pub out_args: Vec<ArgInfo>,
    in_types: Vec<SignatureType>,
    out_types: Vec<SignatureType>,
    in_signature: Signature,
    out_signature: Signature,
}

impl MethodInfo {
    pub fn in_types(&self) -> &[SignatureType] {
        &self.in_types
    }

    pub fn out_types(&self) -> &[SignatureType] {
        &self.out_types
    }

    /// Input tuple signature, e.g. `"(si)"`.
    pub fn in_signature(&self) -> &Signature {
        &self.in_signature
    }

    /// Output tuple signature, `"()"` when nothing is returned.
    pub fn out_signature(&self) -> &Signature {
        &self.out_signature
    }

    /// Name of the callback-completed proxy entry.
    pub fn remote_name(&self) -> String {
        format!("{}Remote", self.name)
    }

    /// Name of the blocking proxy entry.
    pub fn sync_name(&self) -> String {
        format!("{}Sync", self.name)
    }
}

/// A parsed property
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub name: String,
    pub signature: Signature,
    pub access: PropertyAccess,
}

impl PropertyInfo {
    pub fn ty(&self) -> &SignatureType {
        // Validated to hold exactly one complete type.
        &self.signature.types()[0]
    }
}

/// A parsed signal
#[derive(Debug, Clone)]
pub struct SignalInfo {
    pub name: String,
    pub args: Vec<ArgInfo>,
    types: Vec<SignatureType>,
    signature: Signature,
}

impl SignalInfo {
    pub fn types(&self) -> &[SignatureType] {
        &self.types
    }

    /// Payload tuple signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Read-only lookup table for one interface.
///
/// Entries keep declaration order; lookups go through a name index.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    name: String,
    methods: Vec<MethodInfo>,
    properties: Vec<PropertyInfo>,
    signals: Vec<SignalInfo>,
    method_index: HashMap<String, usize>,
    property_index: HashMap<String, usize>,
    signal_index: HashMap<String, usize>,
}

impl SignatureTable {
    /// Validate a descriptor and build its table.
    pub fn new(descriptor: InterfaceDescriptor) -> Result<Self> {
        validate_interface_name(&descriptor.name)?;

        let mut table = Self {
            name: descriptor.name,
            methods: Vec::with_capacity(descriptor.methods.len()),
            properties: Vec::with_capacity(descriptor.properties.len()),
            signals: Vec::with_capacity(descriptor.signals.len()),
            method_index: HashMap::new(),
            property_index: HashMap::new(),
            signal_index: HashMap::new(),
        };

        for method in descriptor.methods {
            validate_member_name(&method.name)?;
            let in_args = parse_args(&method.name, &method.in_args)?;
            let out_args = parse_args(&method.name, &method.out_args)?;
            let in_types: Vec<_> = in_args.iter().map(|a| a.ty.clone()).collect();
            let out_types: Vec<_> = out_args.iter().map(|a| a.ty.clone()).collect();

            insert_unique(&mut table.method_index, "method", &method.name, table.methods.len())?;
            table.methods.push(MethodInfo {
                in_signature: Signature::tuple_of(&in_types),
                out_signature: Signature::tuple_of(&out_types),
                name: method.name,
                in_args,
                out_args,
                in_types,
                out_types,
            });
        }

        for property in descriptor.properties {
            validate_member_name(&property.name)?;
            let signature = single_type(&property.name, &property.signature)?;

            insert_unique(
                &mut table.property_index,
                "property",
                &property.name,
                table.properties.len(),
            )?;
            table.properties.push(PropertyInfo {
                name: property.name,
                signature,
                access: property.access,
            });
        }

        for signal in descriptor.signals {
            validate_member_name(&signal.name)?;
            let args = parse_args(&signal.name, &signal.args)?;
            let types: Vec<_> = args.iter().map(|a| a.ty.clone()).collect();

            insert_unique(&mut table.signal_index, "signal", &signal.name, table.signals.len())?;
            table.signals.push(SignalInfo {
                signature: Signature::tuple_of(&types),
                name: signal.name,
                args,
                types,
            });
        }

        Ok(table)
    }

    /// Parse a JSON descriptor and build its table.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(InterfaceDescriptor::from_json(json)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup_method(&self, name: &str) -> Result<&MethodInfo> {
        self.method_index
            .get(name)
            .map(|&i| &self.methods[i])
            .ok_or_else(|| BusError::not_found("method", name))
    }

    pub fn lookup_property(&self, name: &str) -> Result<&PropertyInfo> {
        self.property_index
            .get(name)
            .map(|&i| &self.properties[i])
            .ok_or_else(|| BusError::not_found("property", name))
    }

    pub fn lookup_signal(&self, name: &str) -> Result<&SignalInfo> {
        self.signal_index
            .get(name)
            .map(|&i| &self.signals[i])
            .ok_or_else(|| BusError::not_found("signal", name))
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn signals(&self) -> &[SignalInfo] {
        &self.signals
    }
}

fn insert_unique(
    index: &mut HashMap<String, usize>,
    kind: &str,
    name: &str,
    position: usize,
) -> Result<()> {
    if index.insert(name.to_string(), position).is_some() {
        return Err(BusError::Descriptor(format!("duplicate {kind} '{name}'")));
    }
    Ok(())
}

fn single_type(owner: &str, signature: &str) -> Result<Signature> {
    let parsed = Signature::new(signature)?;
    if parsed.len() != 1 {
        return Err(BusError::Descriptor(format!(
            "'{owner}': signature '{signature}' must be a single complete type"
        )));
    }
    Ok(parsed)
}

fn parse_args(owner: &str, args: &[ArgDescriptor]) -> Result<Vec<ArgInfo>> {
    args.iter()
        .map(|arg| {
            let signature = single_type(owner, &arg.signature)?;
            Ok(ArgInfo {
                name: arg.name.clone(),
                ty: signature.types()[0].clone(),
            })
        })
        .collect()
}

fn is_name_element(element: &str) -> bool {
    let mut bytes = element.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn validate_interface_name(name: &str) -> Result<()> {
    let valid = name.len() <= MAX_NAME_LEN
        && name.split('.').count() >= 2
        && name.split('.').all(is_name_element);
    if !valid {
        return Err(BusError::Descriptor(format!("invalid interface name '{name}'")));
    }
    Ok(())
}

fn validate_member_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN || !is_name_element(name) {
        return Err(BusError::Descriptor(format!("invalid member name '{name}'")));
    }
    Ok(())
}
