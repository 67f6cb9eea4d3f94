use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::interface::{InterfaceDescriptor, SignatureTable};
use crate::variant::Signature;

/// Print the signature table of a JSON descriptor.
pub fn handle_inspect(path: &Path, json: bool, out: &mut impl Write) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor {}", path.display()))?;
    let descriptor = InterfaceDescriptor::from_json(&text)
        .with_context(|| format!("Failed to parse descriptor {}", path.display()))?;

    if json {
        // Validate before echoing.
        SignatureTable::new(descriptor.clone())?;
        writeln!(out, "{}", descriptor.to_json()?)?;
        return Ok(());
    }

    let table = SignatureTable::new(descriptor)?;
    writeln!(out, "interface {}", table.name())?;

    if !table.methods().is_empty() {
        writeln!(out, "\nmethods:")?;
    }
    for method in table.methods() {
        writeln!(
            out,
            "  {}{} -> {}    [{}, {}]",
            method.name,
            method.in_signature(),
            method.out_signature(),
            method.remote_name(),
            method.sync_name()
        )?;
    }

    if !table.properties().is_empty() {
        writeln!(out, "\nproperties:")?;
    }
    for property in table.properties() {
        writeln!(
            out,
            "  {}: {} ({})",
            property.name, property.signature, property.access
        )?;
    }

    if !table.signals().is_empty() {
        writeln!(out, "\nsignals:")?;
    }
    for signal in table.signals() {
        writeln!(out, "  {}{}", signal.name, signal.signature())?;
    }
    Ok(())
}

/// Print each complete type of a signature.
pub fn handle_signature(signature: &str, out: &mut impl Write) -> Result<()> {
    let parsed = Signature::new(signature)?;
    for ty in parsed.types() {
        writeln!(out, "{ty}\t{}", ty.describe())?;
    }
    Ok(())
}
