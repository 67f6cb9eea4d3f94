//! Typed value model.
//!
//! Values are held as an in-memory tree checked against D-Bus signatures;
//! there is no byte-level wire format here.

mod codec;
mod signature;
mod value;

pub use codec::{decode, encode, encode_tuple, validate_object_path};
pub use signature::{
    count_complete_types, parse_signature, Signature, SignatureType, MAX_NESTING_DEPTH,
    MAX_SIGNATURE_LEN,
};
pub use value::{Value, Variant};
