//! Application-owned property values.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::variant::Value;

use super::HandlerError;

/// Live property values behind a service.
///
/// `get` returning `None` means the property currently has no value.
pub trait PropertyStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, value: Value) -> Result<(), HandlerError>;
}

/// Map-backed store that accepts every write.
#[derive(Debug, Default)]
pub struct PropertyMap {
    values: RwLock<HashMap<String, Value>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.write().insert(name.into(), value.into());
        self
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.write().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().remove(name)
    }
}

impl PropertyStore for PropertyMap {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) -> Result<(), HandlerError> {
        self.values.write().insert(name.to_string(), value);
        Ok(())
    }
}
