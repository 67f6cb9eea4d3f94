//! Server-side dispatch.
//!
//! A [`Service`] binds application handlers to the methods of a
//! [`SignatureTable`] and answers calls arriving through a transport:
//!
//! ```ignore
//! let service = Service::builder(table)
//!     .handle("frobateStuff", |_args| Ok(Value::dict([("hello", Variant::new("s", "world")?)])))?
//!     .handle_async("echo", |args, invocation| invocation.return_values(args))?
//!     .with_properties(Arc::new(PropertyMap::new().with("PropReadOnly", true)))
//!     .build();
//! service.export(bus.clone(), "/org/busbind/Test")?;
//! ```
//!
//! Calls on `org.freedesktop.DBus.Properties` for the service's interface
//! are answered from its [`PropertyStore`].

mod invocation;
mod properties;

pub use invocation::{HandlerError, MethodInvocation, Returned, FORMAT_FAULT_MESSAGE};
pub use properties::{PropertyMap, PropertyStore};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{
    BusTransport, ExportId, IncomingCall, ObjectDispatch, ReplyHandle, SignalMessage,
    PROPERTIES_INTERFACE,
};
use crate::config::ServiceConfig;
use crate::error::{BusError, DbusError, Result};
use crate::interface::{MethodInfo, SignatureTable};
use crate::variant::{encode, encode_tuple, parse_signature, SignatureType, Value, Variant};

use invocation::{format_fault, shape_reply};

type SyncHandler = Arc<dyn Fn(Vec<Value>) -> std::result::Result<Returned, HandlerError> + Send + Sync>;
type AsyncHandler = Arc<dyn Fn(Vec<Value>, MethodInvocation) + Send + Sync>;

/// Registers handlers, then builds a [`Service`].
pub struct ServiceBuilder {
    table: Arc<SignatureTable>,
    sync_handlers: HashMap<String, SyncHandler>,
    async_handlers: HashMap<String, AsyncHandler>,
    properties: Arc<dyn PropertyStore>,
    config: ServiceConfig,
}

impl ServiceBuilder {
    /// Handler returning its result directly.
    ///
    /// Preferred over an async handler registered for the same method.
    pub fn handle<F, R>(mut self, method: &str, handler: F) -> Result<Self>
    where
        F: Fn(Vec<Value>) -> std::result::Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Returned>,
    {
        self.table.lookup_method(method)?;
        self.sync_handlers.insert(
            method.to_string(),
            Arc::new(move |args| handler(args).map(Into::into)),
        );
        Ok(self)
    }

    /// Handler completing a [`MethodInvocation`], possibly later and from
    /// another thread.
    pub fn handle_async<F>(mut self, method: &str, handler: F) -> Result<Self>
    where
        F: Fn(Vec<Value>, MethodInvocation) + Send + Sync + 'static,
    {
        self.table.lookup_method(method)?;
        self.async_handlers
            .insert(method.to_string(), Arc::new(handler));
        Ok(self)
    }

    pub fn with_properties(mut self, store: Arc<dyn PropertyStore>) -> Self {
        self.properties = store;
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Service {
        Service {
            inner: Arc::new(Dispatcher {
                table: self.table,
                sync_handlers: self.sync_handlers,
                async_handlers: self.async_handlers,
                properties: self.properties,
                namespace: self.config.error_namespace,
            }),
            export: Mutex::new(None),
        }
    }
}

struct Export {
    transport: Arc<dyn BusTransport>,
    path: String,
    id: ExportId,
}

/// A dispatchable implementation of one interface.
///
/// Dropping the service unexports it.
pub struct Service {
    inner: Arc<Dispatcher>,
    export: Mutex<Option<Export>>,
}

impl Service {
    pub fn builder(table: Arc<SignatureTable>) -> ServiceBuilder {
        ServiceBuilder {
            table,
            sync_handlers: HashMap::new(),
            async_handlers: HashMap::new(),
            properties: Arc::new(PropertyMap::new()),
            config: ServiceConfig::default(),
        }
    }

    pub fn table(&self) -> &Arc<SignatureTable> {
        &self.inner.table
    }

    pub fn interface_name(&self) -> &str {
        self.inner.table.name()
    }

    pub fn properties(&self) -> &Arc<dyn PropertyStore> {
        &self.inner.properties
    }

    /// Current value of a property, encoded with its declared signature.
    pub fn get_property(&self, name: &str) -> Result<Option<Variant>> {
        self.inner.get_property(name)
    }

    pub fn object_path(&self) -> Option<String> {
        self.export.lock().as_ref().map(|e| e.path.clone())
    }

    pub fn is_exported(&self) -> bool {
        self.export.lock().is_some()
    }

    /// Export at `path`. A service has at most one active export.
    pub fn export(&self, transport: Arc<dyn BusTransport>, path: &str) -> Result<()> {
        let mut export = self.export.lock();
        if let Some(current) = export.as_ref() {
            return Err(BusError::AlreadyExported {
                path: current.path.clone(),
                interface: self.interface_name().to_string(),
            });
        }

        let id = transport.export_object(path, self.inner.clone())?;
        tracing::info!(interface = %self.interface_name(), path = %path, "service exported");
        *export = Some(Export {
            transport,
            path: path.to_string(),
            id,
        });
        Ok(())
    }

    /// Returns false if the service was not exported.
    pub fn unexport(&self) -> bool {
        match self.export.lock().take() {
            Some(export) => {
                tracing::info!(interface = %self.interface_name(), path = %export.path, "service unexported");
                export.transport.unexport(export.id)
            }
            None => false,
        }
    }

    /// Emit a declared signal from the exported object.
    pub fn emit_signal(&self, name: &str, args: Vec<Value>) -> Result<()> {
        let signal = self.inner.table.lookup_signal(name)?;
        let body = if signal.types().is_empty() && args.is_empty() {
            None
        } else {
            Some(encode_tuple(signal.types(), args)?)
        };
        self.send_signal(self.interface_name(), name, body)
    }

    /// Announce a property change. `None` lists the property as invalidated.
    pub fn emit_property_changed(&self, name: &str, value: Option<Value>) -> Result<()> {
        let property = self.inner.table.lookup_property(name)?;
        let (changed, invalidated) = match value {
            Some(value) => {
                let variant = encode(&property.signature, value)?;
                (vec![(Value::string(name), variant.into())], vec![])
            }
            None => (vec![], vec![Value::string(name)]),
        };

        let types = parse_signature("sa{sv}as")?;
        let body = encode_tuple(
            &types,
            vec![
                Value::string(self.interface_name()),
                Value::Dict(changed),
                Value::Array(invalidated),
            ],
        )?;
        self.send_signal(PROPERTIES_INTERFACE, "PropertiesChanged", Some(body))
    }

    fn send_signal(&self, interface: &str, member: &str, body: Option<Variant>) -> Result<()> {
        let (transport, path) = match self.export.lock().as_ref() {
            Some(export) => (export.transport.clone(), export.path.clone()),
            None => return Err(BusError::NotExported),
        };
        let signal = SignalMessage {
            sender: transport.unique_name().to_string(),
            path,
            interface: interface.to_string(),
            member: member.to_string(),
            body,
        };
        transport.emit_signal(signal)
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.unexport();
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("interface", &self.interface_name())
            .field("path", &self.object_path())
            .finish()
    }
}

/// The exported half of a service.
struct Dispatcher {
    table: Arc<SignatureTable>,
    sync_handlers: HashMap<String, SyncHandler>,
    async_handlers: HashMap<String, AsyncHandler>,
    properties: Arc<dyn PropertyStore>,
    namespace: String,
}

impl ObjectDispatch for Dispatcher {
    fn interface_name(&self) -> &str {
        self.table.name()
    }

    fn dispatch(&self, call: IncomingCall, reply: ReplyHandle) {
        if call.interface == PROPERTIES_INTERFACE {
            match self.dispatch_properties(&call) {
                Ok(body) => reply.return_value(body),
                Err(err) => reply.return_error(err),
            }
            return;
        }

        let method = match self.table.lookup_method(&call.member) {
            Ok(method) => method,
            Err(_) => {
                reply.return_error(DbusError::unknown_method(self.table.name(), &call.member));
                return;
            }
        };
        if call.body.signature() != method.in_signature() {
            reply.return_error(DbusError::invalid_args(format!(
                "Method {} expects '{}', got '{}'",
                method.name,
                method.in_signature(),
                call.body.signature()
            )));
            return;
        }
        let args = match call.body.into_tuple() {
            Ok(args) => args,
            Err(e) => {
                reply.return_error(DbusError::invalid_args(e.to_string()));
                return;
            }
        };

        tracing::debug!(method = %method.name, sender = %call.sender, "dispatching call");
        if let Some(handler) = self.sync_handlers.get(&method.name) {
            reply.send(self.run_sync(method, handler, args));
        } else if let Some(handler) = self.async_handlers.get(&method.name) {
            let invocation = MethodInvocation::new(
                call.sender,
                call.path,
                method.clone(),
                self.namespace.clone(),
                reply,
            );
            if catch_unwind(AssertUnwindSafe(|| handler(args, invocation))).is_err() {
                tracing::error!(method = %method.name, "async handler panicked");
            }
        } else {
            tracing::warn!(method = %method.name, "Missing handler for method");
            reply.return_error(DbusError::new(
                format!("{}.NotImplemented", self.namespace),
                format!("Method {} is not implemented", method.name),
            ));
        }
    }
}

impl Dispatcher {
    fn run_sync(
        &self,
        method: &MethodInfo,
        handler: &SyncHandler,
        args: Vec<Value>,
    ) -> std::result::Result<Variant, DbusError> {
        match catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(Ok(returned)) => shape_reply(method, returned)
                .map_err(|detail| format_fault(&self.namespace, &method.name, &detail)),
            Ok(Err(err)) => {
                tracing::debug!(method = %method.name, error = %err, "handler failed");
                Err(err.into_dbus_error(&self.namespace))
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else {
                    "handler panicked".to_string()
                };
                tracing::error!(method = %method.name, panic = %panic_msg, "handler panicked");
                Err(DbusError::new(format!("{}.Panic", self.namespace), panic_msg))
            }
        }
    }

    fn get_property(&self, name: &str) -> Result<Option<Variant>> {
        let property = self.table.lookup_property(name)?;
        self.properties
            .get(name)
            .map(|value| encode(&property.signature, value))
            .transpose()
    }

    fn dispatch_properties(&self, call: &IncomingCall) -> std::result::Result<Variant, DbusError> {
        let iface = self.table.name();
        let args = call
            .body
            .clone()
            .into_tuple()
            .map_err(|e| DbusError::invalid_args(e.to_string()))?;

        let (interface, property, value) = match (call.member.as_str(), args.as_slice()) {
            ("Get", [Value::String(i), Value::String(p)]) => (i, Some(p), None),
            ("Set", [Value::String(i), Value::String(p), Value::Variant(v)]) => {
                (i, Some(p), Some(v.as_ref().clone()))
            }
            ("GetAll", [Value::String(i)]) => (i, None, None),
            ("Get" | "Set" | "GetAll", _) => {
                return Err(DbusError::invalid_args(format!(
                    "Invalid arguments for {PROPERTIES_INTERFACE}.{}: '{}'",
                    call.member,
                    call.body.signature()
                )))
            }
            (other, _) => return Err(DbusError::unknown_method(PROPERTIES_INTERFACE, other)),
        };
        if interface != iface {
            return Err(DbusError::invalid_args(format!("No such interface '{interface}'")));
        }

        let Some(name) = property else {
            return self.get_all();
        };
        let info = self
            .table
            .lookup_property(name)
            .map_err(|_| DbusError::unknown_property(iface, name))?;

        match value {
            None => {
                if !info.access.is_readable() {
                    return Err(DbusError::invalid_args(format!(
                        "Property '{name}' is not readable"
                    )));
                }
                let variant = self.property_value(name)?.ok_or_else(|| {
                    DbusError::unknown_property(iface, name)
                })?;
                tuple(&[SignatureType::Variant], vec![variant.into()])
            }
            Some(variant) => {
                if !info.access.is_writable() {
                    return Err(DbusError::property_read_only(name));
                }
                if variant.signature() != &info.signature {
                    return Err(DbusError::invalid_args(format!(
                        "Property '{name}' has type '{}', got '{}'",
                        info.signature,
                        variant.signature()
                    )));
                }
                tracing::debug!(property = %name, "setting property");
                self.properties
                    .set(name, variant.unpack())
                    .map_err(|e| e.into_dbus_error(&self.namespace))?;
                tuple(&[], vec![])
            }
        }
    }

    fn property_value(&self, name: &str) -> std::result::Result<Option<Variant>, DbusError> {
        self.get_property(name).map_err(|e| {
            format_fault(&self.namespace, name, &e.to_string())
        })
    }

    fn get_all(&self) -> std::result::Result<Variant, DbusError> {
        let mut entries = Vec::new();
        for property in self.table.properties() {
            if !property.access.is_readable() {
                continue;
            }
            if let Some(variant) = self.property_value(&property.name)? {
                entries.push((Value::string(&property.name), variant.into()));
            }
        }
        let dict = SignatureType::Dict(
            Box::new(SignatureType::String),
            Box::new(SignatureType::Variant),
        );
        tuple(&[dict], vec![Value::Dict(entries)])
    }
}

fn tuple(types: &[SignatureType], values: Vec<Value>) -> std::result::Result<Variant, DbusError> {
    encode_tuple(types, values).map_err(|e| DbusError::failed(e.to_string()))
}
