//! Client-side proxies.
//!
//! A [`Proxy`] is built from a [`SignatureTable`] through [`ProxyBuilder`].
//! Every declared method is reachable through [`Proxy::method`], which offers
//! the three call styles:
//!
//! - `sync`: blocks for the reply
//! - `remote`: returns immediately, completes a [`ReplyHandler`]
//! - `call`: async, resolves to the reply
//!
//! ```ignore
//! let proxy = ProxyBuilder::new(bus.clone(), table)
//!     .bus_name("org.busbind.Test")
//!     .object_path("/org/busbind/Test")
//!     .build_sync()?;
//!
//! let out = proxy.method("echo")?.sync(args!["hello", 42i32])?;
//! proxy.method("echo")?.remote(args!["hello", 42i32, ReplyHandler::new(|r| {
//!     println!("{r:?}");
//! })])?;
//! ```

mod marshal;
mod options;
mod resolver;
mod signals;

pub use marshal::PendingCall;
pub use options::{CallArg, CallOptions, ReplyHandler};
pub use resolver::{resolve, ResolvedCall, MAX_TRAILING};
pub use signals::{SignalHandler, SignalHandlerId};

use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusTransport, MatchRule, SignalMessage, WatchId, PROPERTIES_INTERFACE};
use crate::config::ProxyConfig;
use crate::error::{BusError, Result};
use crate::interface::{MethodInfo, SignatureTable};
use crate::variant::{encode, encode_tuple, SignatureType, Value, Variant};

use marshal::{spawn_detached, CallMarshaler};
use signals::SignalRegistry;

/// Proxy construction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProxyFlags(u32);

impl ProxyFlags {
    pub const NONE: ProxyFlags = ProxyFlags(0);
    /// Skip the initial `GetAll`; the cache starts empty.
    pub const DO_NOT_LOAD_PROPERTIES: ProxyFlags = ProxyFlags(1 << 0);
    /// Do not subscribe to signals or property change notifications.
    pub const DO_NOT_CONNECT_SIGNALS: ProxyFlags = ProxyFlags(1 << 1);

    pub fn contains(self, other: ProxyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProxyFlags {
    type Output = ProxyFlags;

    fn bitor(self, rhs: ProxyFlags) -> ProxyFlags {
        ProxyFlags(self.0 | rhs.0)
    }
}

/// State reachable from signal subscriptions.
struct ProxyShared {
    interface: String,
    cache: RwLock<HashMap<String, Variant>>,
    signals: SignalRegistry,
}

impl ProxyShared {
    fn on_signal(&self, signal: &SignalMessage) {
        let args = match signal.body.clone().map(Variant::into_tuple).transpose() {
            Ok(args) => args.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(signal = %signal.member, error = %e, "dropping malformed signal");
                return;
            }
        };
        self.signals.emit(&signal.member, &signal.sender, &args);
    }

    fn on_properties_changed(&self, signal: &SignalMessage) {
        let Some(body) = signal.body.clone() else {
            return;
        };
        let mut items = match body.into_tuple() {
            Ok(items) if items.len() == 3 => items.into_iter(),
            _ => {
                tracing::warn!("dropping malformed PropertiesChanged");
                return;
            }
        };
        let (Some(Value::String(interface)), Some(changed), Some(invalidated)) =
            (items.next(), items.next(), items.next())
        else {
            return;
        };
        if interface != self.interface {
            return;
        }

        let mut cache = self.cache.write();
        if let Value::Dict(entries) = changed {
            for (name, value) in entries {
                if let (Value::String(name), Value::Variant(value)) = (name, value) {
                    cache.insert(name, *value);
                }
            }
        }
        if let Value::Array(names) = invalidated {
            for name in names {
                if let Some(name) = name.as_str() {
                    cache.remove(name);
                }
            }
        }
    }
}

/// Client-side handle to one interface of a remote object.
pub struct Proxy {
    table: Arc<SignatureTable>,
    flags: ProxyFlags,
    marshaler: CallMarshaler,
    shared: Arc<ProxyShared>,
    watches: Vec<WatchId>,
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", &self.table.name())
            .field("path", &self.marshaler.path())
            .field("destination", &self.marshaler.destination())
            .field("flags", &self.flags)
            .finish()
    }
}

impl Proxy {
    pub fn interface_name(&self) -> &str {
        self.table.name()
    }

    pub fn object_path(&self) -> &str {
        self.marshaler.path()
    }

    pub fn bus_name(&self) -> Option<&str> {
        self.marshaler.destination()
    }

    pub fn flags(&self) -> ProxyFlags {
        self.flags
    }

    pub fn table(&self) -> &Arc<SignatureTable> {
        &self.table
    }

    /// Bound entry for a declared method.
    pub fn method(&self, name: &str) -> Result<ProxyMethod<'_>> {
        Ok(ProxyMethod {
            proxy: self,
            info: self.table.lookup_method(name)?,
        })
    }

    pub fn call_sync(&self, name: &str, args: Vec<Value>, options: CallOptions) -> Result<Vec<Value>> {
        self.method(name)?.sync_with(args, options)
    }

    pub async fn call(&self, name: &str, args: Vec<Value>, options: CallOptions) -> Result<Vec<Value>> {
        self.method(name)?.call(args, options).await
    }

    /// Non-blocking call; without a handler failures are only logged.
    pub fn call_remote(
        &self,
        name: &str,
        args: Vec<Value>,
        options: CallOptions,
        reply: Option<ReplyHandler>,
    ) -> Result<PendingCall> {
        let method = self.method(name)?;
        let reply = reply.unwrap_or_else(|| ReplyHandler::log_only(name));
        self.marshaler.invoke_remote(method.info, args, options, Some(reply))
    }

    /// Read a property from the cache.
    pub fn get_property(&self, name: &str) -> Result<Option<Value>> {
        let info = self.table.lookup_property(name)?;
        if !info.access.is_readable() {
            return Err(BusError::PropertyAccess {
                name: name.to_string(),
                access: "readable",
            });
        }
        Ok(self.shared.cache.read().get(name).map(Variant::unpack))
    }

    /// Update the cache and send `Properties.Set` without waiting.
    ///
    /// Remote failures are logged; the cache keeps the new value until the
    /// next change notification.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let info = self.table.lookup_property(name)?;
        if !info.access.is_writable() {
            return Err(BusError::PropertyAccess {
                name: name.to_string(),
                access: "writable",
            });
        }

        let variant = encode(&info.signature, value.into())?;
        let body = encode_tuple(
            &[SignatureType::String, SignatureType::String, SignatureType::Variant],
            vec![
                Value::string(self.table.name()),
                Value::string(name),
                variant.clone().into(),
            ],
        )?;
        self.shared.cache.write().insert(name.to_string(), variant);

        let call = self.marshaler.raw_call(PROPERTIES_INTERFACE, "Set", body);
        let transport = self.marshaler.transport().clone();
        let property = name.to_string();
        spawn_detached(self.marshaler.runtime(), async move {
            if let Err(e) = transport.send(call, None).await {
                tracing::warn!(property = %property, error = %e, "failed to set remote property");
            }
        });
        Ok(())
    }

    /// Raw cached variant.
    pub fn cached_property(&self, name: &str) -> Option<Variant> {
        self.shared.cache.read().get(name).cloned()
    }

    pub fn cached_property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.cache.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Observe a declared signal.
    pub fn connect_signal<F>(&self, name: &str, handler: F) -> Result<SignalHandlerId>
    where
        F: Fn(&str, &[Value]) + Send + Sync + 'static,
    {
        self.table.lookup_signal(name)?;
        Ok(self.shared.signals.connect(name, Arc::new(handler)))
    }

    pub fn disconnect_signal(&self, id: SignalHandlerId) -> bool {
        self.shared.signals.disconnect(id)
    }

    fn subscribe(&mut self) {
        let transport = self.marshaler.transport().clone();
        let path = self.marshaler.path().to_string();

        let mut base = MatchRule::new().path(path);
        if let Some(sender) = self.marshaler.destination() {
            base = base.sender(sender);
        }

        let weak: Weak<ProxyShared> = Arc::downgrade(&self.shared);
        self.watches.push(transport.watch_signals(
            base.clone().interface(self.table.name()),
            Arc::new(move |signal: &SignalMessage| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_signal(signal);
                }
            }),
        ));

        let weak: Weak<ProxyShared> = Arc::downgrade(&self.shared);
        self.watches.push(transport.watch_signals(
            base.interface(PROPERTIES_INTERFACE).member("PropertiesChanged"),
            Arc::new(move |signal: &SignalMessage| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_properties_changed(signal);
                }
            }),
        ));
    }

    fn get_all_call(&self) -> Result<crate::bus::MethodCall> {
        let body = encode_tuple(&[SignatureType::String], vec![Value::string(self.table.name())])?;
        Ok(self.marshaler.raw_call(PROPERTIES_INTERFACE, "GetAll", body))
    }

    /// Fill the cache from a `GetAll` reply, or log why it could not be.
    fn load_properties(&self, reply: Result<Variant>) -> Result<()> {
        let reply = match reply {
            Ok(reply) => reply,
            Err(BusError::Cancelled) => return Err(BusError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    interface = %self.table.name(),
                    path = %self.object_path(),
                    error = %e,
                    "could not load properties"
                );
                return Ok(());
            }
        };

        let mut cache = self.shared.cache.write();
        if let Some(Value::Dict(entries)) = reply.into_tuple()?.into_iter().next() {
            for (name, value) in entries {
                if let (Value::String(name), Value::Variant(value)) = (name, value) {
                    cache.insert(name, *value);
                }
            }
        }
        Ok(())
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        let transport = self.marshaler.transport();
        for id in self.watches.drain(..) {
            transport.unwatch_signals(id);
        }
    }
}

/// A declared method bound to its proxy.
#[derive(Clone, Copy)]
pub struct ProxyMethod<'a> {
    proxy: &'a Proxy,
    info: &'a MethodInfo,
}

impl<'a> ProxyMethod<'a> {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &MethodInfo {
        self.info
    }

    /// Non-blocking call from raw arguments.
    ///
    /// Trailing [`CallArg::Reply`], [`CallArg::Flags`] and
    /// [`CallArg::Cancellable`] controls are honored.
    pub fn remote(&self, args: Vec<CallArg>) -> Result<PendingCall> {
        let resolved = resolve(&self.info.name, self.info.in_types().len(), args, false)?;
        self.proxy
            .marshaler
            .invoke_remote(self.info, resolved.args, resolved.options, resolved.reply)
    }

    /// Blocking call from raw arguments. A trailing continuation is ignored.
    pub fn sync(&self, args: Vec<CallArg>) -> Result<Vec<Value>> {
        let resolved = resolve(&self.info.name, self.info.in_types().len(), args, true)?;
        self.sync_with(resolved.args, resolved.options)
    }

    pub fn sync_with(&self, args: Vec<Value>, options: CallOptions) -> Result<Vec<Value>> {
        self.proxy.marshaler.invoke_sync(self.info, args, options)
    }

    pub async fn call(&self, args: Vec<Value>, options: CallOptions) -> Result<Vec<Value>> {
        self.proxy.marshaler.invoke_async(self.info, args, options)?.await
    }
}

/// Builds and initializes a [`Proxy`].
pub struct ProxyBuilder {
    transport: Arc<dyn BusTransport>,
    table: Arc<SignatureTable>,
    bus_name: Option<String>,
    object_path: Option<String>,
    flags: ProxyFlags,
    default_timeout: Option<Duration>,
    cancellable: Option<CancellationToken>,
    runtime: Option<tokio::runtime::Handle>,
}

impl ProxyBuilder {
    pub fn new(transport: Arc<dyn BusTransport>, table: Arc<SignatureTable>) -> Self {
        Self {
            transport,
            table,
            bus_name: None,
            object_path: None,
            flags: ProxyFlags::NONE,
            default_timeout: None,
            cancellable: None,
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    pub fn bus_name(mut self, name: impl Into<String>) -> Self {
        self.bus_name = Some(name.into());
        self
    }

    pub fn object_path(mut self, path: impl Into<String>) -> Self {
        self.object_path = Some(path.into());
        self
    }

    pub fn flags(mut self, flags: ProxyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Default call timeout. Per-call [`CallOptions::timeout`] wins.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn cancellable(mut self, token: CancellationToken) -> Self {
        self.cancellable = Some(token);
        self
    }

    /// Apply timeout and flag defaults from configuration.
    pub fn config(mut self, config: &ProxyConfig) -> Self {
        self.default_timeout = config.default_timeout();
        if !config.load_properties {
            self.flags = self.flags | ProxyFlags::DO_NOT_LOAD_PROPERTIES;
        }
        if !config.connect_signals {
            self.flags = self.flags | ProxyFlags::DO_NOT_CONNECT_SIGNALS;
        }
        self
    }

    fn into_proxy(self) -> Result<(Proxy, Option<CancellationToken>)> {
        let path = self
            .object_path
            .ok_or_else(|| BusError::Config("proxy needs an object path".to_string()))?;
        crate::variant::validate_object_path(&path)
            .map_err(|e| BusError::Config(e.to_string()))?;

        let interface = self.table.name().to_string();
        let proxy = Proxy {
            marshaler: CallMarshaler::new(
                self.transport,
                self.bus_name,
                path,
                interface.clone(),
                self.default_timeout,
                self.runtime,
            ),
            shared: Arc::new(ProxyShared {
                interface,
                cache: RwLock::new(HashMap::new()),
                signals: SignalRegistry::default(),
            }),
            table: self.table,
            flags: self.flags,
            watches: Vec::new(),
        };
        Ok((proxy, self.cancellable))
    }

    fn finish(mut proxy: Proxy) -> Proxy {
        if !proxy.flags.contains(ProxyFlags::DO_NOT_CONNECT_SIGNALS) {
            proxy.subscribe();
        }
        tracing::debug!(
            interface = %proxy.interface_name(),
            path = %proxy.object_path(),
            "proxy initialized"
        );
        proxy
    }

    /// Initialize, blocking on the property load.
    pub fn build_sync(self) -> Result<Proxy> {
        let (proxy, token) = self.into_proxy()?;
        if !proxy.flags.contains(ProxyFlags::DO_NOT_LOAD_PROPERTIES) {
            let call = proxy.get_all_call()?;
            let reply = proxy.marshaler.transport().send_blocking(
                call,
                proxy.marshaler.default_timeout(),
                token.as_ref(),
            );
            proxy.load_properties(reply)?;
        }
        Ok(Self::finish(proxy))
    }

    /// Initialize asynchronously.
    pub async fn build(self) -> Result<Proxy> {
        let (proxy, token) = self.into_proxy()?;
        if !proxy.flags.contains(ProxyFlags::DO_NOT_LOAD_PROPERTIES) {
            let call = proxy.get_all_call()?;
            let transport = proxy.marshaler.transport().clone();
            let send = transport.send(call, token);
            let reply = match proxy.marshaler.default_timeout() {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .unwrap_or(Err(BusError::Timeout(limit))),
                None => send.await,
            };
            proxy.load_properties(reply)?;
        }
        Ok(Self::finish(proxy))
    }

    /// Initialize without blocking; `callback` receives the proxy or error.
    pub fn build_with_callback<F>(self, callback: F)
    where
        F: FnOnce(Result<Proxy>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        spawn_detached(runtime.as_ref(), async move {
            callback(self.build().await);
        });
    }
}
