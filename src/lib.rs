//! Interface-driven proxy and service bindings for D-Bus style IPC.
//!
//! This crate provides:
//! - A typed value model checked against D-Bus signatures (`variant`)
//! - Signature tables built from declarative interface descriptors (`interface`)
//! - Client proxies with blocking, callback and async call styles (`proxy`)
//! - Service dispatch with handler error mapping and the standard
//!   properties interface (`service`)
//! - A transport contract plus an in-process bus (`bus`)
//!
//! # Example
//!
//! ```ignore
//! use busbind_core::prelude::*;
//!
//! let table = Arc::new(SignatureTable::new(
//!     InterfaceDescriptor::new("org.example.Greeter").method("hello", "s", "s"),
//! )?);
//!
//! let bus = LocalBus::new();
//! let service = Service::builder(table.clone())
//!     .handle("hello", |args| Ok(format!("Hello {}", args[0])))?
//!     .build();
//! service.export(bus.clone(), "/org/example/Greeter")?;
//!
//! let proxy = ProxyBuilder::new(bus.clone(), table)
//!     .object_path("/org/example/Greeter")
//!     .build_sync()?;
//! let reply = proxy.method("hello")?.sync(args!["world"])?;
//! ```

pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod proxy;
pub mod service;
pub mod variant;

pub use error::{BusError, DbusError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::args;
    pub use crate::bus::{BusTransport, CallFlags, LocalBus};
    pub use crate::config::{BusbindConfig, ProxyConfig, ServiceConfig};
    pub use crate::error::{BusError, DbusError, Result};
    pub use crate::interface::{InterfaceDescriptor, PropertyAccess, SignatureTable};
    pub use crate::proxy::{
        CallArg, CallOptions, PendingCall, Proxy, ProxyBuilder, ProxyFlags, ReplyHandler,
    };
    pub use crate::service::{
        HandlerError, MethodInvocation, PropertyMap, PropertyStore, Returned, Service,
    };
    pub use crate::variant::{Signature, Value, Variant};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
