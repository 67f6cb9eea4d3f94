//! Transport contract.
//!
//! Proxies and services never talk to a socket directly; they go through a
//! [`BusTransport`]. The crate ships [`LocalBus`], an in-process transport
//! that routes calls to exported objects by path and interface.

mod local;

pub use local::LocalBus;

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DbusError, Result};
use crate::variant::Variant;

/// The standard property access interface.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Per-call flags handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallFlags(u32);

impl CallFlags {
    pub const NONE: CallFlags = CallFlags(0);
    pub const NO_AUTO_START: CallFlags = CallFlags(1 << 0);
    pub const ALLOW_INTERACTIVE_AUTH: CallFlags = CallFlags(1 << 1);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        CallFlags(bits)
    }

    pub fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;

    fn bitor(self, rhs: CallFlags) -> CallFlags {
        CallFlags(self.0 | rhs.0)
    }
}

/// Outgoing method call
#[derive(Debug, Clone)]
pub struct MethodCall {
    /// Destination bus name, `None` for peer-to-peer style routing
    pub destination: Option<String>,

    /// Object path (e.g., "/org/busbind/Test")
    pub path: String,

    /// Interface name
    pub interface: String,

    /// Method name
    pub member: String,

    /// Input tuple
    pub body: Variant,

    pub flags: CallFlags,
}

/// A call as seen by an exported object.
#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub body: Variant,
}

/// Signal emission
#[derive(Debug, Clone)]
pub struct SignalMessage {
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    /// Argument tuple, `None` for signals without arguments
    pub body: Option<Variant>,
}

/// Signal filter. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    pub sender: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
}

impl MatchRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn matches(&self, signal: &SignalMessage) -> bool {
        self.matches_owned(signal, |_| false)
    }

    /// Like [`matches`](Self::matches), but a sender given as a well-known
    /// name also matches when `owned_by_sender` reports that the signal's
    /// sender owns it.
    pub fn matches_owned(
        &self,
        signal: &SignalMessage,
        owned_by_sender: impl Fn(&str) -> bool,
    ) -> bool {
        fn field(rule: &Option<String>, value: &str) -> bool {
            rule.as_deref().map_or(true, |r| r == value)
        }
        let sender = match self.sender.as_deref() {
            Some(name) => name == signal.sender || owned_by_sender(name),
            None => true,
        };
        sender
            && field(&self.path, &signal.path)
            && field(&self.interface, &signal.interface)
            && field(&self.member, &signal.member)
    }
}

/// Receives matching signals. Called outside of transport locks.
pub type SignalSink = Arc<dyn Fn(&SignalMessage) + Send + Sync>;

/// Signal subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Object export handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportId(pub u64);

type ReplyFn = Box<dyn FnOnce(std::result::Result<Variant, DbusError>) + Send>;

/// Fire-once reply slot for an incoming call.
///
/// Dropping the handle without replying sends `NoReply` to the caller.
pub struct ReplyHandle {
    member: String,
    reply: Option<ReplyFn>,
}

impl ReplyHandle {
    pub fn new<F>(member: impl Into<String>, reply: F) -> Self
    where
        F: FnOnce(std::result::Result<Variant, DbusError>) + Send + 'static,
    {
        Self {
            member: member.into(),
            reply: Some(Box::new(reply)),
        }
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn send(mut self, result: std::result::Result<Variant, DbusError>) {
        if let Some(reply) = self.reply.take() {
            reply(result);
        }
    }

    pub fn return_value(self, body: Variant) {
        self.send(Ok(body));
    }

    pub fn return_error(self, error: DbusError) {
        self.send(Err(error));
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            tracing::debug!(member = %self.member, "call dropped without a reply");
            reply(Err(DbusError::no_reply(&self.member)));
        }
    }
}

impl fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("member", &self.member)
            .field("pending", &self.reply.is_some())
            .finish()
    }
}

/// What an exported object offers to a transport.
///
/// Calls on [`PROPERTIES_INTERFACE`] naming this object's interface are
/// dispatched here too.
pub trait ObjectDispatch: Send + Sync {
    fn interface_name(&self) -> &str;

    fn dispatch(&self, call: IncomingCall, reply: ReplyHandle);
}

/// Message transport.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Name of this connection on the bus.
    fn unique_name(&self) -> &str;

    /// Send a call and block until the reply, the timeout or cancellation.
    ///
    /// `None` timeout waits indefinitely.
    fn send_blocking(
        &self,
        call: MethodCall,
        timeout: Option<Duration>,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Variant>;

    /// Send a call and await the reply.
    async fn send(&self, call: MethodCall, cancellable: Option<CancellationToken>)
        -> Result<Variant>;

    fn export_object(&self, path: &str, object: Arc<dyn ObjectDispatch>) -> Result<ExportId>;

    /// Returns false when the id was not exported.
    fn unexport(&self, id: ExportId) -> bool;

    fn emit_signal(&self, signal: SignalMessage) -> Result<()>;

    fn watch_signals(&self, rule: MatchRule, sink: SignalSink) -> WatchId;

    fn unwatch_signals(&self, id: WatchId) -> bool;
}
