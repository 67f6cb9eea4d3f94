//! In-process bus.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{
    BusTransport, ExportId, IncomingCall, MatchRule, MethodCall, ObjectDispatch, ReplyHandle,
    SignalMessage, SignalSink, WatchId, PROPERTIES_INTERFACE,
};
use crate::error::{BusError, DbusError, Result};
use crate::variant::{Value, Variant};

/// How often a blocking send re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

static NEXT_BUS: AtomicU64 = AtomicU64::new(1);

struct Export {
    id: ExportId,
    object: Arc<dyn ObjectDispatch>,
}

#[derive(Default)]
struct Routes {
    /// path -> interface -> export
    objects: HashMap<String, HashMap<String, Export>>,
    watchers: Vec<(WatchId, MatchRule, SignalSink)>,
    names: HashSet<String>,
}

/// In-process transport.
///
/// Every proxy and service sharing one `LocalBus` sees the same objects and
/// signals. Handlers run on the thread that delivers the call; replies may
/// complete from any thread.
pub struct LocalBus {
    unique_name: String,
    routes: RwLock<Routes>,
    next_id: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        let n = NEXT_BUS.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            unique_name: format!(":local.{n}"),
            routes: RwLock::new(Routes::default()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Claim a well-known name. Returns false if it was already owned.
    pub fn own_name(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        tracing::debug!(bus = %self.unique_name, name = %name, "owning name");
        self.routes.write().names.insert(name)
    }

    pub fn release_name(&self, name: &str) -> bool {
        self.routes.write().names.remove(name)
    }

    /// Number of active signal subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.routes.read().watchers.len()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn route(&self, call: &MethodCall) -> std::result::Result<Arc<dyn ObjectDispatch>, DbusError> {
        let routes = self.routes.read();

        if let Some(dest) = call.destination.as_deref() {
            if dest != self.unique_name && !routes.names.contains(dest) {
                return Err(DbusError::service_unknown(dest));
            }
        }

        let interfaces = routes
            .objects
            .get(&call.path)
            .ok_or_else(|| DbusError::unknown_object(&call.path))?;

        let target = if call.interface == PROPERTIES_INTERFACE {
            // Properties calls carry the target interface as their first argument.
            match call.body.value().as_struct().and_then(|items| items.first()) {
                Some(Value::String(name)) => name.as_str(),
                _ => {
                    return Err(DbusError::invalid_args(format!(
                        "{} expects an interface name as first argument",
                        call.member
                    )))
                }
            }
        } else {
            call.interface.as_str()
        };

        interfaces
            .get(target)
            .map(|export| export.object.clone())
            .ok_or_else(|| DbusError::unknown_interface(&call.path, target))
    }

    fn deliver<F>(&self, call: MethodCall, reply: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<Variant, DbusError>) + Send + 'static,
    {
        let object = self.route(&call)?;
        tracing::debug!(
            path = %call.path,
            interface = %call.interface,
            member = %call.member,
            "delivering call"
        );

        let handle = ReplyHandle::new(call.member.clone(), reply);
        object.dispatch(
            IncomingCall {
                sender: self.unique_name.clone(),
                path: call.path,
                interface: call.interface,
                member: call.member,
                body: call.body,
            },
            handle,
        );
        Ok(())
    }
}

#[async_trait]
impl BusTransport for LocalBus {
    fn unique_name(&self) -> &str {
        &self.unique_name
    }

    fn send_blocking(
        &self,
        call: MethodCall,
        timeout: Option<Duration>,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Variant> {
        if cancellable.is_some_and(|t| t.is_cancelled()) {
            return Err(BusError::Cancelled);
        }

        let (tx, rx) = mpsc::channel();
        let member = call.member.clone();
        self.deliver(call, move |result| {
            let _ = tx.send(result);
        })?;

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if cancellable.is_some_and(|t| t.is_cancelled()) {
                return Err(BusError::Cancelled);
            }

            let wait = match (deadline, cancellable) {
                (Some(deadline), _) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(BusError::Timeout(timeout.unwrap_or_default()));
                    }
                    if cancellable.is_some() {
                        remaining.min(CANCEL_POLL_INTERVAL)
                    } else {
                        remaining
                    }
                }
                (None, Some(_)) => CANCEL_POLL_INTERVAL,
                (None, None) => {
                    return match rx.recv() {
                        Ok(result) => result.map_err(BusError::Remote),
                        Err(_) => Err(BusError::Remote(DbusError::no_reply(&member))),
                    };
                }
            };

            match rx.recv_timeout(wait) {
                Ok(result) => return result.map_err(BusError::Remote),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(BusError::Remote(DbusError::no_reply(&member)))
                }
            }
        }
    }

    async fn send(
        &self,
        call: MethodCall,
        cancellable: Option<CancellationToken>,
    ) -> Result<Variant> {
        if cancellable.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(BusError::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        let member = call.member.clone();
        self.deliver(call, move |result| {
            let _ = tx.send(result);
        })?;

        let reply = async move {
            match rx.await {
                Ok(result) => result.map_err(BusError::Remote),
                Err(_) => Err(BusError::Remote(DbusError::no_reply(&member))),
            }
        };

        match cancellable {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(BusError::Cancelled),
                result = reply => result,
            },
            None => reply.await,
        }
    }

    fn export_object(&self, path: &str, object: Arc<dyn ObjectDispatch>) -> Result<ExportId> {
        crate::variant::validate_object_path(path)
            .map_err(|e| BusError::Transport(e.to_string()))?;

        let interface = object.interface_name().to_string();
        let mut routes = self.routes.write();
        let interfaces = routes.objects.entry(path.to_string()).or_default();
        if interfaces.contains_key(&interface) {
            return Err(BusError::AlreadyExported {
                path: path.to_string(),
                interface,
            });
        }

        let id = ExportId(self.next_id());
        tracing::debug!(path = %path, interface = %interface, "exported object");
        interfaces.insert(interface, Export { id, object });
        Ok(id)
    }

    fn unexport(&self, id: ExportId) -> bool {
        let mut routes = self.routes.write();
        let mut removed = false;
        routes.objects.retain(|_, interfaces| {
            let before = interfaces.len();
            interfaces.retain(|_, export| export.id != id);
            removed |= interfaces.len() != before;
            !interfaces.is_empty()
        });
        removed
    }

    fn emit_signal(&self, mut signal: SignalMessage) -> Result<()> {
        signal.sender = self.unique_name.clone();

        let sinks: Vec<SignalSink> = {
            let routes = self.routes.read();
            routes
                .watchers
                .iter()
                .filter(|(_, rule, _)| {
                    rule.matches_owned(&signal, |name| routes.names.contains(name))
                })
                .map(|(_, _, sink)| sink.clone())
                .collect()
        };

        tracing::debug!(
            path = %signal.path,
            interface = %signal.interface,
            member = %signal.member,
            receivers = sinks.len(),
            "emitting signal"
        );
        for sink in sinks {
            sink(&signal);
        }
        Ok(())
    }

    fn watch_signals(&self, rule: MatchRule, sink: SignalSink) -> WatchId {
        let id = WatchId(self.next_id());
        self.routes.write().watchers.push((id, rule, sink));
        id
    }

    fn unwatch_signals(&self, id: WatchId) -> bool {
        let mut routes = self.routes.write();
        let before = routes.watchers.len();
        routes.watchers.retain(|(w, _, _)| *w != id);
        routes.watchers.len() != before
    }
}
