//! Observer registry for proxy signals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::variant::Value;

/// Signal observer: receives the sender and the decoded arguments.
pub type SignalHandler = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

/// Returned by `connect_signal`, used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandlerId(u64);

struct Registration {
    id: SignalHandlerId,
    signal: String,
    handler: SignalHandler,
}

#[derive(Default)]
pub(crate) struct SignalRegistry {
    next_id: AtomicU64,
    handlers: RwLock<Vec<Registration>>,
}

impl SignalRegistry {
    pub(crate) fn connect(&self, signal: &str, handler: SignalHandler) -> SignalHandlerId {
        let id = SignalHandlerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.handlers.write().push(Registration {
            id,
            signal: signal.to_string(),
            handler,
        });
        id
    }

    pub(crate) fn disconnect(&self, id: SignalHandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        handlers.len() != before
    }

    fn is_connected(&self, id: SignalHandlerId) -> bool {
        self.handlers.read().iter().any(|r| r.id == id)
    }

    /// Deliver to every observer of `signal`, in registration order.
    ///
    /// Handlers run without the registry lock held, so they may connect or
    /// disconnect observers; one disconnected mid-emission is skipped.
    pub(crate) fn emit(&self, signal: &str, sender: &str, args: &[Value]) -> usize {
        let snapshot: Vec<(SignalHandlerId, SignalHandler)> = self
            .handlers
            .read()
            .iter()
            .filter(|r| r.signal == signal)
            .map(|r| (r.id, r.handler.clone()))
            .collect();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            if !self.is_connected(id) {
                continue;
            }
            handler(sender, args);
            delivered += 1;
        }
        delivered
    }
}
