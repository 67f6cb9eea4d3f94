//! Encodes calls, drives them through the transport and decodes replies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusTransport, MethodCall};
use crate::error::{BusError, Result};
use crate::interface::MethodInfo;
use crate::variant::{encode_tuple, Value, Variant};

use super::options::{CallOptions, ReplyHandler};

/// Run a future to completion without blocking the caller.
///
/// Uses the current (or given) tokio runtime; without one, a dedicated
/// thread drives the future on a current-thread runtime.
pub(crate) fn spawn_detached<F>(runtime: Option<&Handle>, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let current = Handle::try_current().ok();
    if let Some(handle) = current.as_ref().or(runtime) {
        handle.spawn(future);
        return;
    }

    let spawned = std::thread::Builder::new()
        .name("busbind-call".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(future),
                Err(e) => tracing::error!(error = %e, "failed to start call runtime"),
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn call thread");
    }
}

/// Handle to an in-flight non-blocking call.
#[derive(Debug)]
pub struct PendingCall {
    method: String,
    token: CancellationToken,
    done: oneshot::Receiver<()>,
}

impl PendingCall {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Cancel the call. Its continuation receives [`BusError::Cancelled`]
    /// unless the reply already arrived.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until the continuation has run.
    pub async fn wait(self) {
        let _ = self.done.await;
    }

    /// Blocking variant of [`wait`](Self::wait). Must not be called from
    /// within an async context.
    pub fn wait_blocking(self) {
        let _ = self.done.blocking_recv();
    }
}

pub(crate) struct CallMarshaler {
    transport: Arc<dyn BusTransport>,
    destination: Option<String>,
    path: String,
    interface: String,
    default_timeout: Option<Duration>,
    runtime: Option<Handle>,
}

impl CallMarshaler {
    pub(crate) fn new(
        transport: Arc<dyn BusTransport>,
        destination: Option<String>,
        path: String,
        interface: String,
        default_timeout: Option<Duration>,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            transport,
            destination,
            path,
            interface,
            default_timeout,
            runtime,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn BusTransport> {
        &self.transport
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub(crate) fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    /// Build a call on an arbitrary interface of the same object.
    pub(crate) fn raw_call(&self, interface: &str, member: &str, body: Variant) -> MethodCall {
        MethodCall {
            destination: self.destination.clone(),
            path: self.path.clone(),
            interface: interface.to_string(),
            member: member.to_string(),
            body,
            flags: Default::default(),
        }
    }

    fn build_call(&self, method: &MethodInfo, args: Vec<Value>, options: &CallOptions) -> Result<MethodCall> {
        let body = encode_tuple(method.in_types(), args)?;
        let mut call = self.raw_call(&self.interface, &method.name, body);
        call.flags = options.flags;
        Ok(call)
    }

    fn effective_timeout(&self, options: &CallOptions) -> Option<Duration> {
        options.timeout.or(self.default_timeout)
    }

    /// Blocking call.
    pub(crate) fn invoke_sync(
        &self,
        method: &MethodInfo,
        args: Vec<Value>,
        options: CallOptions,
    ) -> Result<Vec<Value>> {
        let call = self.build_call(method, args, &options)?;
        tracing::debug!(method = %method.name, path = %self.path, "calling (sync)");
        let reply = self
            .transport
            .send_blocking(call, self.effective_timeout(&options), options.cancellable.as_ref())?;
        decode_reply(method, reply)
    }

    /// Encode now, send when polled.
    ///
    /// Encoding failures are returned before any transport activity.
    pub(crate) fn invoke_async(
        &self,
        method: &MethodInfo,
        args: Vec<Value>,
        options: CallOptions,
    ) -> Result<BoxFuture<'static, Result<Vec<Value>>>> {
        let call = self.build_call(method, args, &options)?;
        let timeout = self.effective_timeout(&options);
        let transport = self.transport.clone();
        let method = method.clone();
        let token = options.cancellable;

        Ok(async move {
            tracing::debug!(method = %method.name, path = %call.path, "calling (async)");
            let send = transport.send(call, token);
            let reply = match timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .map_err(|_| BusError::Timeout(limit))??,
                None => send.await?,
            };
            decode_reply(&method, reply)
        }
        .boxed())
    }

    /// Non-blocking call completed through `reply`.
    pub(crate) fn invoke_remote(
        &self,
        method: &MethodInfo,
        args: Vec<Value>,
        mut options: CallOptions,
        reply: Option<ReplyHandler>,
    ) -> Result<PendingCall> {
        let token = options
            .cancellable
            .get_or_insert_with(CancellationToken::new)
            .clone();
        let future = self.invoke_async(method, args, options)?;
        let (done_tx, done_rx) = oneshot::channel();

        spawn_detached(self.runtime.as_ref(), async move {
            let result = future.await;
            if let Some(reply) = reply {
                reply.complete(result);
            }
            let _ = done_tx.send(());
        });

        Ok(PendingCall {
            method: method.name.clone(),
            token,
            done: done_rx,
        })
    }
}

/// Check the reply against the declared outputs and unpack it.
fn decode_reply(method: &MethodInfo, reply: Variant) -> Result<Vec<Value>> {
    if reply.signature() != method.out_signature() {
        return Err(BusError::encoding(format!(
            "reply to {} has signature '{}', expected '{}'",
            method.name,
            reply.signature(),
            method.out_signature()
        )));
    }
    reply.into_tuple()
}
