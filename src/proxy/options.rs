use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bus::CallFlags;
use crate::error::Result;
use crate::variant::{Value, Variant};

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub flags: CallFlags,

    /// Overrides the proxy's default timeout
    pub timeout: Option<Duration>,

    pub cancellable: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: CallFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellable(mut self, token: CancellationToken) -> Self {
        self.cancellable = Some(token);
        self
    }
}

type ReplyFn = Box<dyn FnOnce(Result<Vec<Value>>) + Send>;

/// One-shot continuation of a non-blocking call.
pub struct ReplyHandler(ReplyFn);

impl ReplyHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Result<Vec<Value>>) + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Continuation used when the caller supplies none: failures are logged
    /// and otherwise dropped.
    pub fn log_only(method: &str) -> Self {
        let method = method.to_string();
        Self::new(move |result| {
            if let Err(e) = result {
                tracing::warn!(method = %method, error = %e, "Ignored exception from dbus method");
            }
        })
    }

    pub fn complete(self, result: Result<Vec<Value>>) {
        (self.0)(result)
    }
}

impl fmt::Debug for ReplyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyHandler")
    }
}

/// One raw argument of a proxy call.
///
/// Positional values come first; up to three trailing controls may follow
/// in any order, at most one of each kind.
#[derive(Debug)]
pub enum CallArg {
    Value(Value),
    Reply(ReplyHandler),
    Flags(CallFlags),
    Cancellable(CancellationToken),
}

impl CallArg {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CallArg::Value(_) => "value",
            CallArg::Reply(_) => "callback",
            CallArg::Flags(_) => "flags",
            CallArg::Cancellable(_) => "cancellable",
        }
    }
}

impl From<Value> for CallArg {
    fn from(v: Value) -> Self {
        CallArg::Value(v)
    }
}

impl From<Variant> for CallArg {
    fn from(v: Variant) -> Self {
        CallArg::Value(v.into())
    }
}

impl From<ReplyHandler> for CallArg {
    fn from(r: ReplyHandler) -> Self {
        CallArg::Reply(r)
    }
}

impl From<CallFlags> for CallArg {
    fn from(f: CallFlags) -> Self {
        CallArg::Flags(f)
    }
}

impl From<CancellationToken> for CallArg {
    fn from(t: CancellationToken) -> Self {
        CallArg::Cancellable(t)
    }
}

macro_rules! impl_call_arg_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CallArg {
                fn from(v: $ty) -> Self {
                    CallArg::Value(v.into())
                }
            }
        )*
    };
}

impl_call_arg_value!(bool, u8, i16, u16, i32, u32, i64, u64, f64, String, &str);

impl<T: Into<Value>> From<Vec<T>> for CallArg {
    fn from(items: Vec<T>) -> Self {
        CallArg::Value(items.into())
    }
}

/// Build a `Vec<CallArg>` from values and trailing controls.
///
/// ```ignore
/// proxy.method("echo")?.remote(args!["hello", 42i32, ReplyHandler::new(|r| println!("{r:?}"))])?;
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::proxy::CallArg>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::proxy::CallArg::from($arg)),+]
    };
}
