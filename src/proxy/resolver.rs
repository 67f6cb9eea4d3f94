//! Splits raw call arguments into positional values and trailing controls.

use tokio_util::sync::CancellationToken;

use crate::bus::CallFlags;
use crate::error::{BusError, Result};
use crate::variant::Value;

use super::options::{CallArg, CallOptions, ReplyHandler};

/// Most trailing controls a call may carry: a continuation, flags and a
/// cancellable.
pub const MAX_TRAILING: usize = 3;

#[derive(Debug)]
pub struct ResolvedCall {
    pub args: Vec<Value>,
    /// `None` for synchronous calls.
    pub reply: Option<ReplyHandler>,
    pub options: CallOptions,
}

/// Resolve `raw` against a method declaring `declared` input arguments.
///
/// Non-synchronous calls without a continuation get
/// [`ReplyHandler::log_only`].
pub fn resolve(
    method: &str,
    declared: usize,
    mut raw: Vec<CallArg>,
    synchronous: bool,
) -> Result<ResolvedCall> {
    let given = raw.len();
    if given < declared {
        return Err(BusError::Arity(format!(
            "Not enough arguments passed for method: {method}. Expected {declared}, got {given}"
        )));
    }
    if given > declared + MAX_TRAILING {
        return Err(BusError::Arity(format!(
            "Too many arguments passed for method: {method}. Maximum is {declared} + one callback and/or flags"
        )));
    }

    let mut reply: Option<ReplyHandler> = None;
    let mut flags: Option<CallFlags> = None;
    let mut cancellable: Option<CancellationToken> = None;

    let trailing = raw.split_off(declared);
    for (offset, arg) in trailing.into_iter().enumerate() {
        let position = declared + offset;
        let duplicate = match arg {
            CallArg::Reply(r) => reply.replace(r).is_some(),
            CallArg::Flags(f) => flags.replace(f).is_some(),
            CallArg::Cancellable(t) => cancellable.replace(t).is_some(),
            CallArg::Value(v) => {
                return Err(BusError::TypeMismatch(format!(
                    "Argument {position} of method {method} is a {}; expected a callback, flags or a cancellable",
                    v.kind()
                )))
            }
        };
        if duplicate {
            return Err(BusError::TypeMismatch(format!(
                "Argument {position} of method {method} repeats an earlier control argument"
            )));
        }
    }

    let args = raw
        .into_iter()
        .enumerate()
        .map(|(position, arg)| match arg {
            CallArg::Value(v) => Ok(v),
            other => Err(BusError::TypeMismatch(format!(
                "Argument {position} of method {method} must be a value, got a {}",
                other.kind()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let reply = if synchronous {
        if reply.is_some() {
            tracing::debug!(method = %method, "ignoring callback passed to synchronous call");
        }
        None
    } else {
        Some(reply.unwrap_or_else(|| ReplyHandler::log_only(method)))
    };

    Ok(ResolvedCall {
        args,
        reply,
        options: CallOptions {
            flags: flags.unwrap_or_default(),
            timeout: None,
            cancellable,
        },
    })
}
