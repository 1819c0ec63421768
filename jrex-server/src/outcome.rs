//! Invocation outcomes and response assembly

use crate::error_resolver::ErrorInfo;
use jrex_core::{Id, RpcResponseEnvelope};
use serde_json::Value;

/// What an invoked operation produced
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    /// The operation returned; `None` when it has no result
    Success(Option<Value>),
    /// The operation failed and the failure has been resolved
    Failure(ErrorInfo),
}

impl RpcOutcome {
    /// Build the response for this outcome
    ///
    /// Returns `None` for notifications: nothing is written when the request
    /// carried no id. An operation without a result answers `"result": null`.
    pub fn into_envelope(self, jsonrpc: &str, id: Option<Id>) -> Option<RpcResponseEnvelope> {
        let id = id?;
        Some(match self {
            RpcOutcome::Success(value) => {
                RpcResponseEnvelope::success(jsonrpc, Some(id), value.unwrap_or(Value::Null))
            }
            RpcOutcome::Failure(info) => {
                let status = info.http_status;
                RpcResponseEnvelope::error(jsonrpc, Some(id), info.into_error_data(), status)
            }
        })
    }

    /// Did the operation fail?
    pub fn is_failure(&self) -> bool {
        matches!(self, RpcOutcome::Failure(_))
    }
}
