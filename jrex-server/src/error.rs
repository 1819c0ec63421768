//! Server-side error types
//!
//! - [`ServiceError`] is what operations return when they fail. Any
//!   `std::error::Error` converts into it with `?`, keeping its type name as
//!   the failure category used by the error resolvers.
//! - [`DispatchError`] is what `JsonRpcServer::handle` returns. It never
//!   describes a failing operation that has already been answered, except
//!   when failures are re-raised on purpose.

use crate::invoke::InvocationError;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Application failure raised by an operation
///
/// The category identifies the kind of failure (for converted errors it is
/// the Rust type name, e.g. `std::num::ParseIntError`). Declared error
/// mappings and custom resolvers select on it.
///
/// # Examples
///
/// ```rust
/// use jrex_server::ServiceError;
///
/// fn parse(input: &str) -> Result<i64, ServiceError> {
///     Ok(input.parse::<i64>()?)
/// }
///
/// let err = parse("x").unwrap_err();
/// assert!(err.category().ends_with("ParseIntError"));
///
/// let declared = ServiceError::new("InsufficientFunds", "balance too low").with_code(1001);
/// assert_eq!(declared.code(), Some(1001));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    category: String,
    message: String,
    code: Option<i32>,
    data: Option<Value>,
}

impl ServiceError {
    /// Create a failure of the given category
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Report the failure with an explicit JSON-RPC error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach error data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Failure category
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Explicit error code, if any
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Attached data, if any
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ServiceError must not implement std::error::Error, otherwise this impl
// overlaps the reflexive `From<T> for T`.
impl<E: std::error::Error> From<E> for ServiceError {
    fn from(err: E) -> Self {
        ServiceError::new(std::any::type_name::<E>(), err.to_string())
    }
}

/// Failure returned by the dispatcher entry points
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The document could not be read or is not a valid single request
    #[error(transparent)]
    Core(#[from] jrex_core::Error),

    /// The response could not be written to the sink
    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),

    /// An operation failed and the server is configured to re-raise failures
    ///
    /// The response (or its suppression) has already happened.
    #[error("operation '{method}' failed: {source}")]
    Rethrown {
        /// Name of the failing operation
        method: String,
        /// The captured failure
        #[source]
        source: InvocationError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_error_from_std_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = ServiceError::from(io);
        assert!(err.category().starts_with("std::io::"));
        assert_eq!(err.message(), "disk full");
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_service_error_builders() {
        let err = ServiceError::new("Locked", "account locked")
            .with_code(-32001)
            .with_data(json!({"account": 7}));
        assert_eq!(err.code(), Some(-32001));
        assert_eq!(err.data(), Some(&json!({"account": 7})));
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::from(jrex_core::Error::BatchUnsupported);
        assert_eq!(err.to_string(), "Batch requests are not supported");

        let err = DispatchError::Rethrown {
            method: "divide".into(),
            source: InvocationError::Service(ServiceError::new("DivideByZero", "division by zero")),
        };
        assert_eq!(err.to_string(), "operation 'divide' failed: division by zero");
    }
}
