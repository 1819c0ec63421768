//! Mapping invocation failures to JSON-RPC errors
//!
//! When an operation fails, the dispatcher asks a [`ResolverChain`] for the
//! error object to send back. Each [`ErrorResolver`] in the chain either
//! claims the failure or passes; the first claim wins. When nobody claims it,
//! [`ErrorInfo::fallback`] reports code `0` with the failure's message and
//! its category name as data.
//!
//! The default chain:
//!
//! 1. [`DeclaredErrorResolver`]: error mappings declared on the operation
//! 2. [`ServiceErrorResolver`]: a [`ServiceError`](crate::ServiceError) carrying an explicit code
//! 3. [`InternalErrorResolver`]: marshaling failures and panics become `-32603`
//!
//! # Examples
//!
//! ```rust
//! use jrex_server::{ErrorInfo, InvocationError, ResolverChain, OperationDescriptor};
//! use serde_json::Value;
//!
//! let chain = ResolverChain::default().prepend(
//!     |err: &InvocationError, _: &OperationDescriptor, _: &[Value]| {
//!         (err.category() == "Timeout").then(|| ErrorInfo::new(-32000, "timed out"))
//!     },
//! );
//! assert_eq!(chain.len(), 4);
//! ```

use crate::descriptor::OperationDescriptor;
use crate::invoke::InvocationError;
use jrex_core::{JsonRpcErrorData, StandardError};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Resolved error object plus its HTTP status hint
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional error data
    pub data: Option<Value>,
    /// Status reported to HTTP-aware sinks
    pub http_status: u16,
}

impl ErrorInfo {
    /// An error with the default status `500`
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            http_status: 500,
        }
    }

    /// Attach data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Override the status hint
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    /// One of the reserved protocol errors
    pub fn from_standard(error: StandardError) -> Self {
        Self::new(error.code(), error.message()).with_http_status(error.http_status())
    }

    /// The answer used when no resolver claims a failure
    pub fn fallback(error: &InvocationError) -> Self {
        Self::new(0, error.message()).with_data(Value::String(error.category().to_string()))
    }

    /// The error object as written on the wire
    pub fn into_error_data(self) -> JsonRpcErrorData {
        JsonRpcErrorData {
            code: self.code,
            message: self.message,
            data: self.data,
        }
    }
}

/// Strategy turning a failure into an error object
///
/// Implemented for closures with the same signature as [`ErrorResolver::resolve`].
pub trait ErrorResolver: Send + Sync {
    /// Claim the failure, or return `None` to let the next resolver try
    fn resolve(
        &self,
        error: &InvocationError,
        operation: &OperationDescriptor,
        arguments: &[Value],
    ) -> Option<ErrorInfo>;
}

impl<F> ErrorResolver for F
where
    F: Fn(&InvocationError, &OperationDescriptor, &[Value]) -> Option<ErrorInfo> + Send + Sync,
{
    fn resolve(
        &self,
        error: &InvocationError,
        operation: &OperationDescriptor,
        arguments: &[Value],
    ) -> Option<ErrorInfo> {
        self(error, operation, arguments)
    }
}

/// Uses the error mappings declared on the failing operation
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredErrorResolver;

impl ErrorResolver for DeclaredErrorResolver {
    fn resolve(&self, error: &InvocationError, operation: &OperationDescriptor, _: &[Value]) -> Option<ErrorInfo> {
        let mapping = operation
            .errors
            .iter()
            .find(|mapping| mapping.applies_to(error.category()))?;

        let message = mapping.message.clone().unwrap_or_else(|| error.message());
        let data = mapping.data.clone().or_else(|| match error {
            InvocationError::Service(err) => err.data().cloned(),
            _ => None,
        });

        let info = ErrorInfo::new(mapping.code, message);
        Some(match data {
            Some(data) => info.with_data(data),
            None => info,
        })
    }
}

/// Reports service errors that carry their own code
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceErrorResolver;

impl ErrorResolver for ServiceErrorResolver {
    fn resolve(&self, error: &InvocationError, _: &OperationDescriptor, _: &[Value]) -> Option<ErrorInfo> {
        let InvocationError::Service(err) = error else {
            return None;
        };
        let code = err.code()?;
        let data = err
            .data()
            .cloned()
            .unwrap_or_else(|| json!({"category": err.category(), "message": err.message()}));
        Some(ErrorInfo::new(code, err.message()).with_data(data))
    }
}

/// Reports engine-side failures as internal errors
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalErrorResolver;

impl ErrorResolver for InternalErrorResolver {
    fn resolve(&self, error: &InvocationError, _: &OperationDescriptor, _: &[Value]) -> Option<ErrorInfo> {
        match error {
            InvocationError::Marshal(_) | InvocationError::Panicked(_) => {
                Some(ErrorInfo::from_standard(StandardError::InternalError).with_data(Value::String(error.to_string())))
            }
            _ => None,
        }
    }
}

/// Ordered list of resolvers
#[derive(Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ErrorResolver>>,
}

impl ResolverChain {
    /// A chain with no resolvers; every failure gets the fallback
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Append a resolver
    pub fn with(mut self, resolver: impl ErrorResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    /// Append a resolver in place
    pub fn push(&mut self, resolver: impl ErrorResolver + 'static) {
        self.resolvers.push(Arc::new(resolver));
    }

    /// Insert a resolver ahead of all others
    pub fn prepend(mut self, resolver: impl ErrorResolver + 'static) -> Self {
        self.resolvers.insert(0, Arc::new(resolver));
        self
    }

    /// Number of resolvers
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Is the chain empty?
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// First claim from the chain, if any
    pub fn try_resolve(
        &self,
        error: &InvocationError,
        operation: &OperationDescriptor,
        arguments: &[Value],
    ) -> Option<ErrorInfo> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(error, operation, arguments))
    }

    /// First claim from the chain, or the fallback
    pub fn resolve(&self, error: &InvocationError, operation: &OperationDescriptor, arguments: &[Value]) -> ErrorInfo {
        self.try_resolve(error, operation, arguments)
            .unwrap_or_else(|| ErrorInfo::fallback(error))
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
            .with(DeclaredErrorResolver)
            .with(ServiceErrorResolver)
            .with(InternalErrorResolver)
    }
}

impl ErrorResolver for ResolverChain {
    fn resolve(
        &self,
        error: &InvocationError,
        operation: &OperationDescriptor,
        arguments: &[Value],
    ) -> Option<ErrorInfo> {
        self.try_resolve(error, operation, arguments)
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
