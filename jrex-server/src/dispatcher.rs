//! Request dispatching
//!
//! [`JsonRpcServer`] drives one request document through its whole life:
//!
//! 1. **Read**: the document is read to the end of the stream and parsed.
//! 2. **Validate**: a request needs a `method` member, and a `jsonrpc`
//!    member unless legacy mode is on. A malformed request is answered with
//!    `-32600` and id `null`, even when it looks like a notification.
//! 3. **Resolve**: the operations registered under the method name are
//!    looked up and one of them is picked for the params. No operation
//!    answers `-32601`, no acceptable overload answers `-32602`. Neither is
//!    written for a notification.
//! 4. **Invoke**: the operation runs; failures and panics are captured.
//! 5. **Answer**: calls get a `result` or an `error` response echoing their
//!    id with its original numeric subtype. Notifications get nothing.
//!
//! A captured failure is logged after the answer has been written. With
//! `rethrow_failures` on it is also returned to the caller of
//! [`JsonRpcServer::handle`] as [`DispatchError::Rethrown`].
//!
//! Every request reads one configuration snapshot at entry, so
//! [`JsonRpcServer::replace_config`] never affects a request in flight.
//!
//! # Examples
//!
//! ```rust
//! use jrex_server::{Contract, JsonRpcServer, OperationDescriptor, ReturnType, ServiceError, TypeKind};
//! use jrex_core::RpcResponseEnvelope;
//! use std::sync::Arc;
//!
//! struct Pinger;
//!
//! let contract = Contract::builder()
//!     .method(
//!         OperationDescriptor::new("ping").returns(ReturnType::Value(TypeKind::Text)),
//!         |_: &Pinger, (): ()| Ok::<_, ServiceError>("pong"),
//!     )
//!     .build();
//! let server = JsonRpcServer::with_contract(Arc::new(Pinger), Arc::new(contract));
//!
//! let mut responses: Vec<RpcResponseEnvelope> = Vec::new();
//! server
//!     .handle(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.as_bytes(), &mut responses)
//!     .unwrap();
//! assert_eq!(responses[0].result(), Some(&serde_json::json!("pong")));
//! ```

use crate::builder::ServerBuilder;
use crate::config::ServerConfig;
use crate::descriptor::OperationDescriptor;
use crate::error::DispatchError;
use crate::error_resolver::ResolverChain;
use crate::invoke::invoke;
use crate::metrics::ServerMetrics;
use crate::outcome::RpcOutcome;
use crate::registry::{Contract, RpcService};
use crate::resolver::resolve;
use crate::sink::ResponseSink;
use jrex_core::codec::{self, Document};
use jrex_core::{Error, RpcRequest, RpcResponseEnvelope, StandardError, JSONRPC_VERSION};
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// JSON-RPC server bound to one handler and its contract
///
/// `S` may be a trait object, in which case only the operations of the
/// trait's contract are reachable.
pub struct JsonRpcServer<S: ?Sized> {
    handler: Arc<S>,
    contract: Arc<Contract<S>>,
    config: RwLock<ServerConfig>,
    resolvers: ResolverChain,
    metrics: Option<Arc<ServerMetrics>>,
}

impl<S: RpcService> JsonRpcServer<S> {
    /// Serve a handler with its own contract and the default configuration
    pub fn new(handler: S) -> Self {
        Self::with_contract(Arc::new(handler), S::contract())
    }

    /// Start configuring a server for a handler with its own contract
    pub fn builder(handler: S) -> ServerBuilder<S> {
        ServerBuilder::for_service(handler)
    }
}

impl<S: ?Sized> JsonRpcServer<S> {
    /// Serve a handler through an explicit contract
    pub fn with_contract(handler: Arc<S>, contract: Arc<Contract<S>>) -> Self {
        Self::from_parts(handler, contract, ServerConfig::default(), ResolverChain::default(), None)
    }

    pub(crate) fn from_parts(
        handler: Arc<S>,
        contract: Arc<Contract<S>>,
        config: ServerConfig,
        resolvers: ResolverChain,
        metrics: Option<Arc<ServerMetrics>>,
    ) -> Self {
        Self {
            handler,
            contract,
            config: RwLock::new(config),
            resolvers,
            metrics,
        }
    }

    /// The handler
    pub fn handler(&self) -> &Arc<S> {
        &self.handler
    }

    /// The operation table
    pub fn contract(&self) -> &Arc<Contract<S>> {
        &self.contract
    }

    /// Current configuration snapshot
    pub fn config(&self) -> ServerConfig {
        *self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the configuration for subsequent requests
    pub fn replace_config(&self, config: ServerConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        tracing::debug!(?config, "Server configuration replaced");
    }

    /// Handle one request document read from `reader`
    ///
    /// # Errors
    ///
    /// - `DispatchError::Core` when the document cannot be parsed, is a batch
    ///   or a scalar, or carries an illegal `id` or `params` shape. Nothing
    ///   has been written in that case.
    /// - `DispatchError::Io` when writing the response fails
    /// - `DispatchError::Rethrown` for operation failures, if configured
    pub fn handle<R, K>(&self, reader: R, sink: &mut K) -> Result<(), DispatchError>
    where
        R: Read,
        K: ResponseSink + ?Sized,
    {
        let started = Instant::now();
        let document = codec::read_document(reader)?;
        self.dispatch_document(document, sink, started)
    }

    /// Handle an already-parsed request document
    ///
    /// Integer ids wider than 64 bits have lost precision when the value was
    /// parsed; use [`JsonRpcServer::handle`] to echo them exactly.
    ///
    /// # Errors
    ///
    /// Same as [`JsonRpcServer::handle`].
    pub fn handle_value<K>(&self, document: Value, sink: &mut K) -> Result<(), DispatchError>
    where
        K: ResponseSink + ?Sized,
    {
        let started = Instant::now();
        self.dispatch_document(codec::decode_value(document), sink, started)
    }

    /// Handle a request built in process
    ///
    /// Skips document validation; the request is resolved and invoked as is.
    ///
    /// # Errors
    ///
    /// `DispatchError::Io` or `DispatchError::Rethrown`.
    pub fn handle_request<K>(&self, request: RpcRequest, sink: &mut K) -> Result<(), DispatchError>
    where
        K: ResponseSink + ?Sized,
    {
        let config = self.config();
        self.dispatch_request(request, &config, sink, Instant::now())
    }

    /// Handle one document and answer every failure on the wire
    ///
    /// Unreadable documents get `-32700`, structurally invalid ones `-32600`
    /// and batches `-32603`, all with id `null`. Write failures and rethrown
    /// operation failures are logged only.
    pub fn handle_quietly<R, K>(&self, reader: R, sink: &mut K)
    where
        R: Read,
        K: ResponseSink + ?Sized,
    {
        match self.handle(reader, sink) {
            Ok(()) => {}
            Err(DispatchError::Core(err)) => {
                let standard = err.standard();
                tracing::warn!(error = %err, code = standard.code(), "Rejecting request document");
                self.record_error(standard.code());
                let envelope = RpcResponseEnvelope::standard_error(JSONRPC_VERSION, None, standard);
                if let Err(e) = sink.write_response(&envelope) {
                    tracing::warn!(error = %e, "Failed to write error response");
                }
            }
            Err(DispatchError::Io(e)) => {
                tracing::warn!(error = %e, "Failed to write response");
            }
            Err(DispatchError::Rethrown { method, .. }) => {
                tracing::debug!(method = %method, "Operation failure already answered");
            }
        }
    }

    fn dispatch_document<K>(&self, document: Document, sink: &mut K, started: Instant) -> Result<(), DispatchError>
    where
        K: ResponseSink + ?Sized,
    {
        let config = self.config();

        let document = match document {
            Document::Request(document) => document,
            Document::Batch(items) => {
                tracing::warn!(batch_size = items.len(), "Rejecting batch request");
                return Err(Error::BatchUnsupported.into());
            }
            Document::Invalid(value) => {
                return Err(Error::InvalidRequest(format!("expected a request object, got {}", value)).into());
            }
        };

        if !document.is_well_formed(config.legacy_mode) {
            tracing::debug!(
                has_jsonrpc = document.has("jsonrpc"),
                has_method = document.has("method"),
                "Invalid request"
            );
            self.record_error(StandardError::InvalidRequest.code());
            let envelope = RpcResponseEnvelope::standard_error(JSONRPC_VERSION, None, StandardError::InvalidRequest);
            return Ok(sink.write_response(&envelope)?);
        }

        let request = document.into_request()?;
        self.dispatch_request(request, &config, sink, started)
    }

    #[tracing::instrument(skip_all, fields(method = %request.method, id = ?request.id))]
    fn dispatch_request<K>(
        &self,
        request: RpcRequest,
        config: &ServerConfig,
        sink: &mut K,
        started: Instant,
    ) -> Result<(), DispatchError>
    where
        K: ResponseSink + ?Sized,
    {
        tracing::debug!(params = request.params.len(), "Received request");

        let candidates = self.contract.candidates(&request.method);
        if candidates.is_empty() {
            tracing::debug!("Method not found");
            return self.write_standard(sink, &request, StandardError::MethodNotFound, started);
        }

        let descriptors: Vec<&OperationDescriptor> = candidates.iter().map(|op| op.descriptor()).collect();
        let Some(found) = resolve(&descriptors, &request.params, config) else {
            tracing::debug!(candidates = candidates.len(), "No overload accepts the params");
            return self.write_standard(sink, &request, StandardError::InvalidParams, started);
        };

        let operation = candidates[found.index];
        let (outcome, failure) = match invoke(&*self.handler, operation, &found.arguments) {
            Ok(result) => (RpcOutcome::Success(result), None),
            Err(err) if request.id.is_some() => {
                let info = self.resolvers.resolve(&err, operation.descriptor(), &found.arguments);
                self.record_error(info.code);
                (RpcOutcome::Failure(info), Some(err))
            }
            Err(err) => {
                let code = self
                    .resolvers
                    .try_resolve(&err, operation.descriptor(), &found.arguments)
                    .map_or(StandardError::InternalError.code(), |info| info.code);
                self.record_error(code);
                (RpcOutcome::Success(None), Some(err))
            }
        };

        let status = if failure.is_some() { "error" } else { "success" };
        match outcome.into_envelope(&request.jsonrpc, request.id.clone()) {
            Some(envelope) => sink.write_response(&envelope)?,
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(&request.method);
                }
            }
        }
        self.record_request(&request.method, status, started);

        match failure {
            Some(err) => {
                tracing::error!(
                    signature = %operation.descriptor().signature(),
                    category = err.category(),
                    error = %err,
                    "Operation failed"
                );
                if config.rethrow_failures {
                    Err(DispatchError::Rethrown {
                        method: request.method,
                        source: err,
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    fn write_standard<K>(
        &self,
        sink: &mut K,
        request: &RpcRequest,
        error: StandardError,
        started: Instant,
    ) -> Result<(), DispatchError>
    where
        K: ResponseSink + ?Sized,
    {
        self.record_error(error.code());
        self.record_request(&request.method, "error", started);
        if request.id.is_none() {
            tracing::debug!(code = error.code(), "Suppressing error response to notification");
            return Ok(());
        }
        let envelope = RpcResponseEnvelope::standard_error(request.jsonrpc.as_str(), request.id.clone(), error);
        Ok(sink.write_response(&envelope)?)
    }

    fn record_request(&self, method: &str, status: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method, status, started.elapsed().as_secs_f64());
        }
    }

    fn record_error(&self, code: i32) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(code);
        }
    }
}

impl<S: ?Sized> fmt::Debug for JsonRpcServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcServer")
            .field("operations", &self.contract.len())
            .field("config", &self.config())
            .field("resolvers", &self.resolvers)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ParamDescriptor, ReturnType};
    use crate::error::ServiceError;
    use crate::matcher::TypeKind;
    use jrex_core::Id;
    use serde_json::json;

    struct Echo;

    fn server() -> JsonRpcServer<Echo> {
        let contract = Contract::builder()
            .method(
                OperationDescriptor::new("echo")
                    .param(ParamDescriptor::named("value", TypeKind::Text))
                    .returns(ReturnType::Value(TypeKind::Text)),
                |_: &Echo, (value,): (String,)| Ok::<_, ServiceError>(value),
            )
            .method(
                OperationDescriptor::new("fail").returns(ReturnType::Value(TypeKind::Text)),
                |_: &Echo, (): ()| Err::<String, _>(ServiceError::new("Broken", "always fails")),
            )
            .build();
        JsonRpcServer::with_contract(Arc::new(Echo), Arc::new(contract))
    }

    fn run(server: &JsonRpcServer<Echo>, body: &str) -> Vec<RpcResponseEnvelope> {
        let mut responses = Vec::new();
        server.handle(body.as_bytes(), &mut responses).unwrap();
        responses
    }

    #[test]
    fn test_success_echoes_id() {
        let responses = run(&server(), r#"{"jsonrpc":"2.0","id":"abc","method":"echo","params":["hi"]}"#);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, Some(Id::String("abc".into())));
        assert_eq!(responses[0].result(), Some(&json!("hi")));
    }

    #[test]
    fn test_missing_method_member_is_invalid_request() {
        let responses = run(&server(), r#"{"jsonrpc":"2.0","id":4}"#);
        assert_eq!(responses[0].id, None);
        assert_eq!(responses[0].error_data().map(|e| e.code), Some(-32600));
        assert_eq!(responses[0].http_status, 400);
    }

    #[test]
    fn test_strict_mode_requires_version() {
        let server = server();
        server.replace_config(server.config().with_legacy_mode(false));
        let responses = run(&server, r#"{"id":1,"method":"echo","params":["x"]}"#);
        assert_eq!(responses[0].error_data().map(|e| e.code), Some(-32600));

        server.replace_config(ServerConfig::default());
        let responses = run(&server, r#"{"id":1,"method":"echo","params":["x"]}"#);
        assert!(responses[0].is_success());
        assert_eq!(responses[0].jsonrpc, "2.0");
    }

    #[test]
    fn test_failed_notification_writes_nothing() {
        let responses = run(&server(), r#"{"jsonrpc":"2.0","method":"fail"}"#);
        assert!(responses.is_empty());
    }

    #[test]
    fn test_unknown_method_notification_writes_nothing() {
        let responses = run(&server(), r#"{"jsonrpc":"2.0","method":"missing"}"#);
        assert!(responses.is_empty());

        let responses = run(&server(), r#"{"jsonrpc":"2.0","id":5,"method":"missing"}"#);
        assert_eq!(responses[0].error_data().map(|e| e.code), Some(-32601));
    }

    #[test]
    fn test_rethrow_after_answering() {
        let server = server();
        server.replace_config(ServerConfig::default().with_rethrow_failures(true));
        let mut responses = Vec::new();
        let err = server
            .handle(r#"{"jsonrpc":"2.0","id":9,"method":"fail"}"#.as_bytes(), &mut responses)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rethrown { ref method, .. } if method == "fail"));
        assert_eq!(responses[0].error_data().map(|e| e.code), Some(0));
    }

    #[test]
    fn test_batch_is_an_error() {
        let mut responses = Vec::new();
        let err = server().handle("[]".as_bytes(), &mut responses).unwrap_err();
        assert!(matches!(err, DispatchError::Core(Error::BatchUnsupported)));
        assert!(responses.is_empty());
    }

    #[test]
    fn test_handle_quietly_answers_parse_errors() {
        let mut responses = Vec::new();
        server().handle_quietly("{not json".as_bytes(), &mut responses);
        assert_eq!(responses[0].error_data().map(|e| e.code), Some(-32700));
        assert_eq!(responses[0].id, None);
    }
}
