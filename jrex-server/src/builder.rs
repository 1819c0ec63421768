//! Server builder
//!
//! Fluent configuration of a [`JsonRpcServer`]: dispatch toggles, error
//! resolvers, observability and metrics.
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrex_server::{Contract, ErrorInfo, InvocationError, OperationDescriptor, ServerBuilder};
//! use std::sync::Arc;
//!
//! struct Ledger;
//!
//! # fn example() -> jrex_core::Result<()> {
//! let contract = Arc::new(Contract::<Ledger>::builder().build());
//! let server = ServerBuilder::new(Arc::new(Ledger), contract)
//!     .allow_fewer_params(true)
//!     .error_resolver(|err: &InvocationError, _: &OperationDescriptor, _: &[serde_json::Value]| {
//!         (err.category() == "Timeout").then(|| ErrorInfo::new(-32000, "timed out"))
//!     })
//!     .service_name("ledger")
//!     .with_default_observability()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::config::ServerConfig;
use crate::dispatcher::JsonRpcServer;
use crate::error_resolver::{ErrorResolver, ResolverChain};
use crate::metrics::ServerMetrics;
use crate::registry::{Contract, RpcService};
use jrex_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;

/// Builder for a [`JsonRpcServer`]
pub struct ServerBuilder<S: ?Sized> {
    handler: Arc<S>,
    contract: Arc<Contract<S>>,
    config: ServerConfig,
    resolvers: ResolverChain,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    metrics: bool,
}

impl<S: RpcService> ServerBuilder<S> {
    /// Start from a handler with its own contract
    pub fn for_service(handler: S) -> Self {
        Self::new(Arc::new(handler), S::contract())
    }
}

impl<S: ?Sized> ServerBuilder<S> {
    /// Start from a handler and an explicit contract
    pub fn new(handler: Arc<S>, contract: Arc<Contract<S>>) -> Self {
        Self {
            handler,
            contract,
            config: ServerConfig::default(),
            resolvers: ResolverChain::default(),
            observability_config: None,
            service_name: None,
            metrics: false,
        }
    }

    /// Replace the whole dispatch configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept requests without a `jsonrpc` member (default: true)
    pub fn legacy_mode(mut self, enabled: bool) -> Self {
        self.config.legacy_mode = enabled;
        self
    }

    /// Accept more params than an operation declares (default: false)
    pub fn allow_extra_params(mut self, enabled: bool) -> Self {
        self.config.allow_extra_params = enabled;
        self
    }

    /// Accept fewer params than an operation declares (default: false)
    pub fn allow_fewer_params(mut self, enabled: bool) -> Self {
        self.config.allow_fewer_params = enabled;
        self
    }

    /// Return operation failures from `handle` after answering (default: false)
    pub fn rethrow_failures(mut self, enabled: bool) -> Self {
        self.config.rethrow_failures = enabled;
        self
    }

    /// Add a resolver ahead of the current chain
    pub fn error_resolver(mut self, resolver: impl ErrorResolver + 'static) -> Self {
        self.resolvers = self.resolvers.prepend(resolver);
        self
    }

    /// Replace the resolver chain
    pub fn error_resolvers(mut self, chain: ResolverChain) -> Self {
        self.resolvers = chain;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability and metrics
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Record metrics on the global meter provider without installing one
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Build the server
    ///
    /// # Errors
    ///
    /// `Error::Internal` if observability was requested and cannot be
    /// initialized.
    pub fn build(self) -> Result<JsonRpcServer<S>> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = &self.service_name {
                config.service_name = name.clone();
            }

            jrex_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ServerMetrics::new(config.service_name)))
        } else if self.metrics {
            let name = self.service_name.unwrap_or_else(|| "jrex".to_string());
            Some(Arc::new(ServerMetrics::new(name)))
        } else {
            None
        };

        tracing::debug!(
            operations = self.contract.len(),
            config = ?self.config,
            resolvers = self.resolvers.len(),
            metrics = metrics.is_some(),
            "JSON-RPC server built"
        );

        Ok(JsonRpcServer::from_parts(
            self.handler,
            self.contract,
            self.config,
            self.resolvers,
            metrics,
        ))
    }
}
