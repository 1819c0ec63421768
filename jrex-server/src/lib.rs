//! JSON-RPC invocation engine
//!
//! This crate turns one JSON-RPC request document into a call on a Rust
//! handler and writes the response back out. It is transport-agnostic: input
//! is any `std::io::Read`, output is any [`ResponseSink`].
//!
//! # Core Features
//!
//! - **Contracts**: precomputed operation tables, built by hand or with the
//!   `#[rpc_service]` attribute from `jrex-macros`
//! - **Overloads**: several operations may share a name; the best one is
//!   picked by arity and a coarse JSON type check
//! - **Positional and named params**, with configurable tolerance for extra
//!   or missing params
//! - **Error resolvers**: an ordered chain mapping failures to error codes
//! - **Notifications**: requests without an id are invoked but never answered
//! - **Id echo**: response ids keep the numeric subtype of the request id
//! - **Observability**: tracing throughout, optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust
//! use jrex_server::{
//!     Contract, JsonRpcServer, OperationDescriptor, ParamDescriptor, ReturnType, ServiceError,
//!     StreamSink, TypeKind,
//! };
//! use std::sync::Arc;
//!
//! struct Calculator;
//!
//! let contract = Contract::builder()
//!     .method(
//!         OperationDescriptor::new("add")
//!             .param(ParamDescriptor::named("a", TypeKind::INTEGER))
//!             .param(ParamDescriptor::named("b", TypeKind::INTEGER))
//!             .returns(ReturnType::Value(TypeKind::INTEGER)),
//!         |_: &Calculator, (a, b): (i64, i64)| Ok::<_, ServiceError>(a + b),
//!     )
//!     .build();
//!
//! let server = JsonRpcServer::with_contract(Arc::new(Calculator), Arc::new(contract));
//! let mut sink = StreamSink::new(Vec::new());
//! server
//!     .handle(r#"{"jsonrpc":"2.0","id":7,"method":"add","params":{"a":2,"b":3}}"#.as_bytes(), &mut sink)
//!     .unwrap();
//!
//! assert_eq!(
//!     String::from_utf8(sink.into_inner()).unwrap(),
//!     r#"{"jsonrpc":"2.0","id":7,"result":5}"#
//! );
//! ```
//!
//! # Architecture
//!
//! - [`matcher`]: could a JSON value fit a declared parameter type?
//! - [`descriptor`] and [`registry`]: what operations exist
//! - [`resolver`]: which overload a request means
//! - [`invoke`]: argument coercion, the call itself, result marshaling
//! - [`error_resolver`]: failures to error objects
//! - [`dispatcher`]: the request state machine tying it all together
//!
//! Everything is synchronous. A server is `Send + Sync` when its handler is,
//! and can be shared between threads behind an `Arc`.

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod error_resolver;
pub mod invoke;
pub mod matcher;
pub mod metrics;
pub mod outcome;
pub mod registry;
pub mod resolver;
pub mod sink;

pub use builder::ServerBuilder;
pub use config::ServerConfig;
pub use descriptor::{ElementType, ErrorMapping, OperationDescriptor, ParamDescriptor, ReturnType};
pub use dispatcher::JsonRpcServer;
pub use error::{DispatchError, ServiceError};
pub use error_resolver::{
    DeclaredErrorResolver, ErrorInfo, ErrorResolver, InternalErrorResolver, ResolverChain, ServiceErrorResolver,
};
pub use invoke::{FromArguments, InvocationError, TypeTagged};
pub use matcher::{NumericKind, TypeKind};
pub use metrics::ServerMetrics;
pub use outcome::RpcOutcome;
pub use registry::{Contract, ContractBuilder, Operation, RpcService};
pub use resolver::MatchResult;
pub use sink::{ResponseSink, StatusSink, StreamSink, JSONRPC_CONTENT_TYPE};

// Re-exported for code generated by `#[rpc_service]`
#[doc(hidden)]
pub use serde_json;
