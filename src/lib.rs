//! JREX - JSON-RPC invocation engine
//!
//! This is the convenience crate that re-exports the jrex sub-crates. Use it
//! if you want a single dependency for the engine and its macro.
//!
//! # Architecture
//!
//! jrex is organized into modular crates:
//!
//! - **jrex-core**: wire types, codec, protocol errors, observability
//! - **jrex-server**: contracts, overload resolution, invocation, dispatch
//! - **jrex-macros**: `#[rpc_service]` contract generation
//!
//! Code generated by `#[rpc_service]` refers to `jrex_server` by name, so
//! crates using the attribute also depend on `jrex-server` directly.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use jrex::{rpc_service, JsonRpcServer, StreamSink};
//!
//! struct Greeter;
//!
//! #[rpc_service]
//! impl Greeter {
//!     pub fn greet(&self, #[param("name")] name: &str) -> String {
//!         format!("hello {}", name)
//!     }
//! }
//!
//! let server = JsonRpcServer::new(Greeter);
//! let mut sink = StreamSink::new(std::io::stdout());
//! server.handle_quietly(std::io::stdin(), &mut sink);
//! ```

// Re-export all public APIs from sub-crates
pub use jrex_core as core;
pub use jrex_macros as macros;
pub use jrex_server as server;

// Convenience re-exports of the most commonly used types
pub use jrex_core::{Id, RpcResponseEnvelope, StandardError};
pub use jrex_macros::rpc_service;
pub use jrex_server::{
    JsonRpcServer, ResponseSink, ServerBuilder, ServerConfig, ServiceError, StatusSink, StreamSink, TypeTagged,
};
