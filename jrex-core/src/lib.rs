//! Core JSON-RPC types and codec for jrex
//!
//! This crate provides the wire-level building blocks of the jrex invocation
//! engine. It includes:
//!
//! - **Types**: request ids that remember their numeric subtype, parameter
//!   payloads, parsed requests and response envelopes
//! - **Codec**: reading one request document from a byte stream and writing
//!   response envelopes back
//! - **Error handling**: the crate error type and the standard JSON-RPC error table
//! - **Observability**: OpenTelemetry integration for distributed tracing, metrics, and logs
//!
//! # Architecture
//!
//! The crate is transport-agnostic. It knows how a request document looks on
//! the wire and how a response must be written, but it does not know anything
//! about handlers or overload resolution. The `jrex-server` crate builds the
//! dispatcher on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use jrex_core::{codec, Document, Id};
//!
//! let text = r#"{"jsonrpc":"2.0","method":"add","params":[5,3],"id":9007199254740993}"#;
//! let Document::Request(document) = codec::decode_document(text).unwrap() else {
//!     panic!("expected a single request");
//! };
//!
//! let request = document.into_request().unwrap();
//! assert_eq!(request.method, "add");
//! assert_eq!(request.id, Some(Id::Long(9007199254740993)));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

// Re-export the most commonly used types for convenience
// This allows users to use `jrex_core::Error` instead of `jrex_core::error::Error`
pub use codec::{Document, RequestDocument};
pub use error::{Error, JsonRpcErrorData, Result, StandardError};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Id, Params, ResponsePayload, RpcRequest, RpcResponseEnvelope, JSONRPC_VERSION};
