//! Procedural macros for the jrex JSON-RPC invocation engine
//!
//! # `#[rpc_service]`
//!
//! Put it on an inherent `impl` block to expose the block's public `&self`
//! methods as JSON-RPC operations. The macro keeps the impl as written and
//! adds an `impl jrex_server::RpcService` whose contract is built once, on
//! first use.
//!
//! For every exposed method it records, ahead of time:
//!
//! - the wire name (the method name unless renamed)
//! - each parameter's declared [`TypeKind`](../jrex_server/matcher/enum.TypeKind.html),
//!   inferred from its Rust type, and its optional explicit name
//! - how the return value is marshaled
//! - the application errors it declares
//!
//! # Attributes
//!
//! On methods:
//!
//! - `#[rpc(name = "wire.name")]`: expose under another name. Several
//!   methods may share a name; they become overloads.
//! - `#[rpc(skip)]`: do not expose this method
//! - `#[rpc(tagged)]`: the method returns a collection of a `TypeTagged`
//!   element type; every element is written with its type tag
//! - `#[rpc(error(category = "Overdrawn", code = 1001, message = "..."))]`:
//!   report failures of that category with the given code. `message` is
//!   optional and may be repeated with several `error(...)` entries.
//!
//! On parameters:
//!
//! - `#[param("name")]`: the name used by named-parameter calls.
//!   Parameters without it can only be passed positionally.
//! - `#[param("name", optional)]`: same, documented as optional
//!
//! # Examples
//!
//! ```ignore
//! use jrex::{rpc_service, JsonRpcServer, ServiceError};
//!
//! struct Bank;
//!
//! #[rpc_service]
//! impl Bank {
//!     pub fn balance(&self, #[param("account")] account: &str) -> i64 {
//!         account.len() as i64
//!     }
//!
//!     #[rpc(error(category = "Overdrawn", code = 1001))]
//!     pub fn withdraw(&self, #[param("amount")] amount: i64) -> Result<i64, ServiceError> {
//!         Err(ServiceError::new("Overdrawn", "balance too low"))
//!     }
//!
//!     #[rpc(skip)]
//!     pub fn audit(&self) {}
//! }
//!
//! let server = JsonRpcServer::new(Bank);
//! ```
//!
//! # Limitations
//!
//! - generic impl blocks and trait impls are rejected
//! - `async` methods are rejected; mark them `#[rpc(skip)]`
//! - `&mut` parameters and `impl Trait` parameters are rejected

mod service;

use proc_macro::TokenStream;

/// Expose an impl block's public methods as JSON-RPC operations
///
/// See the [crate documentation](crate) for the supported attributes.
#[proc_macro_attribute]
pub fn rpc_service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::rpc_service_impl(attr, item)
}
