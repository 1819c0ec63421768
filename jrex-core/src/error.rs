//! Error types for jrex
//!
//! This module provides the error handling vocabulary shared by every jrex
//! crate. It defines three things:
//!
//! - **Error**: failures detected while reading or decoding a request document
//!   (uses thiserror)
//! - **JsonRpcErrorData**: the wire-format error object as defined by JSON-RPC 2.0
//! - **StandardError**: the fixed table of reserved error codes, each with its
//!   canonical message and the HTTP status a transport should report
//!
//! # Standard Error Table
//!
//! | error            | code   | http | message               |
//! |------------------|--------|------|-----------------------|
//! | ParseError       | -32700 | 500  | `Parse error.`        |
//! | InvalidRequest   | -32600 | 400  | `Invalid Request.`    |
//! | MethodNotFound   | -32601 | 404  | `Method not found.`   |
//! | InvalidParams    | -32602 | 500  | `Invalid params.`     |
//! | InternalError    | -32603 | 500  | `Internal error.`     |
//! | ServerError      | -32099 | 500  | `Server error.`       |
//!
//! Method-not-found and invalid-params are never raised as `Error` values.
//! They are outcomes of dispatch and are written as responses.
//!
//! # Examples
//!
//! ```rust
//! use jrex_core::{Error, JsonRpcErrorData, StandardError};
//!
//! let error = Error::Parse("EOF while parsing an object".into());
//! assert_eq!(error.standard(), StandardError::ParseError);
//!
//! let json_error = JsonRpcErrorData::method_not_found();
//! assert_eq!(json_error.code, -32601);
//! assert_eq!(json_error.message, "Method not found.");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for jrex operations
///
/// This is a convenience type alias that uses the jrex `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised before a request reaches the dispatcher
///
/// Every variant describes something wrong with the document itself or with
/// the stream it came from. Anything that happens after a request has been
/// validated (unknown method, no matching overload, a failing handler) is
/// turned into a response instead of an `Error`.
///
/// # Mapping to the wire
///
/// A document-level wrapper that must always answer uses [`Error::standard`]
/// to pick the reserved error it writes back.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// JSON-RPC protocol error (already in wire format)
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The byte stream did not contain a well-formed JSON document
    #[error("Parse error: {0}")]
    Parse(String),

    /// The document is valid JSON but not a request object
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The `id` member is a boolean, array or object
    ///
    /// Only strings, numbers and null are accepted as identifiers.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// The `params` member is neither absent, null, an array nor an object
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The document is an array of requests
    #[error("Batch requests are not supported")]
    BatchUnsupported,

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input/output error on the request or response stream
    #[error("IO error: {0}")]
    Io(String),

    /// Internal failure outside the request path (e.g. setup)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The reserved error a transport should answer with for this failure
    ///
    /// Malformed JSON maps to `ParseError`. Structural problems with an
    /// otherwise valid document map to `InvalidRequest`. Everything else,
    /// including the unsupported batch form, maps to `InternalError`.
    pub fn standard(&self) -> StandardError {
        match self {
            Error::Parse(_) => StandardError::ParseError,
            Error::InvalidRequest(_) | Error::InvalidId(_) | Error::InvalidParams(_) => {
                StandardError::InvalidRequest
            }
            Error::JsonRpc(data) => {
                StandardError::from_code(data.code).unwrap_or(StandardError::InternalError)
            }
            Error::BatchUnsupported
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => StandardError::InternalError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Reserved JSON-RPC errors
///
/// Each variant carries its numeric code, the canonical message and the HTTP
/// status a transport adapter should use when it has to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardError {
    /// Malformed JSON document
    ParseError,
    /// Structurally non-conformant request
    InvalidRequest,
    /// No operation exists under the requested name
    MethodNotFound,
    /// No overload of the operation accepts the given parameters
    InvalidParams,
    /// Unexpected failure inside the pipeline
    InternalError,
    /// Implementation-defined server error
    ServerError,
}

impl StandardError {
    /// All reserved errors, in table order
    pub const ALL: [StandardError; 6] = [
        StandardError::ParseError,
        StandardError::InvalidRequest,
        StandardError::MethodNotFound,
        StandardError::InvalidParams,
        StandardError::InternalError,
        StandardError::ServerError,
    ];

    /// The JSON-RPC error code
    pub const fn code(self) -> i32 {
        match self {
            StandardError::ParseError => -32700,
            StandardError::InvalidRequest => -32600,
            StandardError::MethodNotFound => -32601,
            StandardError::InvalidParams => -32602,
            StandardError::InternalError => -32603,
            StandardError::ServerError => -32099,
        }
    }

    /// The HTTP status a transport should report alongside the error
    pub const fn http_status(self) -> u16 {
        match self {
            StandardError::InvalidRequest => 400,
            StandardError::MethodNotFound => 404,
            _ => 500,
        }
    }

    /// The canonical error message
    pub const fn message(self) -> &'static str {
        match self {
            StandardError::ParseError => "Parse error.",
            StandardError::InvalidRequest => "Invalid Request.",
            StandardError::MethodNotFound => "Method not found.",
            StandardError::InvalidParams => "Invalid params.",
            StandardError::InternalError => "Internal error.",
            StandardError::ServerError => "Server error.",
        }
    }

    /// Look up a reserved error by its code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|standard| standard.code() == code)
    }
}

impl From<StandardError> for JsonRpcErrorData {
    fn from(standard: StandardError) -> Self {
        JsonRpcErrorData::new(standard.code(), standard.message())
    }
}

/// JSON-RPC 2.0 error object
///
/// This structure represents the exact wire format for JSON-RPC errors.
/// It appears in the `error` member of a response envelope.
///
/// Error objects always carry a `code` and a `message`, and may carry a
/// `data` member with any additional JSON.
///
/// # Custom Error Codes
///
/// Codes from -32768 to -32000 are reserved. Application errors declared on
/// operations usually live outside that range. A failure that no resolver
/// recognises is reported with code `0`.
///
/// # Examples
///
/// ```rust
/// use jrex_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// // Standard error
/// let error = JsonRpcErrorData::invalid_params();
/// assert_eq!(error.code, -32602);
///
/// // Custom error with additional data
/// let custom = JsonRpcErrorData::with_data(
///     1001,
///     "Insufficient funds",
///     json!({"balance": 50, "required": 100})
/// );
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code indicating the error type
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create a new JSON-RPC error with code and message
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jrex_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::new(-32000, "Database connection failed");
    /// assert!(error.data.is_none());
    /// ```
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        StandardError::ParseError.into()
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request() -> Self {
        StandardError::InvalidRequest.into()
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found() -> Self {
        StandardError::MethodNotFound.into()
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params() -> Self {
        StandardError::InvalidParams.into()
    }

    /// Create an internal error (-32603)
    pub fn internal_error() -> Self {
        StandardError::InternalError.into()
    }

    /// Create a server error (-32099)
    pub fn server_error() -> Self {
        StandardError::ServerError.into()
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message" for easy readability in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// Implement std::error::Error so JsonRpcErrorData can be used with Result and ?
impl std::error::Error for JsonRpcErrorData {}
