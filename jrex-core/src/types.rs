//! JSON-RPC wire types used by the invocation engine
//!
//! These types sit between the raw request document and the dispatcher:
//!
//! - [`Id`]: a request identifier that remembers its wire subtype
//! - [`Params`]: the three legal shapes of the `params` member
//! - [`RpcRequest`]: a validated request ready for method lookup
//! - [`RpcResponseEnvelope`]: the response document plus its out-of-band
//!   HTTP status hint
//!
//! # Request IDs
//!
//! A JSON-RPC client expects the response id to be byte-for-byte what it
//! sent. A client that sends `1` must not get `1.0` back, and one that sends
//! a 30 digit integer must not get a rounded float. [`Id`] therefore keeps the
//! subtype it was parsed as and serializes back to that same subtype.

use crate::error::{JsonRpcErrorData, StandardError};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::fmt;

/// Protocol version written when a request does not carry one
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request identifier with its wire subtype preserved
///
/// The classification rules used by the codec are:
///
/// - a JSON string is a `String`
/// - an integer literal that fits `i32` is an `Int`, one that fits `i64` is a
///   `Long`, and anything wider is a `Decimal` that keeps its literal text
/// - a literal with a fraction or exponent is a `Double` when it has at most
///   15 significant digits, otherwise a `Decimal`
///
/// `Int`, `Long`, `Decimal` and `String` are echoed as the exact text the
/// client sent. `Double` keeps its value but not its spelling: it is written
/// back in `serde_json`'s shortest round-trip form, so `1e5` comes back as
/// `100000.0` and `2.50` as `2.5`.
///
/// `Float` is never produced by parsing, since JSON has no single-precision
/// marker. It exists so that callers building envelopes by hand can echo an
/// `f32` identifier faithfully.
///
/// A `null` or absent identifier is represented as `Option::<Id>::None` and
/// marks the request as a notification.
///
/// # Examples
///
/// ```rust
/// use jrex_core::Id;
///
/// let id: Id = 42.into();
/// assert_eq!(id, Id::Int(42));
/// assert_eq!(serde_json::to_string(&id).unwrap(), "42");
///
/// let wide = Id::Decimal("123456789012345678901234567890".into());
/// assert_eq!(serde_json::to_string(&wide).unwrap(), "123456789012345678901234567890");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Id {
    /// 32-bit integer identifier
    Int(i32),
    /// 64-bit integer identifier
    Long(i64),
    /// Single-precision identifier (programmatic use only)
    Float(f32),
    /// Double-precision identifier
    Double(f64),
    /// Arbitrary-precision number, kept as its literal text
    Decimal(String),
    /// String identifier
    String(String),
}

impl Id {
    /// Short name of the wire subtype, used in logs and diagnostics
    pub fn subtype(&self) -> &'static str {
        match self {
            Id::Int(_) => "int",
            Id::Long(_) => "long",
            Id::Float(_) => "float",
            Id::Double(_) => "double",
            Id::Decimal(_) => "decimal",
            Id::String(_) => "string",
        }
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Id::Int(n) => serializer.serialize_i32(*n),
            Id::Long(n) => serializer.serialize_i64(*n),
            Id::Float(n) => serializer.serialize_f32(*n),
            Id::Double(n) => serializer.serialize_f64(*n),
            Id::Decimal(text) => {
                // Emitted verbatim so no digit is lost to f64 rounding
                let raw = RawValue::from_string(text.clone()).map_err(S::Error::custom)?;
                raw.serialize(serializer)
            }
            Id::String(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(n) => write!(f, "{}", n),
            Id::Long(n) => write!(f, "{}", n),
            Id::Float(n) => write!(f, "{}", n),
            Id::Double(n) => write!(f, "{}", n),
            Id::Decimal(text) => f.write_str(text),
            Id::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i32> for Id {
    fn from(n: i32) -> Self {
        Id::Int(n)
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Long(n)
    }
}

impl From<f32> for Id {
    fn from(n: f32) -> Self {
        Id::Float(n)
    }
}

impl From<f64> for Id {
    fn from(n: f64) -> Self {
        Id::Double(n)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

/// The parameter payload of a request
///
/// Exactly one shape is active. A JSON `null` is treated like an absent
/// member. Any other JSON shape is rejected by the codec.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// No `params` member (or `null`)
    #[default]
    None,
    /// Ordered positional arguments
    Positional(Vec<Value>),
    /// Arguments keyed by parameter name
    Named(Map<String, Value>),
}

impl Params {
    /// Number of given arguments
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    /// True when no argument was given
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(values: Map<String, Value>) -> Self {
        Params::Named(values)
    }
}

/// A structurally valid JSON-RPC request
///
/// Produced by [`RequestDocument::into_request`](crate::RequestDocument::into_request)
/// once the document passed validation. The `jsonrpc` member is echoed back
/// unchanged in the response.
///
/// # Examples
///
/// ```rust
/// use jrex_core::{Id, Params, RpcRequest};
/// use serde_json::json;
///
/// let request = RpcRequest::new("subtract", Params::Positional(vec![json!(42), json!(23)]))
///     .with_id(Id::Int(1));
/// assert!(!request.is_notification());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Protocol version, "2.0" when the request omitted it
    pub jsonrpc: String,
    /// Name of the operation to invoke
    pub method: String,
    /// Identifier, `None` for notifications
    pub id: Option<Id>,
    /// Parameter payload
    pub params: Params,
}

impl RpcRequest {
    /// Create a notification-style request (no id) with protocol version "2.0"
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            id: None,
            params,
        }
    }

    /// Attach an identifier, turning the request into a call
    pub fn with_id(mut self, id: impl Into<Id>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// True when no response must be written for this request
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Body of a response envelope, exactly one of `result` or `error`
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Successful result (JSON `null` for operations without a result)
    Success(Value),
    /// Error object
    Failure(JsonRpcErrorData),
}

/// A complete JSON-RPC response plus the HTTP status hint for transports
///
/// The envelope is serialized directly into the output stream as
/// `{"jsonrpc": .., "id": .., "result" | "error": ..}`. The `http_status`
/// field is never part of the document. Transport adapters read it to set
/// their own status line.
///
/// # Examples
///
/// ```rust
/// use jrex_core::{Id, RpcResponseEnvelope, StandardError};
/// use serde_json::json;
///
/// let ok = RpcResponseEnvelope::success("2.0", Some(Id::Int(1)), json!("success"));
/// assert_eq!(ok.http_status, 200);
/// assert_eq!(
///     serde_json::to_string(&ok).unwrap(),
///     r#"{"jsonrpc":"2.0","id":1,"result":"success"}"#
/// );
///
/// let missing = RpcResponseEnvelope::standard_error("2.0", Some(Id::Int(2)), StandardError::MethodNotFound);
/// assert_eq!(missing.http_status, 404);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponseEnvelope {
    /// Protocol version echoed from the request
    pub jsonrpc: String,
    /// Identifier echoed from the request, `null` on the wire when absent
    pub id: Option<Id>,
    /// Result or error
    pub payload: ResponsePayload,
    /// Status a transport adapter should report
    pub http_status: u16,
}

impl RpcResponseEnvelope {
    /// Build a success envelope with HTTP hint 200
    pub fn success(jsonrpc: impl Into<String>, id: Option<Id>, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            id,
            payload: ResponsePayload::Success(result),
            http_status: 200,
        }
    }

    /// Build an error envelope with an explicit HTTP hint
    pub fn error(
        jsonrpc: impl Into<String>,
        id: Option<Id>,
        error: JsonRpcErrorData,
        http_status: u16,
    ) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            id,
            payload: ResponsePayload::Failure(error),
            http_status,
        }
    }

    /// Build an error envelope for one of the reserved errors
    pub fn standard_error(jsonrpc: impl Into<String>, id: Option<Id>, standard: StandardError) -> Self {
        Self::error(jsonrpc, id, standard.into(), standard.http_status())
    }

    /// The result, if this is a success envelope
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Success(value) => Some(value),
            ResponsePayload::Failure(_) => None,
        }
    }

    /// The error object, if this is an error envelope
    pub fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.payload {
            ResponsePayload::Success(_) => None,
            ResponsePayload::Failure(error) => Some(error),
        }
    }

    /// Check if the envelope represents a successful result
    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Success(_))
    }

    /// Check if the envelope represents an error
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }
}

impl Serialize for RpcResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("jsonrpc", &self.jsonrpc)?;
        map.serialize_entry("id", &self.id)?;
        match &self.payload {
            ResponsePayload::Success(result) => map.serialize_entry("result", result)?,
            ResponsePayload::Failure(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}
