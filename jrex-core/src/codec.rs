//! Reading request documents and writing response envelopes
//!
//! The codec is the only place that looks at raw request text. It is
//! responsible for three things the rest of the engine relies on:
//!
//! - **Document shape**: one JSON object is a request, an array is a batch,
//!   anything else cannot be a request at all
//! - **Id fidelity**: the `id` member is classified from its literal text, so
//!   a 20 digit integer or a high-precision fraction survives unchanged
//! - **Params shape**: absent/`null`, array and object are the only legal
//!   `params` values
//!
//! Validation of `jsonrpc` / `method` presence is deliberately left to the
//! dispatcher, because an invalid request must still be answered even when its
//! `id` cannot be parsed.
//!
//! # Examples
//!
//! ```rust
//! use jrex_core::{codec, Document, Id, Params};
//!
//! let text = r#"{"method":"echo","params":{"text":"hi"},"id":"a-1"}"#;
//! let Document::Request(document) = codec::decode_document(text).unwrap() else {
//!     panic!("expected a request");
//! };
//! assert!(document.is_well_formed(true));
//! assert!(!document.is_well_formed(false)); // no "jsonrpc" member
//!
//! let request = document.into_request().unwrap();
//! assert_eq!(request.id, Some(Id::String("a-1".into())));
//! assert!(matches!(request.params, Params::Named(_)));
//! ```

use crate::error::{Error, Result};
use crate::types::{Id, Params, RpcRequest, RpcResponseEnvelope, JSONRPC_VERSION};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::io::{Read, Write};

/// Fractions with more significant digits than this are kept as decimals
const DOUBLE_PRECISION_DIGITS: usize = 15;

/// A decoded request document, before any validation
#[derive(Debug, Clone)]
pub enum Document {
    /// A single JSON object
    Request(RequestDocument),
    /// An array of documents (not supported by the dispatcher)
    Batch(Vec<Value>),
    /// A scalar document, which can never be a request
    Invalid(Value),
}

/// The members of a single request object
///
/// When the document came from text, the literal text of `id` is kept next to
/// the parsed members so that its numeric subtype can be classified exactly.
#[derive(Debug, Clone)]
pub struct RequestDocument {
    fields: Map<String, Value>,
    raw_id: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct IdOnly {
    #[serde(default)]
    id: Option<Box<RawValue>>,
}

impl RequestDocument {
    /// Wrap an already-parsed request object
    ///
    /// Integers wider than `u64` have already been rounded by the JSON parser
    /// at this point. Documents read through [`decode_document`] keep them.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields, raw_id: None }
    }

    /// True when the object has the given member, even if it is `null`
    pub fn has(&self, member: &str) -> bool {
        self.fields.contains_key(member)
    }

    /// Access a member value
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.fields.get(member)
    }

    /// Structural validation
    ///
    /// A request must have a `method` member. Outside legacy mode it must
    /// also carry a `jsonrpc` member.
    pub fn is_well_formed(&self, legacy_mode: bool) -> bool {
        (legacy_mode || self.has("jsonrpc")) && self.has("method")
    }

    /// Parse the `id` member
    ///
    /// Returns `Ok(None)` for an absent or `null` id.
    ///
    /// # Errors
    ///
    /// `Error::InvalidId` when the id is a boolean, array or object.
    pub fn id(&self) -> Result<Option<Id>> {
        match (&self.raw_id, self.fields.get("id")) {
            (Some(raw), _) => id_from_raw(raw),
            (None, Some(value)) => id_from_value(value),
            (None, None) => Ok(None),
        }
    }

    /// Convert into a typed request
    ///
    /// `jsonrpc` defaults to "2.0" when absent or `null`. A `null` method
    /// becomes an empty name, which no operation can match.
    ///
    /// # Errors
    ///
    /// `Error::InvalidId` or `Error::InvalidParams` for illegal member shapes.
    pub fn into_request(mut self) -> Result<RpcRequest> {
        let id = self.id()?;
        let params = decode_params(self.fields.remove("params"))?;
        let jsonrpc = member_text(self.fields.get("jsonrpc"))
            .unwrap_or_else(|| JSONRPC_VERSION.to_string());
        let method = member_text(self.fields.get("method")).unwrap_or_default();

        Ok(RpcRequest {
            jsonrpc,
            method,
            id,
            params,
        })
    }
}

/// Read one document from a byte stream
///
/// The stream is read to its end. It is not closed.
///
/// # Errors
///
/// - `Error::Parse` if the bytes are not UTF-8 or not a single JSON document
/// - `Error::Io` if reading fails
pub fn read_document<R: Read>(mut reader: R) -> Result<Document> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => Error::Parse(e.to_string()),
        _ => Error::Io(e.to_string()),
    })?;
    decode_document(&text)
}

/// Decode a document from text
///
/// # Errors
///
/// Returns `Error::Parse` if the text is not valid JSON.
pub fn decode_document(text: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;

    Ok(match value {
        Value::Object(fields) => {
            // A failed id-only parse (e.g. duplicate members) falls back to the parsed value
            let raw_id = serde_json::from_str::<IdOnly>(text)
                .ok()
                .and_then(|only| only.id);
            Document::Request(RequestDocument { fields, raw_id })
        }
        other => decode_value(other),
    })
}

/// Classify an already-parsed document
pub fn decode_value(value: Value) -> Document {
    match value {
        Value::Object(fields) => Document::Request(RequestDocument::from_map(fields)),
        Value::Array(items) => Document::Batch(items),
        other => Document::Invalid(other),
    }
}

/// Interpret the `params` member
///
/// # Errors
///
/// Returns `Error::InvalidParams` for strings, numbers and booleans.
pub fn decode_params(params: Option<Value>) -> Result<Params> {
    match params {
        None | Some(Value::Null) => Ok(Params::None),
        Some(Value::Array(values)) => Ok(Params::Positional(values)),
        Some(Value::Object(values)) => Ok(Params::Named(values)),
        Some(other) => Err(Error::InvalidParams(format!(
            "params must be an array or an object, got {}",
            other
        ))),
    }
}

/// Classify an id from its literal JSON text
///
/// # Errors
///
/// Returns `Error::InvalidId` for booleans, arrays and objects.
pub fn id_from_raw(raw: &RawValue) -> Result<Option<Id>> {
    let text = raw.get();
    match text.as_bytes().first() {
        Some(b'"') => serde_json::from_str::<String>(text)
            .map(|s| Some(Id::String(s)))
            .map_err(|e| Error::InvalidId(e.to_string())),
        Some(b'-' | b'0'..=b'9') => Ok(Some(classify_number(text))),
        Some(b'n') => Ok(None),
        _ => Err(Error::InvalidId(format!("unsupported id {}", text))),
    }
}

/// Classify an id from a parsed JSON value
///
/// # Errors
///
/// Returns `Error::InvalidId` for booleans, arrays and objects.
pub fn id_from_value(value: &Value) -> Result<Option<Id>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(Id::String(s.clone()))),
        Value::Number(n) => {
            if let Some(wide) = n.as_i64() {
                Ok(Some(i32::try_from(wide).map_or(Id::Long(wide), Id::Int)))
            } else if n.is_u64() {
                Ok(Some(Id::Decimal(n.to_string())))
            } else {
                Ok(Some(n.as_f64().map_or_else(|| Id::Decimal(n.to_string()), Id::Double)))
            }
        }
        other => Err(Error::InvalidId(format!("unsupported id {}", other))),
    }
}

fn classify_number(text: &str) -> Id {
    let integral = !text.contains(|c: char| matches!(c, '.' | 'e' | 'E'));
    if integral {
        if let Ok(n) = text.parse::<i32>() {
            return Id::Int(n);
        }
        if let Ok(n) = text.parse::<i64>() {
            return Id::Long(n);
        }
        return Id::Decimal(text.to_string());
    }

    if significant_digits(text) <= DOUBLE_PRECISION_DIGITS {
        if let Ok(n) = text.parse::<f64>() {
            if n.is_finite() {
                return Id::Double(n);
            }
        }
    }
    Id::Decimal(text.to_string())
}

fn significant_digits(text: &str) -> usize {
    let mantissa = text.split(|c: char| c == 'e' || c == 'E').next().unwrap_or(text);
    mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .skip_while(|b| *b == b'0')
        .count()
}

fn member_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(String::new()),
    }
}

/// Encode a response envelope to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the envelope cannot be serialized.
pub fn encode_response(response: &RpcResponseEnvelope) -> Result<String> {
    serde_json::to_string(response).map_err(|e| Error::Serialization(e.to_string()))
}

/// Write a response envelope to a stream and flush it
///
/// The writer is borrowed and never closed.
///
/// # Errors
///
/// Returns `Error::Io` if writing or flushing fails.
pub fn write_response<W: Write + ?Sized>(writer: &mut W, response: &RpcResponseEnvelope) -> Result<()> {
    serde_json::to_writer(&mut *writer, response).map_err(|e| Error::Io(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(text: &str) -> RequestDocument {
        match decode_document(text).unwrap() {
            Document::Request(document) => document,
            other => panic!("Expected a request document, got {:?}", other),
        }
    }

    fn id_of(text: &str) -> Option<Id> {
        request(text).id().unwrap()
    }

    #[test]
    fn test_id_classification() {
        assert_eq!(id_of(r#"{"id":1}"#), Some(Id::Int(1)));
        assert_eq!(id_of(r#"{"id":-2147483648}"#), Some(Id::Int(i32::MIN)));
        assert_eq!(id_of(r#"{"id":2147483648}"#), Some(Id::Long(2_147_483_648)));
        assert_eq!(
            id_of(r#"{"id":123456789012345678901234567890}"#),
            Some(Id::Decimal("123456789012345678901234567890".into()))
        );
        assert_eq!(id_of(r#"{"id":1.5}"#), Some(Id::Double(1.5)));
        assert_eq!(id_of(r#"{"id":2.5e3}"#), Some(Id::Double(2500.0)));
        assert_eq!(
            id_of(r#"{"id":3.14159265358979323846}"#),
            Some(Id::Decimal("3.14159265358979323846".into()))
        );
        assert_eq!(id_of(r#"{"id":"abc"}"#), Some(Id::String("abc".into())));
        assert_eq!(id_of(r#"{"id":null}"#), None);
        assert_eq!(id_of(r#"{"method":"x"}"#), None);
    }

    #[test]
    fn test_invalid_id_shapes() {
        for text in [r#"{"id":true}"#, r#"{"id":[1]}"#, r#"{"id":{"a":1}}"#] {
            match request(text).id() {
                Err(Error::InvalidId(_)) => {}
                other => panic!("Expected InvalidId for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(id_from_value(&json!(7)).unwrap(), Some(Id::Int(7)));
        assert_eq!(id_from_value(&json!(7_000_000_000i64)).unwrap(), Some(Id::Long(7_000_000_000)));
        assert_eq!(
            id_from_value(&json!(u64::MAX)).unwrap(),
            Some(Id::Decimal(u64::MAX.to_string()))
        );
        assert_eq!(id_from_value(&json!(0.25)).unwrap(), Some(Id::Double(0.25)));
        assert!(id_from_value(&json!(false)).is_err());
    }

    #[test]
    fn test_decimal_id_round_trips_verbatim() {
        let text = r#"{"id":0.1000000000000000055511151231257827}"#;
        let id = id_of(text);
        let envelope = RpcResponseEnvelope::success("2.0", id, json!(true));
        assert_eq!(
            encode_response(&envelope).unwrap(),
            r#"{"jsonrpc":"2.0","id":0.1000000000000000055511151231257827,"result":true}"#
        );
    }

    #[test]
    fn test_double_id_is_echoed_in_canonical_form() {
        for (text, echoed) in [(r#"{"id":1e5}"#, "100000.0"), (r#"{"id":2.50}"#, "2.5")] {
            let id = id_of(text);
            assert_eq!(id.as_ref().map(Id::subtype), Some("double"));
            let envelope = RpcResponseEnvelope::success("2.0", id, json!(true));
            assert_eq!(
                encode_response(&envelope).unwrap(),
                format!(r#"{{"jsonrpc":"2.0","id":{},"result":true}}"#, echoed)
            );
        }
    }

    #[test]
    fn test_document_shapes() {
        assert!(matches!(decode_document("[1, 2]").unwrap(), Document::Batch(items) if items.len() == 2));
        assert!(matches!(decode_document("42").unwrap(), Document::Invalid(_)));
        assert!(matches!(decode_document("{").unwrap_err(), Error::Parse(_)));
        assert!(matches!(decode_document("").unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn test_well_formed() {
        assert!(request(r#"{"method":"a"}"#).is_well_formed(true));
        assert!(!request(r#"{"method":"a"}"#).is_well_formed(false));
        assert!(request(r#"{"jsonrpc":"2.0","method":"a"}"#).is_well_formed(false));
        assert!(!request(r#"{"jsonrpc":"2.0","id":1}"#).is_well_formed(true));
        // presence is enough, even with a null value
        assert!(request(r#"{"jsonrpc":null,"method":"a"}"#).is_well_formed(false));
    }

    #[test]
    fn test_into_request_defaults() {
        let req = request(r#"{"method":"ping"}"#).into_request().unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert_eq!(req.method, "ping");
        assert_eq!(req.params, Params::None);
        assert!(req.is_notification());

        let req = request(r#"{"jsonrpc":"1.0","method":null,"params":null,"id":3}"#)
            .into_request()
            .unwrap();
        assert_eq!(req.jsonrpc, "1.0");
        assert_eq!(req.method, "");
        assert_eq!(req.id, Some(Id::Int(3)));
    }

    #[test]
    fn test_params_shapes() {
        let req = request(r#"{"method":"m","params":[1,"a"]}"#).into_request().unwrap();
        assert_eq!(req.params, Params::Positional(vec![json!(1), json!("a")]));

        let req = request(r#"{"method":"m","params":{"a":1}}"#).into_request().unwrap();
        assert!(matches!(req.params, Params::Named(ref map) if map["a"] == json!(1)));

        let err = request(r#"{"method":"m","params":"nope"}"#).into_request().unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn test_read_document_from_stream() {
        let input = br#"{"jsonrpc":"2.0","method":"m","id":9}"#;
        let document = read_document(&input[..]).unwrap();
        assert!(matches!(document, Document::Request(_)));

        let invalid_utf8: &[u8] = &[0xff, 0xfe];
        assert!(matches!(read_document(invalid_utf8).unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn test_write_response_flushes() {
        let mut out = Vec::new();
        let envelope = RpcResponseEnvelope::success("2.0", Some(Id::Long(1 << 40)), json!("ok"));
        write_response(&mut out, &envelope).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"jsonrpc":"2.0","id":1099511627776,"result":"ok"}"#
        );
    }
}
