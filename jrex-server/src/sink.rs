//! Response sinks
//!
//! The dispatcher never touches a transport directly. It hands every
//! response it decides to write to a [`ResponseSink`]:
//!
//! - [`StreamSink`] serializes onto any `std::io::Write` and flushes. It
//!   never closes the stream; the caller owns it.
//! - [`StatusSink`] additionally reports the envelope's HTTP status hint to
//!   a callback before writing, for transports with a status line.
//! - `Vec<RpcResponseEnvelope>` collects envelopes unserialized, which is
//!   what tests and in-process callers usually want.
//!
//! # Examples
//!
//! ```rust
//! use jrex_server::{ResponseSink, StatusSink};
//! use jrex_core::{Id, RpcResponseEnvelope, StandardError};
//!
//! let mut status = 0;
//! let mut body = Vec::new();
//! {
//!     let mut sink = StatusSink::new(&mut body, |code| status = code);
//!     let envelope = RpcResponseEnvelope::standard_error("2.0", Some(Id::Int(1)), StandardError::MethodNotFound);
//!     sink.write_response(&envelope).unwrap();
//! }
//! assert_eq!(status, 404);
//! assert!(String::from_utf8(body).unwrap().contains("-32601"));
//! ```

use jrex_core::RpcResponseEnvelope;
use std::io::{self, Write};

/// Content type for JSON-RPC response bodies
pub const JSONRPC_CONTENT_TYPE: &str = "application/json-rpc";

/// Destination for response envelopes
pub trait ResponseSink {
    /// Write one response
    fn write_response(&mut self, response: &RpcResponseEnvelope) -> io::Result<()>;
}

impl<T: ResponseSink + ?Sized> ResponseSink for &mut T {
    fn write_response(&mut self, response: &RpcResponseEnvelope) -> io::Result<()> {
        (**self).write_response(response)
    }
}

impl ResponseSink for Vec<RpcResponseEnvelope> {
    fn write_response(&mut self, response: &RpcResponseEnvelope) -> io::Result<()> {
        self.push(response.clone());
        Ok(())
    }
}

/// Writes serialized responses to a byte stream
#[derive(Debug)]
pub struct StreamSink<W> {
    writer: W,
}

impl<W: Write> StreamSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResponseSink for StreamSink<W> {
    fn write_response(&mut self, response: &RpcResponseEnvelope) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, response)?;
        self.writer.flush()
    }
}

/// Writes serialized responses and reports their HTTP status first
pub struct StatusSink<W, F> {
    inner: StreamSink<W>,
    set_status: F,
}

impl<W: Write, F: FnMut(u16)> StatusSink<W, F> {
    /// Wrap a writer and a status callback
    pub fn new(writer: W, set_status: F) -> Self {
        Self {
            inner: StreamSink::new(writer),
            set_status,
        }
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W: Write, F: FnMut(u16)> ResponseSink for StatusSink<W, F> {
    fn write_response(&mut self, response: &RpcResponseEnvelope) -> io::Result<()> {
        (self.set_status)(response.http_status);
        self.inner.write_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jrex_core::Id;
    use serde_json::json;

    #[test]
    fn test_stream_sink_writes_document() {
        let mut sink = StreamSink::new(Vec::new());
        let envelope = RpcResponseEnvelope::success("2.0", Some(Id::String("a".into())), json!(true));
        sink.write_response(&envelope).unwrap();
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            r#"{"jsonrpc":"2.0","id":"a","result":true}"#
        );
    }

    #[test]
    fn test_status_sink_reports_before_writing() {
        let mut statuses = Vec::new();
        let mut sink = StatusSink::new(Vec::new(), |status| statuses.push(status));
        let envelope = RpcResponseEnvelope::success("2.0", Some(Id::Int(1)), json!(null));
        sink.write_response(&envelope).unwrap();
        let body = sink.into_inner();
        assert!(!body.is_empty());
        assert_eq!(statuses, vec![200]);
    }

    #[test]
    fn test_capture_sink() {
        let mut captured: Vec<RpcResponseEnvelope> = Vec::new();
        let envelope = RpcResponseEnvelope::success("2.0", Some(Id::Int(1)), json!(1));
        (&mut captured).write_response(&envelope).unwrap();
        assert_eq!(captured, vec![envelope]);
    }
}
