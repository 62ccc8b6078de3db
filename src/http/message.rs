//! The mutable HTTP message passed to observers.
//!
//! A `Message` keeps the raw start line, its decoded form, an ordered
//! header list and the de-framed body. Header lookup is by lower-cased
//! name; each header also remembers the spelling it arrived with so an
//! untouched message is forwarded with the same bytes it was received with.

use std::collections::HashMap;

use serde_json::Value;

use crate::http::start_line::{RequestLine, StartLine, StatusLine};

/// Which side of the exchange a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Request,
    Response,
}

/// How a message body is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// `content-length` header present.
    ContentLength,
    /// `transfer-encoding: chunked`.
    Chunked,
    /// No body framing header.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    value: String,
}

/// One HTTP request or response.
#[derive(Debug, Clone, Default)]
pub struct Message {
    kind: MessageKind,
    start_line: String,
    decoded: Option<StartLine>,
    headers: HashMap<String, HeaderEntry>,
    header_order: Vec<String>,
    body: Vec<u8>,
    parsed_body: Option<Value>,
}

impl Message {
    /// Create a message from its raw start line. The line is decoded
    /// according to `kind`; a line that does not decode is kept verbatim.
    pub fn new(kind: MessageKind, start_line: impl Into<String>) -> Self {
        let mut message = Self {
            kind,
            ..Self::default()
        };
        message.set_start_line(start_line);
        message
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Raw request-line or status-line, without the trailing CRLF.
    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    /// Replace the start line and re-decode it.
    pub fn set_start_line(&mut self, line: impl Into<String>) {
        self.start_line = line.into();
        self.decoded = match self.kind {
            MessageKind::Request => RequestLine::parse(&self.start_line).map(StartLine::Request),
            MessageKind::Response => StatusLine::parse(&self.start_line).map(StartLine::Status),
        };
    }

    /// Decoded start line, if it matched the expected form.
    pub fn decoded_start_line(&self) -> Option<&StartLine> {
        self.decoded.as_ref()
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        match &self.decoded {
            Some(StartLine::Request(line)) => Some(line),
            _ => None,
        }
    }

    pub fn status_line(&self) -> Option<&StatusLine> {
        match &self.decoded {
            Some(StartLine::Status(line)) => Some(line),
            _ => None,
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value.as_str())
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Set a header value. An existing header keeps its position and
    /// spelling; a new one is appended using `name` as given.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let key = name.to_ascii_lowercase();
        let value = value.into();
        match self.headers.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.header_order.push(key.clone());
                self.headers.insert(
                    key,
                    HeaderEntry {
                        name: name.to_string(),
                        value,
                    },
                );
            }
        }
    }

    /// Remove a header, returning its value.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = name.to_ascii_lowercase();
        let entry = self.headers.remove(&key)?;
        self.header_order.retain(|k| k != &key);
        Some(entry.value)
    }

    /// Record a header line as received. Repeated names are folded into
    /// the first occurrence with a comma separator, except `set-cookie`:
    /// cookie dates contain commas, so a repeated `set-cookie` replaces the
    /// earlier value instead.
    pub(crate) fn append_received_header(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.headers.get_mut(&key) {
            Some(entry) if key == "set-cookie" => {
                tracing::debug!(dropped = %entry.value, "Repeated set-cookie replaces earlier value");
                entry.value = value.to_string();
            }
            Some(entry) => {
                entry.value.push_str(", ");
                entry.value.push_str(value);
            }
            None => {
                self.header_order.push(key.clone());
                self.headers.insert(
                    key,
                    HeaderEntry {
                        name: name.to_string(),
                        value: value.to_string(),
                    },
                );
            }
        }
    }

    /// Lower-cased header names in wire order.
    pub fn header_order(&self) -> &[String] {
        &self.header_order
    }

    /// Iterate `(name, value)` pairs in wire order, names as spelled on the wire.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.header_order.iter().filter_map(move |key| {
            self.headers
                .get(key)
                .map(|entry| (entry.name.as_str(), entry.value.as_str()))
        })
    }

    /// Body framing selected by header presence. `content-length` wins
    /// over `transfer-encoding` when both are present.
    pub fn framing(&self) -> BodyFraming {
        if self.contains_header("content-length") {
            BodyFraming::ContentLength
        } else if self
            .header("transfer-encoding")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("chunked"))
        {
            BodyFraming::Chunked
        } else {
            BodyFraming::None
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Mutable access to the raw body. Framing headers are left untouched.
    pub fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// Replace the body, keeping an existing `content-length` in step.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        if self.contains_header("content-length") {
            let len = self.body.len().to_string();
            self.set_header("content-length", len);
        }
    }

    /// Structured JSON view of the body, decoded when the message was read
    /// with a JSON content type or last set through [`Message::set_json_body`].
    pub fn json_body(&self) -> Option<&Value> {
        self.parsed_body.as_ref()
    }

    /// Serialize `value` as the new body.
    pub fn set_json_body(&mut self, value: Value) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(&value)?;
        self.set_body(bytes);
        self.parsed_body = Some(value);
        Ok(())
    }

    /// Decode the body as JSON if the content type says it is JSON.
    pub(crate) fn decode_structured_body(&mut self) {
        let is_json = self
            .header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        if !is_json || self.body.is_empty() {
            return;
        }

        match serde_json::from_slice(&self.body) {
            Ok(value) => self.parsed_body = Some(value),
            Err(e) => tracing::debug!(error = %e, "JSON content-type with undecodable body"),
        }
    }
}
