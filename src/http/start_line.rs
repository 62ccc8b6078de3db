//! Request-line and status-line decoding.
//!
//! # Accepted forms
//! ```text
//! request:  VERB SP target SP HTTP/1.x
//! response: HTTP/1.x SP 3DIGIT SP reason
//! ```
//! The reason phrase may contain spaces and may be empty.

use std::fmt;

/// Decoded `VERB path HTTP/1.x` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub verb: String,
    pub path: String,
    pub version: String,
}

impl RequestLine {
    /// Decode a request line, returning `None` if it does not match the form.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(' ');
        let verb = parts.next()?;
        let path = parts.next()?;
        let version = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        if verb.is_empty() || !verb.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        if path.is_empty() {
            return None;
        }
        if !is_http1_version(version) {
            return None;
        }

        Some(Self {
            verb: verb.to_string(),
            path: path.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.verb, self.path, self.version)
    }
}

/// Decoded `HTTP/1.x CODE REASON` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    /// Decode a status line, returning `None` if it does not match the form.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next()?;
        let code = parts.next()?;
        let reason = parts.next().unwrap_or("");

        if !is_http1_version(version) {
            return None;
        }
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            version: version.to_string(),
            code: code.parse().ok()?,
            reason: reason.to_string(),
        })
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}

/// Structured view of a message's first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request(RequestLine),
    Status(StatusLine),
}

fn is_http1_version(version: &str) -> bool {
    match version.strip_prefix("HTTP/1.") {
        Some(minor) => minor.len() == 1 && minor.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_decodes() {
        let line = RequestLine::parse("GET /x?y=1 HTTP/1.1").unwrap();
        assert_eq!(line.verb, "GET");
        assert_eq!(line.path, "/x?y=1");
        assert_eq!(line.version, "HTTP/1.1");
        assert_eq!(line.to_string(), "GET /x?y=1 HTTP/1.1");
    }

    #[test]
    fn request_line_rejects_garbage() {
        assert!(RequestLine::parse("GET /x").is_none());
        assert!(RequestLine::parse("GET /x HTTP/2.0").is_none());
        assert!(RequestLine::parse("GET /x HTTP/1.1 extra").is_none());
        assert!(RequestLine::parse("G:T /x HTTP/1.1").is_none());
        assert!(RequestLine::parse("").is_none());
    }

    #[test]
    fn status_line_keeps_multi_word_reason() {
        let line = StatusLine::parse("HTTP/1.1 503 Service Unavailable").unwrap();
        assert_eq!(line.code, 503);
        assert_eq!(line.reason, "Service Unavailable");
    }

    #[test]
    fn status_line_allows_empty_reason() {
        let line = StatusLine::parse("HTTP/1.0 204").unwrap();
        assert_eq!(line.code, 204);
        assert_eq!(line.reason, "");
    }

    #[test]
    fn status_line_rejects_bad_code() {
        assert!(StatusLine::parse("HTTP/1.1 2000 OK").is_none());
        assert!(StatusLine::parse("HTTP/1.1 abc OK").is_none());
        assert!(StatusLine::parse("HTTPS/1.1 200 OK").is_none());
    }
}
