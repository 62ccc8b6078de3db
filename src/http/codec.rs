//! Reading and writing whole HTTP/1.x messages.
//!
//! # Wire handling
//! - Start line and headers are CRLF-terminated lines (a bare LF is tolerated)
//! - Header lines starting with `proxy` (any case) are dropped on read
//! - Body framing: `content-length` first, then `transfer-encoding: chunked`;
//!   any other transfer coding is rejected with [`CodecError::UnsupportedEncoding`]
//! - Writing emits headers in `header_order` and re-frames the body from
//!   the current headers

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::chunked::{read_chunked_body, write_chunked_body};
use crate::http::message::{BodyFraming, Message, MessageKind};

/// Longest accepted start, header or chunk-size line, in bytes.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors produced while reading or writing a message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed start line, header line or chunk framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A `transfer-encoding` other than `chunked`; the body was not read.
    #[error("unsupported transfer-encoding: {0}")]
    UnsupportedEncoding(String),

    /// The peer closed the connection before a message started.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one message (start line, headers, body) from `reader`.
pub async fn read_message<R>(reader: &mut R, kind: MessageKind) -> Result<Message, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let start_line = read_line(reader).await?;
    let mut message = Message::new(kind, start_line);
    if message.decoded_start_line().is_none() {
        return Err(CodecError::Protocol(format!(
            "malformed {} line: {:?}",
            match kind {
                MessageKind::Request => "request",
                MessageKind::Response => "status",
            },
            message.start_line()
        )));
    }

    read_headers(reader, &mut message).await?;
    read_body(reader, &mut message).await?;
    message.decode_structured_body();

    tracing::trace!(
        start_line = %message.start_line(),
        headers = message.header_order().len(),
        body_len = message.body().len(),
        "Message read"
    );
    Ok(message)
}

/// Serialize `message` to `writer` and flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut head = String::with_capacity(256);
    head.push_str(message.start_line());
    head.push_str("\r\n");
    for (name, value) in message.headers() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    writer.write_all(head.as_bytes()).await?;

    match message.framing() {
        BodyFraming::ContentLength => writer.write_all(message.body()).await?,
        BodyFraming::Chunked => write_chunked_body(writer, message.body()).await?,
        BodyFraming::None => {
            if !message.body().is_empty() {
                tracing::debug!(
                    body_len = message.body().len(),
                    "Body dropped: message has no framing header"
                );
            }
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Read one line, stripping the line terminator.
pub(crate) async fn read_line<R>(reader: &mut R) -> Result<String, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_LENGTH as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Err(CodecError::ConnectionClosed);
    }
    if buf.last() != Some(&b'\n') {
        return Err(if read >= MAX_LINE_LENGTH {
            CodecError::Protocol(format!("line exceeds {} bytes", MAX_LINE_LENGTH))
        } else {
            CodecError::Protocol("connection closed mid-line".into())
        });
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| CodecError::Protocol("line is not valid UTF-8".into()))
}

/// Whether a header line is stripped before forwarding.
pub fn is_filtered_header(line: &str) -> bool {
    line.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("proxy"))
}

async fn read_headers<R>(reader: &mut R, message: &mut Message) -> Result<(), CodecError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = read_line(reader).await?;
        if line.trim().is_empty() {
            return Ok(());
        }
        if is_filtered_header(&line) {
            tracing::trace!(header = %line, "Dropping proxy header");
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CodecError::Protocol(format!("malformed header line: {:?}", line)))?;
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(CodecError::Protocol(format!("invalid header name: {:?}", name)));
        }
        message.append_received_header(name, value.trim());
    }
}

async fn read_body<R>(reader: &mut R, message: &mut Message) -> Result<(), CodecError>
where
    R: AsyncBufRead + Unpin,
{
    match message.framing() {
        BodyFraming::ContentLength => {
            let raw = message.header("content-length").unwrap_or_default();
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| CodecError::Protocol(format!("invalid content-length: {:?}", raw)))?;

            let mut body = Vec::new();
            (&mut *reader).take(len as u64).read_to_end(&mut body).await?;
            if body.len() != len {
                return Err(CodecError::Protocol(format!(
                    "body truncated: expected {} bytes, got {}",
                    len,
                    body.len()
                )));
            }
            *message.body_mut() = body;
        }
        BodyFraming::Chunked => {
            *message.body_mut() = read_chunked_body(reader).await?;
        }
        BodyFraming::None => {
            if let Some(encoding) = message.header("transfer-encoding") {
                return Err(CodecError::UnsupportedEncoding(encoding.to_string()));
            }
        }
    }
    Ok(())
}
