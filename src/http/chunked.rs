//! Chunked transfer coding.
//!
//! Decoding strips all chunk framing and yields the concatenated payload.
//! Encoding re-slices the payload into chunks of at most [`CHUNK_SIZE`]
//! bytes; incoming chunk boundaries are not preserved.

use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::codec::{read_line, CodecError};

/// Largest chunk written when re-encoding a body.
pub const CHUNK_SIZE: usize = 4000;

/// Read a chunked body up to and including the terminating empty line.
///
/// Chunk extensions (`;name=value`) are ignored and trailer fields are
/// consumed and discarded.
pub async fn read_chunked_body<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();

    loop {
        let line = read_line(reader).await?;
        let size = parse_chunk_size(&line)?;
        if size == 0 {
            skip_trailers(reader).await?;
            return Ok(body);
        }

        let start = body.len();
        (&mut *reader).take(size as u64).read_to_end(&mut body).await?;
        if body.len() - start != size {
            return Err(CodecError::Protocol(format!(
                "chunk truncated: expected {} bytes, got {}",
                size,
                body.len() - start
            )));
        }

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await?;
        if crlf != *b"\r\n" {
            return Err(CodecError::Protocol("chunk data not followed by CRLF".into()));
        }
    }
}

/// Write `body` as a chunked payload followed by the zero-size chunk and
/// the terminating empty line.
pub async fn write_chunked_body<W>(writer: &mut W, body: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    for slice in body.chunks(CHUNK_SIZE) {
        writer.write_all(format!("{:x}\r\n", slice.len()).as_bytes()).await?;
        writer.write_all(slice).await?;
        writer.write_all(b"\r\n").await?;
    }
    writer.write_all(b"0\r\n\r\n").await?;
    Ok(())
}

fn parse_chunk_size(line: &str) -> Result<usize, CodecError> {
    let digits = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16)
        .map_err(|_| CodecError::Protocol(format!("invalid chunk size line: {:?}", line)))
}

async fn skip_trailers<R>(reader: &mut R) -> Result<(), CodecError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_line(reader).await {
            Ok(line) if line.is_empty() => return Ok(()),
            Ok(trailer) => tracing::trace!(trailer = %trailer, "Discarding chunked trailer"),
            // Peer closed right after the last chunk.
            Err(CodecError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_and_strips_framing() {
        let mut wire: &[u8] = b"4\r\nWiki\r\n5;ext=1\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n";
        let body = read_chunked_body(&mut wire).await.unwrap();
        assert_eq!(body, b"Wikipedia in\r\n\r\nchunks.");
        assert!(wire.is_empty());
    }

    #[tokio::test]
    async fn consumes_trailers() {
        let mut wire: &[u8] = b"3\r\nabc\r\n0\r\nExpires: never\r\n\r\nleftover";
        let body = read_chunked_body(&mut wire).await.unwrap();
        assert_eq!(body, b"abc");
        assert_eq!(wire, b"leftover");
    }

    #[tokio::test]
    async fn rejects_bad_size_line() {
        let mut wire: &[u8] = b"zz\r\nabc\r\n0\r\n\r\n";
        let err = read_chunked_body(&mut wire).await.unwrap_err();
        assert!(matches!(err, CodecError::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_missing_chunk_crlf() {
        let mut wire: &[u8] = b"3\r\nabcXY0\r\n\r\n";
        let err = read_chunked_body(&mut wire).await.unwrap_err();
        assert!(matches!(err, CodecError::Protocol(_)));
    }

    #[tokio::test]
    async fn rechunks_at_most_chunk_size() {
        let body = vec![b'x'; CHUNK_SIZE * 2 + 10];
        let mut wire = Vec::new();
        write_chunked_body(&mut wire, &body).await.unwrap();

        let text = String::from_utf8(wire.clone()).unwrap();
        assert!(text.starts_with("fa0\r\n"));
        assert!(text.ends_with("a\r\nxxxxxxxxxx\r\n0\r\n\r\n"));

        let decoded = read_chunked_body(&mut wire.as_slice()).await.unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn reencoding_preserves_payload_not_boundaries() {
        let mut encoded: &[u8] = b"1\r\na\r\n2\r\nbc\r\n3\r\ndef\r\n0\r\n\r\n";
        let first = read_chunked_body(&mut encoded).await.unwrap();

        let mut wire = Vec::new();
        write_chunked_body(&mut wire, &first).await.unwrap();
        assert_eq!(wire, b"6\r\nabcdef\r\n0\r\n\r\n");

        let second = read_chunked_body(&mut wire.as_slice()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_body_is_terminator_only() {
        let mut wire = Vec::new();
        write_chunked_body(&mut wire, b"").await.unwrap();
        assert_eq!(wire, b"0\r\n\r\n");
    }
}
