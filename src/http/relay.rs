//! Bidirectional byte relay between client and backend connections.
//!
//! # Responsibilities
//! - Forward a request head and body to the chosen backend
//! - Forward the backend's response head and body back to the client
//! - Preserve `Content-Length` and chunked framing manually on both legs
//!
//! # Design Decisions
//! - No hyper client: this proxy owns the wire bytes end to end, which is
//!   what lets it relay chunked bodies without re-encoding them
//! - Reads and writes happen in bounded chunks (`buffer_bytes` from
//!   `LimitsConfig`), so a slow client or backend applies backpressure all
//!   the way through instead of this task buffering an unbounded body
//! - Chunk extensions are forwarded verbatim; trailers after the last
//!   chunk are copied through unexamined

use crate::http::parser::{
    body_framing, find_head_end, parse_response_head, BodyFraming, ResponseHead,
};
use crate::security::headers::strip_hop_by_hop;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("backend connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed upstream response: {0}")]
    MalformedResponse(#[from] crate::http::parser::ParseError),
    #[error("backend closed the connection before sending a response")]
    BackendClosed,
}

/// Relay a request body of known framing from `src` to `dst`.
pub async fn relay_body<R, W>(src: &mut R, dst: &mut W, framing: BodyFraming, buffer_bytes: usize) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match framing {
        BodyFraming::None => Ok(()),
        BodyFraming::ContentLength(len) => relay_fixed_length(src, dst, len, buffer_bytes).await,
        BodyFraming::Chunked => relay_chunked(src, dst, buffer_bytes).await,
    }
}

async fn relay_fixed_length<R, W>(src: &mut R, dst: &mut W, len: usize, buffer_bytes: usize) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = len;
    let mut buf = vec![0u8; buffer_bytes.min(len.max(1))];
    while remaining > 0 {
        let to_read = remaining.min(buf.len());
        let read = src.read(&mut buf[..to_read]).await?;
        if read == 0 {
            return Err(RelayError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed connection mid-body",
            )));
        }
        dst.write_all(&buf[..read]).await?;
        remaining -= read;
    }
    dst.flush().await?;
    Ok(())
}

async fn relay_chunked<R, W>(src: &mut R, dst: &mut W, buffer_bytes: usize) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let mut size_line = String::new();
        src.read_line(&mut size_line).await?;
        dst.write_all(size_line.as_bytes()).await?;

        let size_str = size_line.trim_end().split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| RelayError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad chunk size")))?;

        if chunk_size == 0 {
            // Trailer section: copy lines verbatim until the blank terminator.
            loop {
                let mut trailer_line = String::new();
                src.read_line(&mut trailer_line).await?;
                dst.write_all(trailer_line.as_bytes()).await?;
                if trailer_line == "\r\n" {
                    break;
                }
            }
            dst.flush().await?;
            return Ok(());
        }

        relay_fixed_length(src, dst, chunk_size, buffer_bytes).await?;

        // Trailing CRLF after chunk data.
        let mut crlf = [0u8; 2];
        src.read_exact(&mut crlf).await?;
        dst.write_all(&crlf).await?;
    }
}

/// Read a complete response head from `src` into a fresh buffer, growing it
/// until the `\r\n\r\n` terminator appears.
pub async fn read_response_head<R>(src: &mut R) -> Result<(ResponseHead, Vec<u8>), RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find_head_end(&buf) {
            let head = parse_response_head(&buf, end)?;
            let leftover = buf.split_off(end);
            return Ok((head, leftover));
        }
        let read = src.read(&mut chunk).await?;
        if read == 0 {
            return Err(RelayError::BackendClosed);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

/// Serialize a response head for forwarding, after stripping hop-by-hop
/// headers the way the request side already does.
pub fn serialize_response_head(head: &ResponseHead) -> Vec<u8> {
    let mut headers = head.headers.clone();
    strip_hop_by_hop(&mut headers);

    let mut out = Vec::with_capacity(128);
    out.extend_from_slice(
        format!("{} {} {}\r\n", head.version.as_str(), head.status, head.reason).as_bytes(),
    );
    for (name, value) in &headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out
}

pub fn response_body_framing(head: &ResponseHead) -> BodyFraming {
    // 1xx/204/304 and HEAD responses never carry a body; the driver tracks
    // the request method and skips relaying in that case.
    body_framing(&head.headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn relays_fixed_length_body() {
        let mut src = BufReader::new(&b"hello"[..]);
        let mut dst = Vec::new();
        relay_body(&mut src, &mut dst, BodyFraming::ContentLength(5), 64)
            .await
            .unwrap();
        assert_eq!(dst, b"hello");
    }

    #[tokio::test]
    async fn relays_chunked_body_verbatim() {
        let input = b"5\r\nhello\r\n0\r\n\r\n";
        let mut src = BufReader::new(&input[..]);
        let mut dst = Vec::new();
        relay_body(&mut src, &mut dst, BodyFraming::Chunked, 64).await.unwrap();
        assert_eq!(dst, input);
    }

    #[tokio::test]
    async fn reads_response_head_and_keeps_leftover_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi";
        let mut src = &raw[..];
        let (head, leftover) = read_response_head(&mut src).await.unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(leftover, b"hi");
    }
}
