use std::{fmt, io};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const QUIT: &str = "/quit";
pub const NICK: &str = "/nick";
pub const MSG: &str = "/msg";

// Everything on the wire is one line of text terminated by '\n'.
// The server side is free-form, so only client requests are typed.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Quit,
    Nick(String),
    Msg(String),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Quit => f.write_str(QUIT),
            Request::Nick(name) => write!(f, "{NICK} {name}"),
            Request::Msg(text) => write!(f, "{MSG} {text}"),
        }
    }
}

pub async fn write_request<W: AsyncWrite + Unpin>(dst: &mut W, request: &Request) -> io::Result<()> {
    write_line(dst, &request.to_string()).await
}

/// Writes `line` plus a newline and flushes right away so nothing sits in a buffer.
pub async fn write_line<W: AsyncWrite + Unpin>(dst: &mut W, line: &str) -> io::Result<()> {
    let mut frame = Vec::with_capacity(line.len() + 1);
    frame.extend_from_slice(line.as_bytes());
    frame.push(b'\n');

    dst.write_all(&frame).await?;
    dst.flush().await
}

/// Reads one line and returns its raw bytes without the `\n` / `\r\n` terminator.
///
/// `Ok(None)` means the peer closed the stream. A final line with no terminator
/// is still returned. Bytes are not decoded, so non UTF-8 input survives as-is.
pub async fn read_line<R: AsyncBufRead + Unpin>(src: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if src.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}
