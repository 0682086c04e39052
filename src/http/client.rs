use std::io::{self, Write};

use crate::http::headers::{header_end, parse_header_block};
use crate::net::TcpStream;
use crate::Coroutine;

/// Fetches `path` from the HTTP server at `addr` (an `ip:port` string) and
/// streams the response body into `out`.
///
/// `host` goes into the `Host` header. Bodies framed by `CONTENT-LENGTH`
/// and by chunked transfer encoding are both understood.
pub fn fetch(
    co: &Coroutine,
    host: &str,
    addr: &str,
    path: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    let stream = TcpStream::connect(co, addr)?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\n\r\n");
    stream.write_all(co, request.as_bytes())?;

    // Read until the blank line terminating the response headers; body
    // bytes received along the way stay in the buffer.
    let mut buf = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = stream.read(co, &mut chunk)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the response headers finished",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if header_end(&buf).is_some() {
            break;
        }
    }

    let block = parse_header_block(&buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed response header"))?;
    if block.start_line.len() < 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "malformed status line",
        ));
    }
    if block.start_line[1] != "200" {
        return Err(io::Error::other(format!(
            "server answered: {}",
            block.start_line[1..].join(" ")
        )));
    }

    let pos = block.body_start;
    let chunked = block
        .fields
        .get("TRANSFER-ENCODING")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    if chunked {
        return read_chunked(co, &stream, &mut buf, pos, out);
    }
    match block.fields.get("CONTENT-LENGTH") {
        Some(value) => {
            let length: usize = value.parse().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "bad CONTENT-LENGTH value")
            })?;
            read_contents(co, &stream, &mut buf, pos, length, Some(out))?;
            Ok(())
        }
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "no CONTENT-LENGTH header and not chunked",
        )),
    }
}

/// Consumes `length` body bytes, refilling the buffer from the stream as
/// needed; writes them to `out` when given. Returns the new buffer offset.
fn read_contents(
    co: &Coroutine,
    stream: &TcpStream,
    buf: &mut Vec<u8>,
    mut pos: usize,
    mut length: usize,
    mut out: Option<&mut dyn Write>,
) -> io::Result<usize> {
    while length > 0 {
        if pos < buf.len() {
            let n = (buf.len() - pos).min(length);
            if let Some(out) = out.as_deref_mut() {
                out.write_all(&buf[pos..pos + n])?;
            }
            pos += n;
            length -= n;
        } else {
            buf.clear();
            pos = 0;
            let mut chunk = [0u8; 256];
            let n = stream.read(co, &mut chunk)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
    Ok(pos)
}

/// Parses one hex chunk-length line, leaving the offset just past its CRLF.
fn read_chunk_length(
    co: &Coroutine,
    stream: &TcpStream,
    buf: &mut Vec<u8>,
    mut pos: usize,
    length: &mut usize,
) -> io::Result<usize> {
    loop {
        if pos >= buf.len() {
            buf.clear();
            pos = 0;
            let mut chunk = [0u8; 256];
            let n = stream.read(co, &mut chunk)?;
            if n == 0 {
                return Ok(pos);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let ch = buf[pos];
        pos += 1;
        if ch == b'\r' {
            pos += 1; // skip the LF
            return Ok(pos);
        }
        let digit = (ch as char).to_digit(16).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "bad chunk length digit")
        })?;
        *length = (*length << 4) | digit as usize;
    }
}

/// Streams a chunked body: hex length line, chunk bytes, trailing CRLF,
/// terminated by a zero-length chunk.
fn read_chunked(
    co: &Coroutine,
    stream: &TcpStream,
    buf: &mut Vec<u8>,
    mut pos: usize,
    out: &mut dyn Write,
) -> io::Result<()> {
    loop {
        let mut length = 0usize;
        pos = read_chunk_length(co, stream, buf, pos, &mut length)?;
        if length == 0 {
            return Ok(());
        }
        pos = read_contents(co, stream, buf, pos, length, Some(out))?;
        pos = read_contents(co, stream, buf, pos, 2, None)?;
    }
}
