use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use crate::gate::Interest;
use crate::http::headers::{header_end, parse_header_block};
use crate::net::{TcpListener, TcpStream};
use crate::{Coroutine, CoroutineBuilder};

/// Stack size for connection-handling coroutines; request parsing and
/// response formatting need more headroom than the runtime default.
const CONNECTION_STACK_SIZE: usize = 64 * 1024;

/// Accept loop body: waits for connections and hands each one to a
/// dedicated coroutine. Runs until `accept` fails.
pub fn serve(co: &Coroutine, listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept(co) {
            Ok(accepted) => accepted,
            Err(error) => {
                log::warn!("accept failed: {error}");
                return;
            }
        };
        log::debug!("connection from {peer}");

        let machine = co.machine();
        let handler = CoroutineBuilder::new()
            .stack_size(CONNECTION_STACK_SIZE)
            .spawn(&machine, move |co| serve_connection(co, stream));
        match handler {
            Ok(handler) => handler.start(),
            Err(error) => log::warn!("could not spawn connection handler: {error}"),
        }
    }
}

/// Handles one HTTP/1.1 connection: reads the request, answers a `GET`
/// with the file at the requested path, and closes.
pub fn serve_connection(co: &Coroutine, stream: TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = match stream.read(co, &mut chunk) {
            Ok(n) => n,
            Err(error) => {
                log::warn!("request read failed: {error}");
                return;
            }
        };
        if n == 0 {
            // EOF before the headers finished.
            return;
        }
        request.extend_from_slice(&chunk[..n]);
        if header_end(&request).is_some() {
            break;
        }
    }

    let Some(block) = parse_header_block(&request) else {
        return;
    };
    if block.start_line.len() < 3 {
        return;
    }
    let method = &block.start_line[0];
    let path = &block.start_line[1];
    let protocol = &block.start_line[2];
    let host = block
        .fields
        .get("HOST")
        .map(String::as_str)
        .unwrap_or("unknown");
    log::info!("{}: {} for {} from {}", co.name(), method, path, host);

    let outcome = if method == "GET" {
        send_file(co, &stream, path, protocol)
    } else {
        stream.write_all(
            co,
            format!("{protocol} 400 Invalid request method\r\n\r\n").as_bytes(),
        )
    };
    if let Err(error) = outcome {
        log::warn!("response failed: {error}");
    }
}

struct FileFd(RawFd);

impl Drop for FileFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

fn send_file(co: &Coroutine, stream: &TcpStream, path: &str, protocol: &str) -> io::Result<()> {
    let not_found = || format!("{protocol} 404 Not Found\r\n\r\n");

    let Ok(c_path) = CString::new(path) else {
        return stream.write_all(co, not_found().as_bytes());
    };
    let mut st: libc::stat = unsafe { mem::zeroed() };
    if unsafe { libc::stat(c_path.as_ptr(), &mut st) } < 0 {
        return stream.write_all(co, not_found().as_bytes());
    }
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return stream.write_all(co, not_found().as_bytes());
    }
    let file = FileFd(fd);

    let header = format!(
        "{protocol} 200 OK\r\nContent-type: text/html\r\nContent-length: {}\r\n\r\n",
        st.st_size
    );
    stream.write_all(co, header.as_bytes())?;

    let mut chunk = [0u8; 1024];
    loop {
        co.wait(file.0, Interest::READABLE);
        let n = unsafe { libc::read(file.0, chunk.as_mut_ptr() as *mut _, chunk.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if n == 0 {
            return Ok(());
        }
        stream.write_all(co, &chunk[..n as usize])?;
    }
}
