use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use crate::gate::Interest;
use crate::net::addr::parse_sockaddr;
use crate::net::socket::new_stream_socket;
use crate::Coroutine;

/// A connected IPv4 TCP socket; reads and writes suspend the calling
/// coroutine until the descriptor is ready.
pub struct TcpStream {
    fd: RawFd,
}

impl TcpStream {
    pub(crate) fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Connects to `ip:port`, parking `co` while the handshake is in
    /// flight.
    pub fn connect(co: &Coroutine, addr: &str) -> io::Result<Self> {
        let raw_addr = parse_sockaddr(addr)?;
        let fd = new_stream_socket()?;
        let stream = Self { fd };

        let ret = unsafe {
            libc::connect(
                fd,
                &raw_addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret == 0 {
            return Ok(stream);
        }

        let error = io::Error::last_os_error();
        if error.raw_os_error() != Some(libc::EINPROGRESS) {
            return Err(error);
        }

        // Nonblocking connect: completion is signalled by writability,
        // the verdict lives in SO_ERROR.
        co.wait(fd, Interest::WRITABLE);
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut _ as *mut _,
                &mut len,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        if err != 0 {
            return Err(io::Error::from_raw_os_error(err));
        }
        Ok(stream)
    }

    /// Reads available bytes into `buf`, waiting in `co` for readability.
    /// Returns 0 at end of stream.
    pub fn read(&self, co: &Coroutine, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            co.wait(self.fd, Interest::READABLE);
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::WouldBlock {
                return Err(error);
            }
        }
    }

    /// Writes from `buf`, waiting in `co` for writability. Returns the
    /// number of bytes accepted by the kernel.
    pub fn write(&self, co: &Coroutine, buf: &[u8]) -> io::Result<usize> {
        loop {
            co.wait(self.fd, Interest::WRITABLE);
            let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const _, buf.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::WouldBlock {
                return Err(error);
            }
        }
    }

    /// Writes the whole buffer, suspending between partial writes.
    pub fn write_all(&self, co: &Coroutine, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let n = self.write(co, buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
