use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use crate::gate::Interest;
use crate::net::addr::{parse_sockaddr, sockaddr_to_socketaddr};
use crate::net::socket::{new_stream_socket, set_nonblocking};
use crate::net::tcp_stream::TcpStream;
use crate::Coroutine;

/// A listening IPv4 TCP socket whose `accept` suspends the calling
/// coroutine until a connection arrives.
pub struct TcpListener {
    fd: RawFd,
}

impl TcpListener {
    /// Binds to `ip:port` and starts listening. Pass port 0 for an
    /// ephemeral port and read it back with [`local_addr`].
    ///
    /// [`local_addr`]: TcpListener::local_addr
    pub fn bind(addr: &str) -> io::Result<Self> {
        let raw_addr = parse_sockaddr(addr)?;
        let fd = new_stream_socket()?;

        let reuse: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const _ as *const _,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }

        let ret = unsafe {
            libc::bind(
                fd,
                &raw_addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            let error = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(error);
        }

        let ret = unsafe { libc::listen(fd, 128) };
        if ret < 0 {
            let error = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(error);
        }

        Ok(Self { fd })
    }

    /// Waits in `co` for an incoming connection and returns the accepted
    /// stream with the peer address.
    pub fn accept(&self, co: &Coroutine) -> io::Result<(TcpStream, SocketAddr)> {
        loop {
            co.wait(self.fd, Interest::READABLE);

            let mut raw_addr: libc::sockaddr_in = unsafe { mem::zeroed() };
            let mut addr_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let client = unsafe {
                libc::accept(
                    self.fd,
                    &mut raw_addr as *mut _ as *mut libc::sockaddr,
                    &mut addr_len,
                )
            };
            if client >= 0 {
                set_nonblocking(client);
                return Ok((TcpStream::from_raw(client), sockaddr_to_socketaddr(&raw_addr)));
            }

            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::WouldBlock {
                return Err(error);
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut raw_addr: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockname(
                self.fd,
                &mut raw_addr as *mut _ as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sockaddr_to_socketaddr(&raw_addr))
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
