use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Parses an `ip:port` string into a `sockaddr_in`.
pub(crate) fn parse_sockaddr(addr: &str) -> io::Result<libc::sockaddr_in> {
    let parsed: SocketAddrV4 = addr
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "expected an IPv4 ip:port"))?;
    Ok(socketaddr_to_sockaddr(&parsed))
}

pub(crate) fn socketaddr_to_sockaddr(addr: &SocketAddrV4) -> libc::sockaddr_in {
    let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };
    raw.sin_family = libc::AF_INET as libc::sa_family_t;
    raw.sin_port = addr.port().to_be();
    raw.sin_addr.s_addr = u32::from(*addr.ip()).to_be();
    raw
}

pub(crate) fn sockaddr_to_socketaddr(raw: &libc::sockaddr_in) -> SocketAddr {
    let ip = Ipv4Addr::from(u32::from_be(raw.sin_addr.s_addr));
    let port = u16::from_be(raw.sin_port);
    SocketAddr::V4(SocketAddrV4::new(ip, port))
}
