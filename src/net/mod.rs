//! Coroutine-blocking TCP primitives.
//!
//! This module provides non-blocking TCP sockets whose operations suspend
//! the calling coroutine instead of the thread:
//! - [`TcpListener`] for accepting connections
//! - [`TcpStream`] for connecting, reading and writing data
//!
//! Every operation takes the handle of the coroutine it runs in and parks
//! it with [`Coroutine::wait`] until the descriptor is ready. IPv4 only,
//! matching the wire surface of the bundled demos.
//!
//! # Example
//!
//! ```ignore
//! use corofd::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:8080").unwrap();
//! machine.spawn(move |co| {
//!     loop {
//!         let (stream, addr) = listener.accept(co).unwrap();
//!         println!("new connection from {}", addr);
//!     }
//! });
//! ```
//!
//! [`Coroutine::wait`]: crate::Coroutine::wait

mod addr;
mod socket;
mod tcp_listener;
mod tcp_stream;

pub use tcp_listener::TcpListener;
pub use tcp_stream::TcpStream;
