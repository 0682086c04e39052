//! HTTP/1.1 GET demo logic for the bundled server and client binaries.
//!
//! Deliberately small: request lines are `METHOD SP PATH SP PROTOCOL`,
//! MIME header names are upper-cased and matched case-insensitively, and
//! only `GET` is served. The client side understands `CONTENT-LENGTH`
//! bodies and chunked transfer encoding.

mod client;
mod headers;
mod server;

pub use client::fetch;
pub use server::{serve, serve_connection};
