//! Construction-time error types.

use std::io;

use thiserror::Error;

/// Errors surfaced while building a machine or a coroutine.
///
/// The runtime itself is infallible once constructed; descriptor-level
/// conditions observed during a `wait` are delivered to the waiting
/// coroutine as revents, not as errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A coroutine was requested with a zero-byte stack.
    #[error("coroutine stack size must be nonzero")]
    ZeroStackSize,

    /// The coroutine stack could not be allocated.
    #[error("coroutine stack allocation failed")]
    StackAlloc,

    /// The per-coroutine or interrupt event descriptor could not be created.
    #[error("failed to create event descriptor")]
    Event(#[source] io::Error),
}
