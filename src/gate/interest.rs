use libc::c_short;

bitflags::bitflags! {
    /// Readiness interest and delivered-event mask over the host `poll(2)`
    /// flag set.
    ///
    /// A coroutine passes an `Interest` to [`wait`] to say which directions
    /// it cares about, and receives back the revents the poller actually
    /// reported. `ERROR` and `HANGUP` are delivered even when not requested,
    /// matching `poll` semantics.
    ///
    /// [`wait`]: crate::Coroutine::wait
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Interest: c_short {
        /// Descriptor is readable (`POLLIN`).
        const READABLE = libc::POLLIN;
        /// Descriptor is writable (`POLLOUT`).
        const WRITABLE = libc::POLLOUT;
        /// Error condition on the descriptor (`POLLERR`).
        const ERROR = libc::POLLERR;
        /// Peer hung up (`POLLHUP`). Delivered to the waiting coroutine,
        /// which decides what to do with the descriptor.
        const HANGUP = libc::POLLHUP;
    }
}

impl Interest {
    /// Wraps raw revents from the poller, keeping any host-specific bits.
    pub(crate) fn from_revents(raw: c_short) -> Self {
        Self::from_bits_retain(raw)
    }
}
