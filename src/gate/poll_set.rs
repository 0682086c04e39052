use std::io;
use std::os::unix::io::RawFd;

use crate::gate::Interest;

/// The readiness gate: an ordered set of `(descriptor, interest)` entries
/// handed to `poll(2)` in one blocking call.
///
/// The backing array is rebuilt every scheduling round but only ever grows,
/// so steady-state rounds allocate nothing.
pub(crate) struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub(crate) fn new() -> Self {
        Self { fds: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.fds.clear();
    }

    pub(crate) fn push(&mut self, fd: RawFd, events: Interest) {
        self.fds.push(libc::pollfd {
            fd,
            events: events.bits(),
            revents: 0,
        });
    }

    /// Blocks until at least one entry reports readiness.
    ///
    /// Returns the number of entries with nonzero revents. A signal
    /// interruption counts as an empty round, not an error.
    pub(crate) fn poll(&mut self) -> io::Result<usize> {
        let n = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                -1,
            )
        };
        if n < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(error);
        }
        Ok(n as usize)
    }

    pub(crate) fn revents(&self, index: usize) -> Interest {
        Interest::from_revents(self.fds[index].revents)
    }
}
