//! User-triggerable event objects.
//!
//! Every coroutine owns one event descriptor, and the machine owns one more
//! for its interrupt. Firing makes the descriptor readable from any context;
//! clearing consumes the readiness. On Linux this is an `eventfd`, on macOS
//! a `kqueue` carrying a single `EVFILT_USER` event.

use std::io;
use std::os::unix::io::RawFd;

pub(crate) struct EventFd {
    fd: RawFd,
}

#[cfg(target_os = "linux")]
impl EventFd {
    pub(crate) fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    pub(crate) fn fire(&self) {
        let val: u64 = 1;
        unsafe {
            libc::write(self.fd, &val as *const u64 as *const _, 8);
        }
    }

    pub(crate) fn clear(&self) {
        let mut val: u64 = 0;
        // Nonblocking read; EAGAIN when the event was never fired.
        unsafe {
            libc::read(self.fd, &mut val as *mut u64 as *mut _, 8);
        }
    }
}

#[cfg(target_os = "macos")]
impl EventFd {
    const IDENT: usize = 1;

    pub(crate) fn new() -> io::Result<Self> {
        let fd = unsafe { libc::kqueue() };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    pub(crate) fn fire(&self) {
        self.apply(libc::EV_ADD, libc::NOTE_TRIGGER);
    }

    pub(crate) fn clear(&self) {
        self.apply(libc::EV_DELETE, 0);
    }

    fn apply(&self, flags: u16, fflags: u32) {
        let event = libc::kevent {
            ident: Self::IDENT,
            filter: libc::EVFILT_USER,
            flags,
            fflags,
            data: 0,
            udata: std::ptr::null_mut(),
        };
        unsafe {
            libc::kevent(self.fd, &event, 1, std::ptr::null_mut(), 0, std::ptr::null());
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
compile_error!("corofd needs eventfd or kqueue user events on this platform");

impl EventFd {
    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for EventFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
