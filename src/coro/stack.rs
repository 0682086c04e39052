use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::Error;

/// Byte alignment of every coroutine stack.
const STACK_ALIGN: usize = 16;

/// A coroutine's private call stack, exclusively owned for the coroutine's
/// lifetime and released when the coroutine object drops.
///
/// The stack grows in the host's native direction; no guard page is placed,
/// so overflow is undefined.
pub(crate) struct CoroStack {
    base: NonNull<u8>,
    layout: Layout,
}

impl CoroStack {
    pub(crate) fn allocate(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::ZeroStackSize);
        }
        // Padding to the alignment guarantees room for the seeded entry
        // slot even for tiny requested sizes.
        let layout = Layout::from_size_align(size, STACK_ALIGN)
            .map_err(|_| Error::StackAlloc)?
            .pad_to_align();
        let base = NonNull::new(unsafe { alloc(layout) }).ok_or(Error::StackAlloc)?;
        Ok(Self { base, layout })
    }

    /// One-past-the-end address, handed to the switch primitive as the
    /// initial stack pointer.
    pub(crate) fn top(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.layout.size()) }
    }

    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for CoroStack {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.base.as_ptr(), self.layout);
        }
    }
}
