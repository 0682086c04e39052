use std::cell::Cell;
use std::ptr;

use crate::machine::core::MachineCore;

thread_local! {
    /// Thread-local pointer to the machine currently inside `run`.
    ///
    /// Set for the duration of the run loop; the coroutine entry trampoline
    /// reads it to find the coroutine being started.
    static CURRENT_MACHINE: Cell<*const MachineCore> = const { Cell::new(ptr::null()) };
}

pub(crate) fn set_current_machine(machine: *const MachineCore) {
    CURRENT_MACHINE.with(|cell| cell.set(machine));
}

pub(crate) fn current_machine() -> *const MachineCore {
    CURRENT_MACHINE.with(|cell| cell.get())
}

pub(crate) fn with_current_machine<R>(f: impl FnOnce(&MachineCore) -> R) -> Option<R> {
    let ptr = current_machine();
    if ptr.is_null() {
        None
    } else {
        Some(f(unsafe { &*ptr }))
    }
}
