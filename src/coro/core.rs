//! The coroutine object: a task with its own call stack, an event
//! descriptor for wakeups, and the suspension operations user bodies call.

use std::any::Any;
use std::cell::{Cell, RefCell, UnsafeCell};
use std::fmt;
use std::mem;
use std::os::unix::io::RawFd;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::{Rc, Weak};

use crate::coro::stack::CoroStack;
use crate::coro::switch::{self, prepare, switch_context, SwitchContext};
use crate::error::Error;
use crate::gate::{EventFd, Interest};
use crate::machine::context::with_current_machine;
use crate::machine::core::MachineCore;
use crate::machine::Machine;

/// Default coroutine stack size in bytes.
pub const DEFAULT_STACK_SIZE: usize = 8192;

/// A coroutine body, invoked exactly once with a handle to its own
/// coroutine.
pub(crate) type CoroutineBody = Box<dyn FnOnce(&Coroutine) + 'static>;

/// Lifecycle state of a coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Constructed, not yet started.
    New,
    /// Started, runnable at the next scheduling round.
    Ready,
    /// Currently executing user code.
    Running,
    /// Suspended by `yield_now`, `call` or `yield_value`.
    Yielded,
    /// Suspended until a descriptor reports readiness.
    Waiting,
    /// Body returned or `exit` fired; terminal.
    Dead,
}

impl fmt::Display for CoroutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoroutineState::New => "new",
            CoroutineState::Ready => "ready",
            CoroutineState::Running => "running",
            CoroutineState::Yielded => "yielded",
            CoroutineState::Waiting => "waiting",
            CoroutineState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Sentinel panic payload used by [`Coroutine::exit`] to unwind the body.
pub(crate) struct ExitToken;

/// A cooperative task bound to one [`Machine`] for its whole life.
///
/// Handles are `Rc`-shared; all mutable state is in cells because the
/// scheduler and the coroutine's own body touch the record from different
/// stacks of the same thread.
pub struct Coroutine {
    id: usize,
    machine: Weak<MachineCore>,
    name: RefCell<String>,
    state: Cell<CoroutineState>,
    body: RefCell<Option<CoroutineBody>>,
    stack: CoroStack,
    resume_ctx: UnsafeCell<SwitchContext>,
    event: EventFd,
    wait_fd: Cell<RawFd>,
    wait_mask: Cell<Interest>,
    wait_revents: Cell<Interest>,
    caller: RefCell<Option<Rc<Coroutine>>>,
    result_ptr: Cell<*mut u8>,
    result_size: Cell<usize>,
    user_data: RefCell<Option<Rc<dyn Any>>>,
    last_tick: Cell<u64>,
}

impl Coroutine {
    /// Builds a coroutine, registers it with the machine and leaves it
    /// `New`. Called through [`Machine::spawn`] or the builder.
    ///
    /// [`Machine::spawn`]: crate::Machine::spawn
    pub(crate) fn create(
        core: &Rc<MachineCore>,
        body: CoroutineBody,
        stack_size: usize,
        name: Option<String>,
        user_data: Option<Rc<dyn Any>>,
    ) -> Result<Rc<Coroutine>, Error> {
        let stack = CoroStack::allocate(stack_size)?;
        let event = EventFd::new().map_err(Error::Event)?;
        let id = core.allocate_id();
        let name = name.unwrap_or_else(|| format!("co-{id}"));
        log::debug!(
            "spawned coroutine {id} ({name}) with a {}-byte stack",
            stack.size()
        );

        let mut resume_ctx = SwitchContext::zeroed();
        unsafe { prepare(&mut resume_ctx, stack.top(), coroutine_entry) };

        let coroutine = Rc::new(Coroutine {
            id,
            machine: Rc::downgrade(core),
            name: RefCell::new(name),
            state: Cell::new(CoroutineState::New),
            body: RefCell::new(Some(body)),
            stack,
            resume_ctx: UnsafeCell::new(resume_ctx),
            event,
            wait_fd: Cell::new(-1),
            wait_mask: Cell::new(Interest::READABLE),
            wait_revents: Cell::new(Interest::empty()),
            caller: RefCell::new(None),
            result_ptr: Cell::new(ptr::null_mut()),
            result_size: Cell::new(0),
            user_data: RefCell::new(user_data),
            last_tick: Cell::new(0),
        });

        core.add_coroutine(coroutine.clone());
        Ok(coroutine)
    }

    /// Unique ID within the owning machine; reusable after death.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> CoroutineState {
        self.state.get()
    }

    /// Size in bytes of the coroutine's private stack.
    pub fn stack_size(&self) -> usize {
        self.stack.size()
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    pub fn user_data(&self) -> Option<Rc<dyn Any>> {
        self.user_data.borrow().clone()
    }

    pub fn set_user_data(&self, data: Rc<dyn Any>) {
        *self.user_data.borrow_mut() = Some(data);
    }

    /// Handle to the owning machine, for spawning peers or stopping the
    /// loop from inside a body.
    pub fn machine(&self) -> Machine {
        Machine::from_core(self.core())
    }

    /// Makes a `New` coroutine runnable at the next scheduling round.
    /// Idempotent in any other state.
    pub fn start(&self) {
        if self.state.get() == CoroutineState::New {
            self.state.set(CoroutineState::Ready);
        }
    }

    /// True while `other`'s ID is still in this coroutine's machine's live
    /// set.
    pub fn is_alive(&self, other: &Coroutine) -> bool {
        match self.machine.upgrade() {
            Some(core) => core.is_live_id(other.id),
            None => false,
        }
    }

    /// Yields control, asking to be rescheduled immediately.
    ///
    /// Fires the coroutine's own event before suspending, so it competes
    /// for the very next round. Must be called from the running coroutine.
    pub fn yield_now(&self) {
        self.assert_current("yield_now");
        let core = self.core();
        self.state.set(CoroutineState::Yielded);
        self.last_tick.set(core.tick());
        self.event.fire();
        unsafe { self.suspend(&core) };
    }

    /// Suspends until `fd` reports any of the interests in `mask`.
    ///
    /// Returns the revents the poller delivered, including `ERROR` and
    /// `HANGUP` conditions; the coroutine decides what those mean for its
    /// descriptor. Must be called from the running coroutine.
    pub fn wait(&self, fd: RawFd, mask: Interest) -> Interest {
        self.assert_current("wait");
        assert!(fd >= 0, "wait needs a valid descriptor");
        let core = self.core();
        self.state.set(CoroutineState::Waiting);
        self.wait_fd.set(fd);
        self.wait_mask.set(mask);
        self.wait_revents.set(Interest::empty());
        self.last_tick.set(core.tick());
        unsafe { self.suspend(&core) };
        self.wait_fd.set(-1);
        self.wait_revents.get()
    }

    /// Runs `callee` until it produces a value into `slot` or its body
    /// returns.
    ///
    /// Returns true when the value was produced (the callee is still
    /// alive), false when the callee terminated without yielding one.
    pub fn call<T: Copy>(&self, callee: &Rc<Coroutine>, slot: &mut T) -> bool {
        self.call_raw(callee, slot as *mut T as *mut u8, mem::size_of::<T>())
    }

    /// The payload-free form of [`call`]: a pure rendezvous that touches no
    /// memory at the destination.
    ///
    /// [`call`]: Coroutine::call
    pub fn call_rendezvous(&self, callee: &Rc<Coroutine>) -> bool {
        self.call_raw(callee, ptr::null_mut(), 0)
    }

    fn call_raw(&self, callee: &Rc<Coroutine>, result_ptr: *mut u8, result_size: usize) -> bool {
        self.assert_current("call");
        let core = self.core();
        assert!(
            callee
                .machine
                .upgrade()
                .is_some_and(|other| Rc::ptr_eq(&core, &other)),
            "call target belongs to a different machine"
        );

        // Tell the callee who is asking and where the value goes.
        let this = core
            .current_coroutine()
            .expect("call from the running coroutine");
        *callee.caller.borrow_mut() = Some(this);
        callee.result_ptr.set(result_ptr);
        callee.result_size.set(result_size);

        // Start a fresh callee; wake a parked one.
        if callee.state.get() == CoroutineState::New {
            callee.start();
        } else {
            callee.event.fire();
        }

        // Park without firing our own event; only the callee's yield_value
        // or death epilogue wakes us.
        self.state.set(CoroutineState::Yielded);
        self.last_tick.set(core.tick());
        unsafe { self.suspend(&core) };

        // The rendezvous is over; drop our claim on the callee.
        *callee.caller.borrow_mut() = None;
        callee.result_ptr.set(ptr::null_mut());
        callee.result_size.set(0);
        self.is_alive(callee)
    }

    /// Hands `value` to the caller that invoked this coroutine through
    /// [`call`], wakes it, and parks until the next call.
    ///
    /// Without a pending caller the coroutine simply parks.
    ///
    /// [`call`]: Coroutine::call
    pub fn yield_value<T: Copy>(&self, value: &T) {
        self.yield_value_raw(value as *const T as *const u8, mem::size_of::<T>());
    }

    fn yield_value_raw(&self, value: *const u8, size: usize) {
        self.assert_current("yield_value");
        let core = self.core();

        let dst = self.result_ptr.get();
        let dst_size = self.result_size.get();
        if !dst.is_null() && dst_size > 0 {
            debug_assert_eq!(size, dst_size, "yield_value size mismatch");
            unsafe { ptr::copy_nonoverlapping(value, dst, size.min(dst_size)) };
        }
        if let Some(caller) = self.caller.borrow().as_ref() {
            caller.event.fire();
        }

        // Park without firing our own event; the next call wakes us.
        self.state.set(CoroutineState::Yielded);
        self.last_tick.set(core.tick());
        unsafe { self.suspend(&core) };
    }

    /// Terminates the coroutine without returning from its body.
    ///
    /// Unwinds the coroutine's stack (locals are dropped) and runs the dead
    /// epilogue. Must be called from the running coroutine.
    pub fn exit(&self) -> ! {
        self.assert_current("exit");
        // resume_unwind skips the panic hook: exiting is not an error.
        panic::resume_unwind(Box::new(ExitToken));
    }

    /// Fires this coroutine's event, making it runnable at the next round.
    /// Used by the scheduler and the rendezvous protocol.
    pub fn trigger_event(&self) {
        self.event.fire();
    }

    /// Consumes this coroutine's event readiness.
    pub fn clear_event(&self) {
        self.event.clear();
    }

    /// Instruction address of the last suspension, for diagnostics.
    pub fn yielded_address(&self) -> Option<usize> {
        match self.state.get() {
            CoroutineState::Yielded | CoroutineState::Waiting => {
                Some(switch::suspension_address(unsafe { &*self.resume_ctx.get() }))
            }
            _ => None,
        }
    }

    fn core(&self) -> Rc<MachineCore> {
        self.machine
            .upgrade()
            .expect("coroutine outlived its machine")
    }

    fn assert_current(&self, op: &str) {
        assert!(
            self.core().current_is(self),
            "{op} called outside the running coroutine (co {})",
            self.id
        );
    }

    /// Saves this coroutine's context and transfers to the scheduler.
    /// Returns when the scheduler resumes the coroutine.
    ///
    /// # Safety
    /// Must run on this coroutine's own stack with its state already moved
    /// out of `Running`, and no borrows held across the switch.
    unsafe fn suspend(&self, core: &MachineCore) {
        unsafe { switch_context(self.resume_ctx.get(), core.yield_ctx_ptr()) };
    }

    // Scheduler-side accessors.

    pub(crate) fn set_state(&self, state: CoroutineState) {
        self.state.set(state);
    }

    pub(crate) fn resume_ctx_ptr(&self) -> *const SwitchContext {
        self.resume_ctx.get()
    }

    pub(crate) fn wait_fd(&self) -> RawFd {
        self.wait_fd.get()
    }

    pub(crate) fn wait_mask(&self) -> Interest {
        self.wait_mask.get()
    }

    pub(crate) fn set_wait_revents(&self, revents: Interest) {
        self.wait_revents.set(revents);
    }

    pub(crate) fn event_fd(&self) -> RawFd {
        self.event.raw_fd()
    }

    pub(crate) fn last_tick(&self) -> u64 {
        self.last_tick.get()
    }

    pub(crate) fn take_caller(&self) -> Option<Rc<Coroutine>> {
        self.caller.borrow_mut().take()
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.id)
            .field("name", &*self.name.borrow())
            .field("state", &self.state.get())
            .finish()
    }
}

/// First frame on every coroutine stack.
///
/// Fetches the coroutine the scheduler just resumed, runs its body once,
/// then marks it `Dead` and switches out for good; the scheduler runs the
/// epilogue on its own stack. Never returns.
pub(crate) extern "C" fn coroutine_entry() -> ! {
    let coroutine = with_current_machine(|m| m.current_coroutine())
        .flatten()
        .expect("coroutine entered with no machine running");

    let body = coroutine
        .body
        .borrow_mut()
        .take()
        .expect("coroutine body already consumed");

    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&coroutine)));
    if let Err(payload) = result {
        if !payload.is::<ExitToken>() {
            // A body panic cannot unwind across the stack switch; the
            // process terminates, matching the runtime's contract.
            log::error!(
                "coroutine {} ({}) panicked; aborting",
                coroutine.id,
                coroutine.name()
            );
            drop(payload);
            std::process::abort();
        }
    }

    coroutine.state.set(CoroutineState::Dead);
    let core = coroutine.core();
    let resume_ctx = coroutine.resume_ctx.get();
    let yield_ctx = core.yield_ctx_ptr();

    // Nothing on this stack runs after the switch; release the handles now
    // so the scheduler's epilogue holds the only remaining references.
    drop(coroutine);
    drop(core);

    unsafe { switch_context(resume_ctx, yield_ctx) };
    unreachable!("dead coroutine resumed");
}
