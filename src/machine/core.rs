//! The coroutine machine: membership, the readiness-driven run loop and the
//! fairness discipline.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::cmp::Reverse;
use std::io;
use std::ptr;
use std::rc::Rc;

use crate::coro::{switch_context, Coroutine, CoroutineState, SwitchContext};
use crate::error::Error;
use crate::gate::{EventFd, Interest, PollSet};
use crate::machine::context::{current_machine, set_current_machine};
use crate::machine::IdAllocator;

/// The scheduler owning a set of coroutines and the readiness plumbing that
/// drives them.
///
/// `Machine` is a cheap cloneable handle; all state lives in the shared
/// core. A machine is single-threaded: handles are neither `Send` nor
/// `Sync`, and one OS thread runs at most one machine at a time.
#[derive(Clone)]
pub struct Machine {
    core: Rc<MachineCore>,
}

pub(crate) struct MachineCore {
    coroutines: RefCell<Vec<Rc<Coroutine>>>,
    ids: RefCell<IdAllocator>,
    current: RefCell<Option<Rc<Coroutine>>>,
    yield_ctx: UnsafeCell<SwitchContext>,
    running: Cell<bool>,
    poll_set: RefCell<PollSet>,
    blocked: RefCell<Vec<Rc<Coroutine>>>,
    interrupt: EventFd,
    tick: Cell<u64>,
}

impl Machine {
    /// Creates an empty machine.
    ///
    /// Fails only if the interrupt event descriptor cannot be allocated.
    pub fn new() -> Result<Self, Error> {
        let interrupt = EventFd::new().map_err(Error::Event)?;
        Ok(Self {
            core: Rc::new(MachineCore {
                coroutines: RefCell::new(Vec::new()),
                ids: RefCell::new(IdAllocator::new()),
                current: RefCell::new(None),
                yield_ctx: UnsafeCell::new(SwitchContext::zeroed()),
                running: Cell::new(false),
                poll_set: RefCell::new(PollSet::new()),
                blocked: RefCell::new(Vec::new()),
                interrupt,
                tick: Cell::new(0),
            }),
        })
    }

    pub(crate) fn from_core(core: Rc<MachineCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<MachineCore> {
        &self.core
    }

    /// Creates a coroutine with the default stack size, bound to this
    /// machine. The coroutine is `New`; call [`Coroutine::start`] to make
    /// it runnable.
    pub fn spawn<F>(&self, body: F) -> Result<Rc<Coroutine>, Error>
    where
        F: FnOnce(&Coroutine) + 'static,
    {
        crate::CoroutineBuilder::new().spawn(self, body)
    }

    /// Number of coroutines currently bound to the machine.
    pub fn len(&self) -> usize {
        self.core.coroutines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.coroutines.borrow().is_empty()
    }

    /// Runs the scheduling loop until membership drains or [`stop`] is
    /// observed.
    ///
    /// [`stop`]: Machine::stop
    pub fn run(&self) {
        let core = &self.core;
        assert!(
            current_machine().is_null(),
            "a thread runs at most one machine at a time"
        );
        core.running.set(true);
        set_current_machine(Rc::as_ptr(core));

        while core.running.get() {
            if core.coroutines.borrow().is_empty() {
                break;
            }
            if let Some(chosen) = core.select_runnable() {
                core.resume(chosen);
            }
        }

        set_current_machine(ptr::null());
        core.running.set(false);
        core.current.borrow_mut().take();
        log::debug!("machine stopped with {} coroutines left", self.len());
    }

    /// Asks the run loop to exit and fires the interrupt event so a blocked
    /// poll wakes up. Safe to call from inside any coroutine body.
    pub fn stop(&self) {
        self.core.running.set(false);
        self.core.interrupt.fire();
    }

    /// Writes a diagnostic listing of all coroutines: id, name, state and
    /// last suspension address.
    pub fn show(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for c in self.core.coroutines.borrow().iter() {
            writeln!(
                out,
                "coroutine {}: {}: state: {}: address: {:#x}",
                c.id(),
                c.name(),
                c.state(),
                c.yielded_address().unwrap_or(0)
            )?;
        }
        Ok(())
    }
}

impl MachineCore {
    pub(crate) fn allocate_id(&self) -> usize {
        self.ids.borrow_mut().allocate()
    }

    pub(crate) fn is_live_id(&self, id: usize) -> bool {
        self.ids.borrow().contains(id)
    }

    pub(crate) fn add_coroutine(&self, coroutine: Rc<Coroutine>) {
        self.coroutines.borrow_mut().push(coroutine);
    }

    pub(crate) fn tick(&self) -> u64 {
        self.tick.get()
    }

    pub(crate) fn yield_ctx_ptr(&self) -> *const SwitchContext {
        self.yield_ctx.get()
    }

    pub(crate) fn current_coroutine(&self) -> Option<Rc<Coroutine>> {
        self.current.borrow().clone()
    }

    pub(crate) fn current_is(&self, coroutine: &Coroutine) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|c| ptr::eq(Rc::as_ptr(c), coroutine))
    }

    /// One blocking scheduling decision.
    ///
    /// Rebuilds the readiness array (interrupt event first, then one entry
    /// per suspended coroutine), pre-fires `Ready` events so fresh starts
    /// compete fairly, polls, and picks the runnable coroutine that has
    /// been waiting longest.
    fn select_runnable(&self) -> Option<Rc<Coroutine>> {
        {
            let mut poll_set = self.poll_set.borrow_mut();
            let mut blocked = self.blocked.borrow_mut();
            poll_set.clear();
            blocked.clear();
            poll_set.push(self.interrupt.raw_fd(), Interest::READABLE);

            for c in self.coroutines.borrow().iter() {
                match c.state() {
                    CoroutineState::New | CoroutineState::Running | CoroutineState::Dead => {
                        continue
                    }
                    CoroutineState::Waiting => poll_set.push(c.wait_fd(), c.wait_mask()),
                    CoroutineState::Ready | CoroutineState::Yielded => {
                        poll_set.push(c.event_fd(), Interest::READABLE)
                    }
                }
                if c.state() == CoroutineState::Ready {
                    c.trigger_event();
                }
                blocked.push(c.clone());
            }
        }

        let num_ready = match self.poll_set.borrow_mut().poll() {
            Ok(n) => n,
            Err(error) => {
                log::warn!("readiness poll failed: {error}");
                return None;
            }
        };
        if num_ready == 0 {
            return None;
        }
        self.tick.set(self.tick.get() + 1);

        let mut runnables: Vec<Rc<Coroutine>> = Vec::new();
        {
            let poll_set = self.poll_set.borrow();
            let blocked = self.blocked.borrow();

            if !poll_set.revents(0).is_empty() {
                self.interrupt.clear();
            }
            if !self.running.get() {
                return None;
            }

            for (index, c) in blocked.iter().enumerate() {
                let revents = poll_set.revents(index + 1);
                if revents.is_empty() {
                    continue;
                }
                if c.state() == CoroutineState::Waiting {
                    c.set_wait_revents(revents);
                }
                runnables.push(c.clone());
            }
        }
        if runnables.is_empty() {
            return None;
        }

        // Longest-waiting first; the stable sort keeps membership order for
        // coroutines that became runnable on the same tick.
        let tick = self.tick.get();
        runnables.sort_by_key(|c| Reverse(tick - c.last_tick()));
        let chosen = runnables.into_iter().next();

        if let Some(c) = &chosen {
            // Consume the event so the pick does not spuriously re-wake.
            c.clear_event();
        }
        chosen
    }

    /// Transfers control to `coroutine` until its next suspension, then
    /// runs the dead epilogue if the body finished.
    fn resume(&self, coroutine: Rc<Coroutine>) {
        match coroutine.state() {
            CoroutineState::Ready | CoroutineState::Yielded | CoroutineState::Waiting => {
                coroutine.set_state(CoroutineState::Running);
                *self.current.borrow_mut() = Some(coroutine.clone());
                unsafe { switch_context(self.yield_ctx.get(), coroutine.resume_ctx_ptr()) };
                if coroutine.state() == CoroutineState::Dead {
                    self.finish(coroutine);
                }
            }
            state @ (CoroutineState::New | CoroutineState::Running | CoroutineState::Dead) => {
                log::warn!(
                    "skipping resume of coroutine {} in state {}",
                    coroutine.id(),
                    state
                );
            }
        }
    }

    /// Dead epilogue: removal and ID release happen in one step, then the
    /// caller of a generator is woken so it can observe the death.
    fn finish(&self, coroutine: Rc<Coroutine>) {
        log::debug!(
            "coroutine {} ({}) finished",
            coroutine.id(),
            coroutine.name()
        );
        self.coroutines
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, &coroutine));
        self.ids.borrow_mut().release(coroutine.id());
        self.current.borrow_mut().take();
        if let Some(caller) = coroutine.take_caller() {
            caller.trigger_event();
        }
    }
}
