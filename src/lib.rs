//! Single-threaded cooperative multitasking with stackful coroutines that
//! suspend on file-descriptor readiness.
//!
//! A program builds a [`Machine`], binds one or more coroutines to it, and
//! calls [`Machine::run`]. Each coroutine executes an arbitrary body on its
//! own private stack and may yield to its peers, wait for a descriptor to
//! become ready, or exchange values with another coroutine through the
//! call/yield-value rendezvous. The machine multiplexes every watched
//! descriptor through one `poll(2)` call and always resumes the coroutine
//! that has been waiting longest.
//!
//! # Architecture
//!
//! - **Machine**: scheduler owning the membership list, ID allocation, the
//!   readiness gate and the interrupt event
//! - **Coroutine**: task record with a private stack, saved switch context,
//!   a wait slot and a user-triggerable event descriptor
//! - **Switch**: raw callee-saved register swap between the scheduler stack
//!   and coroutine stacks
//! - **Gate**: `poll(2)` plumbing plus the eventfd/kqueue event objects
//! - **Net / Http**: coroutine-blocking TCP wrappers and the bundled
//!   HTTP/1.1 demo logic
//!
//! # Example
//!
//! ```no_run
//! use corofd::Machine;
//!
//! let machine = Machine::new().unwrap();
//! let greeter = machine
//!     .spawn(|co| {
//!         for _ in 0..3 {
//!             println!("hello from {}", co.name());
//!             co.yield_now();
//!         }
//!     })
//!     .unwrap();
//! greeter.start();
//! machine.run();
//! ```

mod builder;
mod coro;
mod error;
mod gate;
mod machine;

pub mod http;
pub mod net;

pub use builder::CoroutineBuilder;
pub use coro::{Coroutine, CoroutineState, DEFAULT_STACK_SIZE};
pub use error::Error;
pub use gate::Interest;
pub use machine::Machine;
