//! Fluent builder for coroutine construction.

use std::any::Any;
use std::rc::Rc;

use crate::coro::{Coroutine, CoroutineBody, DEFAULT_STACK_SIZE};
use crate::error::Error;
use crate::machine::Machine;

/// Builds a coroutine with a custom stack size, name or user data.
///
/// [`Machine::spawn`] covers the common case; the builder exists for
/// everything else.
///
/// # Example
/// ```ignore
/// let worker = CoroutineBuilder::new()
///     .stack_size(64 * 1024)
///     .name("worker")
///     .spawn(&machine, |co| { /* ... */ })?;
/// ```
///
/// [`Machine::spawn`]: crate::Machine::spawn
pub struct CoroutineBuilder {
    stack_size: usize,
    name: Option<String>,
    user_data: Option<Rc<dyn Any>>,
}

impl Default for CoroutineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoroutineBuilder {
    pub fn new() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            name: None,
            user_data: None,
        }
    }

    /// Stack size in bytes. Zero is rejected at spawn time.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Printable label; defaults to `co-<id>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Opaque data retrievable from the coroutine handle. The runtime never
    /// interprets it.
    pub fn user_data(mut self, data: Rc<dyn Any>) -> Self {
        self.user_data = Some(data);
        self
    }

    /// Creates the coroutine on `machine`, leaving it `New`.
    pub fn spawn<F>(self, machine: &Machine, body: F) -> Result<Rc<Coroutine>, Error>
    where
        F: FnOnce(&Coroutine) + 'static,
    {
        let body: CoroutineBody = Box::new(body);
        Coroutine::create(
            machine.core(),
            body,
            self.stack_size,
            self.name,
            self.user_data,
        )
    }
}
