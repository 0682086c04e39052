mod core;
mod stack;
mod switch;

pub use self::core::{Coroutine, CoroutineState, DEFAULT_STACK_SIZE};

pub(crate) use self::core::CoroutineBody;
pub(crate) use switch::{switch_context, SwitchContext};
