pub(crate) mod context;
pub(crate) mod core;
mod ids;

pub use self::core::Machine;

pub(crate) use ids::IdAllocator;
