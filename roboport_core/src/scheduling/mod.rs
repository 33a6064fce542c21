//! Execution contexts: the schedulers that tick component instances

pub mod execution_context;

pub use execution_context::{ContextStats, ExecutionContext, TickPolicy};
