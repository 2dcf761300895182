// src/tools/mod.rs

pub mod args;
pub mod dispatcher;
pub mod envelope;
pub mod schema;

pub use dispatcher::Dispatcher;
pub use envelope::{ToolFailure, ToolOutcome};
pub use schema::{ToolDescriptor, ToolRegistry};
