//! # Registered handlers.
//!
//! - [`EventHandler`] invocation wrapper (instance + operation + validity flag)
//! - [`HandlerKey`] registration slot address (capability × event type)
//! - `HandlerRegistry` / `HandlerSet` concurrent storage (crate-internal)

mod handler;
mod registry;

pub use handler::EventHandler;
pub use registry::HandlerKey;
pub(crate) use registry::{HandlerRegistry, HandlerSet};
