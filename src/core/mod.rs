//! Dispatch engine: bus handle, contexts and configuration.
//!
//! The public API from this module is [`Bus`] (register/unregister/post),
//! [`DispatchContext`] (ordered delivery), and the configuration types.
//!
//! Internal modules:
//! - [`bus`]: registry wiring and the register/unregister protocol;
//! - [`context`]: per-owner FIFO queue and reentrancy guard;
//! - [`config`]: bus settings and defaults;
//! - [`builder`]: fluent construction of a configured bus;
//! - [`enforcer`]: optional confinement of a bus to one thread.

mod builder;
mod bus;
mod config;
mod context;
mod enforcer;

pub use builder::BusBuilder;
pub use bus::Bus;
pub use config::{BusConfig, DEFAULT_IDENTIFIER};
pub use context::DispatchContext;
pub use enforcer::ThreadEnforcer;
