//! Events: value trait, type descriptors and the hierarchy resolver.
//!
//! ## Contents
//! - [`Event`], [`AsAny`] what can be posted and how it is viewed at runtime
//! - [`EventType`] runtime descriptor used in handler keys
//! - `HierarchyCache` concrete type → ordered dispatch types (crate-internal)

mod event;
mod hierarchy;

pub use event::{AsAny, Event, EventType};
pub(crate) use hierarchy::HierarchyCache;
