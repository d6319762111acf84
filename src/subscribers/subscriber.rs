//! # Capability and subscriber traits
//!
//! A [`Capability`] is a pure addressing key: it names the channel a listener
//! registers under and a producer posts to. It is usually a trait object type.
//!
//! A [`Subscriber`] is a listener type that, for a given capability, declares its
//! subscriber operations in a [`Subscriptions`] table. The table is built once
//! per (capability, listener type) and cached by the bus.
//!
//! ## Example
//! ```rust
//! use typebus::{Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};
//!
//! pub trait Greeter: Send + Sync {}
//! impl Capability for dyn Greeter {}
//!
//! pub struct HelloEvent(pub String);
//! impl Event for HelloEvent {}
//!
//! struct Console;
//! impl Greeter for Console {}
//!
//! impl Console {
//!     fn on_hello(&self, ev: &HelloEvent, _cx: &DispatchContext) -> HandlerResult {
//!         println!("hello, {}", ev.0);
//!         Ok(())
//!     }
//! }
//!
//! impl Subscriber<dyn Greeter> for Console {
//!     fn subscriptions(table: &mut Subscriptions<Self>) {
//!         table.on("on_hello", Self::on_hello);
//!     }
//! }
//! ```

use super::table::Subscriptions;

/// Marker for types used as registration/posting namespaces.
///
/// Implement it for a trait object (`impl Capability for dyn MyTrait {}`) or for
/// a zero-sized marker struct. It carries no data and no behavior.
pub trait Capability: 'static {}

/// A listener type that serves capability `C`.
///
/// Implementations declare every subscriber operation in
/// [`subscriptions`](Subscriber::subscriptions). The function is called once per
/// bus for each (capability, listener type) pair and must be deterministic.
pub trait Subscriber<C: Capability + ?Sized>: Send + Sync + Sized + 'static {
    /// Declares the subscriber operations of this listener type.
    fn subscriptions(table: &mut Subscriptions<Self>);
}
