//! # typebus
//!
//! **typebus** is an in-process, typed publish/subscribe event bus.
//!
//! Listeners register under a **capability** (a trait-object type used purely as
//! an address), producers post event values under the same capability, and the
//! bus delivers each event to every matching, still-registered subscriber
//! operation, synchronously, on the caller's thread.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   register::<C, L>(&Arc<L>)                      post::<C, E>(event)
//!            │                                              │
//!            ▼                                              ▼
//! ┌──────────────────────┐                    ┌──────────────────────────┐
//! │  SubscriberCache     │                    │  HierarchyCache          │
//! │  (C, L) → table      │                    │  E → [E, super(E), ...]  │
//! │  built once per pair │                    │  computed once per type  │
//! └──────────┬───────────┘                    └────────────┬─────────────┘
//!            ▼                                             ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  HandlerRegistry                                                      │
//! │  (C, E) → HandlerSet (copy-on-write, ordered, deduplicated)           │
//! └───────────────────────────────────┬───────────────────────────────────┘
//!                                     ▼  snapshot per dispatch type
//!                          ┌────────────────────────┐
//!                          │  DispatchContext       │
//!                          │  FIFO queue + flag     │
//!                          └───────────┬────────────┘
//!                                      ▼
//!                      EventHandler::dispatch(event, cx)
//!                        (skip if invalidated)
//! ```
//!
//! ### Delivery
//! ```text
//! post(event)
//!   ├─► dispatch types = event's concrete type + supertype chain
//!   ├─► enqueue (event, handler) for every handler of every type, in order
//!   └─► drain (unless this context is already draining):
//!         loop {
//!           pop front ─► invalid? skip : handler.dispatch(event, cx)
//!             ├─ Ok  ─► continue
//!             └─ Err ─► drop rest of queue, reset flag, return BusError::Dispatch
//!         }
//! ```
//!
//! ## Features
//! | Area               | Description                                                     | Key types / traits                          |
//! |--------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Capabilities**   | Namespaces for registration and posting.                        | [`Capability`]                              |
//! | **Subscribers**    | Typed, compile-checked subscriber operations.                   | [`Subscriber`], [`Subscriptions`]           |
//! | **Events**         | Event values with an optional supertype chain.                  | [`Event`], [`EventType`]                    |
//! | **Dispatch**       | Ordered, reentrancy-safe delivery.                              | [`Bus`], [`DispatchContext`]                |
//! | **Handlers**       | Bound operations with one-way invalidation.                     | [`EventHandler`], [`HandlerKey`]            |
//! | **Errors**         | Typed configuration, usage and delivery errors.                 | [`BusError`], [`HandlerFailure`]            |
//! | **Configuration**  | Identifier, thread confinement, panic handling.                 | [`BusConfig`], [`BusBuilder`], [`ThreadEnforcer`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use typebus::{Bus, Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};
//!
//! pub trait Greeter: Send + Sync {}
//! impl Capability for dyn Greeter {}
//!
//! pub struct HelloEvent(pub String);
//! impl Event for HelloEvent {}
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//! impl Greeter for Counter {}
//!
//! impl Counter {
//!     fn on_hello(&self, _ev: &HelloEvent, _cx: &DispatchContext) -> HandlerResult {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! impl Subscriber<dyn Greeter> for Counter {
//!     fn subscriptions(table: &mut Subscriptions<Self>) {
//!         table.on("on_hello", Self::on_hello);
//!     }
//! }
//!
//! fn main() -> Result<(), typebus::BusError> {
//!     let bus = Bus::new();
//!     let counter = Arc::new(Counter::default());
//!
//!     bus.register::<dyn Greeter, _>(&counter)?;
//!     bus.post::<dyn Greeter, _>(HelloEvent("hi".into()))?;
//!     assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//!
//!     bus.unregister::<dyn Greeter, _>(&counter)?;
//!     bus.post::<dyn Greeter, _>(HelloEvent("hi".into()))?;
//!     assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    Bus, BusBuilder, BusConfig, DispatchContext, ThreadEnforcer, DEFAULT_IDENTIFIER,
};
pub use error::{BoxError, BusError, HandlerFailure, HandlerResult};
pub use events::{AsAny, Event, EventType};
pub use handlers::{EventHandler, HandlerKey};
pub use subscribers::{Capability, Subscriber, SubscriberMethods, Subscriptions};
