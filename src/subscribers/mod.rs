//! # Subscriber declaration and discovery.
//!
//! A listener takes part in dispatch by implementing [`Subscriber<C>`] for each
//! capability `C` it serves. The bus turns the declared operations into
//! [`EventHandler`](crate::EventHandler)s on `register`.
//!
//! ## Architecture
//! ```text
//! register::<C, L>(&Arc<L>)
//!     │
//!     └──► SubscriberCache::discover::<C, L>()
//!              │   (once per (C, L); cached Arc afterwards)
//!              ▼
//!          L::subscriptions(&mut Subscriptions<L>)
//!              │
//!              ├──► on::<E1>("on_a", L::on_a)
//!              └──► on::<E2>("on_b", L::on_b)
//!              ▼
//!          SubscriberMethods<L> { E1: [on_a], E2: [on_b] }
//! ```

mod discovery;
mod subscriber;
mod table;

pub(crate) use discovery::SubscriberCache;
pub use subscriber::{Capability, Subscriber};
pub(crate) use table::Method;
pub use table::{SubscriberMethods, Subscriptions};
