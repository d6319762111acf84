//! # Hierarchy resolver: concrete event type → dispatch types.
//!
//! [`HierarchyCache`] answers "which event types does a value of this concrete
//! type get delivered as?". The answer is the concrete type followed by every
//! type on its [`supertype`](crate::Event::supertype) chain, root last.
//!
//! ## Policy
//! Only the declared supertype chain counts. Traits an event happens to
//! implement are never dispatch targets.
//!
//! ## Rules
//! - Computed once per concrete type, immutable afterwards.
//! - Concurrent first computation is allowed; the first stored `Arc` wins and
//!   every caller receives that same `Arc`.
//! - A type that reappears on its own chain ends the walk.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::event::{Event, EventType};

/// Per-bus cache of flattened event hierarchies.
#[derive(Default)]
pub(crate) struct HierarchyCache {
    chains: RwLock<HashMap<TypeId, Arc<[EventType]>>>,
}

impl HierarchyCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatch types for the concrete type of `event`.
    pub(crate) fn ancestors_of(&self, event: &dyn Event) -> Arc<[EventType]> {
        let concrete = event.event_type();
        if let Some(chain) = self.chains.read().get(&concrete.id()) {
            return Arc::clone(chain);
        }

        let computed = flatten(event);
        let mut chains = self.chains.write();
        Arc::clone(chains.entry(concrete.id()).or_insert(computed))
    }

    /// Number of concrete types resolved so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.chains.read().len()
    }
}

/// Walks the supertype chain of `event`, concrete type first.
fn flatten(event: &dyn Event) -> Arc<[EventType]> {
    let mut chain: Vec<EventType> = Vec::new();
    let mut current = Some(event);

    while let Some(ev) = current {
        let ty = ev.event_type();
        if chain.contains(&ty) {
            break;
        }
        chain.push(ty);
        current = ev.supertype();
    }
    chain.into()
}
