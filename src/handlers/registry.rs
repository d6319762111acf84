//! # Handler registry: (capability × event type) → handler set.
//!
//! [`HandlerRegistry`] maps each [`HandlerKey`] to a [`HandlerSet`]. Sets are
//! created on first use and never removed, so a key observed once stays valid.
//!
//! ## Architecture
//! ```text
//! HandlerRegistry
//!   RwLock<HashMap<HandlerKey, Arc<HandlerSet>>>
//!        │                           │
//!        │ read: lookup              │ write: insert-if-absent (first registration)
//!        ▼                           ▼
//!   HandlerSet (copy-on-write)
//!   RwLock<Arc<[Arc<EventHandler>]>>
//!        │
//!        ├─► snapshot(): clone the Arc, iterate without holding any lock
//!        └─► insert/remove: build a new slice, swap it in
//! ```
//!
//! ## Rules
//! - Exactly one set exists per key, even under concurrent first registration.
//! - No handler appears twice in a set; order is insertion order.
//! - Iterating a snapshot is unaffected by concurrent register/unregister.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::EventType;
use crate::subscribers::Capability;

use super::handler::EventHandler;

/// Registration slot address: capability × event type.
#[derive(Clone, Copy)]
pub struct HandlerKey {
    capability: TypeId,
    capability_name: &'static str,
    event: EventType,
}

impl HandlerKey {
    /// Key for capability `C` and `event`.
    pub fn of<C: Capability + ?Sized>(event: EventType) -> Self {
        Self {
            capability: TypeId::of::<C>(),
            capability_name: std::any::type_name::<C>(),
            event,
        }
    }

    /// Capability type name.
    pub fn capability(&self) -> &'static str {
        self.capability_name
    }

    /// Event type of the slot.
    pub fn event(&self) -> EventType {
        self.event
    }
}

impl PartialEq for HandlerKey {
    fn eq(&self, other: &Self) -> bool {
        self.capability == other.capability && self.event == other.event
    }
}

impl Eq for HandlerKey {}

impl Hash for HandlerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.capability.hash(state);
        self.event.hash(state);
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.capability_name, self.event.name())
    }
}

impl fmt::Debug for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Copy-on-write ordered set of handlers for one key.
pub(crate) struct HandlerSet {
    handlers: RwLock<Arc<[Arc<EventHandler>]>>,
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Arc::from(Vec::new())),
        }
    }
}

impl HandlerSet {
    /// Immutable view of the current handlers.
    pub(crate) fn snapshot(&self) -> Arc<[Arc<EventHandler>]> {
        Arc::clone(&self.handlers.read())
    }

    /// Adds `handler` unless an equal one is present. Returns `true` if added.
    pub(crate) fn insert(&self, handler: Arc<EventHandler>) -> bool {
        let mut current = self.handlers.write();
        if current.iter().any(|h| **h == *handler) {
            return false;
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(handler);
        *current = next.into();
        true
    }

    /// Returns the stored handler equal to `probe`, if any.
    pub(crate) fn find(&self, probe: &EventHandler) -> Option<Arc<EventHandler>> {
        self.handlers
            .read()
            .iter()
            .find(|h| ***h == *probe)
            .cloned()
    }

    /// Removes the handler equal to `probe`. Returns the removed handler.
    pub(crate) fn remove(&self, probe: &EventHandler) -> Option<Arc<EventHandler>> {
        let mut current = self.handlers.write();
        let pos = current.iter().position(|h| **h == *probe)?;
        let removed = Arc::clone(&current[pos]);
        let next: Vec<Arc<EventHandler>> = current
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(_, h)| Arc::clone(h))
            .collect();
        *current = next.into();
        Some(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().len()
    }
}

/// Concurrent map of handler sets.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    slots: RwLock<HashMap<HandlerKey, Arc<HandlerSet>>>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The set for `key`, if one was ever created.
    pub(crate) fn get(&self, key: &HandlerKey) -> Option<Arc<HandlerSet>> {
        self.slots.read().get(key).cloned()
    }

    /// The set for `key`, created if absent. All callers get the same set.
    pub(crate) fn get_or_create(&self, key: HandlerKey) -> Arc<HandlerSet> {
        if let Some(set) = self.get(&key) {
            return set;
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key).or_default())
    }

    /// Number of live handlers under `key`.
    pub(crate) fn count(&self, key: &HandlerKey) -> usize {
        self.get(key).map_or(0, |set| set.len())
    }
}
