//! # Bus: register, unregister and post.
//!
//! [`Bus`] is a cheap, cloneable handle to one dispatcher instance. It owns the
//! handler registry and the two lazily filled caches (subscriber tables and event
//! hierarchies). Delivery itself happens in a [`DispatchContext`].
//!
//! ## Register / unregister
//! ```text
//! register::<C, L>(&listener)
//!   ├─► enforce thread
//!   ├─► discover::<C, L>()                      (cached per (C, L))
//!   └─► for (E, ops) in table:
//!         set = registry.get_or_create((C, E))  (insert-if-absent)
//!         for op in ops: set.insert(EventHandler(listener, op))
//!
//! unregister::<C, L>(&listener)
//!   ├─► enforce thread
//!   ├─► discover::<C, L>()
//!   ├─► look up every (set, handler) pair       (any miss → NotRegistered, nothing changed)
//!   └─► for each: handler.invalidate(); set.remove(handler)
//! ```
//!
//! ## Post
//! `Bus::post` opens a fresh [`DispatchContext`] and posts through it. When a
//! context of this bus is already draining on the calling thread (the call comes
//! from inside a subscriber), the deliveries join that queue instead, so delivery
//! stays breadth-first whichever handle the subscriber posts through.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::BusError;
use crate::events::{Event, EventType, HierarchyCache};
use crate::handlers::{EventHandler, HandlerKey, HandlerRegistry, HandlerSet};
use crate::subscribers::{Capability, Subscriber, SubscriberCache};

use super::builder::BusBuilder;
use super::config::BusConfig;
use super::context::{ActiveDrains, DispatchContext};

struct Inner {
    config: BusConfig,
    registry: HandlerRegistry,
    subscribers: SubscriberCache,
    hierarchy: HierarchyCache,
    drains: ActiveDrains,
}

/// Handle to an event bus instance.
///
/// Cloning is cheap and every clone addresses the same registry.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    /// Creates a bus with [`BusConfig::default()`].
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with the given configuration.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: HandlerRegistry::new(),
                subscribers: SubscriberCache::new(),
                hierarchy: HierarchyCache::new(),
                drains: ActiveDrains::default(),
            }),
        }
    }

    /// Starts a [`BusBuilder`] from the default configuration.
    pub fn builder() -> BusBuilder {
        BusBuilder::new(BusConfig::default())
    }

    /// Identifier of this bus.
    pub fn identifier(&self) -> &str {
        &self.inner.config.identifier
    }

    /// Configuration this bus was created with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Opens a new, idle dispatch context bound to this bus.
    ///
    /// A worker that posts repeatedly may keep one context for its lifetime.
    pub fn context(&self) -> DispatchContext {
        DispatchContext::new(self.clone())
    }

    /// Registers every subscriber operation of `listener` under capability `C`.
    ///
    /// Registering the same instance twice is a no-op.
    ///
    /// # Errors
    /// - [`BusError::WrongThread`] if the bus is pinned to another thread.
    /// - [`BusError::ConflictingSubscriber`] if `L` declares a name twice with
    ///   different event types; nothing is registered.
    pub fn register<C, L>(&self, listener: &Arc<L>) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
        L: Subscriber<C>,
    {
        self.enforce()?;
        let methods = self.inner.subscribers.discover::<C, L>()?;

        let mut added = 0usize;
        for (event_type, group) in methods.groups() {
            let set = self
                .inner
                .registry
                .get_or_create(HandlerKey::of::<C>(*event_type));
            for method in group {
                if set.insert(Arc::new(EventHandler::bind(listener, method))) {
                    added += 1;
                }
            }
        }

        debug!(
            bus = %self,
            capability = std::any::type_name::<C>(),
            listener = methods.listener(),
            added,
            "registered listener"
        );
        Ok(())
    }

    /// Removes every subscriber operation of `listener` under capability `C`.
    ///
    /// Each handler is invalidated before it is removed, so deliveries already
    /// queued in some context are skipped.
    ///
    /// # Errors
    /// - [`BusError::WrongThread`] if the bus is pinned to another thread.
    /// - [`BusError::NotRegistered`] if any operation of `listener` is not
    ///   currently registered; the registry is left unchanged.
    pub fn unregister<C, L>(&self, listener: &Arc<L>) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
        L: Subscriber<C>,
    {
        self.enforce()?;
        let methods = self.inner.subscribers.discover::<C, L>()?;

        let mut found: Vec<(Arc<HandlerSet>, Arc<EventHandler>)> = Vec::with_capacity(methods.len());
        for (event_type, group) in methods.groups() {
            let not_registered = || BusError::NotRegistered {
                listener: methods.listener(),
                capability: std::any::type_name::<C>(),
                event: event_type.name(),
            };

            let Some(set) = self.inner.registry.get(&HandlerKey::of::<C>(*event_type)) else {
                return Err(not_registered());
            };
            for method in group {
                let probe = EventHandler::bind(listener, method);
                let Some(stored) = set.find(&probe) else {
                    return Err(not_registered());
                };
                found.push((Arc::clone(&set), stored));
            }
        }

        let removed = retire(&found);
        if removed < found.len() {
            debug!(
                bus = %self,
                listener = methods.listener(),
                missing = found.len() - removed,
                "handlers already removed by a concurrent unregister"
            );
        }

        debug!(
            bus = %self,
            capability = std::any::type_name::<C>(),
            listener = methods.listener(),
            removed,
            "unregistered listener"
        );
        Ok(())
    }

    /// Posts `event` to every valid handler registered under `C` for the event's
    /// concrete type or any of its supertypes.
    ///
    /// Delivery is synchronous: when this returns `Ok`, every matched handler ran.
    /// Called from inside a subscriber, the deliveries are queued behind the ones
    /// already pending on this thread and this returns `Ok(())` at once.
    ///
    /// # Errors
    /// - [`BusError::WrongThread`] if the bus is pinned to another thread.
    /// - [`BusError::Dispatch`] if a subscriber failed; later deliveries of this
    ///   post are abandoned.
    pub fn post<C, E>(&self, event: E) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
        E: Event,
    {
        self.context().post::<C, E>(event)
    }

    /// Like [`post`](Self::post) for an already shared, type-erased event.
    pub fn post_arc<C>(&self, event: Arc<dyn Event>) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
    {
        self.context().post_arc::<C>(event)
    }

    /// Number of handlers registered under `C` for exactly the event type `E`.
    pub fn handler_count<C, E>(&self) -> usize
    where
        C: Capability + ?Sized,
        E: Event,
    {
        self.inner
            .registry
            .count(&HandlerKey::of::<C>(EventType::of::<E>()))
    }

    /// True if `listener` has at least one operation under `C` and all of them
    /// are currently registered.
    pub fn is_registered<C, L>(&self, listener: &Arc<L>) -> bool
    where
        C: Capability + ?Sized,
        L: Subscriber<C>,
    {
        let Ok(methods) = self.inner.subscribers.discover::<C, L>() else {
            return false;
        };
        if methods.is_empty() {
            return false;
        }
        methods.groups().iter().all(|(event_type, group)| {
            match self.inner.registry.get(&HandlerKey::of::<C>(*event_type)) {
                Some(set) => group
                    .iter()
                    .all(|method| set.find(&EventHandler::bind(listener, method)).is_some()),
                None => false,
            }
        })
    }

    /// Handlers to deliver `event` to under `C`, supertype order preserved.
    pub(crate) fn handlers_for<C>(&self, event: &dyn Event) -> Vec<Arc<EventHandler>>
    where
        C: Capability + ?Sized,
    {
        let dispatch_types = self.inner.hierarchy.ancestors_of(event);
        let mut matched = Vec::new();
        for event_type in dispatch_types.iter() {
            if let Some(set) = self.inner.registry.get(&HandlerKey::of::<C>(*event_type)) {
                matched.extend(set.snapshot().iter().cloned());
            }
        }
        matched
    }

    pub(crate) fn drains(&self) -> &ActiveDrains {
        &self.inner.drains
    }

    pub(crate) fn enforce(&self) -> Result<(), BusError> {
        self.inner.config.enforcer.enforce(self)
    }
}

/// Invalidates then removes every handler. Returns how many were still present.
fn retire(found: &[(Arc<HandlerSet>, Arc<EventHandler>)]) -> usize {
    found
        .iter()
        .filter(|(set, handler)| {
            handler.invalidate();
            set.remove(handler).is_some()
        })
        .count()
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Bus \"{}\"]", self.inner.config.identifier)
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("identifier", &self.inner.config.identifier)
            .field("enforcer", &self.inner.config.enforcer)
            .finish_non_exhaustive()
    }
}
