//! # Subscriber tables
//!
//! [`Subscriptions`] is the builder a [`Subscriber`](crate::Subscriber) fills in;
//! [`SubscriberMethods`] is the frozen result the bus caches.
//!
//! ## Declaration rules
//! - An operation is a `fn(&L, &E, &DispatchContext) -> HandlerResult`; its
//!   single event parameter and concreteness are checked by the compiler.
//! - Re-declaring the same name for the same event type is ignored.
//! - Re-declaring a name for a different event type is a configuration error,
//!   reported when the table is frozen.
//! - Declaration order is kept, both across event types and within one type.
//! - An operation whose event type is missing from the delivered value's actual
//!   supertype chain is skipped, not failed.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::DispatchContext;
use crate::error::{BusError, HandlerResult};
use crate::events::{Event, EventType};

/// Type-erased subscriber operation bound to listener type `L`.
pub(crate) type Invoke<L> =
    Arc<dyn Fn(&L, &dyn Event, &DispatchContext) -> HandlerResult + Send + Sync>;

/// A single declared operation.
pub(crate) struct Method<L> {
    pub(crate) name: &'static str,
    pub(crate) event_type: EventType,
    pub(crate) invoke: Invoke<L>,
}

impl<L> Clone for Method<L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            event_type: self.event_type,
            invoke: Arc::clone(&self.invoke),
        }
    }
}

/// Builder for the subscriber operations of listener type `L`.
pub struct Subscriptions<L> {
    listener: &'static str,
    methods: Vec<Method<L>>,
    conflict: Option<BusError>,
}

impl<L: Send + Sync + 'static> Subscriptions<L> {
    pub(crate) fn new() -> Self {
        Self {
            listener: std::any::type_name::<L>(),
            methods: Vec::new(),
            conflict: None,
        }
    }

    /// Declares `op` as the subscriber operation `name` for events of type `E`.
    ///
    /// `E` may be any event type, including a supertype of what gets posted.
    pub fn on<E: Event>(
        &mut self,
        name: &'static str,
        op: fn(&L, &E, &DispatchContext) -> HandlerResult,
    ) -> &mut Self {
        let event_type = EventType::of::<E>();

        if let Some(existing) = self.methods.iter().find(|m| m.name == name) {
            if existing.event_type == event_type {
                debug!(
                    listener = self.listener,
                    name,
                    event = event_type.name(),
                    "duplicate subscriber declaration skipped"
                );
            } else if self.conflict.is_none() {
                self.conflict = Some(BusError::ConflictingSubscriber {
                    listener: self.listener,
                    name,
                    first: existing.event_type.name(),
                    second: event_type.name(),
                });
            }
            return self;
        }

        let invoke: Invoke<L> = Arc::new(
            move |listener: &L, event: &dyn Event, cx: &DispatchContext| match event.view::<E>() {
                Some(ev) => op(listener, ev, cx),
                None => {
                    // The cached chain came from a value whose supertypes differ from this one.
                    trace!(
                        expected = std::any::type_name::<E>(),
                        actual = event.type_name(),
                        "event has no such supertype; delivery skipped"
                    );
                    Ok(())
                }
            },
        );

        self.methods.push(Method {
            name,
            event_type,
            invoke,
        });
        self
    }

    /// Freezes the table, grouping operations by event type.
    pub(crate) fn finish(self) -> Result<SubscriberMethods<L>, BusError> {
        if let Some(err) = self.conflict {
            return Err(err);
        }

        let mut by_event: Vec<(EventType, Vec<Method<L>>)> = Vec::new();
        for method in self.methods {
            match by_event.iter_mut().find(|(ty, _)| *ty == method.event_type) {
                Some((_, group)) => group.push(method),
                None => by_event.push((method.event_type, vec![method])),
            }
        }

        Ok(SubscriberMethods {
            listener: self.listener,
            by_event,
        })
    }
}

/// Frozen subscriber operations of listener type `L`, grouped by event type.
pub struct SubscriberMethods<L> {
    listener: &'static str,
    by_event: Vec<(EventType, Vec<Method<L>>)>,
}

impl<L> SubscriberMethods<L> {
    /// Listener type name.
    pub fn listener(&self) -> &'static str {
        self.listener
    }

    /// Event types with at least one operation, in declaration order.
    pub fn event_types(&self) -> impl Iterator<Item = EventType> + '_ {
        self.by_event.iter().map(|(ty, _)| *ty)
    }

    /// Names of the operations declared for `event_type`.
    pub fn operations(&self, event_type: EventType) -> impl Iterator<Item = &'static str> + '_ {
        self.by_event
            .iter()
            .filter(move |(ty, _)| *ty == event_type)
            .flat_map(|(_, group)| group.iter().map(|m| m.name))
    }

    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.by_event.iter().map(|(_, group)| group.len()).sum()
    }

    /// True if the listener declared nothing.
    pub fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }

    pub(crate) fn groups(&self) -> &[(EventType, Vec<Method<L>>)] {
        &self.by_event
    }
}

impl<L> fmt::Debug for SubscriberMethods<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (ty, group) in &self.by_event {
            map.entry(ty, &group.iter().map(|m| m.name).collect::<Vec<_>>());
        }
        map.finish()
    }
}
