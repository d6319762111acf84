//! # Event handler: a bound (instance, operation) pair.
//!
//! [`EventHandler`] keeps the registered listener alive (shared with the caller),
//! remembers which operation to call, and carries a one-way validity flag.
//!
//! ## Rules
//! - Equality is (instance identity, listener type, operation name); two handlers
//!   bound from the same `Arc` and operation are the same handler.
//! - `invalidate()` is idempotent and cannot be undone.
//! - Failures inside the operation are reported as [`BusError::Dispatch`],
//!   never as a bare panic (unless panic catching is disabled on the bus).

use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::DispatchContext;
use crate::error::{BusError, HandlerFailure, HandlerResult};
use crate::events::{Event, EventType};
use crate::subscribers::Method;

type Call = Arc<dyn Fn(&dyn Event, &DispatchContext) -> HandlerResult + Send + Sync>;

/// Registered subscriber operation bound to a listener instance.
pub struct EventHandler {
    target: Arc<dyn Any + Send + Sync>,
    listener: &'static str,
    listener_id: TypeId,
    name: &'static str,
    event_type: EventType,
    call: Call,
    valid: AtomicBool,
}

impl EventHandler {
    /// Binds `method` to `target`.
    pub(crate) fn bind<L: Send + Sync + 'static>(target: &Arc<L>, method: &Method<L>) -> Self {
        let instance = Arc::clone(target);
        let invoke = Arc::clone(&method.invoke);
        let call: Call = Arc::new(move |event: &dyn Event, cx: &DispatchContext| {
            invoke(&*instance, event, cx)
        });

        Self {
            target: Arc::clone(target) as Arc<dyn Any + Send + Sync>,
            listener: std::any::type_name::<L>(),
            listener_id: TypeId::of::<L>(),
            name: method.name,
            event_type: method.event_type,
            call,
            valid: AtomicBool::new(true),
        }
    }

    /// Invokes the bound operation with `event`.
    ///
    /// Errors and (by default) panics raised by the operation are wrapped in
    /// [`BusError::Dispatch`] with the event type and this handler's description.
    pub fn dispatch(&self, event: &dyn Event, cx: &DispatchContext) -> Result<(), BusError> {
        let outcome = if cx.bus().config().catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| (self.call)(event, cx))) {
                Ok(result) => result.map_err(HandlerFailure::Failed),
                Err(payload) => Err(HandlerFailure::from_panic(payload)),
            }
        } else {
            (self.call)(event, cx).map_err(HandlerFailure::Failed)
        };

        outcome.map_err(|source| BusError::Dispatch {
            event: event.type_name(),
            handler: self.to_string(),
            source,
        })
    }

    /// Marks this handler permanently undeliverable.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// False once [`invalidate`](Self::invalidate) has been called.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Listener type name.
    pub fn listener(&self) -> &'static str {
        self.listener
    }

    /// Operation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Event type the operation was declared for.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    fn target_addr(&self) -> *const () {
        Arc::as_ptr(&self.target) as *const ()
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.target_addr() == other.target_addr()
            && self.listener_id == other.listener_id
            && self.name == other.name
    }
}

impl Eq for EventHandler {}

impl fmt::Display for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[EventHandler {}::{}]", self.listener, self.name)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("listener", &self.listener)
            .field("name", &self.name)
            .field("event", &self.event_type)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::core::{Bus, BusConfig};
    use crate::subscribers::Subscriptions;

    struct Ping;
    impl Event for Ping {}

    #[derive(Default)]
    struct Probe {
        seen: AtomicUsize,
    }

    impl Probe {
        fn on_ping(&self, _: &Ping, _: &DispatchContext) -> HandlerResult {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn fails(&self, _: &Ping, _: &DispatchContext) -> HandlerResult {
            Err("nope".into())
        }
        fn panics(&self, _: &Ping, _: &DispatchContext) -> HandlerResult {
            panic!("kaboom")
        }
    }

    fn method(name: &'static str, op: fn(&Probe, &Ping, &DispatchContext) -> HandlerResult) -> Method<Probe> {
        let mut table = Subscriptions::<Probe>::new();
        table.on(name, op);
        let methods = table.finish().unwrap();
        let (_, group) = &methods.groups()[0];
        group[0].clone()
    }

    #[test]
    fn test_dispatch_invokes_bound_instance() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("on_ping", Probe::on_ping));
        let cx = Bus::new().context();

        handler.dispatch(&Ping, &cx).unwrap();
        handler.dispatch(&Ping, &cx).unwrap();
        assert_eq!(probe.seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_identity_is_instance_and_operation() {
        let a = Arc::new(Probe::default());
        let b = Arc::new(Probe::default());
        let m = method("on_ping", Probe::on_ping);

        assert_eq!(EventHandler::bind(&a, &m), EventHandler::bind(&a, &m));
        assert_ne!(EventHandler::bind(&a, &m), EventHandler::bind(&b, &m));
        assert_ne!(
            EventHandler::bind(&a, &m),
            EventHandler::bind(&a, &method("fails", Probe::fails))
        );
    }

    #[test]
    fn test_invalidate_is_one_way() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("on_ping", Probe::on_ping));
        assert!(handler.is_valid());
        handler.invalidate();
        handler.invalidate();
        assert!(!handler.is_valid());
    }

    #[test]
    fn test_error_is_wrapped_with_context() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("fails", Probe::fails));
        let cx = Bus::new().context();

        let err = handler.dispatch(&Ping, &cx).unwrap_err();
        match err {
            BusError::Dispatch { event, handler, source } => {
                assert!(event.ends_with("Ping"));
                assert!(handler.ends_with("::fails]"));
                assert!(matches!(source, HandlerFailure::Failed(ref e) if e.to_string() == "nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panic_is_wrapped_when_catching() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("panics", Probe::panics));
        let cx = Bus::new().context();

        let err = handler.dispatch(&Ping, &cx).unwrap_err();
        assert!(matches!(
            err,
            BusError::Dispatch { source: HandlerFailure::Panicked(ref msg), .. } if msg == "kaboom"
        ));
    }

    #[test]
    fn test_panic_propagates_when_not_catching() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("panics", Probe::panics));
        let bus = Bus::with_config(BusConfig {
            catch_panics: false,
            ..BusConfig::default()
        });
        let cx = bus.context();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.dispatch(&Ping, &cx)));
        assert!(outcome.is_err());
    }

    #[test]
    fn test_display() {
        let probe = Arc::new(Probe::default());
        let handler = EventHandler::bind(&probe, &method("on_ping", Probe::on_ping));
        let shown = handler.to_string();
        assert!(shown.starts_with("[EventHandler "));
        assert!(shown.ends_with("Probe::on_ping]"));
    }
}
