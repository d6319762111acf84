//! # Dispatch context: ordered, reentrancy-safe delivery.
//!
//! A [`DispatchContext`] owns one FIFO queue of pending deliveries and one
//! "currently dispatching" flag. It replaces ambient per-thread state: whoever
//! owns the context (a worker, a request, a single `Bus::post` call) owns the
//! ordering guarantees.
//!
//! ## State machine
//! ```text
//!            post() with idle context
//!   idle ───────────────────────────────► dispatching
//!    ▲                                         │
//!    │   queue empty │ handler error │ panic   │
//!    └─────────────────────────────────────────┘
//!          (drop guard resets the flag on every exit path)
//! ```
//!
//! ## Reentrancy
//! ```text
//! cx.post(A)                       queue: [A→h1, A→h2]
//!   drain: A→h1
//!     h1 calls cx.post(B)          queue: [A→h2, B→h3]   (returns at once)
//!   drain: A→h2
//!   drain: B→h3
//! cx.post(A) returns
//! ```
//!
//! ## Rules
//! - FIFO per context; nothing is delivered inline from a nested `post`.
//! - At most one context per (bus, thread) drains at a time. A post made on that
//!   thread through any other context of the same bus (including `Bus::post`)
//!   is appended to the draining queue and returns `Ok(())` at once.
//! - Invalidated handlers are skipped when popped.
//! - On a failed delivery the error is returned and the rest of the queue is
//!   dropped.
//! - The context is `!Sync`; share the [`Bus`], not the context.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::BusError;
use crate::events::Event;
use crate::handlers::EventHandler;
use crate::subscribers::Capability;

use super::bus::Bus;

/// One queued delivery.
struct Pending {
    event: Arc<dyn Event>,
    handler: Arc<EventHandler>,
}

type Queue = Arc<Mutex<VecDeque<Pending>>>;

/// Queues currently being drained, one per thread.
#[derive(Default)]
pub(crate) struct ActiveDrains {
    by_thread: RwLock<HashMap<ThreadId, Queue>>,
}

impl ActiveDrains {
    /// The queue being drained on the calling thread, if any.
    fn current(&self) -> Option<Queue> {
        self.by_thread.read().get(&thread::current().id()).cloned()
    }

    /// Marks `queue` as the calling thread's draining queue.
    ///
    /// Returns `false` if another queue already holds the slot.
    fn claim(&self, queue: &Queue) -> bool {
        let mut map = self.by_thread.write();
        match map.entry(thread::current().id()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(queue));
                true
            }
        }
    }

    fn release(&self) {
        self.by_thread.write().remove(&thread::current().id());
    }

    /// True while some context of the bus drains on the calling thread.
    #[cfg(test)]
    pub(crate) fn is_draining(&self) -> bool {
        self.by_thread.read().contains_key(&thread::current().id())
    }
}

/// Owner of a dispatch queue and its reentrancy flag.
pub struct DispatchContext {
    bus: Bus,
    queue: Queue,
    dispatching: Cell<bool>,
}

impl DispatchContext {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            bus,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            dispatching: Cell::new(false),
        }
    }

    /// The bus this context delivers for.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// True while this context is draining its queue.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Number of deliveries waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Posts `event` under capability `C` through this context.
    ///
    /// Called from inside a subscriber, the deliveries are appended to the
    /// running queue and this returns `Ok(())` immediately.
    pub fn post<C, E>(&self, event: E) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
        E: Event,
    {
        self.post_arc::<C>(Arc::new(event))
    }

    /// Like [`post`](Self::post) for an already shared, type-erased event.
    pub fn post_arc<C>(&self, event: Arc<dyn Event>) -> Result<(), BusError>
    where
        C: Capability + ?Sized,
    {
        self.bus.enforce()?;

        let handlers = self.bus.handlers_for::<C>(event.as_ref());
        let pending = handlers.into_iter().map(|handler| Pending {
            event: Arc::clone(&event),
            handler,
        });

        if !self.is_dispatching() {
            if let Some(active) = self.bus.drains().current() {
                trace!(
                    bus = %self.bus,
                    capability = std::any::type_name::<C>(),
                    event = event.as_ref().type_name(),
                    "enqueue on draining context"
                );
                active.lock().extend(pending);
                return Ok(());
            }
        }

        trace!(
            bus = %self.bus,
            capability = std::any::type_name::<C>(),
            event = event.as_ref().type_name(),
            nested = self.is_dispatching(),
            "enqueue"
        );
        self.queue.lock().extend(pending);

        self.drain()
    }

    /// Delivers queued entries until the queue is empty.
    ///
    /// Returns at once if this context is already draining.
    fn drain(&self) -> Result<(), BusError> {
        if self.dispatching.replace(true) {
            return Ok(());
        }
        let mut guard = DrainGuard {
            cx: self,
            claimed: self.bus.drains().claim(&self.queue),
            finished: false,
        };

        loop {
            let next = self.queue.lock().pop_front();
            let Some(Pending { event, handler }) = next else {
                break;
            };

            if !handler.is_valid() {
                trace!(handler = %handler, "skipping invalidated handler");
                continue;
            }

            if let Err(err) = handler.dispatch(event.as_ref(), self) {
                debug!(bus = %self.bus, label = err.as_label(), error = %err.as_message(), "delivery failed");
                return Err(err);
            }
        }

        guard.finished = true;
        Ok(())
    }
}

/// Resets the dispatching flag on every exit from `drain`.
struct DrainGuard<'a> {
    cx: &'a DispatchContext,
    claimed: bool,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let abandoned = {
                let mut queue = self.cx.queue.lock();
                let n = queue.len();
                queue.clear();
                n
            };
            if abandoned > 0 {
                debug!(bus = %self.cx.bus, abandoned, "dropped queued deliveries");
            }
        }
        if self.claimed {
            self.cx.bus.drains().release();
        }
        self.cx.dispatching.set(false);
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("bus", &self.bus.identifier())
            .field("dispatching", &self.is_dispatching())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::error::{HandlerFailure, HandlerResult};
    use crate::subscribers::{Subscriber, Subscriptions};

    trait Pipeline: Send + Sync {}
    impl Capability for dyn Pipeline {}

    struct Start;
    impl Event for Start {}

    struct Step(u32);
    impl Event for Step {}

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn first(&self, _: &Start, cx: &DispatchContext) -> HandlerResult {
            self.log.lock().push("first:start".into());
            assert!(cx.is_dispatching());
            cx.post::<dyn Pipeline, _>(Step(1))?;
            // Nested post only enqueues.
            self.log.lock().push("first:after-post".into());
            Ok(())
        }
        fn second(&self, _: &Start, _: &DispatchContext) -> HandlerResult {
            self.log.lock().push("second:start".into());
            Ok(())
        }
        fn step(&self, ev: &Step, cx: &DispatchContext) -> HandlerResult {
            self.log.lock().push(format!("step:{}", ev.0));
            if ev.0 < 3 {
                cx.post::<dyn Pipeline, _>(Step(ev.0 + 1))?;
            }
            Ok(())
        }
    }

    impl Subscriber<dyn Pipeline> for Recorder {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table
                .on("first", Self::first)
                .on("second", Self::second)
                .on("step", Self::step);
        }
    }

    #[test]
    fn test_nested_posts_are_breadth_first() {
        let bus = Bus::new();
        let rec = Arc::new(Recorder::default());
        bus.register::<dyn Pipeline, _>(&rec).unwrap();

        let cx = bus.context();
        cx.post::<dyn Pipeline, _>(Start).unwrap();

        assert_eq!(
            *rec.log.lock(),
            vec![
                "first:start",
                "first:after-post",
                "second:start",
                "step:1",
                "step:2",
                "step:3",
            ]
        );
        assert!(!cx.is_dispatching());
        assert_eq!(cx.pending(), 0);
    }

    struct Faulty {
        after: Mutex<u32>,
    }

    impl Faulty {
        fn explode(&self, _: &Start, cx: &DispatchContext) -> HandlerResult {
            cx.post::<dyn Pipeline, _>(Step(1))?;
            Err("exploded".into())
        }
        fn later(&self, _: &Step, _: &DispatchContext) -> HandlerResult {
            *self.after.lock() += 1;
            Ok(())
        }
    }

    impl Subscriber<dyn Pipeline> for Faulty {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("explode", Self::explode).on("later", Self::later);
        }
    }

    #[test]
    fn test_failure_resets_context_and_drops_queue() {
        let bus = Bus::new();
        let faulty = Arc::new(Faulty { after: Mutex::new(0) });
        bus.register::<dyn Pipeline, _>(&faulty).unwrap();

        let cx = bus.context();
        let err = cx.post::<dyn Pipeline, _>(Start).unwrap_err();
        assert!(matches!(
            err,
            BusError::Dispatch { source: HandlerFailure::Failed(_), .. }
        ));
        assert!(!cx.is_dispatching());
        assert_eq!(cx.pending(), 0);
        assert_eq!(*faulty.after.lock(), 0);

        // Still usable afterwards.
        cx.post::<dyn Pipeline, _>(Step(7)).unwrap();
        assert_eq!(*faulty.after.lock(), 1);
    }

    struct Unregistering {
        bus: Bus,
        victim: Arc<Victim>,
    }

    #[derive(Default)]
    struct Victim {
        hits: Mutex<u32>,
    }

    impl Victim {
        fn on_start(&self, _: &Start, _: &DispatchContext) -> HandlerResult {
            *self.hits.lock() += 1;
            Ok(())
        }
    }

    impl Subscriber<dyn Pipeline> for Victim {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("on_start", Self::on_start);
        }
    }

    impl Unregistering {
        fn on_start(&self, _: &Start, _: &DispatchContext) -> HandlerResult {
            self.bus.unregister::<dyn Pipeline, _>(&self.victim)?;
            Ok(())
        }
    }

    impl Subscriber<dyn Pipeline> for Unregistering {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("on_start", Self::on_start);
        }
    }

    #[test]
    fn test_invalidated_handler_is_skipped_while_queued() {
        let bus = Bus::new();
        let victim = Arc::new(Victim::default());
        let killer = Arc::new(Unregistering {
            bus: bus.clone(),
            victim: Arc::clone(&victim),
        });
        // Killer first, so the victim's delivery is already queued when it is unregistered.
        bus.register::<dyn Pipeline, _>(&killer).unwrap();
        bus.register::<dyn Pipeline, _>(&victim).unwrap();

        bus.post::<dyn Pipeline, _>(Start).unwrap();
        assert_eq!(*victim.hits.lock(), 0);
    }

    struct Countdown {
        bus: Bus,
        hits: Mutex<u32>,
        deepest: Mutex<usize>,
        depth: Mutex<usize>,
    }

    impl Countdown {
        fn on_step(&self, ev: &Step, _: &DispatchContext) -> HandlerResult {
            *self.hits.lock() += 1;
            let depth = {
                let mut depth = self.depth.lock();
                *depth += 1;
                *depth
            };
            let deepest = *self.deepest.lock();
            *self.deepest.lock() = deepest.max(depth);

            let result = if ev.0 > 0 {
                // A fresh context each time; it must still join the running queue.
                self.bus.context().post::<dyn Pipeline, _>(Step(ev.0 - 1))
            } else {
                Ok(())
            };
            *self.depth.lock() -= 1;
            result.map_err(Into::into)
        }
    }

    impl Subscriber<dyn Pipeline> for Countdown {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("on_step", Self::on_step);
        }
    }

    #[test]
    fn test_reposting_through_other_contexts_stays_flat() {
        let bus = Bus::new();
        let countdown = Arc::new(Countdown {
            bus: bus.clone(),
            hits: Mutex::new(0),
            deepest: Mutex::new(0),
            depth: Mutex::new(0),
        });
        bus.register::<dyn Pipeline, _>(&countdown).unwrap();

        bus.post::<dyn Pipeline, _>(Step(50_000)).unwrap();
        assert_eq!(*countdown.hits.lock(), 50_001);
        assert_eq!(*countdown.deepest.lock(), 1);
        assert!(!bus.drains().is_draining());
    }

    #[test]
    fn test_draining_is_per_thread() {
        let bus = Bus::new();
        let rec = Arc::new(Recorder::default());
        bus.register::<dyn Pipeline, _>(&rec).unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| bus.post::<dyn Pipeline, _>(Step(3)).unwrap());
            }
        });
        // Each thread drained its own post; none were parked on another thread's queue.
        assert_eq!(rec.log.lock().len(), 4);
        assert!(!bus.drains().is_draining());
    }

    #[test]
    fn test_post_without_handlers_is_ok() {
        let bus = Bus::new();
        let cx = bus.context();
        cx.post::<dyn Pipeline, _>(Start).unwrap();
        assert_eq!(cx.pending(), 0);
        assert!(!cx.is_dispatching());
    }
}
