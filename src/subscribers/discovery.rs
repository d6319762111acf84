//! # Subscriber discovery cache.
//!
//! [`SubscriberCache`] builds the [`SubscriberMethods`] table of a listener type
//! the first time it is registered under a capability, and hands out the same
//! `Arc` afterwards.
//!
//! ## Rules
//! - One entry per (capability, listener type).
//! - [`Subscriber::subscriptions`] runs at most once successfully per entry,
//!   even when several threads register the same listener type concurrently.
//! - A failed build (conflicting declarations) is not cached; the next call
//!   retries and fails the same way.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::BusError;

use super::subscriber::{Capability, Subscriber};
use super::table::{SubscriberMethods, Subscriptions};

type Erased = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct ListenerKey {
    capability: TypeId,
    listener: TypeId,
}

impl ListenerKey {
    fn of<C: Capability + ?Sized, L: 'static>() -> Self {
        Self {
            capability: TypeId::of::<C>(),
            listener: TypeId::of::<L>(),
        }
    }
}

/// Per-bus cache of discovered subscriber tables.
#[derive(Default)]
pub(crate) struct SubscriberCache {
    tables: RwLock<HashMap<ListenerKey, Arc<OnceCell<Erased>>>>,
}

impl SubscriberCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the subscriber table of `L` under capability `C`, building it once.
    pub(crate) fn discover<C, L>(&self) -> Result<Arc<SubscriberMethods<L>>, BusError>
    where
        C: Capability + ?Sized,
        L: Subscriber<C>,
    {
        let cell = self.cell(ListenerKey::of::<C, L>());

        let erased = cell.get_or_try_init(|| {
            let mut table = Subscriptions::<L>::new();
            L::subscriptions(&mut table);
            let methods = table.finish()?;
            debug!(
                capability = std::any::type_name::<C>(),
                listener = methods.listener(),
                operations = methods.len(),
                "discovered subscribers"
            );
            Ok::<Erased, BusError>(Arc::new(methods))
        })?;

        match Arc::clone(erased).downcast::<SubscriberMethods<L>>() {
            Ok(methods) => Ok(methods),
            Err(_) => unreachable!("subscriber table is keyed by listener TypeId"),
        }
    }

    /// Number of (capability, listener) pairs seen so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns the once-cell for `key`, inserting an empty one if absent.
    fn cell(&self, key: ListenerKey) -> Arc<OnceCell<Erased>> {
        if let Some(cell) = self.tables.read().get(&key) {
            return Arc::clone(cell);
        }
        let mut tables = self.tables.write();
        Arc::clone(tables.entry(key).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::core::DispatchContext;
    use crate::error::HandlerResult;
    use crate::events::{Event, EventType};

    trait Audit {}
    impl Capability for dyn Audit {}

    trait Metrics {}
    impl Capability for dyn Metrics {}

    struct Tick;
    impl Event for Tick {}

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;
    impl Counted {
        fn on_tick(&self, _: &Tick, _: &DispatchContext) -> HandlerResult {
            Ok(())
        }
    }
    impl Subscriber<dyn Audit> for Counted {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            table.on("on_tick", Self::on_tick);
        }
    }

    static METRIC_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Shared;
    impl Shared {
        fn on_tick(&self, _: &Tick, _: &DispatchContext) -> HandlerResult {
            Ok(())
        }
    }
    impl Subscriber<dyn Audit> for Shared {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("on_tick", Self::on_tick);
        }
    }
    impl Subscriber<dyn Metrics> for Shared {
        fn subscriptions(_table: &mut Subscriptions<Self>) {
            METRIC_BUILDS.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Broken;
    impl Broken {
        fn a(&self, _: &Tick, _: &DispatchContext) -> HandlerResult {
            Ok(())
        }
        fn b(&self, _: &Pong, _: &DispatchContext) -> HandlerResult {
            Ok(())
        }
    }
    struct Pong;
    impl Event for Pong {}
    impl Subscriber<dyn Audit> for Broken {
        fn subscriptions(table: &mut Subscriptions<Self>) {
            table.on("handle", Self::a).on("handle", Self::b);
        }
    }

    #[test]
    fn test_discovery_runs_once_under_concurrent_first_use() {
        let cache = SubscriberCache::new();
        let tables: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.discover::<dyn Audit, Counted>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        for t in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], t));
        }
        assert_eq!(tables[0].len(), 1);
    }

    #[test]
    fn test_tables_are_per_capability() {
        let cache = SubscriberCache::new();
        let audit = cache.discover::<dyn Audit, Shared>().unwrap();
        let metrics = cache.discover::<dyn Metrics, Shared>().unwrap();
        cache.discover::<dyn Metrics, Shared>().unwrap();

        assert_eq!(audit.len(), 1);
        assert_eq!(
            audit.event_types().collect::<Vec<_>>(),
            vec![EventType::of::<Tick>()]
        );
        assert!(metrics.is_empty());
        assert_eq!(METRIC_BUILDS.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_discovery_is_not_cached() {
        let cache = SubscriberCache::new();
        let first = cache.discover::<dyn Audit, Broken>().unwrap_err();
        let second = cache.discover::<dyn Audit, Broken>().unwrap_err();
        assert!(first.is_configuration());
        assert_eq!(first.as_label(), second.as_label());
    }
}
