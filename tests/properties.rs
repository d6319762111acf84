//! Property tests for delivery counts under registration churn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use typebus::{Bus, Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};

trait Sink: Send + Sync {}
impl Capability for dyn Sink {}

struct Sample;
impl Event for Sample {}

#[derive(Default)]
struct Counter {
    hits: AtomicUsize,
}

impl Counter {
    fn on_sample(&self, _: &Sample, _: &DispatchContext) -> HandlerResult {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Subscriber<dyn Sink> for Counter {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table.on("on_sample", Self::on_sample);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Unregister(usize),
    Post,
}

fn op(listeners: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..listeners).prop_map(Op::Register),
        (0..listeners).prop_map(Op::Unregister),
        Just(Op::Post),
    ]
}

proptest! {
    #[test]
    fn repeated_registration_delivers_once(listeners in 1usize..6, repeats in 1usize..4, posts in 1usize..5) {
        let bus = Bus::new();
        let counters: Vec<Arc<Counter>> = (0..listeners).map(|_| Arc::new(Counter::default())).collect();
        for _ in 0..repeats {
            for c in &counters {
                bus.register::<dyn Sink, _>(c).unwrap();
            }
        }
        prop_assert_eq!(bus.handler_count::<dyn Sink, Sample>(), listeners);

        for _ in 0..posts {
            bus.post::<dyn Sink, _>(Sample).unwrap();
        }
        for c in &counters {
            prop_assert_eq!(c.hits.load(Ordering::SeqCst), posts);
        }
    }

    #[test]
    fn deliveries_match_a_simple_model(ops in prop::collection::vec(op(4), 0..40)) {
        let bus = Bus::new();
        let counters: Vec<Arc<Counter>> = (0..4).map(|_| Arc::new(Counter::default())).collect();
        let mut registered = [false; 4];
        let mut expected = [0usize; 4];

        for op in ops {
            match op {
                Op::Register(i) => {
                    bus.register::<dyn Sink, _>(&counters[i]).unwrap();
                    registered[i] = true;
                }
                Op::Unregister(i) => {
                    let result = bus.unregister::<dyn Sink, _>(&counters[i]);
                    prop_assert_eq!(result.is_ok(), registered[i]);
                    if let Err(err) = result {
                        prop_assert!(err.is_usage());
                    }
                    registered[i] = false;
                }
                Op::Post => {
                    bus.post::<dyn Sink, _>(Sample).unwrap();
                    for (i, live) in registered.iter().enumerate() {
                        if *live {
                            expected[i] += 1;
                        }
                    }
                }
            }
            prop_assert_eq!(
                bus.handler_count::<dyn Sink, Sample>(),
                registered.iter().filter(|r| **r).count()
            );
        }

        for (i, c) in counters.iter().enumerate() {
            prop_assert_eq!(c.hits.load(Ordering::SeqCst), expected[i]);
        }
    }
}
