//! # Example: worker_contexts
//!
//! One shared [`Bus`], several worker threads, each owning a long-lived
//! [`DispatchContext`]. Subscribers chain follow-up events through the context
//! they are handed, so each worker sees breadth-first delivery of its own posts.
//!
//! ## Flow
//! ```text
//! worker N: cx = bus.context()
//!   cx.post(Job)
//!     ├─► Pipeline::on_job     ─► cx.post(Done)  (queued)
//!     ├─► Metrics::on_job
//!     └─► Pipeline::on_done
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=typebus=debug cargo run --example worker_contexts
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, trace};
use tracing_subscriber::EnvFilter;
use typebus::{Bus, Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};

const WORKERS: usize = 4;
const JOBS_PER_WORKER: usize = 25;

pub trait Jobs: Send + Sync {}
impl Capability for dyn Jobs {}

pub struct Job {
    pub worker: usize,
    pub seq: usize,
}
impl Event for Job {}

pub struct Done {
    pub worker: usize,
}
impl Event for Done {}

#[derive(Default)]
struct Pipeline {
    done: AtomicUsize,
}

impl Pipeline {
    fn on_job(&self, ev: &Job, cx: &DispatchContext) -> HandlerResult {
        cx.post::<dyn Jobs, _>(Done { worker: ev.worker })?;
        Ok(())
    }
    fn on_done(&self, ev: &Done, _: &DispatchContext) -> HandlerResult {
        let total = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(worker = ev.worker, total, "job done");
        Ok(())
    }
}

impl Subscriber<dyn Jobs> for Pipeline {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table.on("on_job", Self::on_job).on("on_done", Self::on_done);
    }
}

#[derive(Default)]
struct Metrics {
    jobs: AtomicUsize,
    last_seq: AtomicUsize,
}

impl Metrics {
    fn on_job(&self, ev: &Job, _: &DispatchContext) -> HandlerResult {
        self.jobs.fetch_add(1, Ordering::Relaxed);
        self.last_seq.fetch_max(ev.seq, Ordering::Relaxed);
        Ok(())
    }
}

impl Subscriber<dyn Jobs> for Metrics {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table.on("on_job", Self::on_job);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let bus = Bus::builder().with_identifier("workers").build();
    let pipeline = Arc::new(Pipeline::default());
    let metrics = Arc::new(Metrics::default());
    bus.register::<dyn Jobs, _>(&pipeline)?;
    bus.register::<dyn Jobs, _>(&metrics)?;

    std::thread::scope(|s| -> Result<(), typebus::BusError> {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let bus = bus.clone();
                s.spawn(move || -> Result<(), typebus::BusError> {
                    let cx = bus.context();
                    for seq in 0..JOBS_PER_WORKER {
                        cx.post::<dyn Jobs, _>(Job { worker, seq })?;
                    }
                    info!(worker, "worker finished");
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => eprintln!("[main] worker panicked"),
            }
        }
        Ok(())
    })?;

    println!(
        "[main] jobs={} done={} last_seq={}",
        metrics.jobs.load(Ordering::Relaxed),
        pipeline.done.load(Ordering::Relaxed),
        metrics.last_seq.load(Ordering::Relaxed),
    );
    Ok(())
}
