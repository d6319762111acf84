//! # Example: hierarchy
//!
//! Events declare a supertype chain through [`Event::supertype`]; a subscriber
//! of an ancestor also receives every descendant, nearest type first.
//!
//! ## Flow
//! ```text
//! post(Deploy)
//!     dispatch types = [Deploy, Change, Audit]
//!     ├─► Ops::on_deploy   (Deploy)
//!     ├─► Ops::on_change   (Change)
//!     └─► Ledger::on_audit (Audit)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=typebus=trace cargo run --example hierarchy
//! ```

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use typebus::{Bus, Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};

pub trait Observe: Send + Sync {}
impl Capability for dyn Observe {}

pub struct Audit {
    pub who: &'static str,
}
impl Event for Audit {}

pub struct Change {
    pub audit: Audit,
    pub what: &'static str,
}
impl Event for Change {
    fn supertype(&self) -> Option<&dyn Event> {
        Some(&self.audit)
    }
}

pub struct Deploy {
    pub change: Change,
    pub version: &'static str,
}
impl Event for Deploy {
    fn supertype(&self) -> Option<&dyn Event> {
        Some(&self.change)
    }
}

struct Ops;

impl Ops {
    fn on_deploy(&self, ev: &Deploy, _: &DispatchContext) -> HandlerResult {
        println!("[ops] deploy {}", ev.version);
        Ok(())
    }
    fn on_change(&self, ev: &Change, _: &DispatchContext) -> HandlerResult {
        println!("[ops] change {}", ev.what);
        Ok(())
    }
}

impl Subscriber<dyn Observe> for Ops {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table
            .on("on_deploy", Self::on_deploy)
            .on("on_change", Self::on_change);
    }
}

struct Ledger;

impl Ledger {
    fn on_audit(&self, ev: &Audit, _: &DispatchContext) -> HandlerResult {
        println!("[ledger] audit by {}", ev.who);
        Ok(())
    }
}

impl Subscriber<dyn Observe> for Ledger {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table.on("on_audit", Self::on_audit);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = Bus::builder().with_identifier("hierarchy").build();
    bus.register::<dyn Observe, _>(&Arc::new(Ops))?;
    bus.register::<dyn Observe, _>(&Arc::new(Ledger))?;

    println!("-- post Deploy");
    bus.post::<dyn Observe, _>(Deploy {
        change: Change {
            audit: Audit { who: "ci" },
            what: "rollout",
        },
        version: "1.4.2",
    })?;

    println!("-- post Audit");
    bus.post::<dyn Observe, _>(Audit { who: "operator" })?;
    Ok(())
}
