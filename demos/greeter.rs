//! # Example: greeter
//!
//! Minimal register / post / unregister round trip.
//!
//! Demonstrates how to:
//! - Declare a capability with [`Capability`].
//! - Declare subscriber operations with [`Subscriber`].
//! - Post events and observe delivery.
//!
//! ## Flow
//! ```text
//! Bus::register::<dyn Greeter>(&console)
//!     └─► (dyn Greeter, Hello) → [Console::on_hello]
//! Bus::post::<dyn Greeter>(Hello)  ─► Console::on_hello
//! Bus::unregister::<dyn Greeter>(&console)
//! Bus::post::<dyn Greeter>(Hello)  ─► (nobody)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=typebus=debug cargo run --example greeter
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use typebus::{Bus, Capability, DispatchContext, Event, HandlerResult, Subscriber, Subscriptions};

pub trait Greeter: Send + Sync {}
impl Capability for dyn Greeter {}

pub struct Hello {
    pub from: String,
}
impl Event for Hello {}

#[derive(Default)]
struct Console {
    lines: Mutex<Vec<String>>,
}

impl Greeter for Console {}

impl Console {
    fn on_hello(&self, ev: &Hello, _cx: &DispatchContext) -> HandlerResult {
        let line = format!("hello from {}", ev.from);
        println!("[console] {line}");
        self.lines.lock().push(line);
        Ok(())
    }
}

impl Subscriber<dyn Greeter> for Console {
    fn subscriptions(table: &mut Subscriptions<Self>) {
        table.on("on_hello", Self::on_hello);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 1. One bus, default configuration
    let bus = Bus::new();
    let console = Arc::new(Console::default());

    // 2. Register and post
    bus.register::<dyn Greeter, _>(&console)?;
    bus.post::<dyn Greeter, _>(Hello { from: "alice".into() })?;
    bus.post::<dyn Greeter, _>(Hello { from: "bob".into() })?;

    // 3. Unregister; further posts reach nobody
    bus.unregister::<dyn Greeter, _>(&console)?;
    bus.post::<dyn Greeter, _>(Hello { from: "carol".into() })?;

    println!("[main] console saw {} greetings", console.lines.lock().len());
    Ok(())
}
