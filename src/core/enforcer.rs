//! # Thread confinement for bus calls.

use std::fmt;
use std::thread::{self, ThreadId};

use crate::error::BusError;

/// Which threads may call a bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadEnforcer {
    /// No restriction.
    #[default]
    Any,
    /// Only the given thread.
    Pinned(ThreadId),
}

impl ThreadEnforcer {
    /// Pins to the calling thread.
    pub fn current() -> Self {
        ThreadEnforcer::Pinned(thread::current().id())
    }

    /// Fails with [`BusError::WrongThread`] when called off the pinned thread.
    pub(crate) fn enforce(&self, bus: &dyn fmt::Display) -> Result<(), BusError> {
        match *self {
            ThreadEnforcer::Any => Ok(()),
            ThreadEnforcer::Pinned(expected) => {
                let actual = thread::current().id();
                if actual == expected {
                    Ok(())
                } else {
                    Err(BusError::WrongThread {
                        bus: bus.to_string(),
                        expected,
                        actual,
                    })
                }
            }
        }
    }
}
