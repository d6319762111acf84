//! Error types used by the bus and by subscriber operations.
//!
//! This module defines two enums:
//!
//! - [`BusError`]: errors raised by `register`, `unregister` and `post`.
//! - [`HandlerFailure`]: what went wrong inside a single subscriber call.
//!
//! [`BusError`] provides helper methods (`as_label`, `as_message`) for logs/metrics,
//! plus classifiers that separate configuration mistakes from usage mistakes and
//! delivery failures.

use std::thread::ThreadId;

use thiserror::Error;

/// Boxed error returned by subscriber operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type every subscriber operation returns.
pub type HandlerResult = Result<(), BoxError>;

/// # Errors produced by the bus.
///
/// Variants fall into three groups:
/// - **configuration**: [`ConflictingSubscriber`](BusError::ConflictingSubscriber),
///   [`WrongThread`](BusError::WrongThread)
/// - **usage**: [`NotRegistered`](BusError::NotRegistered)
/// - **delivery**: [`Dispatch`](BusError::Dispatch)
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// A listener declared the same operation name for two different event types.
    #[error("subscriber `{name}` on {listener} is declared for both {first} and {second}")]
    ConflictingSubscriber {
        /// Listener type name.
        listener: &'static str,
        /// Operation name used twice.
        name: &'static str,
        /// Event type of the first declaration.
        first: &'static str,
        /// Event type of the conflicting declaration.
        second: &'static str,
    },

    /// The bus is pinned to a thread and was called from another one.
    #[error("{bus} accessed from thread {actual:?}; it is pinned to {expected:?}")]
    WrongThread {
        /// Display form of the bus.
        bus: String,
        /// Thread the bus is pinned to.
        expected: ThreadId,
        /// Thread that made the call.
        actual: ThreadId,
    },

    /// `unregister` found no matching handler.
    #[error("handler not registered for `{listener}` under {capability} for {event}; was it registered?")]
    NotRegistered {
        /// Listener type name.
        listener: &'static str,
        /// Capability type name.
        capability: &'static str,
        /// Event type name of the first missing slot.
        event: &'static str,
    },

    /// A subscriber operation failed while handling an event.
    #[error("could not dispatch event {event} to {handler}")]
    Dispatch {
        /// Concrete type name of the event being delivered.
        event: &'static str,
        /// Display form of the handler.
        handler: String,
        /// What the subscriber reported.
        #[source]
        source: HandlerFailure,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use typebus::BusError;
    ///
    /// let err = BusError::NotRegistered { listener: "L", capability: "C", event: "E" };
    /// assert_eq!(err.as_label(), "bus_not_registered");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::ConflictingSubscriber { .. } => "bus_conflicting_subscriber",
            BusError::WrongThread { .. } => "bus_wrong_thread",
            BusError::NotRegistered { .. } => "bus_not_registered",
            BusError::Dispatch { .. } => "bus_dispatch_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::ConflictingSubscriber { listener, name, .. } => {
                format!("conflicting subscriber: {listener}::{name}")
            }
            BusError::WrongThread { expected, actual, .. } => {
                format!("wrong thread: expected={expected:?} actual={actual:?}")
            }
            BusError::NotRegistered { listener, event, .. } => {
                format!("not registered: listener={listener} event={event}")
            }
            BusError::Dispatch { event, handler, source } => {
                format!(
                    "dispatch failed: event={event} handler={handler} cause={}",
                    source.cause_message()
                )
            }
        }
    }

    /// True for errors caused by how a listener or bus was set up.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BusError::ConflictingSubscriber { .. } | BusError::WrongThread { .. }
        )
    }

    /// True for errors caused by a caller using the bus incorrectly.
    pub fn is_usage(&self) -> bool {
        matches!(self, BusError::NotRegistered { .. })
    }

    /// True for errors raised by subscriber code during delivery.
    pub fn is_delivery(&self) -> bool {
        matches!(self, BusError::Dispatch { .. })
    }
}

/// # Failure reported by a single subscriber call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerFailure {
    /// The operation returned an error.
    #[error("subscriber returned an error")]
    Failed(#[source] BoxError),

    /// The operation panicked; the payload message is kept.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl HandlerFailure {
    /// The underlying cause as one line: the returned error, or the panic message.
    pub fn cause_message(&self) -> String {
        match self {
            HandlerFailure::Failed(err) => err.to_string(),
            HandlerFailure::Panicked(msg) => format!("panicked: {msg}"),
        }
    }

    /// Builds a [`HandlerFailure::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        HandlerFailure::Panicked(info)
    }
}
