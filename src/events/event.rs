//! # Event values and their runtime type descriptors.
//!
//! Anything posted on a [`Bus`](crate::Bus) implements [`Event`]. An event is a
//! plain sized value; it may declare a **supertype** by exposing an embedded
//! parent value through [`Event::supertype`]. Subscribers of the parent type then
//! receive the child event as well.
//!
//! ## Supertype chain
//! ```text
//! UserSignedUp ──supertype()──► AccountEvent ──supertype()──► AuditRecord ──► None
//!      │                              │                            │
//!   concrete                      ancestor                      ancestor (root)
//! ```
//!
//! The chain must be structural: every value of a type reports the same
//! chain of supertype *types*. The resolver caches the chain per concrete type.
//!
//! ## Example
//! ```rust
//! use typebus::Event;
//!
//! struct AccountEvent { account: u64 }
//! impl Event for AccountEvent {}
//!
//! struct UserSignedUp { base: AccountEvent, email: String }
//! impl Event for UserSignedUp {
//!     fn supertype(&self) -> Option<&dyn Event> {
//!         Some(&self.base)
//!     }
//! }
//!
//! let ev = UserSignedUp { base: AccountEvent { account: 7 }, email: "a@b".into() };
//! let dynamic: &dyn Event = &ev;
//! assert_eq!(dynamic.view::<AccountEvent>().map(|a| a.account), Some(7));
//! ```

use std::any::{Any, TypeId};
use std::fmt;

/// Object-safe access to `Any` for every `'static` type.
///
/// Blanket-implemented; never implement it by hand.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the concrete type name of `self`.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value that can be posted on the bus.
///
/// Implement with an empty body for root events. Override
/// [`supertype`](Event::supertype) to extend another event type.
pub trait Event: AsAny + Send + Sync + 'static {
    /// The embedded value of this event's direct supertype, if any.
    fn supertype(&self) -> Option<&dyn Event> {
        None
    }
}

impl dyn Event {
    /// Runtime type descriptor of the concrete value.
    pub fn event_type(&self) -> EventType {
        EventType {
            id: self.as_any().type_id(),
            name: self.type_name(),
        }
    }

    /// Views this event as `E`, following the supertype chain.
    ///
    /// Returns the first value in the chain (starting at `self`) whose type is `E`.
    /// A type that reappears on the chain ends the walk.
    pub fn view<E: Event>(&self) -> Option<&E> {
        let mut seen: Vec<TypeId> = Vec::new();
        let mut current: &dyn Event = self;
        loop {
            if let Some(found) = current.as_any().downcast_ref::<E>() {
                return Some(found);
            }
            let id = current.as_any().type_id();
            if seen.contains(&id) {
                return None;
            }
            seen.push(id);
            current = current.supertype()?;
        }
    }

    /// True if `E` is the concrete type or one of its supertypes.
    pub fn is<E: Event>(&self) -> bool {
        self.view::<E>().is_some()
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("type", &self.type_name()).finish()
    }
}

/// Runtime descriptor of an event type.
///
/// Equality and hashing use the `TypeId` only; the name is for display.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Descriptor for the static type `E`.
    #[inline]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// The `TypeId` of the described type.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully-qualified type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl std::hash::Hash for EventType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
