//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings a [`Bus`](crate::Bus) is created with.
//!
//! Config is used in two ways:
//! 1. **Direct creation**: `Bus::with_config(config)`
//! 2. **Builder**: `Bus::builder().with_identifier("ui").build()`

use super::enforcer::ThreadEnforcer;

/// Identifier used when none is configured.
pub const DEFAULT_IDENTIFIER: &str = "default";

/// Configuration of a bus instance.
///
/// ## Field semantics
/// - `identifier`: name shown in logs and in `Display` (`[Bus "<identifier>"]`)
/// - `enforcer`: which threads may call register/unregister/post
/// - `catch_panics`: whether a panicking subscriber becomes a `BusError::Dispatch`
///
/// ## Notes
/// All fields are public; prefer [`BusBuilder`](crate::BusBuilder) when only a
/// few settings differ from the defaults.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Name of this bus instance.
    pub identifier: String,

    /// Thread confinement policy.
    ///
    /// - [`ThreadEnforcer::Any`] = callable from every thread
    /// - [`ThreadEnforcer::Pinned`] = callable only from that thread;
    ///   other threads get `BusError::WrongThread`
    pub enforcer: ThreadEnforcer,

    /// Convert subscriber panics into dispatch errors.
    ///
    /// When `false`, a panic unwinds through `post` to the caller. The dispatch
    /// context is reset either way.
    pub catch_panics: bool,
}

impl BusConfig {
    /// True if the bus only accepts calls from one thread.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        matches!(self.enforcer, ThreadEnforcer::Pinned(_))
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `identifier = "default"`
    /// - `enforcer = ThreadEnforcer::Any`
    /// - `catch_panics = true`
    fn default() -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER.to_string(),
            enforcer: ThreadEnforcer::Any,
            catch_panics: true,
        }
    }
}
