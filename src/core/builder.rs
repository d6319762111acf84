use super::{bus::Bus, config::BusConfig, enforcer::ThreadEnforcer};

/// Builder for constructing a [`Bus`] with non-default settings.
#[derive(Clone, Debug, Default)]
pub struct BusBuilder {
    cfg: BusConfig,
}

impl BusBuilder {
    /// Creates a new builder starting from the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self { cfg }
    }

    /// Sets the identifier shown in logs and `Display`.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.cfg.identifier = identifier.into();
        self
    }

    /// Sets the thread confinement policy.
    ///
    /// Use [`ThreadEnforcer::current()`] to pin the bus to the building thread.
    pub fn with_enforcer(mut self, enforcer: ThreadEnforcer) -> Self {
        self.cfg.enforcer = enforcer;
        self
    }

    /// Chooses whether subscriber panics are converted into dispatch errors.
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.cfg.catch_panics = catch;
        self
    }

    /// Builds the bus. Caches and the registry start empty.
    pub fn build(self) -> Bus {
        Bus::with_config(self.cfg)
    }
}
