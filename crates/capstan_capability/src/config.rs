//! Host-supplied capability configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use capstan_foundation::{CapabilityId, Error, Result};

use crate::action::HostAction;

/// Which host actions a registry honors, and which of those are granted to
/// the run.
///
/// Built once by the host and consumed by
/// [`CapabilityRegistry::from_config`](crate::CapabilityRegistry::from_config).
/// Registering an id makes it honored; granting makes it usable.
///
/// ```
/// use capstan_capability::{CapabilityConfig, standard::SteppedClock};
/// use capstan_foundation::CapabilityId;
///
/// let mut config = CapabilityConfig::new();
/// config.register(CapabilityId(2), SteppedClock::new(0, 10))?;
/// config.grant(CapabilityId(2))?;
/// assert!(config.is_granted(CapabilityId(2)));
/// # Ok::<(), capstan_foundation::Error>(())
/// ```
#[derive(Default)]
pub struct CapabilityConfig {
    pub(crate) actions: BTreeMap<CapabilityId, Box<dyn HostAction>>,
    pub(crate) grants: BTreeSet<CapabilityId>,
}

impl CapabilityConfig {
    /// Creates a configuration that honors and grants nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` under `id`.
    ///
    /// # Errors
    /// Returns a configuration error if `id` is already registered.
    pub fn register(
        &mut self,
        id: CapabilityId,
        action: impl HostAction + 'static,
    ) -> Result<&mut Self> {
        self.register_boxed(id, Box::new(action))
    }

    /// Registers an already boxed action under `id`.
    ///
    /// # Errors
    /// Returns a configuration error if `id` is already registered.
    pub fn register_boxed(
        &mut self,
        id: CapabilityId,
        action: Box<dyn HostAction>,
    ) -> Result<&mut Self> {
        if self.actions.contains_key(&id) {
            return Err(Error::config(format!("{id} registered twice")));
        }
        self.actions.insert(id, action);
        Ok(self)
    }

    /// Grants a registered id to the run.
    ///
    /// # Errors
    /// Returns a configuration error if `id` is not registered.
    pub fn grant(&mut self, id: CapabilityId) -> Result<&mut Self> {
        if !self.actions.contains_key(&id) {
            return Err(Error::config(format!("cannot grant unregistered {id}")));
        }
        self.grants.insert(id);
        Ok(self)
    }

    /// Registers and grants in one step.
    ///
    /// # Errors
    /// Returns a configuration error if `id` is already registered.
    pub fn register_granted(
        &mut self,
        id: CapabilityId,
        action: impl HostAction + 'static,
    ) -> Result<&mut Self> {
        self.register(id, action)?;
        self.grant(id)
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn is_registered(&self, id: CapabilityId) -> bool {
        self.actions.contains_key(&id)
    }

    /// Returns true if `id` is granted.
    #[must_use]
    pub fn is_granted(&self, id: CapabilityId) -> bool {
        self.grants.contains(&id)
    }
}

impl fmt::Debug for CapabilityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityConfig")
            .field("registered", &self.actions.keys().collect::<Vec<_>>())
            .field("granted", &self.grants)
            .finish()
    }
}
