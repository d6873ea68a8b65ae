//! The capability registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use capstan_foundation::{
    CapabilityCatalog, CapabilityHandle, CapabilityId, Error, ErrorKind, RegistryToken, Result,
    Signature, Value,
};
use tracing::{debug, instrument, trace, warn};

use crate::action::HostAction;
use crate::config::CapabilityConfig;

/// Maps capability ids to host actions and gates every invocation.
///
/// Populated exactly once from a [`CapabilityConfig`]; no method adds,
/// removes, or re-grants a capability afterwards. Handles it issues carry
/// its [`RegistryToken`] and are rejected by every other registry.
pub struct CapabilityRegistry {
    token: RegistryToken,
    actions: BTreeMap<CapabilityId, Box<dyn HostAction>>,
    granted: BTreeSet<CapabilityId>,
    catalog: CapabilityCatalog,
}

impl CapabilityRegistry {
    /// Builds a registry from a host configuration.
    #[instrument(
        skip_all,
        fields(registered = config.actions.len(), granted = config.grants.len())
    )]
    #[must_use]
    pub fn from_config(config: CapabilityConfig) -> Self {
        let CapabilityConfig { actions, grants } = config;
        let mut catalog = CapabilityCatalog::new();
        for (&id, action) in &actions {
            catalog.insert(id, action.signature().clone());
        }
        let registry = Self {
            token: RegistryToken::fresh(),
            actions,
            granted: grants,
            catalog,
        };
        debug!(granted = ?registry.granted, "capability registry built");
        registry
    }

    /// A registry that honors and grants nothing.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::from_config(CapabilityConfig::new())
    }

    /// Returns this registry's token.
    #[must_use]
    pub fn token(&self) -> RegistryToken {
        self.token
    }

    /// Returns the honored ids with their signatures.
    #[must_use]
    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Returns true if `id` is granted to this run.
    #[must_use]
    pub fn is_granted(&self, id: CapabilityId) -> bool {
        self.granted.contains(&id)
    }

    /// Iterates over the granted ids in order.
    pub fn granted(&self) -> impl Iterator<Item = CapabilityId> + '_ {
        self.granted.iter().copied()
    }

    /// Returns the signature of a granted capability.
    ///
    /// # Errors
    /// Returns `CapabilityDenied` if `id` is not granted.
    pub fn signature(&self, id: CapabilityId) -> Result<&Signature> {
        if !self.is_granted(id) {
            return Err(Self::deny(id));
        }
        self.catalog
            .signature(id)
            .ok_or_else(|| Error::new(ErrorKind::Internal(format!("granted {id} has no action"))))
    }

    /// Issues a handle for a granted capability.
    ///
    /// # Errors
    /// Returns `CapabilityDenied` if `id` is not granted.
    pub fn issue(&self, id: CapabilityId) -> Result<CapabilityHandle> {
        if !self.is_granted(id) {
            return Err(Self::deny(id));
        }
        Ok(CapabilityHandle::new(id, self.token))
    }

    /// Resolves a handle to its host action without invoking it.
    ///
    /// # Errors
    /// Returns `UnresolvedCapability` if the handle came from another
    /// registry and `CapabilityDenied` if its id is not granted.
    pub fn resolve(&self, handle: CapabilityHandle) -> Result<&dyn HostAction> {
        let id = self.check_handle(handle)?;
        self.actions
            .get(&id)
            .map(Box::as_ref)
            .ok_or_else(|| Error::new(ErrorKind::Internal(format!("granted {id} has no action"))))
    }

    fn check_handle(&self, handle: CapabilityHandle) -> Result<CapabilityId> {
        let id = handle.id();
        if handle.token() != self.token {
            warn!(%id, "handle from another registry");
            return Err(Error::new(ErrorKind::UnresolvedCapability(id)));
        }
        if !self.is_granted(id) {
            return Err(Self::deny(id));
        }
        Ok(id)
    }

    /// Invokes the action behind `handle`.
    ///
    /// Arguments are checked against the signature before the action runs;
    /// the result is checked after.
    ///
    /// # Errors
    /// Returns `UnresolvedCapability` or `CapabilityDenied` as for
    /// [`resolve`](Self::resolve), and `CapabilityError` for a bad call
    /// shape, a host failure, or a result the signature does not allow.
    pub fn invoke(&mut self, handle: CapabilityHandle, args: &[Value]) -> Result<Value> {
        let id = self.check_handle(handle)?;
        let action = self
            .actions
            .get_mut(&id)
            .ok_or_else(|| Error::new(ErrorKind::Internal(format!("granted {id} has no action"))))?;

        action.signature().check_args(id, args)?;
        trace!(%id, argc = args.len(), "invoking host action");

        let result = action.invoke(args).map_err(|err| match err.kind {
            ErrorKind::CapabilityError { .. } => err,
            other => Error::capability_error(id, other.to_string()),
        })?;
        action.signature().check_result(id, &result)?;
        Ok(result)
    }

    /// Issues a handle for `id` and invokes it.
    ///
    /// # Errors
    /// See [`issue`](Self::issue) and [`invoke`](Self::invoke).
    pub fn invoke_id(&mut self, id: CapabilityId, args: &[Value]) -> Result<Value> {
        let handle = self.issue(id)?;
        self.invoke(handle, args)
    }

    fn deny(id: CapabilityId) -> Error {
        warn!(%id, "capability denied");
        Error::capability_denied(id)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::deny_all()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("token", &self.token)
            .field("catalog", &self.catalog)
            .field("granted", &self.granted)
            .finish_non_exhaustive()
    }
}
