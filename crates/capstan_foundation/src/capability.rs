//! Capability identity types shared by the loader, the registry, and the VM.
//!
//! A [`CapabilityId`] is the number bytecode uses to name a capability. A
//! [`CapabilityHandle`] is the runtime value a registry issues for a granted
//! id; it carries the issuing registry's [`RegistryToken`] so a handle is only
//! meaningful to the registry that minted it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::types::ValueKind;
use crate::value::Value;

/// Numeric capability identifier as encoded in bytecode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CapabilityId(pub u16);

impl From<u16> for CapabilityId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl From<CapabilityId> for u16 {
    fn from(id: CapabilityId) -> Self {
        id.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap:{}", self.0)
    }
}

/// Identity of one registry instance.
///
/// Tokens are unique within a process. They carry no meaning beyond identity,
/// so two runs with identical inputs still behave identically.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegistryToken(u64);

impl RegistryToken {
    /// Returns a token distinct from every token returned before.
    #[must_use]
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registry-issued handle to one granted capability.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CapabilityHandle {
    id: CapabilityId,
    token: RegistryToken,
}

impl CapabilityHandle {
    /// Creates a handle for `id` bound to the registry identified by `token`.
    ///
    /// Registries call this when issuing; bytecode has no way to reach it.
    #[must_use]
    pub const fn new(id: CapabilityId, token: RegistryToken) -> Self {
        Self { id, token }
    }

    /// Returns the capability id this handle names.
    #[must_use]
    pub const fn id(self) -> CapabilityId {
        self.id
    }

    /// Returns the token of the issuing registry.
    #[must_use]
    pub const fn token(self) -> RegistryToken {
        self.token
    }
}

impl fmt::Display for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.id)
    }
}

/// Accepted kind for one parameter or the return value of a host action.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Any value kind.
    Any,
    /// Exactly this kind.
    Exact(ValueKind),
}

impl ParamKind {
    /// Returns true if `value` is acceptable for this parameter.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(kind) => value.kind() == kind,
        }
    }
}

impl From<ValueKind> for ParamKind {
    fn from(kind: ValueKind) -> Self {
        Self::Exact(kind)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Exact(kind) => write!(f, "{kind}"),
        }
    }
}

/// Declared call shape of a host action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Dotted name for diagnostics, e.g. `console.write_line`.
    pub name: String,
    /// Parameter kinds in argument order.
    pub params: Vec<ParamKind>,
    /// Kind of the returned value.
    pub returns: ParamKind,
}

impl Signature {
    /// Creates a signature with no parameters that returns unit.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ParamKind::Exact(ValueKind::Unit),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, kind: impl Into<ParamKind>) -> Self {
        self.params.push(kind.into());
        self
    }

    /// Sets the return kind.
    #[must_use]
    pub fn returns(mut self, kind: impl Into<ParamKind>) -> Self {
        self.returns = kind.into();
        self
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Checks an argument list against this signature.
    ///
    /// # Errors
    /// Returns a `CapabilityError` naming the first mismatch.
    pub fn check_args(&self, id: CapabilityId, args: &[Value]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(Error::capability_error(
                id,
                format!(
                    "{} expects {} argument(s), got {}",
                    self.name,
                    self.params.len(),
                    args.len()
                ),
            ));
        }
        for (position, (param, arg)) in self.params.iter().zip(args).enumerate() {
            if !param.accepts(arg) {
                return Err(Error::capability_error(
                    id,
                    format!(
                        "{} argument {position}: expected {param}, got {}",
                        self.name,
                        arg.kind()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Checks a host action's result against this signature.
    ///
    /// Handles are rejected regardless of the declared kind: host actions may
    /// not mint capabilities.
    ///
    /// # Errors
    /// Returns a `CapabilityError` if the result is a handle, a reference, or
    /// of the wrong kind.
    pub fn check_result(&self, id: CapabilityId, result: &Value) -> Result<()> {
        match result.kind() {
            ValueKind::Cap => {
                return Err(Error::capability_error(
                    id,
                    format!("{} returned a capability handle", self.name),
                ));
            }
            ValueKind::Ref => {
                return Err(Error::capability_error(
                    id,
                    format!("{} returned a memory reference", self.name),
                ));
            }
            _ => {}
        }
        if !self.returns.accepts(result) {
            return Err(Error::capability_error(
                id,
                format!(
                    "{} returned {}, declared {}",
                    self.name,
                    result.kind(),
                    self.returns
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// The set of capability ids a registry honors, with their signatures.
///
/// The loader consults a catalog to reject programs that declare capabilities
/// no host action backs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityCatalog {
    entries: BTreeMap<CapabilityId, Signature>,
}

impl CapabilityCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, id: CapabilityId, signature: Signature) {
        self.entries.insert(id, signature);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, id: CapabilityId, signature: Signature) -> Self {
        self.insert(id, signature);
        self
    }

    /// Returns true if `id` is honored.
    #[must_use]
    pub fn contains(&self, id: CapabilityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the signature registered for `id`.
    #[must_use]
    pub fn signature(&self, id: CapabilityId) -> Option<&Signature> {
        self.entries.get(&id)
    }

    /// Iterates over entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (CapabilityId, &Signature)> {
        self.entries.iter().map(|(id, sig)| (*id, sig))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
