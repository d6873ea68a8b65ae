//! Core value type manipulated by the Capstan VM.

use std::fmt;

use crate::capability::CapabilityHandle;
use crate::types::ValueKind;

/// Integer representation for bytecode format major version 1.
pub type Int = i64;

/// Opaque reference to a memory region.
///
/// A reference is a generational index, never an address. The slot names a
/// region entry in VM memory and the generation detects use after the region
/// was released. No instruction produces a reference from an integer.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Reference {
    slot: u32,
    generation: u32,
}

impl Reference {
    /// Creates a reference to the region in `slot` allocated at `generation`.
    ///
    /// Only memory implementations should call this.
    #[must_use]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Returns the region slot.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Returns the allocation generation.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({}v{})", self.slot, self.generation)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.slot)
    }
}

/// Runtime value.
///
/// Values are small and `Copy`; they are copied by value between stack slots
/// and memory cells. A [`Value::Ref`] names cells owned by memory, not by the
/// slot that holds it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// Signed integer.
    Int(Int),
    /// Boolean.
    Bool(bool),
    /// Reference into VM memory.
    Ref(Reference),
    /// Handle issued by a capability registry.
    Cap(CapabilityHandle),
    /// The unit value.
    #[default]
    Unit,
}

impl Value {
    /// Returns the kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Ref(_) => ValueKind::Ref,
            Self::Cap(_) => ValueKind::Cap,
            Self::Unit => ValueKind::Unit,
        }
    }

    /// Returns true if this value is unit.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Attempts to extract an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<Int> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract a memory reference.
    #[must_use]
    pub const fn as_reference(&self) -> Option<Reference> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Attempts to extract a capability handle.
    #[must_use]
    pub const fn as_cap(&self) -> Option<CapabilityHandle> {
        match self {
            Self::Cap(h) => Some(*h),
            _ => None,
        }
    }

    /// Equality as seen from outside a run: handles compare by capability
    /// id only, ignoring the issuing registry. Every other kind compares as
    /// with `==`.
    #[must_use]
    pub fn observably_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Cap(a), Self::Cap(b)) => a.id() == b.id(),
            _ => self == other,
        }
    }
}

impl From<Int> for Value {
    fn from(n: Int) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Ref(r)
    }
}

impl From<CapabilityHandle> for Value {
    fn from(h: CapabilityHandle) -> Self {
        Self::Cap(h)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Cap(h) => write!(f, "{h}"),
            Self::Unit => write!(f, "()"),
        }
    }
}
