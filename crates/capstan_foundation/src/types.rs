//! Value kind descriptors.

use std::fmt;

/// The kind tag of a [`Value`](crate::Value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ValueKind {
    /// Signed integer.
    Int,
    /// Boolean.
    Bool,
    /// Memory reference.
    Ref,
    /// Capability handle.
    Cap,
    /// The unit value.
    Unit,
}

impl ValueKind {
    /// Returns the lowercase display name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Ref => "ref",
            Self::Cap => "cap",
            Self::Unit => "unit",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
