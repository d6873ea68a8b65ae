//! Validated programs.

use std::fmt;

use capstan_foundation::CapabilityId;

use crate::instruction::Instruction;

/// A loaded and validated instruction stream.
///
/// Only the [`Loader`](crate::Loader) constructs programs. Every
/// control-transfer target is an instruction index `<= len()`, every PICK
/// depth is provably in bounds, and every capability operand is declared.
/// An index equal to `len()` is the end of the code; execution reaching it
/// halts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    offsets: Vec<u32>,
    entry: usize,
    capabilities: Vec<CapabilityId>,
    version: (u8, u8),
}

impl Program {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        offsets: Vec<u32>,
        entry: usize,
        capabilities: Vec<CapabilityId>,
        version: (u8, u8),
    ) -> Self {
        debug_assert_eq!(instructions.len(), offsets.len());
        Self {
            instructions,
            offsets,
            entry,
            capabilities,
            version,
        }
    }

    /// Returns all instructions in order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the instruction at `index`, or `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns the byte offset of the instruction at `index`.
    #[must_use]
    pub fn offset(&self, index: usize) -> Option<u32> {
        self.offsets.get(index).copied()
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the code section is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the index of the first instruction to execute.
    #[must_use]
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Returns the capability ids declared in the header, in declaration order.
    #[must_use]
    pub fn required_capabilities(&self) -> &[CapabilityId] {
        &self.capabilities
    }

    /// Returns the `(major, minor)` format version of the source buffer.
    #[must_use]
    pub fn version(&self) -> (u8, u8) {
        self.version
    }
}

/// Disassembly listing: one instruction per line, prefixed with its index
/// and byte offset. Targets print as instruction indices.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.version;
        writeln!(f, "; capstan {major}.{minor}, entry @{}", self.entry)?;
        if !self.capabilities.is_empty() {
            f.write_str("; requires")?;
            for id in &self.capabilities {
                write!(f, " {id}")?;
            }
            writeln!(f)?;
        }
        let rows = self.instructions.iter().zip(&self.offsets).enumerate();
        for (index, (instruction, offset)) in rows {
            writeln!(f, "{index:>4} {offset:#06x}  {instruction}")?;
        }
        Ok(())
    }
}
