//! Load-time errors.

use capstan_foundation::CapabilityId;
use thiserror::Error;

use crate::opcode::Opcode;

/// Why a byte buffer was rejected by the loader.
///
/// Every variant is reported before any instruction executes; a rejected
/// buffer never produces a [`Program`](crate::Program).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The buffer ended inside the header.
    #[error("truncated header: needed {needed} byte(s), {available} available")]
    TruncatedHeader {
        /// Bytes needed to finish the field being read.
        needed: usize,
        /// Bytes remaining.
        available: usize,
    },

    /// The buffer does not start with the format magic.
    #[error("bad magic: {0:02X?}")]
    BadMagic([u8; 4]),

    /// The declared format version is not one this loader understands.
    #[error("unsupported bytecode version {major}.{minor}")]
    UnsupportedVersion {
        /// Declared major version.
        major: u8,
        /// Declared minor version.
        minor: u8,
    },

    /// Reserved header flags were set.
    #[error("reserved header flags set: {0:#06x}")]
    ReservedFlags(u16),

    /// A capability id appears twice in the declaration table.
    #[error("capability {0} declared twice")]
    DuplicateCapability(CapabilityId),

    /// The code section exceeds the configured limit.
    #[error("code section of {len} bytes exceeds limit of {limit}")]
    CodeTooLarge {
        /// Declared code length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The buffer ended before the declared code length.
    #[error("truncated code section: declared {declared} byte(s), {available} available")]
    TruncatedCode {
        /// Declared code length.
        declared: usize,
        /// Bytes remaining.
        available: usize,
    },

    /// Bytes follow the code section.
    #[error("{0} trailing byte(s) after code section")]
    TrailingBytes(usize),

    /// An opcode byte that is not part of the instruction set.
    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode {
        /// Byte offset in the code section.
        offset: u32,
        /// The offending byte.
        byte: u8,
    },

    /// The code section ended inside an instruction's operands.
    #[error("truncated operand for {opcode} at offset {offset}")]
    TruncatedOperand {
        /// Byte offset of the instruction.
        offset: u32,
        /// The instruction's opcode.
        opcode: Opcode,
    },

    /// An operand outside its encoding domain.
    #[error("invalid operand for {opcode} at offset {offset}: {reason}")]
    InvalidOperand {
        /// Byte offset of the instruction.
        offset: u32,
        /// The instruction's opcode.
        opcode: Opcode,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A capability operand not listed in the program's declaration table.
    #[error("capability {id} used at offset {offset} is not declared")]
    UndeclaredCapability {
        /// Byte offset of the instruction.
        offset: u32,
        /// The capability id.
        id: CapabilityId,
    },

    /// A declared capability the host does not honor.
    #[error("capability {0} is not honored by this host")]
    UnknownCapability(CapabilityId),

    /// An INVOKE whose argument count differs from the honored signature.
    #[error("capability {id} at offset {offset} takes {expected} argument(s), invoked with {found}")]
    ArityMismatch {
        /// Byte offset of the instruction.
        offset: u32,
        /// The capability id.
        id: CapabilityId,
        /// Arity of the honored signature.
        expected: usize,
        /// Argument count encoded in the instruction.
        found: usize,
    },

    /// A control-transfer target that is not the start of an instruction.
    #[error("branch at offset {offset} targets {target}, which is not an instruction boundary")]
    InvalidTarget {
        /// Byte offset of the branching instruction.
        offset: u32,
        /// The target byte offset.
        target: u32,
    },

    /// The entry offset is not the start of an instruction.
    #[error("entry offset {0} is not an instruction boundary")]
    InvalidEntry(u32),

    /// A stack-depth operand that cannot be proven in bounds.
    #[error("{opcode} {depth} at offset {offset} reaches below the provable stack height {proven}")]
    UnprovableStackDepth {
        /// Byte offset of the instruction.
        offset: u32,
        /// The instruction's opcode.
        opcode: Opcode,
        /// Depth operand.
        depth: u16,
        /// Lower bound of the stack height at that point.
        proven: usize,
    },
}

impl LoadError {
    /// Process exit code an embedding CLI should report for load failures.
    pub const EXIT_CODE: i32 = 1;
}

/// Why the [`Assembler`](crate::Assembler) could not produce a buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// A label was referenced but never bound to a position.
    #[error("label {0} is never bound")]
    UnboundLabel(usize),

    /// A label was bound twice.
    #[error("label {0} bound twice")]
    LabelRebound(usize),

    /// An instruction-index target beyond the end of the listing.
    #[error("instruction {index} targets {target}, past the end of {len} instruction(s)")]
    TargetOutOfRange {
        /// Index of the branching instruction.
        index: usize,
        /// The target index.
        target: usize,
        /// Number of instructions in the listing.
        len: usize,
    },

    /// More capability ids than the header can declare.
    #[error("{0} capabilities declared, at most 65535 fit in the header")]
    TooManyCapabilities(usize),

    /// Code section longer than a `u32` can describe.
    #[error("code section of {0} bytes does not fit the container")]
    CodeTooLarge(usize),
}
