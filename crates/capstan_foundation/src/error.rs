//! Error types for Capstan runtime operations.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::capability::CapabilityId;
use crate::types::ValueKind;
use crate::value::{Int, Reference};

/// The main error type for runtime operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a stack overflow error.
    #[must_use]
    pub fn stack_overflow(limit: usize) -> Self {
        Self::new(ErrorKind::StackOverflow { limit })
    }

    /// Creates a stack underflow error.
    #[must_use]
    pub fn stack_underflow(needed: usize, depth: usize) -> Self {
        Self::new(ErrorKind::StackUnderflow { needed, depth })
    }

    /// Creates an out-of-bounds memory access error.
    #[must_use]
    pub fn out_of_bounds(offset: Int, length: usize) -> Self {
        Self::new(ErrorKind::OutOfBounds { offset, length })
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: ValueKind, actual: ValueKind) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an arithmetic overflow error for the named operation.
    #[must_use]
    pub fn overflow(op: &'static str) -> Self {
        Self::new(ErrorKind::ArithmeticOverflow { op })
    }

    /// Creates a capability denied error.
    #[must_use]
    pub fn capability_denied(id: CapabilityId) -> Self {
        Self::new(ErrorKind::CapabilityDenied(id))
    }

    /// Creates a capability error (bad call shape or host failure).
    #[must_use]
    pub fn capability_error(id: CapabilityId, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityError {
            id,
            reason: reason.into(),
        })
    }

    /// Creates a host action failure; the registry reports it as a
    /// capability error on the invoked id.
    #[must_use]
    pub fn host_failure(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::HostFailure(reason.into()))
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    /// Returns true if this error denies a capability rather than faulting.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self.kind, ErrorKind::CapabilityDenied(_))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A push would exceed the configured stack depth.
    #[error("stack overflow: depth limit {limit}")]
    StackOverflow {
        /// The configured maximum depth.
        limit: usize,
    },

    /// An operation needed more values than the stack holds.
    #[error("stack underflow: needed {needed}, depth {depth}")]
    StackUnderflow {
        /// Number of values the operation needed.
        needed: usize,
        /// Stack depth at the time.
        depth: usize,
    },

    /// Memory access outside a region.
    #[error("out of bounds: offset {offset} (region length {length})")]
    OutOfBounds {
        /// The offset that was accessed.
        offset: Int,
        /// The region length.
        length: usize,
    },

    /// The memory arena cannot satisfy an allocation.
    #[error("out of memory: requested {requested} cell(s), {available} available")]
    OutOfMemory {
        /// Number of cells requested.
        requested: usize,
        /// Number of cells still free.
        available: usize,
    },

    /// Access through a reference whose region was released.
    #[error("dangling reference: {0:?}")]
    DanglingReference(Reference),

    /// Checked integer arithmetic overflowed.
    #[error("arithmetic overflow in {op}")]
    ArithmeticOverflow {
        /// The operation that overflowed.
        op: &'static str,
    },

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Operand of the wrong kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected kind.
        expected: ValueKind,
        /// The kind encountered.
        actual: ValueKind,
    },

    /// Capability not granted to this run.
    #[error("capability denied: {0}")]
    CapabilityDenied(CapabilityId),

    /// Granted capability invoked with a bad call shape, or the host action failed.
    #[error("capability error on {id}: {reason}")]
    CapabilityError {
        /// The capability invoked.
        id: CapabilityId,
        /// What went wrong.
        reason: String,
    },

    /// A host action could not perform its effect.
    #[error("host action failed: {0}")]
    HostFailure(String),

    /// A handle that the current registry did not issue.
    #[error("unresolved capability handle for {0}")]
    UnresolvedCapability(CapabilityId),

    /// Too many nested calls.
    #[error("call depth limit {limit} exceeded")]
    CallDepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// Invalid host-supplied configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Where in a program an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Index of the failing instruction.
    pub instruction: Option<usize>,
    /// Byte offset of the failing instruction in the code section.
    pub offset: Option<u32>,
    /// Mnemonic of the failing instruction.
    pub opcode: Option<&'static str>,
    /// Return instruction indices of the active call frames, innermost last.
    pub frames: Vec<usize>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failing instruction site.
    #[must_use]
    pub fn at(mut self, instruction: usize, offset: u32, opcode: &'static str) -> Self {
        self.instruction = Some(instruction);
        self.offset = Some(offset);
        self.opcode = Some(opcode);
        self
    }

    /// Adds a call frame.
    #[must_use]
    pub fn with_frame(mut self, return_to: usize) -> Self {
        self.frames.push(return_to);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.instruction {
            write!(f, "at instruction {index}")?;
            if let (Some(op), Some(offset)) = (self.opcode, self.offset) {
                write!(f, " ({op} @ {offset:#06x})")?;
            }
        }
        for frame in self.frames.iter().rev() {
            write!(f, "\n  called from instruction {}", frame.saturating_sub(1))?;
        }
        Ok(())
    }
}

/// Result type alias using the runtime [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
