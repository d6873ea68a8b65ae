//! Instruction set, container encoding, assembler, and validating loader for
//! Capstan bytecode.
//!
//! This crate provides:
//! - [`Opcode`] / [`Instruction`] - The closed, versioned instruction set
//! - [`Assembler`] - Builds well-formed buffers with labels
//! - [`Loader`] - Decodes and validates buffers into a [`Program`]
//! - [`LoadError`] - Every reason a buffer is rejected

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assembler;
pub mod encoding;
pub mod error;
pub mod instruction;
pub mod loader;
pub mod opcode;
pub mod program;
mod validate;


pub use assembler::{Assembler, Label};
pub use encoding::{FORMAT_MAJOR, FORMAT_MINOR, Header, MAGIC};
pub use error::{AssembleError, LoadError};
pub use instruction::Instruction;
pub use loader::{Loader, LoaderOptions, load};
pub use opcode::{Opcode, OperandKind};
pub use program::Program;
