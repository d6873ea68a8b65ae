//! Deterministic stack virtual machine for Capstan bytecode.
//!
//! This crate provides:
//! - [`Vm`] - Executes one validated [`Program`](capstan_bytecode::Program)
//! - [`Stack`] / [`Memory`] - The bounded operand stack and cell arena
//! - [`VmConfig`] - Resource limits and tracing options
//! - [`RunResult`] / [`Termination`] / [`Fault`] - How a run ended
//! - [`TraceBuffer`] - Recent capability invocations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod memory;
pub mod stack;
pub mod trace;
pub mod vm;

pub use config::VmConfig;
pub use memory::Memory;
pub use stack::Stack;
pub use trace::{InvocationRecord, TraceBuffer};
pub use vm::{Fault, RunResult, Termination, Vm, VmSnapshot, VmStatus};
