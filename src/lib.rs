//! Capstan - Capability-secure bytecode virtual machine
//!
//! This crate re-exports all layers of the Capstan system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: capstan_vm          - Execution core, stack, memory arena, invocation trace
//! Layer 2: capstan_capability  - Registry, host actions, grant manifest
//! Layer 1: capstan_bytecode    - Instruction set, container format, assembler, loader
//! Layer 0: capstan_foundation  - Core types (Value, CapabilityId, Error)
//! ```
//!
//! # Running a buffer
//!
//! ```
//! use capstan::{CapabilityConfig, Instruction, VmConfig, run_bytecode};
//! use capstan::bytecode::Assembler;
//! use capstan::foundation::Value;
//!
//! let bytes = Assembler::from_instructions(&[
//!     Instruction::Push(2),
//!     Instruction::Push(3),
//!     Instruction::Add,
//!     Instruction::Halt,
//! ])
//! .unwrap();
//! let result = run_bytecode(&bytes, CapabilityConfig::new(), VmConfig::default()).unwrap();
//! assert_eq!(result.termination.top(), Some(Value::Int(5)));
//! ```

use thiserror::Error;
use tracing::debug;

pub use capstan_bytecode as bytecode;
pub use capstan_capability as capability;
pub use capstan_foundation as foundation;
pub use capstan_vm as vm;

pub use capstan_bytecode::{Instruction, LoadError, Loader, Program};
pub use capstan_capability::{CapabilityConfig, CapabilityRegistry, Manifest};
pub use capstan_vm::{Fault, RunResult, Termination, Vm, VmConfig, VmStatus};

/// Why [`run_bytecode`] produced no run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The buffer was rejected; no VM was created.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The VM configuration was rejected.
    #[error(transparent)]
    Config(#[from] foundation::Error),
}

impl RunError {
    /// Exit code for an embedding command-line host.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Load(_) => LoadError::EXIT_CODE,
            Self::Config(_) => 64,
        }
    }
}

/// Loads `bytes` and runs the program to completion against the
/// capabilities `capabilities` honors.
///
/// Declared capability ids are not checked against the registry at load
/// time. Any id that is not granted, registered or not, ends the run with
/// [`Termination::CapabilityDenied`] at the instruction that uses it. Use
/// [`run_bytecode_strict`] to reject unregistered ids before the run.
///
/// # Errors
/// Returns [`RunError::Load`] if the buffer is malformed and
/// [`RunError::Config`] if `config` is unusable.
pub fn run_bytecode(
    bytes: &[u8],
    capabilities: CapabilityConfig,
    config: VmConfig,
) -> Result<RunResult, RunError> {
    run(Loader::new(), bytes, CapabilityRegistry::from_config(capabilities), config)
}

/// Like [`run_bytecode`], but the loader checks every declared capability
/// against the registry's catalog, so a program asking for an id the host
/// never registered is rejected before it runs.
///
/// # Errors
/// Returns [`RunError::Load`] if the buffer is malformed or declares an
/// unregistered capability and [`RunError::Config`] if `config` is unusable.
pub fn run_bytecode_strict(
    bytes: &[u8],
    capabilities: CapabilityConfig,
    config: VmConfig,
) -> Result<RunResult, RunError> {
    let registry = CapabilityRegistry::from_config(capabilities);
    let loader = Loader::new().with_catalog(registry.catalog().clone());
    run(loader, bytes, registry, config)
}

fn run(
    loader: Loader,
    bytes: &[u8],
    registry: CapabilityRegistry,
    config: VmConfig,
) -> Result<RunResult, RunError> {
    let program = loader.load(bytes)?;
    let vm = Vm::new(program, registry, config)?;
    let result = vm.into_result();
    debug!(
        exit_code = result.termination.exit_code(),
        steps = result.steps,
        "run finished"
    );
    Ok(result)
}
