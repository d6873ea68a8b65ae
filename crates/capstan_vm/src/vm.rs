//! The execution core.
//!
//! A [`Vm`] owns one validated [`Program`], its operand [`Stack`], its
//! [`Memory`] arena and the [`CapabilityRegistry`] granted to the run. Each
//! [`step`](Vm::step) executes exactly one instruction. An instruction checks
//! every way it can fail before it mutates anything, so a faulting step
//! leaves the stack and memory exactly as they were before it.
//!
//! # Termination
//!
//! A run ends in one of three terminal states:
//!
//! - `Halted`: HALT, RETURN outside any call, or running off the end of the
//!   code. The remaining stack is the result.
//! - `CapabilityDenied`: the program asked for a capability that is not
//!   granted. No host action ran.
//! - `Faulted`: any other runtime error.
//!
//! Terminal states are final; stepping a terminated VM does nothing.

#![allow(clippy::too_many_lines)]

mod arith;

use std::fmt;

use capstan_bytecode::{Instruction, Opcode, Program};
use capstan_capability::CapabilityRegistry;
use capstan_foundation::{
    CapabilityHandle, Error, ErrorContext, ErrorKind, Int, Reference, Result, Value, ValueKind,
};
use im::Vector;
use tracing::{debug, instrument, trace, warn};

use crate::config::VmConfig;
use crate::memory::Memory;
use crate::stack::Stack;
use crate::trace::{InvocationRecord, TraceBuffer};

// =============================================================================
// Status and results
// =============================================================================

/// Where a VM is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VmStatus {
    /// Created, nothing executed yet.
    Ready,
    /// At least one instruction executed, not terminated.
    Running,
    /// Terminated normally.
    Halted,
    /// Terminated by a runtime error.
    Faulted,
    /// Terminated by an ungranted capability request.
    CapabilityDenied,
}

impl VmStatus {
    /// Returns true for the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::Faulted | Self::CapabilityDenied)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Halted => "halted",
            Self::Faulted => "faulted",
            Self::CapabilityDenied => "capability denied",
        })
    }
}

/// A runtime error pinned to the instruction that raised it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at instruction {instruction} ({opcode} @ {offset:#06x})")]
pub struct Fault {
    /// Index of the failing instruction.
    pub instruction: usize,
    /// Byte offset of the failing instruction in the code section.
    pub offset: u32,
    /// Opcode of the failing instruction.
    pub opcode: Opcode,
    /// What went wrong.
    pub kind: ErrorKind,
    /// Return indices of the active call frames, innermost last.
    pub frames: Vec<usize>,
}

impl Fault {
    /// Converts to a runtime [`Error`] carrying the instruction site.
    #[must_use]
    pub fn to_error(&self) -> Error {
        let mut context =
            ErrorContext::new().at(self.instruction, self.offset, self.opcode.mnemonic());
        for &frame in &self.frames {
            context = context.with_frame(frame);
        }
        Error::new(self.kind.clone()).with_context(context)
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Normal end; the operand stack, bottom to top.
    Halted {
        /// Remaining stack values.
        values: Vec<Value>,
    },
    /// A runtime error.
    Faulted(Fault),
    /// An ungranted capability was requested.
    CapabilityDenied(Fault),
}

impl Termination {
    /// Exit code for an embedding command-line host: 0 halted, 2 faulted,
    /// 3 capability denied. Load failures use
    /// [`LoadError::EXIT_CODE`](capstan_bytecode::LoadError::EXIT_CODE).
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Halted { .. } => 0,
            Self::Faulted(_) => 2,
            Self::CapabilityDenied(_) => 3,
        }
    }

    /// The matching terminal status.
    #[must_use]
    pub const fn status(&self) -> VmStatus {
        match self {
            Self::Halted { .. } => VmStatus::Halted,
            Self::Faulted(_) => VmStatus::Faulted,
            Self::CapabilityDenied(_) => VmStatus::CapabilityDenied,
        }
    }

    /// Top of the final stack, if the run halted with a non-empty stack.
    #[must_use]
    pub fn top(&self) -> Option<Value> {
        match self {
            Self::Halted { values } => values.last().copied(),
            _ => None,
        }
    }

    /// The fault, unless the run halted.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Halted { .. } => None,
            Self::Faulted(fault) | Self::CapabilityDenied(fault) => Some(fault),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halted { values } => {
                f.write_str("halted [")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Faulted(fault) => write!(f, "faulted: {fault}"),
            Self::CapabilityDenied(fault) => write!(f, "denied: {fault}"),
        }
    }
}

/// The outcome of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunResult {
    /// How the run ended.
    pub termination: Termination,
    /// Instructions executed, including a faulting one.
    pub steps: u64,
    /// Capability invocations, if tracing was enabled.
    pub trace: Vec<InvocationRecord>,
}

/// Observable machine state between steps.
///
/// Two runs of the same program against the same capability responses
/// produce equal snapshots after every step. Capability handles compare by
/// id only (see [`Value::observably_eq`]), since each run's registry issues
/// its own tokens.
#[derive(Clone, Debug)]
pub struct VmSnapshot {
    /// Index of the next instruction.
    pub ip: usize,
    /// Lifecycle status.
    pub status: VmStatus,
    /// Operand stack, bottom to top.
    pub stack: Vec<Value>,
    /// Live memory cells, in allocation order.
    pub memory: Vector<Value>,
    /// Return indices of the active call frames.
    pub frames: Vec<usize>,
}

fn observably_eq<'a>(
    a: impl IntoIterator<Item = &'a Value>,
    b: impl IntoIterator<Item = &'a Value>,
) -> bool {
    let (mut a, mut b) = (a.into_iter(), b.into_iter());
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.observably_eq(y) => {}
            _ => return false,
        }
    }
}

impl PartialEq for VmSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip
            && self.status == other.status
            && self.frames == other.frames
            && observably_eq(&self.stack, &other.stack)
            && observably_eq(&self.memory, &other.memory)
    }
}

impl Eq for VmSnapshot {}

enum Flow {
    Next,
    Jump(usize),
    Halt,
}

// =============================================================================
// The VM
// =============================================================================

/// Deterministic stack machine executing one validated program.
#[derive(Debug)]
pub struct Vm {
    program: Program,
    registry: CapabilityRegistry,
    config: VmConfig,
    stack: Stack,
    memory: Memory,
    /// Return instruction index per active CALL.
    frames: Vec<usize>,
    ip: usize,
    steps: u64,
    status: VmStatus,
    termination: Option<Termination>,
    trace: TraceBuffer,
}

impl Vm {
    /// Creates a VM positioned at the program's entry point.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is unusable.
    pub fn new(program: Program, registry: CapabilityRegistry, config: VmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ip: program.entry(),
            stack: Stack::new(config.max_stack_depth),
            memory: Memory::new(config.memory_cells),
            trace: TraceBuffer::new(config.trace_limit),
            frames: Vec::new(),
            steps: 0,
            status: VmStatus::Ready,
            termination: None,
            program,
            registry,
            config,
        })
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> VmStatus {
        self.status
    }

    /// Index of the next instruction to execute.
    #[must_use]
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Instructions executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The operand stack, bottom to top.
    #[must_use]
    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    /// The memory arena.
    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Number of active CALL frames.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// The program being executed.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The registry granted to this run.
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// The configuration the VM was created with.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Recorded capability invocations.
    #[must_use]
    pub fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// How the run ended, once it has.
    #[must_use]
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Captures the observable state.
    #[must_use]
    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot {
            ip: self.ip,
            status: self.status,
            stack: self.stack.snapshot(),
            memory: self.memory.snapshot(),
            frames: self.frames.clone(),
        }
    }

    /// Executes one instruction and returns the resulting status.
    ///
    /// On a terminated VM this executes nothing.
    pub fn step(&mut self) -> VmStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.status = VmStatus::Running;

        let index = self.ip;
        let Some(&instruction) = self.program.get(index) else {
            self.halt();
            return self.status;
        };
        trace!(
            step = self.steps,
            index,
            %instruction,
            depth = self.stack.len(),
            "step"
        );

        let outcome = self.execute(index, instruction);
        self.steps += 1;
        match outcome {
            Ok(Flow::Next) => self.ip = index + 1,
            Ok(Flow::Jump(target)) => self.ip = target,
            Ok(Flow::Halt) => self.halt(),
            Err(error) => self.fault(index, instruction, error),
        }
        if !self.status.is_terminal() && self.ip >= self.program.len() {
            self.halt();
        }
        self.status
    }

    /// Executes at most `budget` instructions, stopping early on
    /// termination.
    pub fn run_steps(&mut self, budget: u64) -> VmStatus {
        for _ in 0..budget {
            if self.status.is_terminal() {
                break;
            }
            self.step();
        }
        self.status
    }

    /// Steps until the VM terminates.
    ///
    /// The VM imposes no step limit; hosts that need one use
    /// [`run_steps`](Self::run_steps).
    #[instrument(skip_all, fields(instructions = self.program.len()))]
    pub fn run(&mut self) -> RunResult {
        loop {
            if let Some(termination) = &self.termination {
                return RunResult {
                    termination: termination.clone(),
                    steps: self.steps,
                    trace: self.trace.to_vec(),
                };
            }
            self.step();
        }
    }

    /// Runs to completion and consumes the VM.
    #[must_use]
    pub fn into_result(mut self) -> RunResult {
        self.run()
    }

    fn halt(&mut self) {
        self.status = VmStatus::Halted;
        debug!(steps = self.steps, depth = self.stack.len(), "vm halted");
        self.termination = Some(Termination::Halted {
            values: self.stack.snapshot(),
        });
    }

    fn fault(&mut self, index: usize, instruction: Instruction, error: Error) {
        let fault = Fault {
            instruction: index,
            offset: self.program.offset(index).unwrap_or_default(),
            opcode: instruction.opcode(),
            kind: error.kind,
            frames: self.frames.clone(),
        };
        warn!(steps = self.steps, %fault, "vm faulted");
        let termination = if matches!(fault.kind, ErrorKind::CapabilityDenied(_)) {
            self.status = VmStatus::CapabilityDenied;
            Termination::CapabilityDenied(fault)
        } else {
            self.status = VmStatus::Faulted;
            Termination::Faulted(fault)
        };
        debug!(steps = self.steps, status = %self.status, "vm terminated");
        self.termination = Some(termination);
    }

    fn execute(&mut self, index: usize, instruction: Instruction) -> Result<Flow> {
        match instruction {
            Instruction::Nop => {}
            Instruction::Push(n) => self.stack.push(Value::Int(n))?,
            Instruction::PushBool(b) => self.stack.push(Value::Bool(b))?,
            Instruction::PushUnit => self.stack.push(Value::Unit)?,
            Instruction::Pop => self.stack.drop_top(1)?,
            Instruction::Dup => self.stack.dup()?,
            Instruction::Swap => self.stack.swap()?,
            Instruction::Pick(depth) => self.stack.pick(usize::from(depth))?,

            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Rem
            | Instruction::Eq
            | Instruction::Ne
            | Instruction::Lt
            | Instruction::Le
            | Instruction::Gt
            | Instruction::Ge
            | Instruction::And
            | Instruction::Or => {
                self.stack.ensure_depth(2)?;
                let b = self.stack.peek(0)?;
                let a = self.stack.peek(1)?;
                let result = arith::binary(instruction, a, b)?;
                self.stack.replace_top(2, result)?;
            }
            Instruction::Neg => {
                let result = arith::negate(self.stack.peek(0)?)?;
                self.stack.replace_top(1, result)?;
            }
            Instruction::Not => {
                let result = arith::not(self.stack.peek(0)?)?;
                self.stack.replace_top(1, result)?;
            }

            Instruction::Jump(target) => return Ok(Flow::Jump(target)),
            Instruction::JumpIf(target) | Instruction::JumpIfNot(target) => {
                let condition = arith::expect_bool(self.stack.peek(0)?)?;
                self.stack.drop_top(1)?;
                if condition == matches!(instruction, Instruction::JumpIf(_)) {
                    return Ok(Flow::Jump(target));
                }
            }
            Instruction::Call(target) => {
                if self.frames.len() >= self.config.max_call_depth {
                    return Err(Error::new(ErrorKind::CallDepthExceeded {
                        limit: self.config.max_call_depth,
                    }));
                }
                self.frames.push(index + 1);
                self.memory.enter_frame();
                return Ok(Flow::Jump(target));
            }
            Instruction::Return => {
                let Some(&return_to) = self.frames.last() else {
                    return Ok(Flow::Halt);
                };
                self.memory.leave_frame()?;
                self.frames.pop();
                return Ok(Flow::Jump(return_to));
            }

            Instruction::Alloc(len) => {
                self.stack.ensure_room(1)?;
                let reference = self.memory.alloc(usize::from(len))?;
                self.stack.push(Value::Ref(reference))?;
            }
            Instruction::Load(offset) => {
                let reference = expect_ref(self.stack.peek(0)?)?;
                let value = self.memory.read(reference, Int::from(offset))?;
                self.stack.replace_top(1, value)?;
            }
            Instruction::Store(offset) => {
                self.stack.ensure_depth(2)?;
                let value = self.stack.peek(0)?;
                let reference = expect_ref(self.stack.peek(1)?)?;
                self.memory.write(reference, Int::from(offset), value)?;
                self.stack.drop_top(2)?;
            }
            Instruction::LoadAt => {
                self.stack.ensure_depth(2)?;
                let offset = arith::expect_int(self.stack.peek(0)?)?;
                let reference = expect_ref(self.stack.peek(1)?)?;
                let value = self.memory.read(reference, offset)?;
                self.stack.replace_top(2, value)?;
            }
            Instruction::StoreAt => {
                self.stack.ensure_depth(3)?;
                let value = self.stack.peek(0)?;
                let offset = arith::expect_int(self.stack.peek(1)?)?;
                let reference = expect_ref(self.stack.peek(2)?)?;
                self.memory.write(reference, offset, value)?;
                self.stack.drop_top(3)?;
            }

            Instruction::Cap(id) => {
                self.stack.ensure_room(1)?;
                let handle = self.registry.issue(id)?;
                self.stack.push(Value::Cap(handle))?;
            }
            Instruction::Invoke(id, argc) => {
                let argc = usize::from(argc);
                self.prepare_invoke(argc)?;
                let handle = self.registry.issue(id)?;
                let result = self.invoke(index, handle, argc)?;
                self.stack.replace_top(argc, result)?;
            }
            Instruction::InvokeHandle(argc) => {
                let argc = usize::from(argc);
                self.stack.ensure_depth(argc + 1)?;
                let handle = expect_cap(self.stack.peek(argc)?)?;
                let result = self.invoke(index, handle, argc)?;
                self.stack.replace_top(argc + 1, result)?;
            }

            Instruction::Halt => return Ok(Flow::Halt),
        }
        Ok(Flow::Next)
    }

    /// Checks the stack can take the arguments off and the result on.
    fn prepare_invoke(&self, argc: usize) -> Result<()> {
        self.stack.ensure_depth(argc)?;
        if argc == 0 {
            self.stack.ensure_room(1)?;
        }
        Ok(())
    }

    /// Invokes `handle` with the top `argc` values, recording the call if
    /// tracing is on. The stack is not modified.
    fn invoke(&mut self, index: usize, handle: CapabilityHandle, argc: usize) -> Result<Value> {
        let args = self.stack.top(argc)?;
        let result = self.registry.invoke(handle, args);
        if self.config.trace_capabilities {
            self.trace.push(InvocationRecord {
                step: self.steps,
                instruction: index,
                id: handle.id(),
                args: args.to_vec(),
                result: result.as_ref().copied().map_err(|e| e.kind.clone()),
            });
        }
        result
    }
}

fn expect_ref(value: Value) -> Result<Reference> {
    value
        .as_reference()
        .ok_or_else(|| Error::type_mismatch(ValueKind::Ref, value.kind()))
}

fn expect_cap(value: Value) -> Result<CapabilityHandle> {
    value
        .as_cap()
        .ok_or_else(|| Error::type_mismatch(ValueKind::Cap, value.kind()))
}
