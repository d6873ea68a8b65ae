//! Decoded instructions.

use std::fmt;

use capstan_foundation::{CapabilityId, Int};

use crate::opcode::Opcode;

/// A single decoded instruction with its operands.
///
/// Inside a validated [`Program`](crate::Program) every control-transfer
/// target is an instruction index. The decoder produces byte offsets in the
/// same fields; the loader rewrites them before any program is observable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// No operation.
    Nop,
    /// Push an integer.
    Push(Int),
    /// Push a boolean.
    PushBool(bool),
    /// Push unit.
    PushUnit,
    /// Discard the top of stack.
    Pop,
    /// Duplicate the top of stack.
    Dup,
    /// Swap the top two values.
    Swap,
    /// Copy the value at the given depth (0 = top) onto the top.
    Pick(u16),
    /// Checked integer addition.
    Add,
    /// Checked integer subtraction.
    Sub,
    /// Checked integer multiplication.
    Mul,
    /// Checked integer division.
    Div,
    /// Checked integer remainder.
    Rem,
    /// Checked integer negation.
    Neg,
    /// Equality over any kinds.
    Eq,
    /// Inequality over any kinds.
    Ne,
    /// Integer less-than.
    Lt,
    /// Integer less-or-equal.
    Le,
    /// Integer greater-than.
    Gt,
    /// Integer greater-or-equal.
    Ge,
    /// Boolean negation.
    Not,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
    /// Unconditional jump.
    Jump(usize),
    /// Jump when the popped boolean is true.
    JumpIf(usize),
    /// Jump when the popped boolean is false.
    JumpIfNot(usize),
    /// Call the routine starting at the target.
    Call(usize),
    /// Return from the current routine.
    Return,
    /// Allocate a region of the given number of cells.
    Alloc(u16),
    /// Read the cell at a fixed offset.
    Load(u16),
    /// Write the cell at a fixed offset.
    Store(u16),
    /// Read the cell at an offset taken from the stack.
    LoadAt,
    /// Write the cell at an offset taken from the stack.
    StoreAt,
    /// Push a handle for a granted capability.
    Cap(CapabilityId),
    /// Invoke a capability by id with the given number of arguments.
    Invoke(CapabilityId, u8),
    /// Invoke the capability handle below the given number of arguments.
    InvokeHandle(u8),
    /// Stop execution.
    Halt,
}

impl Instruction {
    /// Returns the opcode of this instruction.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Push(_) => Opcode::Push,
            Self::PushBool(_) => Opcode::PushBool,
            Self::PushUnit => Opcode::PushUnit,
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::Swap => Opcode::Swap,
            Self::Pick(_) => Opcode::Pick,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Mul => Opcode::Mul,
            Self::Div => Opcode::Div,
            Self::Rem => Opcode::Rem,
            Self::Neg => Opcode::Neg,
            Self::Eq => Opcode::Eq,
            Self::Ne => Opcode::Ne,
            Self::Lt => Opcode::Lt,
            Self::Le => Opcode::Le,
            Self::Gt => Opcode::Gt,
            Self::Ge => Opcode::Ge,
            Self::Not => Opcode::Not,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
            Self::Jump(_) => Opcode::Jump,
            Self::JumpIf(_) => Opcode::JumpIf,
            Self::JumpIfNot(_) => Opcode::JumpIfNot,
            Self::Call(_) => Opcode::Call,
            Self::Return => Opcode::Return,
            Self::Alloc(_) => Opcode::Alloc,
            Self::Load(_) => Opcode::Load,
            Self::Store(_) => Opcode::Store,
            Self::LoadAt => Opcode::LoadAt,
            Self::StoreAt => Opcode::StoreAt,
            Self::Cap(_) => Opcode::Cap,
            Self::Invoke(..) => Opcode::Invoke,
            Self::InvokeHandle(_) => Opcode::InvokeHandle,
            Self::Halt => Opcode::Halt,
        }
    }

    /// Returns the control-transfer target, if this instruction has one.
    #[must_use]
    pub const fn target(&self) -> Option<usize> {
        match self {
            Self::Jump(t) | Self::JumpIf(t) | Self::JumpIfNot(t) | Self::Call(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns a copy with the control-transfer target replaced.
    #[must_use]
    pub(crate) const fn with_target(self, target: usize) -> Self {
        match self {
            Self::Jump(_) => Self::Jump(target),
            Self::JumpIf(_) => Self::JumpIf(target),
            Self::JumpIfNot(_) => Self::JumpIfNot(target),
            Self::Call(_) => Self::Call(target),
            other => other,
        }
    }

    /// Returns the capability id operand, if any.
    #[must_use]
    pub const fn capability(&self) -> Option<CapabilityId> {
        match self {
            Self::Cap(id) | Self::Invoke(id, _) => Some(*id),
            _ => None,
        }
    }

    /// Returns `(pops, pushes)`: how many values the instruction consumes
    /// from the stack and how many it leaves.
    ///
    /// `Pick(n)` reads `n + 1` values but consumes none; see
    /// [`required_depth`](Self::required_depth).
    #[must_use]
    pub const fn stack_effect(&self) -> (usize, usize) {
        match self {
            Self::Nop | Self::Jump(_) | Self::Call(_) | Self::Return | Self::Halt => (0, 0),
            Self::Push(_)
            | Self::PushBool(_)
            | Self::PushUnit
            | Self::Pick(_)
            | Self::Alloc(_)
            | Self::Cap(_) => (0, 1),
            Self::Pop | Self::JumpIf(_) | Self::JumpIfNot(_) => (1, 0),
            Self::Dup => (1, 2),
            Self::Swap => (2, 2),
            Self::Neg | Self::Not | Self::Load(_) => (1, 1),
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Rem
            | Self::Eq
            | Self::Ne
            | Self::Lt
            | Self::Le
            | Self::Gt
            | Self::Ge
            | Self::And
            | Self::Or
            | Self::LoadAt => (2, 1),
            Self::Store(_) => (2, 0),
            Self::StoreAt => (3, 0),
            Self::Invoke(_, argc) => (*argc as usize, 1),
            Self::InvokeHandle(argc) => (*argc as usize + 1, 1),
        }
    }

    /// Minimum stack depth the instruction needs to execute.
    #[must_use]
    pub const fn required_depth(&self) -> usize {
        match self {
            Self::Pick(depth) => *depth as usize + 1,
            other => other.stack_effect().0,
        }
    }

    /// Returns true if execution never continues to the next instruction.
    #[must_use]
    pub const fn ends_flow(&self) -> bool {
        matches!(self, Self::Jump(_) | Self::Return | Self::Halt)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode().mnemonic();
        match self {
            Self::Push(n) => write!(f, "{mnemonic} {n}"),
            Self::PushBool(b) => write!(f, "{mnemonic} {b}"),
            Self::Pick(n) | Self::Alloc(n) | Self::Load(n) | Self::Store(n) => {
                write!(f, "{mnemonic} {n}")
            }
            Self::Jump(t) | Self::JumpIf(t) | Self::JumpIfNot(t) | Self::Call(t) => {
                write!(f, "{mnemonic} @{t}")
            }
            Self::Cap(id) => write!(f, "{mnemonic} {}", id.0),
            Self::Invoke(id, argc) => write!(f, "{mnemonic} {} {argc}", id.0),
            Self::InvokeHandle(argc) => write!(f, "{mnemonic} {argc}"),
            _ => f.write_str(mnemonic),
        }
    }
}
