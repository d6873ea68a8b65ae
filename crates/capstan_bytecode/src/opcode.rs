//! Opcode table for Capstan bytecode format 1.
//!
//! Opcode byte values and operand shapes are part of the format contract:
//! an opcode is never renumbered and its operands never change width within
//! a major version. Bytes not listed here are rejected by the decoder.

#![allow(clippy::doc_markdown)]

/// Kind of one fixed-width operand slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// Signed 64-bit immediate integer.
    Int,
    /// One byte, 0 or 1.
    Flag,
    /// Stack depth below the top (0 = top), u16.
    StackDepth,
    /// Byte offset of an instruction in the code section, u32.
    Target,
    /// Number of cells to allocate, u16.
    RegionLength,
    /// Cell offset within a region, u16.
    CellOffset,
    /// Capability identifier, u16.
    Capability,
    /// Argument count, u8.
    ArgCount,
}

impl OperandKind {
    /// Encoded width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Int => 8,
            Self::Flag | Self::ArgCount => 1,
            Self::StackDepth | Self::RegionLength | Self::CellOffset | Self::Capability => 2,
            Self::Target => 4,
        }
    }
}

/// A bytecode opcode.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // === Stack ===
    /// No operation.
    Nop = 0x00,
    /// Push an integer immediate: `[] -> [n]`
    Push = 0x01,
    /// Push a boolean immediate: `[] -> [b]`
    PushBool = 0x02,
    /// Push unit: `[] -> [()]`
    PushUnit = 0x03,
    /// Discard the top: `[a] -> []`
    Pop = 0x04,
    /// Duplicate the top: `[a] -> [a, a]`
    Dup = 0x05,
    /// Swap the top two: `[a, b] -> [b, a]`
    Swap = 0x06,
    /// Copy the value at a depth to the top: `[x, .., top] -> [x, .., top, x]`
    Pick = 0x07,

    // === Arithmetic (trapping) ===
    /// `[a, b] -> [a + b]`
    Add = 0x10,
    /// `[a, b] -> [a - b]`
    Sub = 0x11,
    /// `[a, b] -> [a * b]`
    Mul = 0x12,
    /// `[a, b] -> [a / b]`
    Div = 0x13,
    /// `[a, b] -> [a % b]`
    Rem = 0x14,
    /// `[a] -> [-a]`
    Neg = 0x15,

    // === Comparison ===
    /// `[a, b] -> [a == b]`
    Eq = 0x20,
    /// `[a, b] -> [a != b]`
    Ne = 0x21,
    /// `[a, b] -> [a < b]`
    Lt = 0x22,
    /// `[a, b] -> [a <= b]`
    Le = 0x23,
    /// `[a, b] -> [a > b]`
    Gt = 0x24,
    /// `[a, b] -> [a >= b]`
    Ge = 0x25,

    // === Logic ===
    /// `[a] -> [!a]`
    Not = 0x28,
    /// `[a, b] -> [a && b]`
    And = 0x29,
    /// `[a, b] -> [a || b]`
    Or = 0x2A,

    // === Control Flow ===
    /// Unconditional jump to an absolute code offset.
    Jump = 0x30,
    /// Pop a boolean and jump if true.
    JumpIf = 0x31,
    /// Pop a boolean and jump if false.
    JumpIfNot = 0x32,
    /// Enter a call frame at the target.
    Call = 0x33,
    /// Leave the current call frame (halts at top level).
    Return = 0x34,

    // === Memory ===
    /// Allocate a region: `[] -> [ref]`
    Alloc = 0x40,
    /// Read a cell at a fixed offset: `[ref] -> [v]`
    Load = 0x41,
    /// Write a cell at a fixed offset: `[ref, v] -> []`
    Store = 0x42,
    /// Read a cell at a computed offset: `[ref, i] -> [v]`
    LoadAt = 0x43,
    /// Write a cell at a computed offset: `[ref, i, v] -> []`
    StoreAt = 0x44,

    // === Capabilities ===
    /// Obtain a handle for a granted capability: `[] -> [cap]`
    Cap = 0x50,
    /// Invoke a capability by id: `[args..] -> [result]`
    Invoke = 0x51,
    /// Invoke a capability through a handle: `[cap, args..] -> [result]`
    InvokeHandle = 0x52,

    // === System ===
    /// Stop execution.
    Halt = 0xFF,
}

impl Opcode {
    /// Every opcode, in byte order.
    pub const ALL: [Self; 37] = [
        Self::Nop,
        Self::Push,
        Self::PushBool,
        Self::PushUnit,
        Self::Pop,
        Self::Dup,
        Self::Swap,
        Self::Pick,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Rem,
        Self::Neg,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Not,
        Self::And,
        Self::Or,
        Self::Jump,
        Self::JumpIf,
        Self::JumpIfNot,
        Self::Call,
        Self::Return,
        Self::Alloc,
        Self::Load,
        Self::Store,
        Self::LoadAt,
        Self::StoreAt,
        Self::Cap,
        Self::Invoke,
        Self::InvokeHandle,
        Self::Halt,
    ];

    /// Converts a raw byte to an opcode.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Nop,
            0x01 => Self::Push,
            0x02 => Self::PushBool,
            0x03 => Self::PushUnit,
            0x04 => Self::Pop,
            0x05 => Self::Dup,
            0x06 => Self::Swap,
            0x07 => Self::Pick,

            0x10 => Self::Add,
            0x11 => Self::Sub,
            0x12 => Self::Mul,
            0x13 => Self::Div,
            0x14 => Self::Rem,
            0x15 => Self::Neg,

            0x20 => Self::Eq,
            0x21 => Self::Ne,
            0x22 => Self::Lt,
            0x23 => Self::Le,
            0x24 => Self::Gt,
            0x25 => Self::Ge,

            0x28 => Self::Not,
            0x29 => Self::And,
            0x2A => Self::Or,

            0x30 => Self::Jump,
            0x31 => Self::JumpIf,
            0x32 => Self::JumpIfNot,
            0x33 => Self::Call,
            0x34 => Self::Return,

            0x40 => Self::Alloc,
            0x41 => Self::Load,
            0x42 => Self::Store,
            0x43 => Self::LoadAt,
            0x44 => Self::StoreAt,

            0x50 => Self::Cap,
            0x51 => Self::Invoke,
            0x52 => Self::InvokeHandle,

            0xFF => Self::Halt,

            _ => return None,
        })
    }

    /// Returns the encoded byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Push => "PUSH",
            Self::PushBool => "PUSH_BOOL",
            Self::PushUnit => "PUSH_UNIT",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::Pick => "PICK",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Rem => "REM",
            Self::Neg => "NEG",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Jump => "JUMP",
            Self::JumpIf => "JUMP_IF",
            Self::JumpIfNot => "JUMP_IF_NOT",
            Self::Call => "CALL",
            Self::Return => "RETURN",
            Self::Alloc => "ALLOC",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::LoadAt => "LOAD_AT",
            Self::StoreAt => "STORE_AT",
            Self::Cap => "CAP",
            Self::Invoke => "INVOKE",
            Self::InvokeHandle => "INVOKE_HANDLE",
            Self::Halt => "HALT",
        }
    }

    /// Returns the operand slots that follow the opcode byte.
    #[must_use]
    pub const fn operands(self) -> &'static [OperandKind] {
        match self {
            Self::Push => &[OperandKind::Int],
            Self::PushBool => &[OperandKind::Flag],
            Self::Pick => &[OperandKind::StackDepth],
            Self::Jump | Self::JumpIf | Self::JumpIfNot | Self::Call => &[OperandKind::Target],
            Self::Alloc => &[OperandKind::RegionLength],
            Self::Load | Self::Store => &[OperandKind::CellOffset],
            Self::Cap => &[OperandKind::Capability],
            Self::Invoke => &[OperandKind::Capability, OperandKind::ArgCount],
            Self::InvokeHandle => &[OperandKind::ArgCount],
            _ => &[],
        }
    }

    /// Total encoded length, opcode byte included.
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        let operands = self.operands();
        let mut len = 1;
        let mut i = 0;
        while i < operands.len() {
            len += operands[i].width();
            i += 1;
        }
        len
    }

    /// Returns true if this opcode may transfer control somewhere other
    /// than the next instruction.
    #[must_use]
    pub const fn is_control_transfer(self) -> bool {
        matches!(
            self,
            Self::Jump | Self::JumpIf | Self::JumpIfNot | Self::Call | Self::Return
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
