//! Binary container and instruction encoding.
//!
//! # Layout (format 1.x, big-endian)
//!
//! ```text
//! magic      4   "CPST"
//! major      u8  must equal FORMAT_MAJOR
//! minor      u8  any
//! flags      u16 must be 0
//! entry      u32 byte offset of the first instruction to execute
//! cap_count  u16
//! cap_ids    cap_count x u16
//! code_len   u32
//! code       code_len bytes, nothing after
//! ```
//!
//! Each instruction is one opcode byte followed by the fixed-width operand
//! slots listed in [`Opcode::operands`].

use capstan_foundation::CapabilityId;

use crate::error::{AssembleError, LoadError};
use crate::instruction::Instruction;
use crate::opcode::Opcode;

/// Format magic.
pub const MAGIC: [u8; 4] = *b"CPST";

/// Major format version understood by this crate.
pub const FORMAT_MAJOR: u8 = 1;

/// Minor format version written by this crate.
pub const FORMAT_MINOR: u8 = 0;

/// Size of the fixed part of the header (up to and including `cap_count`).
pub const FIXED_HEADER_LEN: usize = 14;

/// Decoded container header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Entry byte offset into the code section.
    pub entry: u32,
    /// Declared capability ids, in declaration order.
    pub capabilities: Vec<CapabilityId>,
}

/// Bounds-checked big-endian reader over a byte slice.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Some(out)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }

    pub(crate) fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_be_bytes)
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_be_bytes)
    }

    pub(crate) fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_be_bytes)
    }

    /// Header field read: a short buffer is a truncated header.
    fn header_field<T>(
        &mut self,
        width: usize,
        read: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Result<T, LoadError> {
        let available = self.remaining();
        read(self).ok_or(LoadError::TruncatedHeader {
            needed: width,
            available,
        })
    }
}

/// Reads and checks the header, leaving the cursor at `code_len`.
pub(crate) fn read_header(cursor: &mut Cursor<'_>) -> Result<Header, LoadError> {
    let magic: [u8; 4] = cursor.header_field(4, Cursor::array)?;
    if magic != MAGIC {
        return Err(LoadError::BadMagic(magic));
    }

    let major = cursor.header_field(1, Cursor::u8)?;
    let minor = cursor.header_field(1, Cursor::u8)?;
    if major != FORMAT_MAJOR {
        return Err(LoadError::UnsupportedVersion { major, minor });
    }

    let flags = cursor.header_field(2, Cursor::u16)?;
    if flags != 0 {
        return Err(LoadError::ReservedFlags(flags));
    }

    let entry = cursor.header_field(4, Cursor::u32)?;

    let count = cursor.header_field(2, Cursor::u16)?;
    let mut capabilities = Vec::with_capacity(usize::from(count).min(cursor.remaining() / 2));
    for _ in 0..count {
        let id = CapabilityId(cursor.header_field(2, Cursor::u16)?);
        if capabilities.contains(&id) {
            return Err(LoadError::DuplicateCapability(id));
        }
        capabilities.push(id);
    }

    Ok(Header {
        major,
        minor,
        entry,
        capabilities,
    })
}

/// One decoded instruction whose targets are still byte offsets.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Decoded {
    pub(crate) offset: u32,
    pub(crate) instruction: Instruction,
}

/// Decodes an entire code section.
///
/// The caller guarantees `code.len()` fits in a `u32`.
pub(crate) fn decode_code(code: &[u8]) -> Result<Vec<Decoded>, LoadError> {
    let mut cursor = Cursor::new(code);
    let mut out = Vec::new();

    while cursor.remaining() > 0 {
        #[allow(clippy::cast_possible_truncation)]
        let offset = cursor.position() as u32;
        let instruction = decode_one(&mut cursor, offset)?;
        out.push(Decoded {
            offset,
            instruction,
        });
    }

    Ok(out)
}

fn decode_one(cursor: &mut Cursor<'_>, offset: u32) -> Result<Instruction, LoadError> {
    let byte = cursor.u8().ok_or(LoadError::TruncatedOperand {
        offset,
        opcode: Opcode::Nop,
    })?;
    let opcode = Opcode::from_byte(byte).ok_or(LoadError::UnknownOpcode { offset, byte })?;
    let truncated = LoadError::TruncatedOperand { offset, opcode };

    let instruction = match opcode {
        Opcode::Nop => Instruction::Nop,
        Opcode::Push => Instruction::Push(cursor.i64().ok_or(truncated)?),
        Opcode::PushBool => match cursor.u8().ok_or(truncated)? {
            0 => Instruction::PushBool(false),
            1 => Instruction::PushBool(true),
            _ => {
                return Err(LoadError::InvalidOperand {
                    offset,
                    opcode,
                    reason: "boolean immediate must be 0 or 1",
                });
            }
        },
        Opcode::PushUnit => Instruction::PushUnit,
        Opcode::Pop => Instruction::Pop,
        Opcode::Dup => Instruction::Dup,
        Opcode::Swap => Instruction::Swap,
        Opcode::Pick => Instruction::Pick(cursor.u16().ok_or(truncated)?),
        Opcode::Add => Instruction::Add,
        Opcode::Sub => Instruction::Sub,
        Opcode::Mul => Instruction::Mul,
        Opcode::Div => Instruction::Div,
        Opcode::Rem => Instruction::Rem,
        Opcode::Neg => Instruction::Neg,
        Opcode::Eq => Instruction::Eq,
        Opcode::Ne => Instruction::Ne,
        Opcode::Lt => Instruction::Lt,
        Opcode::Le => Instruction::Le,
        Opcode::Gt => Instruction::Gt,
        Opcode::Ge => Instruction::Ge,
        Opcode::Not => Instruction::Not,
        Opcode::And => Instruction::And,
        Opcode::Or => Instruction::Or,
        Opcode::Jump => Instruction::Jump(target(cursor, truncated)?),
        Opcode::JumpIf => Instruction::JumpIf(target(cursor, truncated)?),
        Opcode::JumpIfNot => Instruction::JumpIfNot(target(cursor, truncated)?),
        Opcode::Call => Instruction::Call(target(cursor, truncated)?),
        Opcode::Return => Instruction::Return,
        Opcode::Alloc => Instruction::Alloc(cursor.u16().ok_or(truncated)?),
        Opcode::Load => Instruction::Load(cursor.u16().ok_or(truncated)?),
        Opcode::Store => Instruction::Store(cursor.u16().ok_or(truncated)?),
        Opcode::LoadAt => Instruction::LoadAt,
        Opcode::StoreAt => Instruction::StoreAt,
        Opcode::Cap => Instruction::Cap(CapabilityId(cursor.u16().ok_or(truncated)?)),
        Opcode::Invoke => {
            let id = CapabilityId(cursor.u16().ok_or(truncated.clone())?);
            let argc = cursor.u8().ok_or(truncated)?;
            Instruction::Invoke(id, argc)
        }
        Opcode::InvokeHandle => Instruction::InvokeHandle(cursor.u8().ok_or(truncated)?),
        Opcode::Halt => Instruction::Halt,
    };

    Ok(instruction)
}

fn target(cursor: &mut Cursor<'_>, truncated: LoadError) -> Result<usize, LoadError> {
    cursor.u32().map(|t| t as usize).ok_or(truncated)
}

/// Appends the encoding of `instruction` to `out`.
///
/// Control-transfer targets are written as byte offsets; values above
/// `u32::MAX` are clamped to `u32::MAX`, which no loader accepts as a boundary.
pub fn encode_instruction(instruction: &Instruction, out: &mut Vec<u8>) {
    out.push(instruction.opcode().byte());
    match *instruction {
        Instruction::Push(n) => out.extend_from_slice(&n.to_be_bytes()),
        Instruction::PushBool(b) => out.push(u8::from(b)),
        Instruction::Pick(n)
        | Instruction::Alloc(n)
        | Instruction::Load(n)
        | Instruction::Store(n) => {
            out.extend_from_slice(&n.to_be_bytes());
        }
        Instruction::Jump(t)
        | Instruction::JumpIf(t)
        | Instruction::JumpIfNot(t)
        | Instruction::Call(t) => {
            let t = u32::try_from(t).unwrap_or(u32::MAX);
            out.extend_from_slice(&t.to_be_bytes());
        }
        Instruction::Cap(id) => out.extend_from_slice(&id.0.to_be_bytes()),
        Instruction::Invoke(id, argc) => {
            out.extend_from_slice(&id.0.to_be_bytes());
            out.push(argc);
        }
        Instruction::InvokeHandle(argc) => out.push(argc),
        _ => {}
    }
}

/// Writes a complete container around an already-encoded code section.
///
/// # Errors
/// Returns an error if the capability table or the code section does not
/// fit the header's length fields.
pub fn write_container(
    entry: u32,
    capabilities: &[CapabilityId],
    code: &[u8],
) -> Result<Vec<u8>, AssembleError> {
    let cap_count = u16::try_from(capabilities.len())
        .map_err(|_| AssembleError::TooManyCapabilities(capabilities.len()))?;
    let code_len =
        u32::try_from(code.len()).map_err(|_| AssembleError::CodeTooLarge(code.len()))?;

    let mut out = Vec::with_capacity(FIXED_HEADER_LEN + capabilities.len() * 2 + 4 + code.len());
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_MAJOR);
    out.push(FORMAT_MINOR);
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&entry.to_be_bytes());
    out.extend_from_slice(&cap_count.to_be_bytes());
    for id in capabilities {
        out.extend_from_slice(&id.0.to_be_bytes());
    }
    out.extend_from_slice(&code_len.to_be_bytes());
    out.extend_from_slice(code);
    Ok(out)
}
