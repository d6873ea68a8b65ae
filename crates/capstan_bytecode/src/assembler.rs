//! Builds bytecode buffers.
//!
//! The assembler is the inverse of the loader: it encodes instructions,
//! patches forward branches once their labels are bound, and wraps the code
//! in a container header.

use capstan_foundation::{CapabilityId, Int};

use crate::encoding::{encode_instruction, write_container};
use crate::error::AssembleError;
use crate::instruction::Instruction;

/// A position in the code that branches can refer to before it is known.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Incremental bytecode builder with labels.
///
/// ```
/// use capstan_bytecode::{Assembler, Instruction};
///
/// let mut asm = Assembler::new();
/// let done = asm.label();
/// asm.emit(Instruction::PushBool(true));
/// asm.jump_if(done);
/// asm.emit(Instruction::Push(1));
/// asm.bind(done).unwrap();
/// asm.emit(Instruction::Halt);
/// let bytes = asm.finish().unwrap();
/// assert!(capstan_bytecode::load(&bytes).is_ok());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<u32>>,
    /// `(operand position, label)` pairs awaiting a bound label.
    fixups: Vec<(usize, Label)>,
    capabilities: Vec<CapabilityId>,
    entry: Option<Label>,
}

impl Assembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a listing whose control-transfer targets are instruction
    /// indices, declaring every capability it uses.
    ///
    /// A target equal to the listing length refers to the end of the code.
    ///
    /// # Errors
    /// Returns an error if a target lies past the end of the listing or the
    /// result does not fit the container.
    pub fn from_instructions(instructions: &[Instruction]) -> Result<Vec<u8>, AssembleError> {
        let mut asm = Self::new();
        let labels: Vec<Label> = (0..=instructions.len()).map(|_| asm.label()).collect();

        for (index, instruction) in instructions.iter().enumerate() {
            asm.bind(labels[index])?;
            if let Some(id) = instruction.capability() {
                asm.declare(id);
            }
            match instruction.target() {
                Some(target) => {
                    let label = *labels.get(target).ok_or(AssembleError::TargetOutOfRange {
                        index,
                        target,
                        len: instructions.len(),
                    })?;
                    asm.branch(*instruction, label);
                }
                None => {
                    asm.emit(*instruction);
                }
            }
        }
        asm.bind(labels[instructions.len()])?;

        asm.finish()
    }

    /// Creates a fresh unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current position.
    ///
    /// # Errors
    /// Returns an error if the label is already bound or the code has grown
    /// past `u32::MAX` bytes.
    pub fn bind(&mut self, label: Label) -> Result<&mut Self, AssembleError> {
        let here = self.offset()?;
        let slot = self
            .labels
            .get_mut(label.0)
            .ok_or(AssembleError::UnboundLabel(label.0))?;
        if slot.is_some() {
            return Err(AssembleError::LabelRebound(label.0));
        }
        *slot = Some(here);
        Ok(self)
    }

    /// Uses `label` as the entry point instead of offset 0.
    pub fn entry(&mut self, label: Label) -> &mut Self {
        self.entry = Some(label);
        self
    }

    /// Declares a required capability. Declaring an id twice is a no-op.
    pub fn declare(&mut self, id: CapabilityId) -> &mut Self {
        if !self.capabilities.contains(&id) {
            self.capabilities.push(id);
        }
        self
    }

    /// Returns the byte offset of the next instruction.
    ///
    /// # Errors
    /// Returns an error once the code outgrows the container.
    pub fn offset(&self) -> Result<u32, AssembleError> {
        u32::try_from(self.code.len()).map_err(|_| AssembleError::CodeTooLarge(self.code.len()))
    }

    /// Appends an instruction as-is. Targets are written as byte offsets.
    pub fn emit(&mut self, instruction: Instruction) -> &mut Self {
        encode_instruction(&instruction, &mut self.code);
        self
    }

    /// Appends a control-transfer instruction whose target is `label`.
    ///
    /// Non-branching instructions are emitted unchanged.
    pub fn branch(&mut self, instruction: Instruction, label: Label) -> &mut Self {
        if instruction.target().is_none() {
            return self.emit(instruction);
        }
        let operand = self.code.len() + 1;
        encode_instruction(&instruction.with_target(0), &mut self.code);
        self.fixups.push((operand, label));
        self
    }

    /// `PUSH n`.
    pub fn push(&mut self, n: Int) -> &mut Self {
        self.emit(Instruction::Push(n))
    }

    /// `JUMP label`.
    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::Jump(0), label)
    }

    /// `JUMP_IF label`.
    pub fn jump_if(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::JumpIf(0), label)
    }

    /// `JUMP_IF_NOT label`.
    pub fn jump_if_not(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::JumpIfNot(0), label)
    }

    /// `CALL label`.
    pub fn call(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::Call(0), label)
    }

    /// `CAP id`, declaring `id`.
    pub fn cap(&mut self, id: CapabilityId) -> &mut Self {
        self.declare(id).emit(Instruction::Cap(id))
    }

    /// `INVOKE id argc`, declaring `id`.
    pub fn invoke(&mut self, id: CapabilityId, argc: u8) -> &mut Self {
        self.declare(id).emit(Instruction::Invoke(id, argc))
    }

    fn resolve(&self, label: Label) -> Result<u32, AssembleError> {
        self.labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or(AssembleError::UnboundLabel(label.0))
    }

    /// Patches branches and writes the container.
    ///
    /// # Errors
    /// Returns an error if a referenced label was never bound or the result
    /// does not fit the container.
    pub fn finish(mut self) -> Result<Vec<u8>, AssembleError> {
        for (operand, label) in std::mem::take(&mut self.fixups) {
            let target = self.resolve(label)?;
            self.code[operand..operand + 4].copy_from_slice(&target.to_be_bytes());
        }
        let entry = match self.entry {
            Some(label) => self.resolve(label)?,
            None => 0,
        };
        write_container(entry, &self.capabilities, &self.code)
    }
}
