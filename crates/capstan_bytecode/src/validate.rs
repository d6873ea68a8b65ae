//! Static validation of decoded code.
//!
//! Runs after structural decode and before any [`Program`](crate::Program)
//! exists. Checks are ordered: capabilities, then control-flow targets
//! (rewritten to instruction indices), then PICK depths.

use std::collections::VecDeque;

use capstan_foundation::{CapabilityCatalog, CapabilityId, Signature};

use crate::encoding::Decoded;
use crate::error::LoadError;
use crate::instruction::Instruction;

/// Every capability operand must be declared; with a catalog, every declared
/// id must be honored and every INVOKE must match its signature's arity.
pub(crate) fn check_capabilities(
    code: &[Decoded],
    declared: &[CapabilityId],
    catalog: Option<&CapabilityCatalog>,
) -> Result<(), LoadError> {
    for decoded in code {
        match decoded.instruction.capability() {
            Some(id) if !declared.contains(&id) => {
                return Err(LoadError::UndeclaredCapability {
                    offset: decoded.offset,
                    id,
                });
            }
            _ => {}
        }
    }

    let Some(catalog) = catalog else {
        return Ok(());
    };

    for &id in declared {
        if !catalog.contains(id) {
            return Err(LoadError::UnknownCapability(id));
        }
    }

    for decoded in code {
        let Instruction::Invoke(id, argc) = decoded.instruction else {
            continue;
        };
        let expected = catalog.signature(id).map_or(0, Signature::arity);
        if expected != usize::from(argc) {
            return Err(LoadError::ArityMismatch {
                offset: decoded.offset,
                id,
                expected,
                found: usize::from(argc),
            });
        }
    }

    Ok(())
}

/// Maps a byte offset to an instruction index. The end of the code section
/// counts as a boundary and maps to `code.len()`.
fn boundary(code: &[Decoded], code_len: u32, offset: u32) -> Option<usize> {
    if offset == code_len {
        return Some(code.len());
    }
    code.binary_search_by_key(&offset, |d| d.offset).ok()
}

/// Resolves the entry and every control-transfer target to instruction
/// indices. Returns the rewritten instructions and the entry index.
pub(crate) fn resolve_targets(
    code: &[Decoded],
    code_len: u32,
    entry: u32,
) -> Result<(Vec<Instruction>, usize), LoadError> {
    let entry_index = boundary(code, code_len, entry).ok_or(LoadError::InvalidEntry(entry))?;

    let mut instructions = Vec::with_capacity(code.len());
    for decoded in code {
        let instruction = match decoded.instruction.target() {
            Some(target) => {
                let invalid = LoadError::InvalidTarget {
                    offset: decoded.offset,
                    target: u32::try_from(target).unwrap_or(u32::MAX),
                };
                let byte = u32::try_from(target).map_err(|_| invalid.clone())?;
                let index = boundary(code, code_len, byte).ok_or(invalid)?;
                decoded.instruction.with_target(index)
            }
            None => decoded.instruction,
        };
        instructions.push(instruction);
    }

    Ok((instructions, entry_index))
}

/// Lower bound on stack height at each instruction, computed over the
/// control-flow graph from `entry`.
///
/// Heights start at zero at the entry and only decrease at merge points, so
/// the worklist reaches a fixed point. A CALL's fall-through is reset to zero
/// because the callee may consume anything; the call target inherits the
/// caller's height. Unreachable instructions get no bound.
pub(crate) fn stack_bounds(instructions: &[Instruction], entry: usize) -> Vec<Option<usize>> {
    let mut bounds: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut worklist = VecDeque::new();

    flow(&mut bounds, &mut worklist, entry, 0);

    while let Some(index) = worklist.pop_front() {
        let Some(height) = bounds[index] else { continue };
        let instruction = instructions[index];
        let (pops, pushes) = instruction.stack_effect();
        let after = height.max(pops) - pops + pushes;

        // Nothing is known about the stack a callee returns with.
        let fall_through = match instruction {
            Instruction::Call(target) => {
                flow(&mut bounds, &mut worklist, target, height);
                0
            }
            Instruction::Jump(target)
            | Instruction::JumpIf(target)
            | Instruction::JumpIfNot(target) => {
                flow(&mut bounds, &mut worklist, target, after);
                after
            }
            _ => after,
        };
        if !instruction.ends_flow() {
            flow(&mut bounds, &mut worklist, index + 1, fall_through);
        }
    }

    bounds
}

fn flow(bounds: &mut [Option<usize>], worklist: &mut VecDeque<usize>, to: usize, height: usize) {
    let Some(slot) = bounds.get_mut(to) else {
        return;
    };
    let merged = slot.map_or(height, |h| h.min(height));
    if *slot != Some(merged) {
        *slot = Some(merged);
        worklist.push_back(to);
    }
}

/// Rejects any PICK whose depth is not covered by the proven stack height.
/// A PICK in unreachable code has a proven height of zero.
pub(crate) fn check_stack_depths(
    instructions: &[Instruction],
    offsets: &[u32],
    entry: usize,
) -> Result<(), LoadError> {
    let bounds = stack_bounds(instructions, entry);

    for (index, instruction) in instructions.iter().enumerate() {
        if let Instruction::Pick(depth) = *instruction {
            let proven = bounds[index].unwrap_or(0);
            if proven < instruction.required_depth() {
                return Err(LoadError::UnprovableStackDepth {
                    offset: offsets[index],
                    opcode: instruction.opcode(),
                    depth,
                    proven,
                });
            }
        }
    }

    Ok(())
}
