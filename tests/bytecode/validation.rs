//! Integration tests for static validation

use capstan_bytecode::encoding::write_container;
use capstan_bytecode::{Assembler, Instruction, LoadError, Loader, Opcode, load};
use capstan_foundation::{CapabilityCatalog, CapabilityId, ParamKind, Signature, ValueKind};

const CONSOLE: CapabilityId = CapabilityId(1);
const CLOCK: CapabilityId = CapabilityId(2);

fn catalog() -> CapabilityCatalog {
    CapabilityCatalog::new()
        .with(
            CONSOLE,
            Signature::new("console.write_line").param(ParamKind::Any),
        )
        .with(CLOCK, Signature::new("clock.now").returns(ValueKind::Int))
}

// =============================================================================
// Capabilities
// =============================================================================

#[test]
fn undeclared_capability_is_out_of_range() {
    // INVOKE cap 7 with an empty declaration table.
    let code = [Opcode::Invoke.byte(), 0, 7, 0, Opcode::Halt.byte()];
    let bytes = write_container(0, &[], &code).unwrap();
    assert_eq!(
        load(&bytes).unwrap_err(),
        LoadError::UndeclaredCapability {
            offset: 0,
            id: CapabilityId(7)
        }
    );
}

#[test]
fn catalog_rejects_unhonored_declarations() {
    let mut asm = Assembler::new();
    asm.declare(CapabilityId(9)).emit(Instruction::Halt);
    let bytes = asm.finish().unwrap();

    assert!(load(&bytes).is_ok());
    assert_eq!(
        Loader::new().with_catalog(catalog()).load(&bytes).unwrap_err(),
        LoadError::UnknownCapability(CapabilityId(9))
    );
}

#[test]
fn catalog_checks_invoke_arity() {
    let bytes = Assembler::from_instructions(&[Instruction::Invoke(CLOCK, 1)]).unwrap();
    assert!(matches!(
        Loader::new().with_catalog(catalog()).load(&bytes),
        Err(LoadError::ArityMismatch {
            expected: 0,
            found: 1,
            ..
        })
    ));

    let bytes = Assembler::from_instructions(&[
        Instruction::Invoke(CLOCK, 0),
        Instruction::Invoke(CONSOLE, 1),
    ])
    .unwrap();
    let program = Loader::new().with_catalog(catalog()).load(&bytes).unwrap();
    assert_eq!(program.required_capabilities(), &[CLOCK, CONSOLE]);
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn mid_instruction_target_rejected() {
    // JUMP 7 lands inside the PUSH that starts at offset 5.
    let mut code = vec![Opcode::Jump.byte(), 0, 0, 0, 7];
    code.push(Opcode::Push.byte());
    code.extend_from_slice(&1i64.to_be_bytes());
    let bytes = write_container(0, &[], &code).unwrap();
    assert_eq!(
        load(&bytes).unwrap_err(),
        LoadError::InvalidTarget {
            offset: 0,
            target: 7
        }
    );
}

#[test]
fn target_past_end_rejected() {
    let code = [Opcode::Call.byte(), 0, 0, 0, 6];
    let bytes = write_container(0, &[], &code).unwrap();
    assert!(matches!(load(&bytes), Err(LoadError::InvalidTarget { target: 6, .. })));
}

#[test]
fn end_of_code_is_a_boundary() {
    let code = [Opcode::Jump.byte(), 0, 0, 0, 5];
    let program = load(&write_container(0, &[], &code).unwrap()).unwrap();
    assert_eq!(program.instructions(), &[Instruction::Jump(1)]);
}

#[test]
fn entry_must_be_a_boundary() {
    let code = [Opcode::Push.byte(), 0, 0, 0, 0, 0, 0, 0, 1, Opcode::Halt.byte()];
    assert_eq!(
        load(&write_container(3, &[], &code).unwrap()).unwrap_err(),
        LoadError::InvalidEntry(3)
    );
    let program = load(&write_container(9, &[], &code).unwrap()).unwrap();
    assert_eq!(program.entry(), 1);
}

#[test]
fn targets_become_indices() {
    let program = load(
        &Assembler::from_instructions(&[
            Instruction::Push(1),
            Instruction::Jump(3),
            Instruction::Nop,
            Instruction::Halt,
        ])
        .unwrap(),
    )
    .unwrap();
    assert_eq!(program.instructions()[1], Instruction::Jump(3));
    assert_eq!(program.offset(1), Some(9));
    assert_eq!(program.offset(2), Some(14));
    assert_eq!(program.offset(3), Some(15));
}

// =============================================================================
// Stack depth
// =============================================================================

fn pick_check(instructions: &[Instruction]) -> Result<(), LoadError> {
    load(&Assembler::from_instructions(instructions).unwrap()).map(|_| ())
}

#[test]
fn provable_pick_accepted() {
    use Instruction::*;
    assert!(pick_check(&[Push(1), Push(2), Pick(1), Halt]).is_ok());
}

#[test]
fn unprovable_pick_rejected() {
    use Instruction::*;
    let err = pick_check(&[Push(1), Pick(1)]).unwrap_err();
    assert_eq!(
        err,
        LoadError::UnprovableStackDepth {
            offset: 9,
            opcode: Opcode::Pick,
            depth: 1,
            proven: 1
        }
    );
}

#[test]
fn merge_points_take_the_minimum() {
    use Instruction::*;
    // The jump skips two pushes, so PICK sees either one value or three.
    let listing = [PushBool(true), JumpIf(4), Push(1), Push(2), Push(3), Pick(1), Halt];
    assert!(pick_check(&listing).is_err());
    let listing = [PushBool(true), JumpIf(4), Push(1), Push(2), Push(3), Pick(0), Halt];
    assert!(pick_check(&listing).is_ok());
}

#[test]
fn call_fall_through_is_conservative() {
    use Instruction::*;
    assert!(pick_check(&[Push(1), Call(4), Pick(0), Halt, Return]).is_err());
    assert!(pick_check(&[Push(1), Call(3), Halt, Pick(0), Return]).is_ok());
}

#[test]
fn unreachable_pick_rejected() {
    use Instruction::*;
    assert!(pick_check(&[Halt, Pick(0)]).is_err());
}
