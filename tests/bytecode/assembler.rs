//! Integration tests for the assembler

use capstan_bytecode::{AssembleError, Assembler, Instruction, load};
use capstan_foundation::CapabilityId;

#[test]
fn labels_and_entry() {
    let mut asm = Assembler::new();
    let main = asm.label();
    let helper = asm.label();
    let done = asm.label();
    asm.entry(main);

    asm.bind(helper).unwrap();
    asm.push(40).push(2).emit(Instruction::Add).emit(Instruction::Return);

    asm.bind(main).unwrap();
    asm.call(helper);
    asm.emit(Instruction::Dup).push(42).emit(Instruction::Eq);
    asm.jump_if(done);
    asm.emit(Instruction::PushUnit);
    asm.bind(done).unwrap();
    asm.emit(Instruction::Halt);

    let program = load(&asm.finish().unwrap()).unwrap();
    assert_eq!(program.entry(), 4);
    assert_eq!(program.get(4), Some(&Instruction::Call(0)));
    assert_eq!(program.get(8), Some(&Instruction::JumpIf(10)));
}

#[test]
fn capabilities_are_declared_in_first_use_order() {
    let mut asm = Assembler::new();
    asm.invoke(CapabilityId(4), 0)
        .cap(CapabilityId(2))
        .invoke(CapabilityId(4), 0)
        .emit(Instruction::Halt);
    let program = load(&asm.finish().unwrap()).unwrap();
    assert_eq!(
        program.required_capabilities(),
        &[CapabilityId(4), CapabilityId(2)]
    );
}

#[test]
fn unbound_label() {
    let mut asm = Assembler::new();
    let missing = asm.label();
    asm.jump_if_not(missing);
    assert_eq!(asm.finish().unwrap_err(), AssembleError::UnboundLabel(0));
}

#[test]
fn listing_target_out_of_range() {
    let err = Assembler::from_instructions(&[Instruction::Call(2)]).unwrap_err();
    assert_eq!(
        err,
        AssembleError::TargetOutOfRange {
            index: 0,
            target: 2,
            len: 1
        }
    );
}

#[test]
fn disassembly() {
    let bytes = Assembler::from_instructions(&[
        Instruction::Invoke(CapabilityId(7), 0),
        Instruction::Halt,
    ])
    .unwrap();
    let text = load(&bytes).unwrap().to_string();
    assert!(text.starts_with("; capstan 1.0, entry @0\n; requires cap:7\n"));
    assert!(text.contains("HALT"));
}
