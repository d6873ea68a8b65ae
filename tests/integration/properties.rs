//! Pipeline-wide properties

use capstan::bytecode::Assembler;
use capstan::{CapabilityConfig, Instruction, VmConfig, run_bytecode};
use proptest::prelude::*;

/// Listings whose branches and calls only go forward, so every run ends.
/// Returning re-executes code after a call, so the call depth is kept low.
fn forward_listing() -> impl Strategy<Value = Vec<Instruction>> {
    (1usize..48).prop_flat_map(|len| {
        (0..len)
            .map(|index| {
                prop_oneof![
                    4 => (-8i64..8).prop_map(Instruction::Push),
                    1 => any::<bool>().prop_map(Instruction::PushBool),
                    1 => Just(Instruction::Add),
                    1 => Just(Instruction::Sub),
                    1 => Just(Instruction::Rem),
                    1 => Just(Instruction::Dup),
                    1 => Just(Instruction::Pop),
                    1 => Just(Instruction::Swap),
                    1 => Just(Instruction::Ge),
                    1 => Just(Instruction::Not),
                    1 => (0u16..4).prop_map(Instruction::Alloc),
                    1 => (0u16..4).prop_map(Instruction::Load),
                    1 => (0u16..4).prop_map(Instruction::Store),
                    1 => Just(Instruction::Return),
                    1 => Just(Instruction::Halt),
                    1 => (index + 1..=len).prop_map(Instruction::Jump),
                    1 => (index + 1..=len).prop_map(Instruction::JumpIfNot),
                    1 => (index + 1..=len).prop_map(Instruction::Call),
                ]
                .boxed()
            })
            .collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = run_bytecode(&bytes, CapabilityConfig::new(), VmConfig::small());
    }

    #[test]
    fn arbitrary_code_after_a_valid_header_never_panics(
        code in prop::collection::vec(any::<u8>(), 0..64)
    ) {
        let mut bytes = b"CPST\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec();
        let len = u32::try_from(code.len()).unwrap();
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&code);
        let _ = run_bytecode(&bytes, CapabilityConfig::new(), VmConfig::small());
    }

    #[test]
    fn well_formed_programs_terminate(listing in forward_listing()) {
        let bytes = Assembler::from_instructions(&listing).unwrap();
        let config = VmConfig::small().with_max_call_depth(4);
        let result = run_bytecode(&bytes, CapabilityConfig::new(), config).unwrap();
        prop_assert!(result.termination.status().is_terminal());
    }
}
