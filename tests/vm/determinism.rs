//! Determinism of trajectories
//!
//! Identical bytecode plus identical capability responses produce identical
//! snapshots after every step.

use capstan_bytecode::{Assembler, Instruction, load};
use capstan_capability::{CapabilityRegistry, Manifest, StandardAction};
use capstan_foundation::{CapabilityId, Value, ValueKind};
use capstan_vm::{Vm, VmConfig, VmSnapshot};
use proptest::prelude::*;

const CLOCK: CapabilityId = CapabilityId(1);
const RANDOM: CapabilityId = CapabilityId(2);
const CONSOLE: CapabilityId = CapabilityId(3);

fn trajectory(
    listing: &[Instruction],
    seed: u64,
    budget: usize,
) -> (Vec<VmSnapshot>, Vec<String>) {
    let (caps, console) = Manifest::new(seed)
        .grant(CLOCK, StandardAction::SteppedClock { start: 0, step: 7 })
        .grant(RANDOM, StandardAction::SeededRandom)
        .grant(CONSOLE, StandardAction::ConsoleWriteLine)
        .to_captured_config()
        .unwrap();
    let program = load(&Assembler::from_instructions(listing).unwrap()).unwrap();
    let registry = CapabilityRegistry::from_config(caps);
    let mut vm = Vm::new(program, registry, VmConfig::small()).unwrap();

    let mut snapshots = vec![vm.snapshot()];
    for _ in 0..budget {
        if vm.status().is_terminal() {
            break;
        }
        vm.step();
        snapshots.push(vm.snapshot());
    }
    (snapshots, console.take())
}

/// Programs mixing arithmetic, memory, effects and capability handles.
fn listing() -> impl Strategy<Value = Vec<Instruction>> {
    (1usize..32).prop_flat_map(|len| {
        let op = prop_oneof![
            3 => (-4i64..4).prop_map(Instruction::Push),
            1 => Just(Instruction::Add),
            1 => Just(Instruction::Mul),
            1 => Just(Instruction::Div),
            1 => Just(Instruction::Dup),
            1 => Just(Instruction::Swap),
            1 => Just(Instruction::Lt),
            1 => (1u16..3).prop_map(Instruction::Alloc),
            1 => Just(Instruction::StoreAt),
            1 => Just(Instruction::LoadAt),
            1 => Just(Instruction::Invoke(CLOCK, 0)),
            1 => Just(Instruction::Invoke(RANDOM, 0)),
            1 => Just(Instruction::Invoke(CONSOLE, 1)),
            1 => Just(Instruction::Cap(CLOCK)),
            1 => Just(Instruction::Cap(CONSOLE)),
            1 => (0u8..2).prop_map(Instruction::InvokeHandle),
            1 => (0..=len).prop_map(Instruction::JumpIf),
            1 => (0..=len).prop_map(Instruction::Call),
            1 => Just(Instruction::Return),
        ];
        prop::collection::vec(op, len)
    })
}

proptest! {
    #[test]
    fn identical_inputs_identical_trajectories(listing in listing(), seed in any::<u64>()) {
        let (a, out_a) = trajectory(&listing, seed, 200);
        let (b, out_b) = trajectory(&listing, seed, 200);
        prop_assert_eq!(a, b);
        prop_assert_eq!(out_a, out_b);
    }
}

#[test]
fn clock_and_random_replay() {
    use Instruction::*;
    let listing = [
        Invoke(CLOCK, 0),
        Invoke(RANDOM, 0),
        Invoke(CLOCK, 0),
        Invoke(CONSOLE, 1),
        Halt,
    ];
    let (first, out) = trajectory(&listing, 99, 100);
    let (second, _) = trajectory(&listing, 99, 100);
    assert_eq!(first, second);
    assert_eq!(out, vec!["7"]);
    let stack = &first.last().unwrap().stack;
    assert_eq!(stack.len(), 3);
    assert_eq!(stack[0], Value::Int(0));
    assert_eq!(stack[1].kind(), ValueKind::Int);
    assert_eq!(stack[2], Value::Unit);
}

#[test]
fn handles_do_not_break_replay() {
    use Instruction::*;
    let (first, _) = trajectory(&[Cap(CLOCK), Halt], 5, 1);
    let (second, _) = trajectory(&[Cap(CLOCK), Halt], 5, 1);
    assert_eq!(first.len(), 2);
    assert_eq!(first.last().unwrap().stack[0].kind(), ValueKind::Cap);
    assert_eq!(first, second);
}

#[test]
fn handle_invocations_replay() {
    use Instruction::*;
    let listing = [Cap(CLOCK), InvokeHandle(0), Cap(CLOCK), InvokeHandle(0), Halt];
    let (first, _) = trajectory(&listing, 5, 100);
    let (second, _) = trajectory(&listing, 5, 100);
    assert_eq!(first, second);
    assert_eq!(
        first.last().unwrap().stack,
        vec![Value::Int(0), Value::Int(7)]
    );
}
