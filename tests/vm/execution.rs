//! Integration tests for VM execution

use capstan_bytecode::{Assembler, Instruction, Opcode, Program, load};
use capstan_capability::{
    CapabilityConfig, CapabilityRegistry, FnAction, Manifest, StandardAction,
};
use capstan_foundation::{CapabilityId, ErrorKind, ParamKind, Signature, Value};
use capstan_vm::{Termination, Vm, VmConfig, VmStatus};

fn program(listing: &[Instruction]) -> Program {
    load(&Assembler::from_instructions(listing).unwrap()).unwrap()
}

fn new_vm(listing: &[Instruction], config: VmConfig) -> Vm {
    Vm::new(program(listing), CapabilityRegistry::deny_all(), config).unwrap()
}

#[test]
fn add_example() {
    use Instruction::*;
    let result = new_vm(&[Push(2), Push(3), Add, Halt], VmConfig::default()).into_result();
    assert_eq!(result.termination.top(), Some(Value::Int(5)));
    assert_eq!(result.termination.status(), VmStatus::Halted);
}

#[test]
fn denied_example() {
    use Instruction::*;
    let result = new_vm(&[Invoke(CapabilityId(7), 0), Halt], VmConfig::default()).into_result();
    let Termination::CapabilityDenied(fault) = &result.termination else {
        panic!("expected denial, got {}", result.termination);
    };
    assert_eq!(fault.instruction, 0);
    assert_eq!(fault.offset, 0);
    assert_eq!(fault.opcode, Opcode::Invoke);
    assert_eq!(result.steps, 1);
}

#[test]
fn step_by_step() {
    use Instruction::*;
    let mut vm = new_vm(&[Push(2), Dup, Mul, Halt], VmConfig::default());
    assert_eq!(vm.status(), VmStatus::Ready);
    assert_eq!(vm.step(), VmStatus::Running);
    assert_eq!(vm.stack(), &[Value::Int(2)]);
    assert_eq!(vm.ip(), 1);
    vm.step();
    vm.step();
    assert_eq!(vm.stack(), &[Value::Int(4)]);
    assert_eq!(vm.step(), VmStatus::Halted);
    assert_eq!(vm.step(), VmStatus::Halted);
    assert_eq!(vm.steps(), 4);
}

#[test]
fn recursion_to_the_depth_limit() {
    use Instruction::*;
    // f(n) = n == 0 ? 0 : 1 + f(n - 1)
    let listing = [
        Push(5),
        Call(3),
        Halt,
        Dup,
        Push(0),
        Eq,
        JumpIf(13),
        Push(1),
        Sub,
        Call(3),
        Push(1),
        Add,
        Return,
        Return,
    ];
    let result = new_vm(&listing, VmConfig::default()).into_result();
    assert_eq!(result.termination.top(), Some(Value::Int(5)));

    let shallow = VmConfig::default().with_max_call_depth(4);
    let result = new_vm(&listing, shallow).into_result();
    let fault = result.termination.fault().unwrap();
    assert_eq!(fault.kind, ErrorKind::CallDepthExceeded { limit: 4 });
    assert_eq!(fault.frames.len(), 4);
}

#[test]
fn faults_convert_to_errors_with_context() {
    use Instruction::*;
    let result = new_vm(&[Push(1), Push(0), Rem], VmConfig::default()).into_result();
    let error = result.termination.fault().unwrap().to_error();
    assert_eq!(error.kind, ErrorKind::DivisionByZero);
    assert_eq!(
        error.context.unwrap().to_string(),
        "at instruction 2 (REM @ 0x0012)"
    );
}

#[test]
fn trace_ring_keeps_the_latest() {
    use Instruction::*;
    let clock = CapabilityId(1);
    let (caps, _) = Manifest::new(0)
        .grant(clock, StandardAction::SteppedClock { start: 0, step: 1 })
        .to_captured_config()
        .unwrap();
    let listing = [
        Invoke(clock, 0),
        Invoke(clock, 0),
        Invoke(clock, 0),
        Invoke(clock, 0),
        Invoke(clock, 0),
        Halt,
    ];
    let config = VmConfig::default()
        .with_trace_capabilities(true)
        .with_trace_limit(2);
    let mut vm = Vm::new(program(&listing), CapabilityRegistry::from_config(caps), config).unwrap();
    let result = vm.run();
    let results: Vec<_> = result.trace.iter().map(|r| r.result.clone()).collect();
    assert_eq!(results, vec![Ok(Value::Int(3)), Ok(Value::Int(4))]);
    assert_eq!(vm.trace().dropped(), 3);
}

#[test]
fn host_actions_cannot_return_handles() {
    use Instruction::*;
    let mut caps = CapabilityConfig::new();
    caps.register_granted(
        CapabilityId(1),
        FnAction::new(
            Signature::new("test.echo")
                .param(ParamKind::Any)
                .returns(ParamKind::Any),
            |args| Ok(args[0]),
        ),
    )
    .unwrap();
    let mut vm = Vm::new(
        program(&[Cap(CapabilityId(1)), Cap(CapabilityId(1)), InvokeHandle(1)]),
        CapabilityRegistry::from_config(caps),
        VmConfig::default(),
    )
    .unwrap();
    let result = vm.run();
    assert_eq!(result.termination.exit_code(), 2);
    assert_eq!(vm.stack().len(), 2);
}

#[test]
fn host_actions_cannot_return_references() {
    use Instruction::*;
    let mut caps = CapabilityConfig::new();
    caps.register_granted(
        CapabilityId(1),
        FnAction::new(
            Signature::new("test.echo")
                .param(ParamKind::Any)
                .returns(ParamKind::Any),
            |args| Ok(args[0]),
        ),
    )
    .unwrap();
    let mut vm = Vm::new(
        program(&[Alloc(1), Invoke(CapabilityId(1), 1), Halt]),
        CapabilityRegistry::from_config(caps),
        VmConfig::default(),
    )
    .unwrap();
    let result = vm.run();
    let fault = result.termination.fault().unwrap();
    assert!(matches!(fault.kind, ErrorKind::CapabilityError { .. }));
    assert_eq!(fault.instruction, 1);
    assert_eq!(vm.stack().len(), 1);
}
