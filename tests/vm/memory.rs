//! Integration tests for the memory arena and operand stack

use capstan_foundation::{ErrorKind, Value};
use capstan_vm::{Memory, Stack};

#[test]
fn stack_overflows_at_exactly_the_bound() {
    let mut stack = Stack::new(3);
    for n in 0..3 {
        stack.push(Value::Int(n)).unwrap();
    }
    let err = stack.push(Value::Int(3)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow { limit: 3 });
    assert_eq!(stack.len(), 3);
}

#[test]
fn stack_failures_change_nothing() {
    let mut stack = Stack::new(2);
    stack.push(Value::Int(1)).unwrap();
    assert!(stack.swap().is_err());
    assert!(stack.pick(1).is_err());
    assert!(stack.drop_top(2).is_err());
    assert_eq!(stack.snapshot(), vec![Value::Int(1)]);
    stack.dup().unwrap();
    assert!(stack.dup().is_err());
    assert_eq!(stack.as_slice(), &[Value::Int(1), Value::Int(1)]);
}

#[test]
fn stack_peek_counts_from_top() {
    let mut stack = Stack::new(4);
    for n in 1..=3 {
        stack.push(Value::Int(n)).unwrap();
    }
    assert_eq!(stack.peek(0).unwrap(), Value::Int(3));
    assert_eq!(stack.peek(2).unwrap(), Value::Int(1));
    assert_eq!(stack.top(2).unwrap(), &[Value::Int(2), Value::Int(3)]);
}

#[test]
fn nested_frames_release_in_order() {
    let mut memory = Memory::new(32);
    let base = memory.alloc(1).unwrap();
    memory.enter_frame();
    let outer = memory.alloc(2).unwrap();
    memory.enter_frame();
    let inner = memory.alloc(3).unwrap();
    assert_eq!(memory.frame_depth(), 2);
    assert_eq!(memory.used(), 6);

    memory.leave_frame().unwrap();
    assert!(memory.read(inner, 0).is_err());
    assert!(memory.read(outer, 1).is_ok());

    memory.leave_frame().unwrap();
    assert!(memory.read(outer, 0).is_err());
    assert!(memory.read(base, 0).is_ok());
    assert_eq!(memory.used(), 1);
}

#[test]
fn released_cells_are_reusable() {
    let mut memory = Memory::new(4);
    memory.enter_frame();
    memory.alloc(4).unwrap();
    assert!(memory.alloc(1).is_err());
    memory.leave_frame().unwrap();
    let r = memory.alloc(4).unwrap();
    memory.write(r, 3, Value::Bool(true)).unwrap();
    assert_eq!(memory.read(r, 3).unwrap(), Value::Bool(true));
    assert_eq!(memory.read(r, 0).unwrap(), Value::Unit);
}

#[test]
fn zero_length_regions() {
    let mut memory = Memory::new(0);
    let r = memory.alloc(0).unwrap();
    assert_eq!(memory.region_len(r).unwrap(), 0);
    assert_eq!(
        memory.read(r, 0).unwrap_err().kind,
        ErrorKind::OutOfBounds { offset: 0, length: 0 }
    );
}
