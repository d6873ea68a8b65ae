//! Integration tests for CapabilityRegistry

use std::cell::RefCell;
use std::rc::Rc;

use capstan_capability::{CapabilityConfig, CapabilityRegistry, FnAction};
use capstan_foundation::{CapabilityId, ErrorKind, ParamKind, Signature, Value, ValueKind};

const LOG: CapabilityId = CapabilityId(10);
const SECRET: CapabilityId = CapabilityId(11);

fn registry() -> (CapabilityRegistry, Rc<RefCell<Vec<Value>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let mut config = CapabilityConfig::new();
    config
        .register_granted(
            LOG,
            FnAction::new(Signature::new("test.log").param(ParamKind::Any), move |args| {
                sink.borrow_mut().push(args[0]);
                Ok(Value::Unit)
            }),
        )
        .unwrap();
    config
        .register(
            SECRET,
            FnAction::new(Signature::new("test.secret").returns(ValueKind::Int), |_| {
                Ok(Value::Int(1234))
            }),
        )
        .unwrap();
    (CapabilityRegistry::from_config(config), log)
}

#[test]
fn catalog_and_grants() {
    let (registry, _) = registry();
    assert_eq!(registry.catalog().len(), 2);
    assert_eq!(registry.granted().collect::<Vec<_>>(), vec![LOG]);
    assert_eq!(registry.signature(LOG).unwrap().name, "test.log");
    assert!(registry.signature(SECRET).unwrap_err().is_denial());
}

#[test]
fn invoke_id_reaches_the_host() {
    let (mut registry, log) = registry();
    registry.invoke_id(LOG, &[Value::Int(3)]).unwrap();
    registry.invoke_id(LOG, &[Value::Bool(false)]).unwrap();
    assert_eq!(*log.borrow(), vec![Value::Int(3), Value::Bool(false)]);
}

#[test]
fn ungranted_never_reaches_the_host() {
    let (mut registry, _) = registry();
    let err = registry.invoke_id(SECRET, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapabilityDenied(SECRET));
}

#[test]
fn handles_are_registry_specific() {
    let (first, _) = registry();
    let (mut second, log) = registry();
    assert_ne!(first.token(), second.token());

    let handle = first.issue(LOG).unwrap();
    let err = second.invoke(handle, &[Value::Unit]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnresolvedCapability(LOG));
    assert!(log.borrow().is_empty());

    let own = second.issue(LOG).unwrap();
    assert!(second.resolve(own).is_ok());
    second.invoke(own, &[Value::Unit]).unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn arity_checked_before_the_host_runs() {
    let (mut registry, log) = registry();
    let err = registry.invoke_id(LOG, &[Value::Unit, Value::Unit]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CapabilityError { id: LOG, .. }));
    assert!(log.borrow().is_empty());
}

#[test]
fn wrong_result_kind_is_a_capability_error() {
    let mut config = CapabilityConfig::new();
    config
        .register_granted(
            CapabilityId(1),
            FnAction::new(Signature::new("test.liar").returns(ValueKind::Int), |_| {
                Ok(Value::Bool(true))
            }),
        )
        .unwrap();
    let mut registry = CapabilityRegistry::from_config(config);
    let err = registry.invoke_id(CapabilityId(1), &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CapabilityError { .. }));
}
