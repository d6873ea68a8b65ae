//! Integration tests for CapabilityConfig

use capstan_capability::{CapabilityConfig, FnAction};
use capstan_foundation::{CapabilityId, ErrorKind, Result, Signature, Value};

fn unit_action(name: &'static str) -> FnAction<impl FnMut(&[Value]) -> Result<Value>> {
    FnAction::new(Signature::new(name), |_| Ok(Value::Unit))
}

#[test]
fn register_then_grant() {
    let mut config = CapabilityConfig::new();
    config.register(CapabilityId(1), unit_action("a")).unwrap();
    assert!(config.is_registered(CapabilityId(1)));
    assert!(!config.is_granted(CapabilityId(1)));
    config.grant(CapabilityId(1)).unwrap();
    assert!(config.is_granted(CapabilityId(1)));
}

#[test]
fn duplicate_registration_rejected() {
    let mut config = CapabilityConfig::new();
    config.register(CapabilityId(1), unit_action("a")).unwrap();
    let err = config.register(CapabilityId(1), unit_action("b")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Config(_)));
}

#[test]
fn granting_unregistered_rejected() {
    let mut config = CapabilityConfig::new();
    let err = config.grant(CapabilityId(3)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Config(_)));
    assert!(!config.is_granted(CapabilityId(3)));
}

#[test]
fn builder_chains() {
    let mut config = CapabilityConfig::new();
    config
        .register_granted(CapabilityId(1), unit_action("a"))
        .unwrap()
        .register(CapabilityId(2), unit_action("b"))
        .unwrap();
    assert!(config.is_granted(CapabilityId(1)));
    assert!(config.is_registered(CapabilityId(2)));
}
