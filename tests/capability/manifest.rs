//! Integration tests for Manifest and the standard actions

use capstan_capability::standard::{SeededRandom, SteppedClock};
use capstan_capability::{CapabilityRegistry, HostAction, Manifest, StandardAction};
use capstan_foundation::{CapabilityId, Value};

const CONSOLE: CapabilityId = CapabilityId(1);
const CLOCK: CapabilityId = CapabilityId(2);
const RANDOM: CapabilityId = CapabilityId(3);
const RANGE: CapabilityId = CapabilityId(4);

fn manifest(seed: u64) -> Manifest {
    Manifest::new(seed)
        .grant(CONSOLE, StandardAction::ConsoleWriteLine)
        .grant(CLOCK, StandardAction::SteppedClock { start: 10, step: 10 })
        .grant(RANDOM, StandardAction::SeededRandom)
        .register(RANGE, StandardAction::SeededRange)
}

#[test]
fn manifest_builds_registry() {
    let (config, _) = manifest(1).to_captured_config().unwrap();
    let registry = CapabilityRegistry::from_config(config);
    assert_eq!(registry.catalog().len(), 4);
    assert!(registry.is_granted(CLOCK));
    assert!(!registry.is_granted(RANGE));
    assert_eq!(registry.signature(RANDOM).unwrap().name, "random.next");
}

#[test]
fn captured_console() {
    let (config, console) = manifest(1).to_captured_config().unwrap();
    let mut registry = CapabilityRegistry::from_config(config);
    registry.invoke_id(CONSOLE, &[Value::Int(7)]).unwrap();
    registry.invoke_id(CONSOLE, &[Value::Unit]).unwrap();
    assert_eq!(console.lines(), vec!["7", "()"]);
}

#[test]
fn stepped_clock_via_manifest() {
    let (config, _) = manifest(1).to_captured_config().unwrap();
    let mut registry = CapabilityRegistry::from_config(config);
    let readings: Vec<Value> = (0..3)
        .map(|_| registry.invoke_id(CLOCK, &[]).unwrap())
        .collect();
    assert_eq!(readings, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    assert_eq!(SteppedClock::new(10, 10).invoke(&[]).unwrap(), Value::Int(10));
}

#[test]
fn random_sources_are_seeded_per_id() {
    let draw = |seed| {
        let (config, _) = manifest(seed).to_captured_config().unwrap();
        let mut registry = CapabilityRegistry::from_config(config);
        (0..8)
            .map(|_| registry.invoke_id(RANDOM, &[]).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(draw(5), draw(5));
    assert_ne!(draw(5), draw(6));

    let mut direct = SeededRandom::new(5 + u64::from(RANDOM.0));
    assert_eq!(direct.invoke(&[]).unwrap(), draw(5)[0]);
}

#[test]
fn duplicate_ids_rejected() {
    let manifest = Manifest::new(0)
        .grant(CONSOLE, StandardAction::ConsoleWriteLine)
        .grant(CONSOLE, StandardAction::MonotonicClock);
    assert!(manifest.to_config().is_err());
}
