//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use capstan_foundation::{CapabilityId, Error, ErrorContext, ErrorKind, Reference, ValueKind};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_stack_limits() {
    let err = Error::stack_overflow(1024);
    assert_eq!(err.kind, ErrorKind::StackOverflow { limit: 1024 });
    assert!(err.to_string().contains("1024"));

    let err = Error::stack_underflow(2, 1);
    assert_eq!(err.to_string(), "stack underflow: needed 2, depth 1");
}

#[test]
fn error_type_mismatch() {
    let err = Error::type_mismatch(ValueKind::Bool, ValueKind::Int);
    assert_eq!(err.to_string(), "type mismatch: expected bool, got int");
}

#[test]
fn error_capability_kinds() {
    let denied = Error::capability_denied(CapabilityId(7));
    assert!(denied.is_denial());
    let failed = Error::capability_error(CapabilityId(7), "boom");
    assert!(!failed.is_denial());
    assert_eq!(failed.to_string(), "capability error on cap:7: boom");
    let host = Error::host_failure("disk full");
    assert_eq!(host.kind, ErrorKind::HostFailure("disk full".into()));
}

#[test]
fn error_dangling_reference() {
    let err = Error::new(ErrorKind::DanglingReference(Reference::new(3, 1)));
    assert!(err.to_string().contains("Reference(3v1)"));
}

#[test]
fn error_config() {
    assert_eq!(
        Error::config("bad").to_string(),
        "invalid configuration: bad"
    );
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_defaults_empty() {
    let ctx = ErrorContext::new();
    assert!(ctx.instruction.is_none());
    assert!(ctx.frames.is_empty());
    assert_eq!(ctx.to_string(), "");
}

#[test]
fn context_with_site_and_frames() {
    let err = Error::new(ErrorKind::DivisionByZero).with_context(
        ErrorContext::new()
            .at(12, 0x40, "DIV")
            .with_frame(3)
            .with_frame(8),
    );
    let ctx = err.context.unwrap();
    let text = ctx.to_string();
    assert!(text.starts_with("at instruction 12 (DIV @ 0x0040)"));
    assert!(text.contains("called from instruction 7"));
    assert!(text.ends_with("called from instruction 2"));
}
