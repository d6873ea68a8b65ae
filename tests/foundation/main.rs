//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, capability identity, and Error.

mod errors;
