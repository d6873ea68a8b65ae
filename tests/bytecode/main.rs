//! Integration tests for Layer 1: Bytecode
//!
//! Tests for the container format, the assembler, and the validating loader.

mod assembler;
mod validation;
