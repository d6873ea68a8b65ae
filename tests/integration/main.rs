//! Integration tests for the whole pipeline
//!
//! Bytes in, termination out, through [`capstan::run_bytecode`].

mod properties;
