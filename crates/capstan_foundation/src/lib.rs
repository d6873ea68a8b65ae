//! Core values, capability identity types, and errors for Capstan.
//!
//! This crate provides:
//! - [`Value`] - The tagged runtime value manipulated by the VM
//! - [`Reference`] - Generational index into VM memory
//! - [`CapabilityId`], [`CapabilityHandle`], [`Signature`] - Capability identity
//! - [`CapabilityCatalog`] - The set of capability ids a registry honors
//! - [`Error`] - Runtime error type with instruction-site context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod capability;
pub mod error;
pub mod types;
pub mod value;

pub use capability::{
    CapabilityCatalog, CapabilityHandle, CapabilityId, ParamKind, RegistryToken, Signature,
};
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use types::ValueKind;
pub use value::{Int, Reference, Value};

/// Bit width of [`Value::Int`] for bytecode format major version 1.
pub const INT_BITS: u32 = Int::BITS;
