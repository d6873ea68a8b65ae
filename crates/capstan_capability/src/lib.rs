//! Capability registry, host actions, and grant manifests for Capstan.
//!
//! Every effect a program has on the outside world goes through a
//! [`CapabilityRegistry`]. The host describes what exists and what is
//! granted in a [`CapabilityConfig`] (or a [`Manifest`] of standard
//! actions); the registry is built from it once and never changes.
//!
//! This crate provides:
//! - [`HostAction`] / [`FnAction`] - Host operations behind capability ids
//! - [`CapabilityConfig`] - Registration and grants, checked as they are made
//! - [`CapabilityRegistry`] - Issues, resolves, and invokes handles
//! - [`standard`] - Console, clocks, and seeded randomness
//! - [`Manifest`] - Declarative, optionally serializable selections

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod config;
pub mod manifest;
pub mod registry;
pub mod standard;

pub use action::{FnAction, HostAction};
pub use config::CapabilityConfig;
pub use manifest::{Manifest, ManifestEntry, StandardAction};
pub use registry::CapabilityRegistry;
pub use standard::ConsoleBuffer;
