//! Declarative capability selections.
//!
//! A [`Manifest`] names which standard actions a host registers under which
//! ids, which of them it grants, and the seed for every random source. With
//! the `serde` feature it can be stored alongside a program.

use capstan_foundation::{CapabilityId, Int, Result};

use crate::action::HostAction;
use crate::config::CapabilityConfig;
use crate::standard::{
    ConsoleBuffer, ConsoleWriteLine, MonotonicClock, SeededRandom, SeededRange, SteppedClock,
};

/// A standard action a manifest can select.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "snake_case"))]
pub enum StandardAction {
    /// [`ConsoleWriteLine`].
    ConsoleWriteLine,
    /// [`MonotonicClock`].
    MonotonicClock,
    /// [`SteppedClock`] starting at `start` and advancing by `step`.
    SteppedClock {
        /// First reading.
        start: Int,
        /// Increment per reading.
        step: Int,
    },
    /// [`SeededRandom`].
    SeededRandom,
    /// [`SeededRange`].
    SeededRange,
}

/// One capability selection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifestEntry {
    /// Id the action is registered under.
    pub id: CapabilityId,
    /// The action.
    pub action: StandardAction,
    /// Whether the run may use it.
    pub granted: bool,
}

/// A set of capability selections plus the random seed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Manifest {
    /// Base seed; each random source is seeded with `seed + id`.
    pub seed: u64,
    /// Selections in registration order.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            entries: Vec::new(),
        }
    }

    /// Adds a granted selection.
    #[must_use]
    pub fn grant(mut self, id: CapabilityId, action: StandardAction) -> Self {
        self.entries.push(ManifestEntry {
            id,
            action,
            granted: true,
        });
        self
    }

    /// Adds a registered but ungranted selection.
    #[must_use]
    pub fn register(mut self, id: CapabilityId, action: StandardAction) -> Self {
        self.entries.push(ManifestEntry {
            id,
            action,
            granted: false,
        });
        self
    }

    /// Builds a configuration whose console writes to stdout.
    ///
    /// # Errors
    /// Returns a configuration error if an id is selected twice.
    pub fn to_config(&self) -> Result<CapabilityConfig> {
        self.build(ConsoleWriteLine::stdout)
    }

    /// Builds a configuration whose consoles all append to one buffer.
    ///
    /// # Errors
    /// Returns a configuration error if an id is selected twice.
    pub fn to_captured_config(&self) -> Result<(CapabilityConfig, ConsoleBuffer)> {
        let buffer = ConsoleBuffer::new();
        let config = self.build(|| ConsoleWriteLine::captured(buffer.clone()))?;
        Ok((config, buffer))
    }

    fn build(&self, mut console: impl FnMut() -> ConsoleWriteLine) -> Result<CapabilityConfig> {
        let mut config = CapabilityConfig::new();
        for entry in &self.entries {
            let seed = self.seed.wrapping_add(u64::from(entry.id.0));
            let action: Box<dyn HostAction> = match entry.action {
                StandardAction::ConsoleWriteLine => Box::new(console()),
                StandardAction::MonotonicClock => Box::new(MonotonicClock::new()),
                StandardAction::SteppedClock { start, step } => {
                    Box::new(SteppedClock::new(start, step))
                }
                StandardAction::SeededRandom => Box::new(SeededRandom::new(seed)),
                StandardAction::SeededRange => Box::new(SeededRange::new(seed)),
            };
            config.register_boxed(entry.id, action)?;
            if entry.granted {
                config.grant(entry.id)?;
            }
        }
        Ok(config)
    }
}
