//! Resource limits and tracing options for a VM run.

use capstan_foundation::{Error, Result};

/// Configuration for one [`Vm`](crate::Vm).
///
/// Limits are fixed when the VM is created; the program cannot change them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VmConfig {
    /// Maximum operand stack depth. Must be at least 1.
    pub max_stack_depth: usize,

    /// Total memory cells across all regions.
    pub memory_cells: usize,

    /// Maximum nesting of CALL frames.
    pub max_call_depth: usize,

    /// Record every capability invocation in the run's trace.
    pub trace_capabilities: bool,

    /// Invocation records retained; older records are discarded.
    pub trace_limit: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 1024,
            memory_cells: 65536,
            max_call_depth: 256,
            trace_capabilities: false,
            trace_limit: 1024,
        }
    }
}

impl VmConfig {
    /// Tight limits for small embedded scripts and tests.
    #[must_use]
    pub fn small() -> Self {
        Self {
            max_stack_depth: 64,
            memory_cells: 1024,
            max_call_depth: 16,
            ..Self::default()
        }
    }

    /// Default limits with capability tracing on.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            trace_capabilities: true,
            trace_limit: 4096,
            ..Self::default()
        }
    }

    /// Builder method to set the stack depth limit.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Builder method to set the memory size.
    #[must_use]
    pub fn with_memory_cells(mut self, cells: usize) -> Self {
        self.memory_cells = cells;
        self
    }

    /// Builder method to set the call depth limit.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Builder method to enable/disable capability tracing.
    #[must_use]
    pub fn with_trace_capabilities(mut self, trace: bool) -> Self {
        self.trace_capabilities = trace;
        self
    }

    /// Builder method to set how many invocation records are kept.
    #[must_use]
    pub fn with_trace_limit(mut self, limit: usize) -> Self {
        self.trace_limit = limit;
        self
    }

    /// Checks the configuration is usable.
    ///
    /// # Errors
    /// Returns a configuration error for a zero stack depth.
    pub fn validate(&self) -> Result<()> {
        if self.max_stack_depth == 0 {
            return Err(Error::config("max_stack_depth must be at least 1"));
        }
        Ok(())
    }
}
