//! Capability invocation trace.
//!
//! When [`VmConfig::trace_capabilities`](crate::VmConfig::trace_capabilities)
//! is on, every INVOKE and INVOKE_HANDLE that reaches the registry leaves an
//! [`InvocationRecord`]. Denied invocations never reach the registry and are
//! reported through the run's termination instead.

use std::collections::VecDeque;
use std::fmt;

use capstan_foundation::{CapabilityId, ErrorKind, Value};

/// One capability invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRecord {
    /// Steps completed before this invocation.
    pub step: u64,
    /// Index of the invoking instruction.
    pub instruction: usize,
    /// The capability invoked.
    pub id: CapabilityId,
    /// Arguments, in push order.
    pub args: Vec<Value>,
    /// What the registry returned.
    pub result: Result<Value, ErrorKind>,
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] #{} {}(", self.step, self.instruction, self.id)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        match &self.result {
            Ok(value) => write!(f, ") -> {value}"),
            Err(kind) => write!(f, ") !! {kind}"),
        }
    }
}

/// Ring buffer of the most recent invocation records.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    /// The records, oldest first.
    records: VecDeque<InvocationRecord>,
    max_size: usize,
    /// Records evicted to stay within `max_size`.
    dropped: u64,
}

impl TraceBuffer {
    /// Creates a buffer keeping at most `max_size` records.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
            dropped: 0,
        }
    }

    /// Appends a record, evicting the oldest if full.
    pub fn push(&mut self, record: InvocationRecord) {
        if self.max_size == 0 {
            self.dropped += 1;
            return;
        }
        while self.records.len() >= self.max_size {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    /// Returns the number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records evicted so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterates over the retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &InvocationRecord> {
        self.records.iter()
    }

    /// Returns the most recent `count` records.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&InvocationRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).collect()
    }

    /// Returns the records for one capability.
    #[must_use]
    pub fn for_capability(&self, id: CapabilityId) -> Vec<&InvocationRecord> {
        self.records.iter().filter(|r| r.id == id).collect()
    }

    /// Copies the retained records out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<InvocationRecord> {
        self.records.iter().cloned().collect()
    }
}
