//! Standard host actions: console output, clocks, and seeded randomness.
//!
//! Every action here is deterministic given its construction parameters
//! except [`MonotonicClock`] and stdout-backed [`ConsoleWriteLine`], which
//! observe the real world. Replays should use [`SteppedClock`] and a
//! captured console.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use capstan_foundation::{Error, Int, ParamKind, Result, Signature, Value, ValueKind};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::action::HostAction;

// =============================================================================
// Console
// =============================================================================

/// Lines written by a captured [`ConsoleWriteLine`].
///
/// Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct ConsoleBuffer(Rc<RefCell<Vec<String>>>);

impl ConsoleBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Removes and returns every line written so far.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    fn push(&self, line: String) {
        self.0.borrow_mut().push(line);
    }
}

enum Sink {
    Writer(Box<dyn Write>),
    Captured(ConsoleBuffer),
}

/// `console.write_line(any) -> unit`: writes a value's display form and a
/// newline.
pub struct ConsoleWriteLine {
    signature: Signature,
    sink: Sink,
}

impl ConsoleWriteLine {
    fn with_sink(sink: Sink) -> Self {
        Self {
            signature: Signature::new("console.write_line").param(ParamKind::Any),
            sink,
        }
    }

    /// Writes to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    /// Writes to an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: impl Write + 'static) -> Self {
        Self::with_sink(Sink::Writer(Box::new(writer)))
    }

    /// Appends to `buffer` instead of writing anywhere.
    #[must_use]
    pub fn captured(buffer: ConsoleBuffer) -> Self {
        Self::with_sink(Sink::Captured(buffer))
    }
}

impl HostAction for ConsoleWriteLine {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, args: &[Value]) -> Result<Value> {
        let line = args.first().map(ToString::to_string).unwrap_or_default();
        match &mut self.sink {
            Sink::Writer(writer) => writeln!(writer, "{line}")
                .and_then(|()| writer.flush())
                .map_err(|e| Error::host_failure(format!("console write failed: {e}")))?,
            Sink::Captured(buffer) => buffer.push(line),
        }
        Ok(Value::Unit)
    }
}

// =============================================================================
// Clocks
// =============================================================================

/// `clock.now() -> int`: nanoseconds since the clock was created.
pub struct MonotonicClock {
    signature: Signature,
    origin: Instant,
}

impl MonotonicClock {
    /// Starts a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature: Signature::new("clock.now").returns(ValueKind::Int),
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAction for MonotonicClock {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, _args: &[Value]) -> Result<Value> {
        let nanos = self.origin.elapsed().as_nanos();
        Ok(Value::Int(Int::try_from(nanos).unwrap_or(Int::MAX)))
    }
}

/// `clock.now() -> int`: returns `start`, then advances by `step` per call.
///
/// Saturates instead of wrapping.
pub struct SteppedClock {
    signature: Signature,
    now: Int,
    step: Int,
}

impl SteppedClock {
    /// Creates a clock reading `start` on its first call.
    #[must_use]
    pub fn new(start: Int, step: Int) -> Self {
        Self {
            signature: Signature::new("clock.now").returns(ValueKind::Int),
            now: start,
            step,
        }
    }
}

impl HostAction for SteppedClock {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, _args: &[Value]) -> Result<Value> {
        let now = self.now;
        self.now = self.now.saturating_add(self.step);
        Ok(Value::Int(now))
    }
}

// =============================================================================
// Randomness
// =============================================================================

/// `random.next() -> int`: a uniformly distributed `u32` widened to int.
pub struct SeededRandom {
    signature: Signature,
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Creates a generator from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            signature: Signature::new("random.next").returns(ValueKind::Int),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl HostAction for SeededRandom {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, _args: &[Value]) -> Result<Value> {
        Ok(Value::Int(Int::from(self.rng.next_u32())))
    }
}

/// `random.range(int, int) -> int`: uniform in `[lo, hi)`.
pub struct SeededRange {
    signature: Signature,
    rng: ChaCha8Rng,
}

impl SeededRange {
    /// Creates a generator from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            signature: Signature::new("random.range")
                .param(ValueKind::Int)
                .param(ValueKind::Int)
                .returns(ValueKind::Int),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl HostAction for SeededRange {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, args: &[Value]) -> Result<Value> {
        let (Some(lo), Some(hi)) = (
            args.first().and_then(Value::as_int),
            args.get(1).and_then(Value::as_int),
        ) else {
            return Err(Error::host_failure("random.range expects two ints"));
        };
        if lo >= hi {
            return Err(Error::host_failure(format!("random.range: empty range [{lo}, {hi})")));
        }
        Ok(Value::Int(self.rng.gen_range(lo..hi)))
    }
}
