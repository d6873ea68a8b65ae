//! The bounded cell arena.
//!
//! Regions are carved from the arena bump-style and released only in bulk,
//! when the call frame that allocated them returns. A [`Reference`] names a
//! region slot plus the generation the slot had when allocated, so a
//! reference outliving its frame is detected instead of aliasing whatever
//! reuses the slot.

use capstan_foundation::{Error, ErrorKind, Int, Reference, Result, Value};
use im::Vector;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Slot {
    start: usize,
    len: usize,
    generation: u32,
}

/// Bounded linear arena of value cells.
#[derive(Clone, Debug)]
pub struct Memory {
    cells: Vector<Value>,
    capacity: usize,
    /// Every slot ever used; `slots[..live]` are the live regions, in
    /// allocation order.
    slots: Vec<Slot>,
    live: usize,
    /// `live` at each unreturned `enter_frame`.
    frames: Vec<usize>,
}

impl Memory {
    /// Creates an arena of `capacity` cells.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vector::new(),
            capacity,
            slots: Vec::new(),
            live: 0,
            frames: Vec::new(),
        }
    }

    /// Total cells.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cells held by live regions.
    #[must_use]
    pub fn used(&self) -> usize {
        self.cells.len()
    }

    /// Number of live regions.
    #[must_use]
    pub fn live_regions(&self) -> usize {
        self.live
    }

    /// Number of open frames.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Allocates a region of `len` cells, each initialized to unit.
    ///
    /// # Errors
    /// Returns `OutOfMemory` if fewer than `len` cells are free.
    pub fn alloc(&mut self, len: usize) -> Result<Reference> {
        let available = self.capacity - self.cells.len();
        let out_of_memory = || {
            Error::new(ErrorKind::OutOfMemory {
                requested: len,
                available,
            })
        };
        if len > available {
            return Err(out_of_memory());
        }
        let index = u32::try_from(self.live).map_err(|_| out_of_memory())?;

        let start = self.cells.len();
        let generation = match self.slots.get(self.live) {
            Some(previous) => previous.generation.wrapping_add(1),
            None => 0,
        };
        let slot = Slot {
            start,
            len,
            generation,
        };
        if self.live < self.slots.len() {
            self.slots[self.live] = slot;
        } else {
            self.slots.push(slot);
        }
        self.live += 1;
        self.cells.extend(std::iter::repeat_n(Value::Unit, len));

        Ok(Reference::new(index, generation))
    }

    fn slot(&self, reference: Reference) -> Result<Slot> {
        let index = reference.slot() as usize;
        match self.slots.get(index) {
            Some(slot) if index < self.live && slot.generation == reference.generation() => {
                Ok(*slot)
            }
            _ => Err(Error::new(ErrorKind::DanglingReference(reference))),
        }
    }

    fn cell(&self, reference: Reference, offset: Int) -> Result<usize> {
        let slot = self.slot(reference)?;
        match usize::try_from(offset) {
            Ok(i) if i < slot.len => Ok(slot.start + i),
            _ => Err(Error::out_of_bounds(offset, slot.len)),
        }
    }

    /// Returns the length of the region behind `reference`.
    ///
    /// # Errors
    /// Returns `DanglingReference` if the region was released.
    pub fn region_len(&self, reference: Reference) -> Result<usize> {
        self.slot(reference).map(|slot| slot.len)
    }

    /// Reads one cell.
    ///
    /// # Errors
    /// Returns `DanglingReference` or `OutOfBounds`.
    pub fn read(&self, reference: Reference, offset: Int) -> Result<Value> {
        let cell = self.cell(reference, offset)?;
        Ok(self.cells[cell])
    }

    /// Writes one cell. No other cell changes, even on failure.
    ///
    /// # Errors
    /// Returns `DanglingReference` or `OutOfBounds`.
    pub fn write(&mut self, reference: Reference, offset: Int, value: Value) -> Result<()> {
        let cell = self.cell(reference, offset)?;
        self.cells[cell] = value;
        Ok(())
    }

    /// Opens a frame; regions allocated until the matching
    /// [`leave_frame`](Self::leave_frame) belong to it.
    pub fn enter_frame(&mut self) {
        self.frames.push(self.live);
    }

    /// Closes the innermost frame and releases every region it allocated.
    ///
    /// # Errors
    /// Returns an internal error if no frame is open.
    pub fn leave_frame(&mut self) -> Result<()> {
        let mark = self
            .frames
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::Internal("no memory frame to leave".into())))?;
        if mark < self.live {
            let start = self.slots[mark].start;
            self.cells.truncate(start);
            self.live = mark;
        }
        Ok(())
    }

    /// Returns a structurally shared copy of the live cells.
    #[must_use]
    pub fn snapshot(&self) -> Vector<Value> {
        self.cells.clone()
    }
}
