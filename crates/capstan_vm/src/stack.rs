//! The bounded operand stack.

use capstan_foundation::{Error, Result, Value};

/// LIFO of values with a fixed maximum depth.
///
/// Every method either fully succeeds or leaves the stack untouched.
/// Depths count from the top: depth 0 is the most recently pushed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stack {
    values: Vec<Value>,
    limit: usize,
}

impl Stack {
    /// Creates an empty stack holding at most `limit` values.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    /// Returns the maximum depth.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the values bottom to top.
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Fails unless `n` more values fit.
    ///
    /// # Errors
    /// Returns `StackOverflow`.
    pub fn ensure_room(&self, n: usize) -> Result<()> {
        if self.limit - self.values.len() < n {
            return Err(Error::stack_overflow(self.limit));
        }
        Ok(())
    }

    /// Fails unless at least `n` values are present.
    ///
    /// # Errors
    /// Returns `StackUnderflow`.
    pub fn ensure_depth(&self, n: usize) -> Result<()> {
        if self.values.len() < n {
            return Err(Error::stack_underflow(n, self.values.len()));
        }
        Ok(())
    }

    /// Pushes a value.
    ///
    /// # Errors
    /// Returns `StackOverflow` if the stack is full.
    pub fn push(&mut self, value: Value) -> Result<()> {
        self.ensure_room(1)?;
        self.values.push(value);
        Ok(())
    }

    /// Pops the top value.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn pop(&mut self) -> Result<Value> {
        self.values
            .pop()
            .ok_or_else(|| Error::stack_underflow(1, 0))
    }

    /// Returns the value at `depth` without removing it.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if fewer than `depth + 1` values are present.
    pub fn peek(&self, depth: usize) -> Result<Value> {
        self.ensure_depth(depth + 1)?;
        Ok(self.values[self.values.len() - 1 - depth])
    }

    /// Returns the top `n` values, bottom to top.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if fewer than `n` values are present.
    pub fn top(&self, n: usize) -> Result<&[Value]> {
        self.ensure_depth(n)?;
        Ok(&self.values[self.values.len() - n..])
    }

    /// Removes the top `n` values.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if fewer than `n` values are present.
    pub fn drop_top(&mut self, n: usize) -> Result<()> {
        self.ensure_depth(n)?;
        self.values.truncate(self.values.len() - n);
        Ok(())
    }

    /// Replaces the top `n` values with `value`.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if fewer than `n` values are present, or
    /// `StackOverflow` if `n` is zero and the stack is full.
    pub fn replace_top(&mut self, n: usize, value: Value) -> Result<()> {
        self.ensure_depth(n)?;
        if n == 0 {
            self.ensure_room(1)?;
        }
        self.values.truncate(self.values.len() - n);
        self.values.push(value);
        Ok(())
    }

    /// Duplicates the top value.
    ///
    /// # Errors
    /// Returns `StackUnderflow` or `StackOverflow`.
    pub fn dup(&mut self) -> Result<()> {
        self.pick(0)
    }

    /// Swaps the top two values.
    ///
    /// # Errors
    /// Returns `StackUnderflow` if fewer than two values are present.
    pub fn swap(&mut self) -> Result<()> {
        self.ensure_depth(2)?;
        let len = self.values.len();
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    /// Copies the value at `depth` onto the top.
    ///
    /// # Errors
    /// Returns `StackUnderflow` or `StackOverflow`.
    pub fn pick(&mut self, depth: usize) -> Result<()> {
        let value = self.peek(depth)?;
        self.push(value)
    }

    /// Returns a copy of the values, bottom to top.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.values.clone()
    }
}
