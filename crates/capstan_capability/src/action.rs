//! The host action trait.

use std::fmt;

use capstan_foundation::{Result, Signature, Value};

/// One host-effecting operation behind a capability id.
///
/// The registry checks arguments against [`signature`](Self::signature)
/// before calling [`invoke`](Self::invoke), and checks the result after, so
/// implementations may assume well-kinded arguments.
pub trait HostAction {
    /// Declared call shape.
    fn signature(&self) -> &Signature;

    /// Performs the effect.
    ///
    /// # Errors
    /// Any error is reported to the program as a capability error.
    fn invoke(&mut self, args: &[Value]) -> Result<Value>;
}

impl fmt::Debug for dyn HostAction + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostAction({})", self.signature())
    }
}

/// A host action backed by a closure.
///
/// ```
/// use capstan_capability::{FnAction, HostAction};
/// use capstan_foundation::{Signature, Value, ValueKind};
///
/// let mut double = FnAction::new(
///     Signature::new("math.double").param(ValueKind::Int).returns(ValueKind::Int),
///     |args| Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2)),
/// );
/// assert_eq!(double.invoke(&[Value::Int(4)]).unwrap(), Value::Int(8));
/// ```
pub struct FnAction<F> {
    signature: Signature,
    f: F,
}

impl<F> FnAction<F>
where
    F: FnMut(&[Value]) -> Result<Value>,
{
    /// Wraps `f` with the given signature.
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> HostAction for FnAction<F>
where
    F: FnMut(&[Value]) -> Result<Value>,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&mut self, args: &[Value]) -> Result<Value> {
        (self.f)(args)
    }
}
