use crate::{error::Fault, runner::Operation};
use std::fmt::{self, Debug, Formatter};

/// A resumable computation driven by the [`crate::runner::TaskRunner`].
///
/// Each call to [`Routine::resume()`] does a bit of work and then tells the
/// runner what it is waiting for.
pub trait Routine {
    /// Do the next unit of work.
    fn resume(&mut self) -> Result<Yield, Fault>;
}

impl<F> Routine for F
where
    F: FnMut() -> Result<Yield, Fault>,
{
    fn resume(&mut self) -> Result<Yield, Fault> { self() }
}

/// Create a [`Routine`] from a closure.
///
/// This is equivalent to using the closure directly, except the closure's
/// signature can always be inferred.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> Result<Yield, Fault>,
{
    FromFn(f)
}

/// The [`Routine`] returned by [`from_fn()`].
pub struct FromFn<F>(F);

impl<F> Routine for FromFn<F>
where
    F: FnMut() -> Result<Yield, Fault>,
{
    fn resume(&mut self) -> Result<Yield, Fault> { (self.0)() }
}

impl<F> Debug for FromFn<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("FromFn(..)")
    }
}

/// What a [`Routine`] is waiting on after being resumed.
pub enum Yield {
    /// Resume again on the next tick.
    NextTick,
    /// Resume once this [`Operation`] has completed.
    Await(Box<dyn Operation>),
    /// Run this [`Routine`] to completion before resuming.
    Nested(Box<dyn Routine>),
    /// There's nothing left to do.
    Done,
}

impl Yield {
    /// Wait on an [`Operation`].
    pub fn wait_for<O: Operation + 'static>(op: O) -> Self {
        Yield::Await(Box::new(op))
    }

    /// Run a nested [`Routine`].
    pub fn nested<R: Routine + 'static>(routine: R) -> Self {
        Yield::Nested(Box::new(routine))
    }
}

impl Debug for Yield {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Yield::NextTick => f.write_str("NextTick"),
            Yield::Await(_) => f.write_str("Await(..)"),
            Yield::Nested(_) => f.write_str("Nested(..)"),
            Yield::Done => f.write_str("Done"),
        }
    }
}

/// A [`Routine`] made from a list of steps, each run to its own completion
/// in order.
#[derive(Default)]
pub struct Sequence {
    steps: std::collections::VecDeque<Box<dyn Routine>>,
}

impl Sequence {
    /// Create an empty [`Sequence`].
    pub fn new() -> Self { Sequence::default() }

    /// Add another step.
    pub fn then<R: Routine + 'static>(mut self, step: R) -> Self {
        self.steps.push_back(Box::new(step));
        self
    }

    /// How many steps haven't started yet?
    pub fn len(&self) -> usize { self.steps.len() }

    /// Have all steps been started?
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }
}

impl Routine for Sequence {
    fn resume(&mut self) -> Result<Yield, Fault> {
        match self.steps.pop_front() {
            Some(step) => Ok(Yield::Nested(step)),
            None => Ok(Yield::Done),
        }
    }
}

impl Debug for Sequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("remaining", &self.steps.len())
            .finish()
    }
}
