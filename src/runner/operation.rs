use futures::channel::oneshot;
use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    future::Future,
    rc::Rc,
};
use tokio::runtime::Handle;

/// Something happening outside the runner (usually a network request) that a
/// [`crate::runner::Routine`] can wait on.
pub trait Operation {
    /// Check whether the operation has finished.
    ///
    /// This is called at most once per tick and must never block.
    fn poll_complete(&mut self) -> bool;
}

impl<F> Operation for F
where
    F: FnMut() -> bool,
{
    fn poll_complete(&mut self) -> bool { self() }
}

/// A single-threaded cell an [`Operation`] deposits its result into.
///
/// The [`crate::runner::Routine`] keeps one half and hands the operation to
/// the runner. After the routine is resumed it can [`Slot::take()`] the
/// result.
pub struct Slot<T>(Rc<RefCell<Option<T>>>);

impl<T> Slot<T> {
    /// Create an empty [`Slot`].
    pub fn new() -> Self { Slot(Rc::new(RefCell::new(None))) }

    /// Store a value, replacing whatever was there.
    pub fn fill(&self, value: T) { *self.0.borrow_mut() = Some(value); }

    /// Take the value out, if one has been stored.
    pub fn take(&self) -> Option<T> { self.0.borrow_mut().take() }

    /// Has a value been stored?
    pub fn is_filled(&self) -> bool { self.0.borrow().is_some() }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self { Slot(Rc::clone(&self.0)) }
}

impl<T> Default for Slot<T> {
    fn default() -> Self { Slot::new() }
}

impl<T> Debug for Slot<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("filled", &self.is_filled())
            .finish()
    }
}

/// An [`Operation`] that completes when a value arrives on a
/// [`oneshot`] channel.
///
/// If the sending half is dropped the operation still completes, but the
/// [`Slot`] stays empty.
pub struct Pending<T> {
    receiver: oneshot::Receiver<T>,
    slot: Slot<T>,
}

impl<T> Pending<T> {
    /// Wait for a value from `receiver`.
    pub fn new(receiver: oneshot::Receiver<T>) -> (Self, Slot<T>) {
        let slot = Slot::new();
        let pending = Pending {
            receiver,
            slot: slot.clone(),
        };

        (pending, slot)
    }
}

impl<T> Operation for Pending<T> {
    fn poll_complete(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(Some(value)) => {
                self.slot.fill(value);
                true
            },
            Ok(None) => false,
            Err(oneshot::Canceled) => true,
        }
    }
}

impl<T> Debug for Pending<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("slot", &self.slot).finish()
    }
}

/// Run a future on a tokio runtime, returning an [`Operation`] that completes
/// when the future does.
///
/// Dropping the [`Pending`] abandons the result; the future itself keeps
/// running until it finishes.
pub fn spawn<F>(
    handle: &Handle,
    future: F,
) -> (Pending<F::Output>, Slot<F::Output>)
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();

    handle.spawn(async move {
        let value = future.await;
        // nobody is listening when the task was cancelled
        let _ = sender.send(value);
    });

    Pending::new(receiver)
}
