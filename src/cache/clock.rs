use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A source of "now", in whole seconds since the Unix epoch.
pub trait Clock {
    /// The current time.
    fn now(&self) -> u64;
}

impl<'c, C: Clock + ?Sized> Clock for &'c C {
    fn now(&self) -> u64 { (**self).now() }
}

/// The [`Clock`] backed by [`SystemTime::now()`].
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A [`Clock`] that only moves when you tell it to.
///
/// Clones share the same underlying time, so a test can keep one copy and
/// give another to the [`crate::PreviewCache`].
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Create a [`ManualClock`] starting at `now`.
    pub fn new(now: u64) -> Self { ManualClock(Arc::new(AtomicU64::new(now))) }

    /// Jump to a particular time.
    pub fn set(&self, now: u64) { self.0.store(now, Ordering::SeqCst); }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 { self.0.load(Ordering::SeqCst) }
}
