//! The on-disk preview cache.

mod clock;
mod entry;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{cache_file_name, CacheEntry, CacheIndex};
pub use store::{CacheStatistics, PreviewCache};
