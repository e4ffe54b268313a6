//! The glue between the [`PreviewCache`], a [`RemoteSource`], and the
//! [`TaskRunner`].

use crate::{
    cache::{CacheStatistics, Clock, PreviewCache, SystemClock},
    error::{describe, Fault, NetworkError},
    preview::{self, Preview},
    remote::{RemoteSource, Resolution},
    runner::{self, Routine, Slot, TaskHandle, TaskRunner, Yield},
};
use bytes::Bytes;
use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fmt::{self, Debug, Formatter},
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
};
use tokio::runtime::Handle;

/// The list of available MatCaps.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Nobody has asked for the list yet.
    NotLoaded,
    /// The list is being fetched.
    Loading,
    /// The names of every available MatCap.
    Loaded(Vec<String>),
    /// Fetching the list failed.
    Failed(String),
}

impl Default for Listing {
    fn default() -> Self { Listing::NotLoaded }
}

/// What we know about a particular MatCap's preview.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewState {
    /// The preview is being fetched.
    Loading,
    /// The preview is ready to display.
    Ready(Preview),
    /// The preview couldn't be loaded.
    Failed(String),
}

/// A message for the user describing what the browser is up to.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Nothing has happened yet.
    Idle,
    /// Something is in progress.
    Busy(String),
    /// Something finished successfully.
    Info(String),
    /// Something failed. Failures are always safe to retry.
    Error(String),
}

impl Status {
    /// Is this an error message?
    pub fn is_error(&self) -> bool { matches!(self, Status::Error(_)) }
}

impl Default for Status {
    fn default() -> Self { Status::Idle }
}

#[derive(Debug, Default)]
struct BrowserState {
    listing: Listing,
    previews: HashMap<String, PreviewState>,
    downloads: HashMap<String, PathBuf>,
    status: Status,
}

struct Shared<C> {
    cache: RefCell<PreviewCache<C>>,
    source: Arc<dyn RemoteSource>,
    runtime: Handle,
    state: RefCell<BrowserState>,
}

impl<C> Shared<C> {
    fn set_status(&self, status: Status) {
        match &status {
            Status::Error(msg) => log::warn!("{}", msg),
            Status::Info(msg) | Status::Busy(msg) => log::info!("{}", msg),
            Status::Idle => {},
        }
        self.state.borrow_mut().status = status;
    }

    fn set_preview(&self, key: &str, preview: PreviewState) {
        self.state
            .borrow_mut()
            .previews
            .insert(key.to_string(), preview);
    }

    /// Forget a busy message once the work it describes has gone away.
    fn clear_busy(&self, msg: &str) {
        let mut state = self.state.borrow_mut();
        if matches!(&state.status, Status::Busy(current) if current == msg) {
            state.status = Status::Idle;
        }
    }

    /// Mark a preview as loading, unless it's already loading or loaded.
    fn claim_preview(&self, key: &str) -> bool {
        let mut state = self.state.borrow_mut();

        match state.previews.get(key) {
            Some(PreviewState::Loading) | Some(PreviewState::Ready(_)) => false,
            _ => {
                state
                    .previews
                    .insert(key.to_string(), PreviewState::Loading);
                true
            },
        }
    }
}

/// Browse, preview, and download MatCaps without blocking the host's update
/// loop.
///
/// Every operation is started as a task on an internal [`TaskRunner`], so
/// the host needs to call [`MatcapBrowser::tick()`] regularly (e.g. once per
/// frame). Network requests run in the background on the provided tokio
/// runtime.
pub struct MatcapBrowser<C: Clock + 'static = SystemClock> {
    runner: TaskRunner,
    shared: Rc<Shared<C>>,
}

impl<C: Clock + 'static> MatcapBrowser<C> {
    /// Create a new [`MatcapBrowser`].
    pub fn new(
        cache: PreviewCache<C>,
        source: Arc<dyn RemoteSource>,
        runtime: Handle,
    ) -> Self {
        MatcapBrowser {
            runner: TaskRunner::new(),
            shared: Rc::new(Shared {
                cache: RefCell::new(cache),
                source,
                runtime,
                state: RefCell::new(BrowserState::default()),
            }),
        }
    }

    /// Fetch the list of available MatCaps, optionally fetching every preview
    /// afterwards.
    pub fn refresh_listing(&mut self, prefetch_previews: bool) -> TaskHandle {
        self.runner.start(RefreshListing {
            shared: Rc::clone(&self.shared),
            prefetch_previews,
            stage: ListingStage::Start,
        })
    }

    /// Load the preview for a particular MatCap, from the cache if possible.
    ///
    /// Returns `None` if that preview is already loading or loaded.
    pub fn request_preview(&mut self, source_key: &str) -> Option<TaskHandle> {
        if !self.shared.claim_preview(source_key) {
            return None;
        }

        let fetch = FetchPreview::new(source_key, Rc::clone(&self.shared));
        Some(self.runner.start(fetch))
    }

    /// Download the full-resolution texture into `destination`.
    pub fn download<P: Into<PathBuf>>(
        &mut self,
        source_key: &str,
        destination: P,
    ) -> TaskHandle {
        self.runner.start(Download {
            source_key: source_key.to_string(),
            destination: destination.into(),
            shared: Rc::clone(&self.shared),
            pending: None,
        })
    }

    /// Let background work make progress. Call this once per host frame.
    pub fn tick(&mut self) { self.runner.tick(); }

    /// Stop a task started by this browser.
    pub fn cancel(&mut self, handle: &TaskHandle) {
        self.runner.cancel(handle);
    }

    /// Stop everything.
    pub fn cancel_all(&mut self) { self.runner.cancel_all(); }

    /// Is there any background work in progress?
    pub fn is_idle(&self) -> bool { self.runner.is_empty() }

    /// The list of available MatCaps.
    pub fn listing(&self) -> Listing {
        self.shared.state.borrow().listing.clone()
    }

    /// What we know about a particular preview.
    pub fn preview(&self, source_key: &str) -> Option<PreviewState> {
        self.shared.state.borrow().previews.get(source_key).cloned()
    }

    /// Where a MatCap was downloaded to, if it has been downloaded.
    pub fn downloaded(&self, source_key: &str) -> Option<PathBuf> {
        self.shared.state.borrow().downloads.get(source_key).cloned()
    }

    /// The message to show the user.
    pub fn status(&self) -> Status { self.shared.state.borrow().status.clone() }

    /// Summarise the preview cache's contents.
    pub fn cache_statistics(&self) -> CacheStatistics {
        self.shared.cache.borrow().statistics()
    }

    /// Drop expired entries from the preview cache.
    pub fn sweep_expired(&mut self) -> usize {
        self.shared.cache.borrow_mut().sweep_expired()
    }

    /// Delete everything in the preview cache.
    ///
    /// This can't be undone, so make sure the user really wants it. Previews
    /// which are already loaded stay in memory.
    pub fn clear_cache(&mut self) {
        self.shared.cache.borrow_mut().clear_all();
        let msg = String::from("Cleared the preview cache");
        self.shared.set_status(Status::Info(msg));
    }
}

impl<C: Clock + 'static> Debug for MatcapBrowser<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("MatcapBrowser")
            .field("runner", &self.runner)
            .field("listing", &state.listing)
            .field("previews", &state.previews.len())
            .field("status", &state.status)
            .finish()
    }
}

type Fetched<T> = Slot<Result<T, NetworkError>>;

fn spawn_fetch<C>(
    shared: &Shared<C>,
    source_key: &str,
    resolution: Resolution,
) -> (Yield, Fetched<Bytes>) {
    let future = shared.source.fetch(source_key, resolution);
    let (op, slot) = runner::spawn(&shared.runtime, future);
    (Yield::wait_for(op), slot)
}

fn take_result<T>(slot: &Fetched<T>) -> Result<T, NetworkError> {
    slot.take().unwrap_or(Err(NetworkError::Abandoned))
}

const LISTING_BUSY: &str = "Fetching the MatCap list...";

enum ListingStage {
    Start,
    Listing(Fetched<Vec<String>>),
    Prefetching(VecDeque<String>),
    Finished,
}

struct RefreshListing<C> {
    shared: Rc<Shared<C>>,
    prefetch_previews: bool,
    stage: ListingStage,
}

impl<C: Clock + 'static> RefreshListing<C> {
    fn on_listed(
        &mut self,
        result: Result<Vec<String>, NetworkError>,
    ) -> Result<Yield, Fault> {
        let names = match result {
            Ok(names) => names,
            Err(e) => {
                let msg = describe(&e);
                self.shared.state.borrow_mut().listing =
                    Listing::Failed(msg.clone());
                self.shared.set_status(Status::Error(format!(
                    "Unable to list the MatCaps, try refreshing again: {}",
                    msg
                )));
                self.stage = ListingStage::Finished;
                return Ok(Yield::Done);
            },
        };

        self.shared.set_status(Status::Info(format!(
            "Found {} MatCaps",
            names.len()
        )));
        self.shared.state.borrow_mut().listing = Listing::Loaded(names.clone());

        if self.prefetch_previews {
            self.stage = ListingStage::Prefetching(names.into());
            self.next_preview()
        } else {
            self.stage = ListingStage::Finished;
            Ok(Yield::Done)
        }
    }

    fn next_preview(&mut self) -> Result<Yield, Fault> {
        let queue = match &mut self.stage {
            ListingStage::Prefetching(queue) => queue,
            _ => return Ok(Yield::Done),
        };

        while let Some(key) = queue.pop_front() {
            if self.shared.claim_preview(&key) {
                let fetch = FetchPreview::new(&key, Rc::clone(&self.shared));
                return Ok(Yield::nested(fetch));
            }
        }

        self.stage = ListingStage::Finished;
        Ok(Yield::Done)
    }
}

impl<C: Clock + 'static> Routine for RefreshListing<C> {
    fn resume(&mut self) -> Result<Yield, Fault> {
        match std::mem::replace(&mut self.stage, ListingStage::Finished) {
            ListingStage::Start => {
                self.shared.state.borrow_mut().listing = Listing::Loading;
                self.shared
                    .set_status(Status::Busy(String::from(LISTING_BUSY)));

                let future = self.shared.source.list_available();
                let (op, slot) = runner::spawn(&self.shared.runtime, future);
                self.stage = ListingStage::Listing(slot);
                Ok(Yield::wait_for(op))
            },
            ListingStage::Listing(slot) => {
                let result = take_result(&slot);
                self.on_listed(result)
            },
            prefetching @ ListingStage::Prefetching(_) => {
                self.stage = prefetching;
                self.next_preview()
            },
            ListingStage::Finished => Ok(Yield::Done),
        }
    }
}

impl<C> Drop for RefreshListing<C> {
    fn drop(&mut self) {
        if let ListingStage::Listing(_) = self.stage {
            let mut state = self.shared.state.borrow_mut();
            if state.listing == Listing::Loading {
                state.listing = Listing::NotLoaded;
            }
        }

        self.shared.clear_busy(LISTING_BUSY);
    }
}

struct FetchPreview<C> {
    source_key: String,
    shared: Rc<Shared<C>>,
    pending: Option<Fetched<Bytes>>,
    finished: bool,
}

impl<C: Clock + 'static> FetchPreview<C> {
    fn new(source_key: &str, shared: Rc<Shared<C>>) -> Self {
        FetchPreview {
            source_key: source_key.to_string(),
            shared,
            pending: None,
            finished: false,
        }
    }

    fn from_cache(&self) -> Option<Preview> {
        let key = &self.source_key;
        let cached = self.shared.cache.borrow().read(key)?;

        match preview::decode(key, Bytes::from(cached)) {
            Ok(preview) => Some(preview),
            Err(e) => {
                log::warn!("Refetching the cached preview: {}", describe(&e));
                self.shared.cache.borrow_mut().invalidate(key);
                None
            },
        }
    }

    fn on_fetched(&mut self, result: Result<Bytes, NetworkError>) {
        let key = &self.source_key;

        let outcome = result
            .map_err(|e| describe(&e))
            .and_then(|bytes| {
                preview::decode(key, bytes).map_err(|e| describe(&e))
            });

        match outcome {
            Ok(preview) => {
                // the cache logs its own write failures
                let _ = self.shared.cache.borrow_mut().put(key, &preview.bytes);
                self.shared.set_preview(key, PreviewState::Ready(preview));
            },
            Err(msg) => {
                self.shared.set_status(Status::Error(format!(
                    "Unable to load the preview for \"{}\", try again: {}",
                    key, msg
                )));
                self.shared.set_preview(key, PreviewState::Failed(msg));
            },
        }
    }
}

impl<C: Clock + 'static> Routine for FetchPreview<C> {
    fn resume(&mut self) -> Result<Yield, Fault> {
        match self.pending.take() {
            None => {
                if let Some(preview) = self.from_cache() {
                    let ready = PreviewState::Ready(preview);
                    self.shared.set_preview(&self.source_key, ready);
                    self.finished = true;
                    return Ok(Yield::Done);
                }

                log::debug!("Cache miss for \"{}\"", self.source_key);
                let (wait, slot) = spawn_fetch(
                    &self.shared,
                    &self.source_key,
                    Resolution::Preview,
                );
                self.pending = Some(slot);
                Ok(wait)
            },
            Some(slot) => {
                let result = take_result(&slot);
                self.on_fetched(result);
                self.finished = true;
                Ok(Yield::Done)
            },
        }
    }
}

impl<C> Drop for FetchPreview<C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // cancelled or faulted part way through, let someone else try
        let mut state = self.shared.state.borrow_mut();
        let loading = matches!(
            state.previews.get(&self.source_key),
            Some(PreviewState::Loading)
        );

        if loading {
            state.previews.remove(&self.source_key);
        }
    }
}

struct Download<C> {
    source_key: String,
    destination: PathBuf,
    shared: Rc<Shared<C>>,
    pending: Option<Fetched<Bytes>>,
}

impl<C> Download<C> {
    fn busy_message(&self) -> String {
        format!("Downloading \"{}\"...", self.source_key)
    }

    fn save(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.destination)?;
        let file_name = Path::new(&self.source_key)
            .file_name()
            .unwrap_or_else(|| self.source_key.as_ref());
        let path = self.destination.join(file_name);
        std::fs::write(&path, bytes)?;

        Ok(path)
    }
}

impl<C> Routine for Download<C> {
    fn resume(&mut self) -> Result<Yield, Fault> {
        let slot = match self.pending.take() {
            Some(slot) => slot,
            None => {
                self.shared.set_status(Status::Busy(self.busy_message()));
                let (wait, slot) = spawn_fetch(
                    &self.shared,
                    &self.source_key,
                    Resolution::Full,
                );
                self.pending = Some(slot);
                return Ok(wait);
            },
        };

        let key = &self.source_key;
        let saved = take_result(&slot)
            .map_err(|e| describe(&e))
            .and_then(|bytes| self.save(&bytes).map_err(|e| describe(&e)));

        match saved {
            Ok(path) => {
                self.shared.set_status(Status::Info(format!(
                    "Saved \"{}\" to \"{}\"",
                    key,
                    path.display()
                )));
                self.shared
                    .state
                    .borrow_mut()
                    .downloads
                    .insert(key.clone(), path);
            },
            Err(msg) => self.shared.set_status(Status::Error(format!(
                "Unable to download \"{}\", try again: {}",
                key, msg
            ))),
        }

        Ok(Yield::Done)
    }
}

impl<C> Drop for Download<C> {
    fn drop(&mut self) {
        // a finished download has already replaced its busy message
        let msg = self.busy_message();
        self.shared.clear_busy(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::ManualClock, config::CacheConfig, preview::png};
    use futures::future::{BoxFuture, FutureExt};
    use pretty_assertions::assert_eq;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::runtime::Runtime;

    #[derive(Debug, Default)]
    struct FakeSource {
        listing: Option<Vec<String>>,
        previews: HashMap<String, Vec<u8>>,
        full: HashMap<String, Vec<u8>>,
        hanging: Vec<String>,
        listing_hangs: bool,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn with_previews(keys: &[&str]) -> Self {
            FakeSource {
                listing: Some(keys.iter().map(|k| k.to_string()).collect()),
                previews: keys
                    .iter()
                    .map(|k| (k.to_string(), png(4, 4)))
                    .collect(),
                ..FakeSource::default()
            }
        }

        fn fetches(&self) -> usize { self.fetches.load(Ordering::SeqCst) }
    }

    impl RemoteSource for FakeSource {
        fn list_available(
            &self,
        ) -> BoxFuture<'static, Result<Vec<String>, NetworkError>> {
            if self.listing_hangs {
                return futures::future::pending().boxed();
            }

            let result = self.listing.clone().ok_or(NetworkError::Timeout {
                url: String::from("https://api.github.com/"),
            });
            futures::future::ready(result).boxed()
        }

        fn fetch(
            &self,
            source_key: &str,
            resolution: Resolution,
        ) -> BoxFuture<'static, Result<Bytes, NetworkError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);

            if self.hanging.iter().any(|k| k == source_key) {
                return futures::future::pending().boxed();
            }

            let files = match resolution {
                Resolution::Preview => &self.previews,
                Resolution::Full => &self.full,
            };
            let result = files
                .get(source_key)
                .map(|b| Bytes::from(b.clone()))
                .ok_or(NetworkError::NotFound {
                    url: source_key.to_string(),
                });
            futures::future::ready(result).boxed()
        }
    }

    struct Fixture {
        browser: MatcapBrowser<ManualClock>,
        source: Arc<FakeSource>,
        cache_dir: tempfile::TempDir,
        _runtime: Runtime,
    }

    fn fixture(source: FakeSource) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let runtime = Runtime::new().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = PreviewCache::with_clock(
            CacheConfig::new(cache_dir.path()),
            ManualClock::new(1_700_000_000),
        );
        let source = Arc::new(source);
        let browser = MatcapBrowser::new(
            cache,
            Arc::clone(&source) as Arc<dyn RemoteSource>,
            runtime.handle().clone(),
        );

        Fixture {
            browser,
            source,
            cache_dir,
            _runtime: runtime,
        }
    }

    fn run_until_finished<C: Clock + 'static>(
        browser: &mut MatcapBrowser<C>,
        handle: &TaskHandle,
    ) {
        for _ in 0..2_000 {
            if handle.is_finished() {
                return;
            }
            browser.tick();
            std::thread::sleep(Duration::from_millis(1));
        }

        panic!("{:?} never finished", handle);
    }

    #[test]
    fn list_then_prefetch_every_preview() {
        let mut f = fixture(FakeSource::with_previews(&["a.png", "b.png"]));

        let handle = f.browser.refresh_listing(true);
        assert_eq!(f.browser.listing(), Listing::Loading);
        run_until_finished(&mut f.browser, &handle);

        assert_eq!(
            f.browser.listing(),
            Listing::Loaded(vec![String::from("a.png"), String::from("b.png")])
        );
        for key in &["a.png", "b.png"] {
            assert!(matches!(
                f.browser.preview(key),
                Some(PreviewState::Ready(Preview { width: 4, .. }))
            ));
        }
        assert_eq!(f.browser.cache_statistics().valid_entries, 2);
        assert_eq!(f.source.fetches(), 2);
        assert!(f.browser.is_idle());
    }

    #[test]
    fn listing_without_prefetching() {
        let mut f = fixture(FakeSource::with_previews(&["a.png"]));

        let handle = f.browser.refresh_listing(false);
        run_until_finished(&mut f.browser, &handle);

        assert_eq!(
            f.browser.status(),
            Status::Info(String::from("Found 1 MatCaps"))
        );
        assert_eq!(f.browser.preview("a.png"), None);
        assert_eq!(f.source.fetches(), 0);
    }

    #[test]
    fn cache_hits_never_touch_the_network() {
        let mut f = fixture(FakeSource::default());
        f.browser
            .shared
            .cache
            .borrow_mut()
            .put("a.png", &png(2, 2))
            .unwrap();

        let handle = f.browser.request_preview("a.png").unwrap();

        assert_eq!(handle.state(), runner::TaskState::Completed);
        assert!(matches!(
            f.browser.preview("a.png"),
            Some(PreviewState::Ready(Preview { width: 2, .. }))
        ));
        assert_eq!(f.source.fetches(), 0);
    }

    #[test]
    fn corrupt_cached_previews_are_refetched() {
        let mut f = fixture(FakeSource::with_previews(&["a.png"]));
        f.browser
            .shared
            .cache
            .borrow_mut()
            .put("a.png", b"garbage")
            .unwrap();

        let handle = f.browser.request_preview("a.png").unwrap();
        run_until_finished(&mut f.browser, &handle);

        assert!(matches!(
            f.browser.preview("a.png"),
            Some(PreviewState::Ready(_))
        ));
        assert_eq!(f.source.fetches(), 1);
        assert_eq!(
            f.browser.shared.cache.borrow().read("a.png").unwrap(),
            png(4, 4)
        );
    }

    #[test]
    fn failed_fetches_are_reported_and_retryable() {
        let mut f = fixture(FakeSource::default());

        let handle = f.browser.request_preview("missing.png").unwrap();
        run_until_finished(&mut f.browser, &handle);

        assert!(matches!(
            f.browser.preview("missing.png"),
            Some(PreviewState::Failed(_))
        ));
        assert!(f.browser.status().is_error());
        assert_eq!(f.browser.cache_statistics().total_entries, 0);
        assert!(f.browser.request_preview("missing.png").is_some());
    }

    #[test]
    fn failed_listings_are_reported() {
        let mut f = fixture(FakeSource::default());

        let handle = f.browser.refresh_listing(true);
        run_until_finished(&mut f.browser, &handle);

        assert!(matches!(f.browser.listing(), Listing::Failed(_)));
        assert!(f.browser.status().is_error());
    }

    #[test]
    fn duplicate_requests_are_ignored() {
        let mut f = fixture(FakeSource {
            hanging: vec![String::from("slow.png")],
            ..FakeSource::default()
        });

        let first = f.browser.request_preview("slow.png");

        assert!(first.is_some());
        assert!(f.browser.request_preview("slow.png").is_none());
        assert_eq!(f.browser.preview("slow.png"), Some(PreviewState::Loading));
    }

    #[test]
    fn cancelled_previews_can_be_requested_again() {
        let mut f = fixture(FakeSource {
            hanging: vec![String::from("slow.png")],
            ..FakeSource::default()
        });
        let handle = f.browser.request_preview("slow.png").unwrap();
        f.browser.tick();

        f.browser.cancel(&handle);

        assert_eq!(handle.state(), runner::TaskState::Cancelled);
        assert_eq!(f.browser.preview("slow.png"), None);
        assert!(f.browser.request_preview("slow.png").is_some());
    }

    #[test]
    fn cancelled_listings_stop_looking_busy() {
        let mut f = fixture(FakeSource {
            listing_hangs: true,
            ..FakeSource::default()
        });
        let handle = f.browser.refresh_listing(false);
        f.browser.tick();
        assert_eq!(
            f.browser.status(),
            Status::Busy(String::from(LISTING_BUSY))
        );

        f.browser.cancel(&handle);

        assert_eq!(f.browser.listing(), Listing::NotLoaded);
        assert_eq!(f.browser.status(), Status::Idle);
    }

    #[test]
    fn cancelled_downloads_stop_looking_busy() {
        let mut f = fixture(FakeSource {
            hanging: vec![String::from("slow.png")],
            ..FakeSource::default()
        });
        let destination = f.cache_dir.path().join("downloads");
        let handle = f.browser.download("slow.png", &destination);
        f.browser.tick();
        assert_eq!(
            f.browser.status(),
            Status::Busy(String::from("Downloading \"slow.png\"..."))
        );

        f.browser.cancel(&handle);

        assert_eq!(handle.state(), runner::TaskState::Cancelled);
        assert_eq!(f.browser.status(), Status::Idle);
        assert_eq!(f.browser.downloaded("slow.png"), None);
    }

    #[test]
    fn finished_downloads_keep_their_status() {
        let mut source = FakeSource::default();
        source.full.insert(String::from("a.png"), b"full res".to_vec());
        let mut f = fixture(source);
        let destination = f.cache_dir.path().join("downloads");

        let handle = f.browser.download("a.png", &destination);
        run_until_finished(&mut f.browser, &handle);

        assert!(matches!(f.browser.status(), Status::Info(_)));
    }

    #[test]
    fn download_the_full_texture() {
        let mut source = FakeSource::default();
        source.full.insert(String::from("a.png"), b"full res".to_vec());
        let mut f = fixture(source);
        let destination = f.cache_dir.path().join("downloads");

        let handle = f.browser.download("a.png", &destination);
        run_until_finished(&mut f.browser, &handle);

        let saved = destination.join("a.png");
        assert_eq!(f.browser.downloaded("a.png"), Some(saved.clone()));
        assert_eq!(std::fs::read(saved).unwrap(), b"full res".to_vec());
        assert!(!f.browser.status().is_error());
    }

    #[test]
    fn clearing_the_cache_keeps_loaded_previews() {
        let mut f = fixture(FakeSource::with_previews(&["a.png"]));
        let handle = f.browser.request_preview("a.png").unwrap();
        run_until_finished(&mut f.browser, &handle);

        f.browser.clear_cache();

        assert_eq!(f.browser.cache_statistics().total_entries, 0);
        assert!(matches!(
            f.browser.preview("a.png"),
            Some(PreviewState::Ready(_))
        ));
    }
}
