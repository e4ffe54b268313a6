//! Where MatCaps come from.

mod github;

pub use github::{parse_contents_listing, scrape_tree_page, GithubSource};

use crate::error::NetworkError;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Which version of a resource to fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// A small image for showing in a grid.
    Preview,
    /// The full-resolution texture.
    Full,
}

/// A collection of MatCap textures somewhere on the internet.
///
/// The futures returned are run on a background runtime, so they need to be
/// `'static` and can't borrow from the source.
pub trait RemoteSource: Send + Sync {
    /// Get the name of every available MatCap.
    fn list_available(
        &self,
    ) -> BoxFuture<'static, Result<Vec<String>, NetworkError>>;

    /// Download a particular MatCap.
    fn fetch(
        &self,
        source_key: &str,
        resolution: Resolution,
    ) -> BoxFuture<'static, Result<Bytes, NetworkError>>;
}

impl<S: RemoteSource + ?Sized> RemoteSource for Arc<S> {
    fn list_available(
        &self,
    ) -> BoxFuture<'static, Result<Vec<String>, NetworkError>> {
        (**self).list_available()
    }

    fn fetch(
        &self,
        source_key: &str,
        resolution: Resolution,
    ) -> BoxFuture<'static, Result<Bytes, NetworkError>> {
        (**self).fetch(source_key, resolution)
    }
}

/// Is this file name something we know how to display?
pub fn is_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg"].iter().any(|ext| lower.ends_with(ext))
}
