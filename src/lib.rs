//! A library for browsing, previewing, and downloading MatCap textures.
//!
//! The main pieces are:
//!
//! - a [`PreviewCache`] which keeps preview images on disk for a week,
//! - a cooperative [`runner::TaskRunner`] which sequences network requests
//!   from a host's single-threaded update loop,
//! - a [`remote::GithubSource`] which knows how to list and fetch MatCaps
//!   from a GitHub repository, and
//! - a [`MatcapBrowser`] which ties them all together.

#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod cache;
pub mod remote;
pub mod runner;

mod browser;
mod config;
mod error;
mod preview;

pub use browser::{Listing, MatcapBrowser, PreviewState, Status};
pub use cache::{CacheEntry, CacheStatistics, PreviewCache};
pub use config::{CacheConfig, Config, RemoteConfig};
pub use error::{CacheError, ConfigError, DecodeError, Fault, NetworkError};
pub use preview::{decode, Preview};
