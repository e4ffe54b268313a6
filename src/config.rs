use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Top-level configuration, usually loaded from the host's settings file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how previews are cached.
    pub cache: CacheConfig,
    /// Which repository the MatCaps come from.
    pub remote: RemoteConfig,
}

impl Config {
    /// Load a [`Config`] from a JSON file. Missing fields take their default
    /// values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Config::from_json(&src)
    }

    /// Parse a [`Config`] from a JSON string.
    pub fn from_json(src: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(src).map_err(ConfigError::from)
    }
}

/// Options for the [`crate::PreviewCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// The directory previews (and the index) are stored in.
    pub directory: PathBuf,
    /// How long an entry stays trustworthy, in seconds.
    pub expiry_secs: u64,
    /// The index file's name within [`CacheConfig::directory`].
    pub index_file: String,
}

impl CacheConfig {
    /// Seven days.
    pub const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;
    /// The default name for the index file.
    pub const DEFAULT_INDEX_FILE: &'static str = "cache_index.json";

    /// Create a [`CacheConfig`] rooted at a particular directory.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        CacheConfig {
            directory: directory.into(),
            ..CacheConfig::default()
        }
    }

    /// Set the [`CacheConfig::expiry()`] window.
    pub fn with_expiry(self, expiry: Duration) -> Self {
        CacheConfig {
            expiry_secs: expiry.as_secs(),
            ..self
        }
    }

    /// Set the index file's name.
    pub fn with_index_file<S: Into<String>>(self, index_file: S) -> Self {
        CacheConfig {
            index_file: index_file.into(),
            ..self
        }
    }

    /// How long a cache entry is considered valid for.
    pub fn expiry(&self) -> Duration { Duration::from_secs(self.expiry_secs) }

    /// The full path to the index file.
    pub fn index_path(&self) -> PathBuf {
        self.directory.join(&self.index_file)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            directory: std::env::temp_dir().join("matcap-previews"),
            expiry_secs: CacheConfig::DEFAULT_EXPIRY_SECS,
            index_file: String::from(CacheConfig::DEFAULT_INDEX_FILE),
        }
    }
}

/// Where to find MatCaps on GitHub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// The repository owner.
    pub owner: String,
    /// The repository name.
    pub repo: String,
    /// The branch to read from.
    pub branch: String,
    /// The directory containing full-resolution textures.
    pub full_dir: String,
    /// The directory containing preview-sized textures.
    pub preview_dir: String,
    /// Base URL for the GitHub REST API.
    pub api_base: String,
    /// Base URL for raw file contents.
    pub raw_base: String,
    /// Base URL for the GitHub website (used when scraping tree pages).
    pub web_base: String,
    /// An optional API token, sent to the REST API to lift rate limits.
    pub token: Option<String>,
    /// Timeout for listing requests, in seconds.
    pub list_timeout_secs: u64,
    /// Timeout for preview downloads, in seconds.
    pub preview_timeout_secs: u64,
    /// Timeout for full-resolution downloads, in seconds.
    pub download_timeout_secs: u64,
}

impl RemoteConfig {
    /// How long to wait for a listing.
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    /// How long to wait for a preview.
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }

    /// How long to wait for a full-resolution texture.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            owner: String::from("nidorx"),
            repo: String::from("matcaps"),
            branch: String::from("master"),
            full_dir: String::from("1024"),
            preview_dir: String::from("preview"),
            api_base: String::from("https://api.github.com"),
            raw_base: String::from("https://raw.githubusercontent.com"),
            web_base: String::from("https://github.com"),
            token: None,
            list_timeout_secs: 10,
            preview_timeout_secs: 15,
            download_timeout_secs: 30,
        }
    }
}
