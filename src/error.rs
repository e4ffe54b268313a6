use http::StatusCode;
use std::path::PathBuf;

/// Something went wrong while reading or writing the preview cache.
///
/// These never escape a [`crate::PreviewCache`] operation. They are logged
/// and the cache degrades to miss/no-op behaviour instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An OS-level error occurred while touching the cache directory.
    #[error("Unable to access \"{}\"", path.display())]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The persisted index couldn't be (de)serialized.
    #[error("The cache index is malformed")]
    Parse(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io<P>(path: P, source: std::io::Error) -> Self
    where
        P: Into<PathBuf>,
    {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A request to the remote MatCap repository failed.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The request didn't complete within its deadline.
    #[error("Timed out while requesting \"{url}\"")]
    Timeout {
        /// The URL being requested.
        url: String,
    },
    /// The server says the resource doesn't exist.
    #[error("\"{url}\" doesn't exist")]
    NotFound {
        /// The URL being requested.
        url: String,
    },
    /// The server responded with an unexpected status code.
    #[error("\"{url}\" responded with {status}")]
    Status {
        /// The URL being requested.
        url: String,
        /// The status code returned.
        status: StatusCode,
    },
    /// Any other transport-level failure (DNS, TLS, connection reset, etc.).
    #[error("The request failed")]
    Transport(#[source] reqwest::Error),
    /// The server's response wasn't in the format we expected.
    #[error("The response was malformed")]
    Malformed(#[from] serde_json::Error),
    /// The configured URLs don't make sense.
    #[error("Invalid URL")]
    InvalidUrl(#[from] url::ParseError),
    /// The operation was dropped before it could deliver a result.
    #[error("The operation was abandoned before it completed")]
    Abandoned,
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();

        if e.is_timeout() {
            NetworkError::Timeout { url }
        } else if let Some(status) = e.status() {
            if status == StatusCode::NOT_FOUND {
                NetworkError::NotFound { url }
            } else {
                NetworkError::Status { url, status }
            }
        } else {
            NetworkError::Transport(e)
        }
    }
}

/// The payload we fetched isn't a usable image.
#[derive(Debug, thiserror::Error)]
#[error("Unable to decode \"{key}\" as an image")]
pub struct DecodeError {
    /// The resource being decoded.
    pub key: String,
    /// The underlying error.
    #[source]
    pub source: image::ImageError,
}

/// Loading a [`crate::Config`] failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Unable to read the config file.
    #[error("Unable to read \"{}\"", path.display())]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The config file isn't valid JSON, or has the wrong shape.
    #[error("Unable to parse the config")]
    Parse(#[from] serde_json::Error),
}

/// The error a [`crate::runner::Routine`] may fail with.
pub type Fault = Box<dyn std::error::Error + 'static>;

/// Render an error and everything that caused it as a single line.
pub(crate) fn describe(error: &dyn std::error::Error) -> String {
    let mut msg = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }

    msg
}
