//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching and persisting one target.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// interrupted body stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create temp file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Whether a retry could plausibly succeed: transport failures and
    /// server-side statuses are transient; client errors, IO failures, and
    /// malformed URLs are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Io { .. } | Self::InvalidUrl { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        assert!(FetchError::http_status("https://example.com/a", 500).is_transient());
        assert!(FetchError::http_status("https://example.com/a", 503).is_transient());
        assert!(FetchError::http_status("https://example.com/a", 429).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!FetchError::http_status("https://example.com/a", 404).is_transient());
        assert!(!FetchError::http_status("https://example.com/a", 403).is_transient());
    }

    #[test]
    fn test_io_and_invalid_url_are_permanent() {
        let io = FetchError::io("/tmp/x", std::io::Error::other("disk full"));
        assert!(!io.is_transient());
        assert!(!FetchError::invalid_url("not a url").is_transient());
    }

    #[test]
    fn test_display_includes_url_and_status() {
        let error = FetchError::http_status("https://example.com/file.jpg", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/file.jpg"),
            "Expected URL in: {msg}"
        );
    }
}
