//! Error types for the render capability.

use thiserror::Error;

/// Errors raised by a [`crate::render::RenderSession`] implementation.
///
/// A selector that matches nothing is NOT an error - queries return empty
/// results and lookups return `None` in that case. These variants cover the
/// conditions a caller genuinely cannot proceed past.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Network-level failure while navigating to a page.
    #[error("navigation failed for {url}: {source}")]
    Navigation {
        /// The URL that failed to load.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The page responded with an error status.
    #[error("HTTP {status} loading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL to navigate to is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The malformed URL string.
        url: String,
    },

    /// A selector expression failed to parse.
    #[error("invalid selector: {selector}")]
    InvalidSelector {
        /// The selector expression.
        selector: String,
    },

    /// An interaction target (form field, submit element) was not found.
    ///
    /// Only `fill` and `click` raise this; plain queries report absence as
    /// empty results instead.
    #[error("no element matches selector: {selector}")]
    NoMatch {
        /// The selector that matched nothing.
        selector: String,
    },

    /// The session has no loaded page to operate on.
    #[error("no page loaded")]
    NoPage,
}

impl RenderError {
    /// Creates a navigation error.
    pub fn navigation(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Navigation {
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

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid-selector error.
    pub fn invalid_selector(selector: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
        }
    }

    /// Creates a no-match error for a required interaction target.
    pub fn no_match(selector: impl Into<String>) -> Self {
        Self::NoMatch {
            selector: selector.into(),
        }
    }
}
