//! Page rendering capability.
//!
//! The crawl and session layers depend only on the [`RenderSession`] trait:
//! navigate to a URL, query attribute values by selector, and perform the
//! two interactions the login replay needs (fill a field, click an element).
//! The production implementation is [`HtmlSession`], a lightweight HTML
//! engine built on reqwest and scraper; tests substitute scripted sessions.

mod error;
mod html;

use async_trait::async_trait;
use url::Url;

pub use error::RenderError;
pub use html::{HtmlSession, HtmlSessionFactory};

/// An exclusive, reusable handle to a page-rendering capability.
///
/// Queries are synchronous over the currently loaded page; only operations
/// that touch the network are async. A selector that matches nothing yields
/// empty results or `None` - never an error.
#[async_trait]
pub trait RenderSession: Send {
    /// Loads the given URL, replacing the current page.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] on malformed URLs, transport failures, or
    /// error status codes.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// The URL of the currently loaded page, if any.
    fn current_url(&self) -> Option<&Url>;

    /// Collects the values of `attrs` from every element matching
    /// `selector`, resolved against the current page URL and deduplicated
    /// in document order. Empty when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSelector`] if the expression does not
    /// parse, or [`RenderError::NoPage`] before the first navigation.
    fn query_attributes(&self, selector: &str, attrs: &[&str])
    -> Result<Vec<String>, RenderError>;

    /// The named attribute of the first element matching `selector`,
    /// resolved against the current page URL. `None` is the distinguishable
    /// "not found" condition: selector absent, attribute missing, or the
    /// referenced URL malformed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSelector`] if the expression does not
    /// parse, or [`RenderError::NoPage`] before the first navigation.
    fn find_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, RenderError>;

    /// Fills the form field matching `selector` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoMatch`] when the field is absent - login
    /// replay cannot proceed without it.
    fn fill(&mut self, selector: &str, value: &str) -> Result<(), RenderError>;

    /// Clicks the element matching `selector`. For form submit elements this
    /// submits the enclosing form with the values filled so far.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoMatch`] when the element is absent, or a
    /// navigation error if the resulting request fails.
    async fn click(&mut self, selector: &str) -> Result<(), RenderError>;

    /// Whether the session is still usable.
    fn is_alive(&self) -> bool;

    /// Tears the session down. Idempotent; called exactly once per session
    /// at pool shutdown.
    fn dispose(&mut self);
}

/// Creates render sessions on demand for the pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Creates a fresh, unauthenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the underlying engine cannot be set up.
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}
