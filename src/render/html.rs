//! Lightweight HTML render engine backed by reqwest + scraper.
//!
//! [`HtmlSession`] keeps the raw HTML of the current page and evaluates CSS
//! selectors against it on demand. Form interaction is approximated the way
//! a non-scripting engine can: filled fields are remembered and submitted as
//! a form request when the submit element is clicked. Cookies persist for
//! the lifetime of the session, so a login survives later navigations.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::error::RenderError;
use super::{RenderSession, SessionFactory};

/// Default connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout in seconds.
const READ_TIMEOUT_SECS: u64 = 300;

/// A render session over plain HTML: no scripting, no layout.
pub struct HtmlSession {
    client: Client,
    url: Option<Url>,
    body: String,
    pending_fields: Vec<(String, String)>,
    alive: bool,
}

impl std::fmt::Debug for HtmlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlSession")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

impl HtmlSession {
    /// Creates a session around an existing HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: None,
            body: String::new(),
            pending_fields: Vec::new(),
            alive: true,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_page(url: &str, body: &str) -> Self {
        let mut session = Self::new(Client::new());
        session.url = Some(Url::parse(url).unwrap_or_else(|_| unreachable!("test URL")));
        session.body = body.to_string();
        session
    }

    fn parse_selector(selector: &str) -> Result<Selector, RenderError> {
        Selector::parse(selector).map_err(|_| RenderError::invalid_selector(selector))
    }

    fn base_url(&self) -> Result<&Url, RenderError> {
        self.url.as_ref().ok_or(RenderError::NoPage)
    }

    /// Resolves a raw attribute value against the current page URL.
    /// Anchors and non-navigable schemes yield `None`.
    fn resolve(base: &Url, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.starts_with('#')
            || raw.starts_with("mailto:")
            || raw.starts_with("tel:")
            || raw.starts_with("javascript:")
        {
            return None;
        }
        base.join(raw).ok().map(Into::into)
    }

    async fn load(&mut self, url: Url) -> Result<(), RenderError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RenderError::navigation(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::http_status(url.as_str(), status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| RenderError::navigation(final_url.as_str(), e))?;

        debug!(url = %final_url, bytes = body.len(), "page loaded");
        self.url = Some(final_url);
        self.body = body;
        Ok(())
    }
}

#[async_trait]
impl RenderSession for HtmlSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let parsed = Url::parse(url).map_err(|_| RenderError::invalid_url(url))?;
        self.load(parsed).await
    }

    fn current_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn query_attributes(
        &self,
        selector: &str,
        attrs: &[&str],
    ) -> Result<Vec<String>, RenderError> {
        let base = self.base_url()?.clone();
        let parsed = Self::parse_selector(selector)?;
        let document = Html::parse_document(&self.body);

        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for attr in attrs {
            for element in document.select(&parsed) {
                let Some(raw) = element.value().attr(attr) else {
                    continue;
                };
                let Some(resolved) = Self::resolve(&base, raw) else {
                    continue;
                };
                if seen.insert(resolved.clone()) {
                    values.push(resolved);
                }
            }
        }
        Ok(values)
    }

    fn find_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, RenderError> {
        let base = self.base_url()?.clone();
        let parsed = Self::parse_selector(selector)?;
        let document = Html::parse_document(&self.body);

        let found = document
            .select(&parsed)
            .find_map(|element| element.value().attr(attr))
            .and_then(|raw| Self::resolve(&base, raw));
        Ok(found)
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<(), RenderError> {
        self.base_url()?;
        let parsed = Self::parse_selector(selector)?;
        let field_name = {
            let document = Html::parse_document(&self.body);
            let element = document
                .select(&parsed)
                .next()
                .ok_or_else(|| RenderError::no_match(selector))?;
            element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("id"))
                .ok_or_else(|| RenderError::no_match(selector))?
                .to_string()
        };
        self.pending_fields.push((field_name, value.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        let base = self.base_url()?.clone();
        let parsed = Self::parse_selector(selector)?;

        // Extract form target before any await: scraper documents are not Send.
        let (action, is_post) = {
            let document = Html::parse_document(&self.body);
            let target = document
                .select(&parsed)
                .next()
                .ok_or_else(|| RenderError::no_match(selector))?;

            // The enclosing form, or the document's first form as fallback.
            let form_selector =
                Selector::parse("form").map_err(|_| RenderError::invalid_selector("form"))?;
            let enclosing = target
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "form");
            let form = enclosing.or_else(|| document.select(&form_selector).next());

            let action = form
                .and_then(|f| f.value().attr("action"))
                .and_then(|raw| Self::resolve(&base, raw))
                .unwrap_or_else(|| base.as_str().to_string());
            let is_post = form
                .and_then(|f| f.value().attr("method"))
                .is_some_and(|m| m.eq_ignore_ascii_case("post"));
            (action, is_post)
        };

        let action_url =
            Url::parse(&action).map_err(|_| RenderError::invalid_url(action.clone()))?;
        let fields = std::mem::take(&mut self.pending_fields);

        debug!(action = %action_url, post = is_post, fields = fields.len(), "submitting form");
        let request = if is_post {
            self.client.post(action_url.clone()).form(&fields)
        } else {
            self.client.get(action_url.clone()).query(&fields)
        };

        let response = request
            .send()
            .await
            .map_err(|e| RenderError::navigation(action_url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::http_status(action_url.as_str(), status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| RenderError::navigation(final_url.as_str(), e))?;
        self.url = Some(final_url);
        self.body = body;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn dispose(&mut self) {
        self.alive = false;
        self.body.clear();
        self.pending_fields.clear();
    }
}

/// Factory producing [`HtmlSession`] instances, one cookie jar each.
///
/// Every session gets its own client so authentication state is strictly
/// per-session, matching the pool invariant that a session is authenticated
/// once at creation and never shared.
#[derive(Debug, Clone)]
pub struct HtmlSessionFactory {
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
}

impl Default for HtmlSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSessionFactory {
    /// Creates a factory with default timeouts (30s connect, 5min read).
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }

    /// Creates a factory with explicit timeout values.
    #[must_use]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self {
            connect_timeout_secs,
            read_timeout_secs,
        }
    }
}

#[async_trait]
impl SessionFactory for HtmlSessionFactory {
    #[allow(clippy::expect_used)]
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(std::time::Duration::from_secs(self.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(self.read_timeout_secs))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Ok(Box::new(HtmlSession::new(client)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GALLERY: &str = r##"
        <html><body>
          <div class="album"><a href="/albums/1">one</a></div>
          <div class="album"><a href="/albums/2">two</a></div>
          <a class="download" href="/files/a.jpg">a</a>
          <img class="download" src="/files/b.jpg">
          <a class="download" href="/files/a.jpg">duplicate</a>
          <a rel="next" href="/gallery?page=2">next</a>
          <a class="broken" href="#top">anchor</a>
        </body></html>
    "##;

    #[test]
    fn test_query_attributes_resolves_and_deduplicates() {
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        let values = session
            .query_attributes("a.download, img.download", &["href", "src"])
            .unwrap();
        assert_eq!(
            values,
            vec![
                "https://example.com/files/a.jpg".to_string(),
                "https://example.com/files/b.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_query_attributes_empty_when_nothing_matches() {
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        let values = session.query_attributes("a.missing", &["href"]).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_query_attributes_invalid_selector_is_error() {
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        let result = session.query_attributes(":::bad", &["href"]);
        assert!(matches!(result, Err(RenderError::InvalidSelector { .. })));
    }

    #[test]
    fn test_query_before_navigation_is_no_page() {
        let session = HtmlSession::new(Client::new());
        let result = session.query_attributes("a", &["href"]);
        assert!(matches!(result, Err(RenderError::NoPage)));
    }

    #[test]
    fn test_find_attribute_returns_first_match_resolved() {
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        let next = session.find_attribute("a[rel=next]", "href").unwrap();
        assert_eq!(next.as_deref(), Some("https://example.com/gallery?page=2"));
    }

    #[test]
    fn test_find_attribute_none_when_selector_absent() {
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        assert!(session.find_attribute("a.nope", "href").unwrap().is_none());
    }

    #[test]
    fn test_find_attribute_none_for_anchor_reference() {
        // "#top" resolves to nothing navigable - the distinguishable not-found.
        let session = HtmlSession::with_page("https://example.com/gallery", GALLERY);
        assert!(session.find_attribute("a.broken", "href").unwrap().is_none());
    }

    #[test]
    fn test_fill_records_field_by_name() {
        let login_page = r#"
            <form action="/login" method="post">
              <input id="user-box" name="username">
              <input id="pass-box" name="password" type="password">
              <button id="go" type="submit">Sign in</button>
            </form>
        "#;
        let mut session = HtmlSession::with_page("https://example.com/login", login_page);
        session.fill("#user-box", "alice").unwrap();
        session.fill("#pass-box", "secret").unwrap();
        assert_eq!(
            session.pending_fields,
            vec![
                ("username".to_string(), "alice".to_string()),
                ("password".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_fill_missing_field_is_no_match() {
        let mut session = HtmlSession::with_page("https://example.com/login", "<form></form>");
        let result = session.fill("#user-box", "alice");
        assert!(matches!(result, Err(RenderError::NoMatch { .. })));
    }

    #[test]
    fn test_navigate_invalid_url_rejected() {
        let mut session = HtmlSession::new(Client::new());
        let result = tokio_test::block_on(session.navigate("not-a-url"));
        assert!(matches!(result, Err(RenderError::InvalidUrl { .. })));
    }

    #[test]
    fn test_dispose_marks_session_dead() {
        let mut session = HtmlSession::with_page("https://example.com/", "<html></html>");
        assert!(session.is_alive());
        session.dispose();
        assert!(!session.is_alive());
        assert!(session.body.is_empty());
    }
}
