//! Shared test support: a scripted render capability over an in-memory site.
//!
//! `FakeSite` holds pages as selector → element-attribute fixtures, and
//! hands out `FakeSession` instances through a `FakeFactory` so pool and
//! crawl tests run without any real HTML engine. The shared state also
//! tracks session concurrency so tests can assert the pool invariant.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use content_downloader::render::{RenderError, RenderSession, SessionFactory};

/// One scripted element: attribute name → value.
type FakeElement = (String, String);

/// A page maps selector expressions to the elements they match.
#[derive(Debug, Default, Clone)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakePage {
    /// Adds one element with a single attribute under `selector`.
    #[must_use]
    pub fn with(mut self, selector: &str, attr: &str, value: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push((attr.to_string(), value.to_string()));
        self
    }
}

/// Shared scripted-site state, including concurrency instrumentation.
#[derive(Debug, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
    /// How long each navigation takes; nonzero values make concurrent
    /// walks overlap so `max_active` is meaningful.
    pub navigation_delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    created_sessions: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, url: &str, page: FakePage) {
        self.pages.insert(url.to_string(), page);
    }

    /// Highest number of sessions navigating at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Total sessions the factory created.
    pub fn created_sessions(&self) -> usize {
        self.created_sessions.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    url: Option<Url>,
    alive: bool,
}

impl FakeSession {
    fn page(&self) -> Option<&FakePage> {
        let url = self.url.as_ref()?;
        self.site.pages.get(url.as_str())
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let active = self.site.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.site.navigation_delay.is_zero() {
            tokio::time::sleep(self.site.navigation_delay).await;
        }
        self.site.active.fetch_sub(1, Ordering::SeqCst);

        if !self.site.pages.contains_key(url) {
            return Err(RenderError::http_status(url, 404));
        }
        self.url = Some(Url::parse(url).map_err(|_| RenderError::invalid_url(url))?);
        Ok(())
    }

    fn current_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn query_attributes(
        &self,
        selector: &str,
        attrs: &[&str],
    ) -> Result<Vec<String>, RenderError> {
        let Some(page) = self.page() else {
            return Err(RenderError::NoPage);
        };
        let mut values = Vec::new();
        if let Some(elements) = page.elements.get(selector) {
            for attr in attrs {
                for (name, value) in elements {
                    if name == attr && !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
        }
        Ok(values)
    }

    fn find_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>, RenderError> {
        Ok(self.query_attributes(selector, &[attr])?.into_iter().next())
    }

    fn fill(&mut self, selector: &str, _value: &str) -> Result<(), RenderError> {
        match self.page().and_then(|p| p.elements.get(selector)) {
            Some(_) => Ok(()),
            None => Err(RenderError::no_match(selector)),
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        match self.page().and_then(|p| p.elements.get(selector)) {
            Some(_) => Ok(()),
            None => Err(RenderError::no_match(selector)),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn dispose(&mut self) {
        self.alive = false;
    }
}

pub struct FakeFactory {
    site: Arc<FakeSite>,
}

impl FakeFactory {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        self.site.created_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.site),
            url: None,
            alive: true,
        }))
    }
}
