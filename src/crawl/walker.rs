//! Pagination state machine.
//!
//! A [`PageWalker`] drives one chain of pages: navigate to the start URL,
//! apply the optional fixed path of selector hops, then alternate between
//! invoking the per-page callback and following the "next page" selector.
//! Reaching the end of a chain is the expected termination, not an error:
//! selector absent, no match, malformed reference, or a repeated URL all
//! mean `Terminal`.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::render::RenderSession;

/// States of one pagination traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WalkerState {
    /// A page is loaded and ready for the per-page callback.
    Positioned,
    /// Following the next-page reference.
    Advancing(String),
    /// The chain is exhausted.
    Terminal,
}

/// Summary of one completed chain traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkOutcome {
    /// Pages on which the callback was invoked.
    pub pages_visited: usize,
}

/// Walks one chain of pages via a "next page" selector.
#[derive(Debug, Clone)]
pub struct PageWalker {
    next_selector: Option<String>,
    path: Vec<String>,
}

impl PageWalker {
    /// Creates a walker following `next_selector` between pages.
    ///
    /// `path` is an optional sequence of fixed selector hops applied after
    /// the initial navigation, before pagination begins (used when a
    /// container's first reachable page requires intermediate navigation).
    /// With no next selector the walker visits exactly the start page.
    #[must_use]
    pub fn new(next_selector: Option<String>, path: Vec<String>) -> Self {
        Self {
            next_selector,
            path,
        }
    }

    /// Runs the chain starting at `start_url`, invoking `on_page` once per
    /// visited page.
    ///
    /// An initial navigation failure terminates the chain with zero pages
    /// visited (logged, not fatal). A next-page URL already seen in this
    /// chain terminates the walk rather than looping.
    pub async fn walk<F>(
        &self,
        session: &mut (dyn RenderSession),
        start_url: &str,
        mut on_page: F,
    ) -> WalkOutcome
    where
        F: FnMut(&dyn RenderSession) + Send,
    {
        let mut outcome = WalkOutcome::default();

        if let Err(e) = session.navigate(start_url).await {
            warn!(url = %start_url, error = %e, "chain start unreachable, terminating walk");
            return outcome;
        }

        if !self.apply_path(session).await {
            return outcome;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut state = WalkerState::Positioned;

        loop {
            match state {
                WalkerState::Positioned => {
                    if let Some(url) = session.current_url() {
                        visited.insert(url.as_str().to_string());
                    }
                    on_page(&*session);
                    outcome.pages_visited += 1;
                    state = self.next_state(session, &visited);
                }
                WalkerState::Advancing(url) => match session.navigate(&url).await {
                    Ok(()) => state = WalkerState::Positioned,
                    Err(e) => {
                        warn!(url = %url, error = %e, "next page unreachable, terminating walk");
                        state = WalkerState::Terminal;
                    }
                },
                WalkerState::Terminal => {
                    debug!(pages = outcome.pages_visited, "pagination chain terminal");
                    return outcome;
                }
            }
        }
    }

    /// Applies the fixed path hops. Returns false when a hop is missing,
    /// which terminates the walk before any page is visited.
    async fn apply_path(&self, session: &mut (dyn RenderSession)) -> bool {
        for hop in &self.path {
            let target = match session.find_attribute(hop, "href") {
                Ok(Some(target)) => target,
                Ok(None) => {
                    debug!(selector = %hop, "path hop matched nothing, terminating walk");
                    return false;
                }
                Err(e) => {
                    warn!(selector = %hop, error = %e, "path hop failed, terminating walk");
                    return false;
                }
            };
            if let Err(e) = session.navigate(&target).await {
                warn!(url = %target, error = %e, "path hop unreachable, terminating walk");
                return false;
            }
        }
        true
    }

    /// Decides the transition out of `Positioned`: advance to the next
    /// page's URL, or go terminal when the selector is absent, matches
    /// nothing, references a malformed URL, or cycles back.
    fn next_state(
        &self,
        session: &dyn RenderSession,
        visited: &HashSet<String>,
    ) -> WalkerState {
        let Some(selector) = &self.next_selector else {
            return WalkerState::Terminal;
        };

        match session.find_attribute(selector, "href") {
            Ok(Some(next)) => {
                if visited.contains(&next) {
                    debug!(url = %next, "next page already visited, breaking cycle");
                    WalkerState::Terminal
                } else {
                    WalkerState::Advancing(next)
                }
            }
            Ok(None) => WalkerState::Terminal,
            Err(e) => {
                warn!(selector = %selector, error = %e, "next-page lookup failed");
                WalkerState::Terminal
            }
        }
    }
}
