//! Two-level crawl orchestration.
//!
//! [`LinkFinder`] runs one outer walk over the root pagination chain and a
//! fixed set of inner-walk workers. The outer walk discovers container URLs
//! and feeds them to the workers through the container queue; every visited
//! page (outer and inner) is also scanned for downloadable links, which are
//! emitted to the download target queue.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::crawl::queue::WorkQueue;
use crate::crawl::walker::PageWalker;
use crate::download::DownloadTarget;
use crate::render::RenderSession;
use crate::session::{SessionError, SessionPool};

/// Backoff applied by an inner worker when the container queue is empty but
/// the outer walk may still produce more containers.
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_secs(1);

/// Attributes read off link elements. A resource link may carry its URL in
/// either, so both are read and the results deduplicated.
const LINK_ATTRS: [&str; 2] = ["href", "src"];

/// Selectors and the root URL driving one crawl.
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    /// Start URL for the outer chain.
    pub root_url: String,
    /// Selector for downloadable-resource links.
    pub link_selector: String,
    /// Selector for container links on outer pages.
    pub container_selector: Option<String>,
    /// Next-page selector for the outer chain.
    pub next_container_selector: Option<String>,
    /// Next-page selector for inner chains; when absent, each container
    /// chain ends after its first page.
    pub next_links_selector: Option<String>,
    /// Fixed selector hops applied inside each container before pagination.
    pub container_path: Vec<String>,
}

/// Orchestrates the outer walk and `workers` concurrent inner walks.
pub struct LinkFinder {
    pool: SessionPool,
    ctx: Arc<RunContext>,
    containers: Arc<WorkQueue<String>>,
    targets: Arc<WorkQueue<DownloadTarget>>,
    plan: Arc<CrawlPlan>,
    workers: usize,
}

impl LinkFinder {
    /// Creates a finder emitting discovered links to `targets`.
    #[must_use]
    pub fn new(
        pool: SessionPool,
        ctx: Arc<RunContext>,
        targets: Arc<WorkQueue<DownloadTarget>>,
        plan: CrawlPlan,
        workers: usize,
    ) -> Self {
        Self {
            pool,
            ctx,
            containers: Arc::new(WorkQueue::new()),
            targets,
            plan: Arc::new(plan),
            workers,
        }
    }

    /// Containers discovered but not yet walked. Exposed for observability.
    #[must_use]
    pub fn pending_containers(&self) -> usize {
        self.containers.len()
    }

    /// Runs discovery to completion.
    ///
    /// Spawns the inner workers, drives the outer walk on the calling task,
    /// marks `containers_finished` once the outer chain is exhausted, joins
    /// the workers, and finally marks `discovery_finished`. The flags are
    /// set even on the error path so downstream consumers can drain.
    ///
    /// # Errors
    ///
    /// Returns the first [`SessionError`] hit by the outer walk or any
    /// inner worker; session errors mid-run mean the engine itself is
    /// broken, not that a chain ended.
    pub async fn run(&self) -> Result<(), SessionError> {
        let mut handles = Vec::new();
        for worker_id in 0..self.workers {
            handles.push(self.spawn_inner_worker(worker_id));
        }

        let outer_result = self.outer_walk().await;
        self.ctx.finish_containers();
        debug!("outer walk finished, container discovery complete");

        let mut first_error = outer_result.err();
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => warn!(error = %e, "inner walk worker panicked"),
            }
        }

        self.ctx.finish_discovery();
        info!(
            total_links = self.ctx.total_discovered(),
            "discovery finished"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Walks the root chain: containers are enqueued, and leaf links found
    /// directly on outer pages are emitted as well.
    async fn outer_walk(&self) -> Result<(), SessionError> {
        let mut lease = self.pool.acquire().await?;
        let walker = PageWalker::new(self.plan.next_container_selector.clone(), Vec::new());

        let plan = Arc::clone(&self.plan);
        let containers = Arc::clone(&self.containers);
        let targets = Arc::clone(&self.targets);
        let ctx = Arc::clone(&self.ctx);

        walker
            .walk(&mut *lease, &self.plan.root_url, move |page| {
                if let Some(selector) = &plan.container_selector {
                    enqueue_containers(page, selector, &containers);
                }
                emit_links(page, &plan.link_selector, &targets, &ctx);
            })
            .await;
        Ok(())
    }

    /// One inner worker: drain container URLs, walking each one's chain.
    /// An empty queue is only terminal once the outer walk has finished;
    /// before that the worker backs off and retries, so it never exits
    /// while more containers might still arrive.
    fn spawn_inner_worker(
        &self,
        worker_id: usize,
    ) -> tokio::task::JoinHandle<Result<(), SessionError>> {
        let pool = self.pool.clone();
        let ctx = Arc::clone(&self.ctx);
        let containers = Arc::clone(&self.containers);
        let targets = Arc::clone(&self.targets);
        let plan = Arc::clone(&self.plan);

        tokio::spawn(async move {
            let walker = PageWalker::new(
                plan.next_links_selector.clone(),
                plan.container_path.clone(),
            );
            loop {
                let Some(container_url) = containers.pop() else {
                    if ctx.containers_finished() {
                        break;
                    }
                    tokio::time::sleep(EMPTY_QUEUE_BACKOFF).await;
                    continue;
                };

                debug!(worker_id, url = %container_url, "walking container");
                let mut lease = pool.acquire().await?;
                let targets = Arc::clone(&targets);
                let ctx = Arc::clone(&ctx);
                let link_selector = plan.link_selector.clone();
                walker
                    .walk(&mut *lease, &container_url, move |page| {
                        emit_links(page, &link_selector, &targets, &ctx);
                    })
                    .await;
            }
            debug!(worker_id, "inner walk worker exited");
            Ok(())
        })
    }
}

/// Enqueues every container link found on an outer page.
fn enqueue_containers(
    page: &dyn RenderSession,
    selector: &str,
    containers: &WorkQueue<String>,
) {
    match page.query_attributes(selector, &["href"]) {
        Ok(links) => {
            for link in links {
                debug!(url = %link, "container discovered");
                containers.push(link);
            }
        }
        Err(e) => warn!(selector = %selector, error = %e, "container query failed"),
    }
}

/// Emits a download target for every resource link on the page, counting
/// each emission.
fn emit_links(
    page: &dyn RenderSession,
    selector: &str,
    targets: &WorkQueue<DownloadTarget>,
    ctx: &RunContext,
) {
    match page.query_attributes(selector, &LINK_ATTRS) {
        Ok(links) => {
            for link in links {
                debug!(url = %link, "download link discovered");
                targets.push(DownloadTarget::new(link));
                ctx.record_discovered();
            }
        }
        Err(e) => warn!(selector = %selector, error = %e, "link query failed"),
    }
}
