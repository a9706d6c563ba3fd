//! Bounded download worker pool.
//!
//! A dispatch loop pulls targets off the shared queue and spawns one task
//! per target, gated by a semaphore sized to the configured worker count -
//! backpressure is explicit, there is no fire-and-forget dispatch. Each
//! task streams the resource into a temp file inside the output directory
//! and moves it into place under the configured collision policy. Transient
//! fetch failures re-enqueue the target up to a bounded attempt count.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use super::error::FetchError;
use super::filename::{candidate_filename, next_free_path, path_exists};
use crate::config::CollisionPolicy;
use crate::context::RunContext;
use crate::crawl::WorkQueue;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Poll interval of the dispatch loop while the queue is empty.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Connect timeout for resource fetches, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for resource fetches, in seconds. Generous for large files.
const READ_TIMEOUT_SECS: u64 = 300;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// One pending download: a resolved URL plus its attempt count.
///
/// Consumed exactly once by a worker, or re-enqueued with a bumped attempt
/// count on transient failure. Terminal outcomes (downloaded, skipped,
/// failed) are counted exactly once per target regardless of retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// The resolved resource URL.
    pub url: String,
    /// Completed fetch attempts so far.
    pub attempts: u32,
}

impl DownloadTarget {
    /// Creates a fresh target with zero attempts.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 0,
        }
    }

    /// The same target with one more completed attempt.
    #[must_use]
    pub fn bump(mut self) -> Self {
        self.attempts += 1;
        self
    }
}

/// State shared by every download task.
struct WorkerShared {
    client: Client,
    output_dir: PathBuf,
    filename_segments: usize,
    policy: CollisionPolicy,
    max_attempts: u32,
    /// Serializes the read-then-write "first free name" search and the
    /// Ignore-policy existence re-check; two workers must never pick the
    /// same destination.
    rename_lock: Mutex<()>,
    temp_seq: AtomicU64,
}

/// Bounded worker pool fetching targets and writing them atomically.
pub struct Downloader {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    shared: Arc<WorkerShared>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("concurrency", &self.concurrency)
            .field("output_dir", &self.shared.output_dir)
            .field("policy", &self.shared.policy)
            .field("max_attempts", &self.shared.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a download pool writing into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is
    /// outside 1-100.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[allow(clippy::expect_used)]
    pub fn new(
        concurrency: usize,
        output_dir: PathBuf,
        filename_segments: usize,
        policy: CollisionPolicy,
        max_attempts: u32,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");

        debug!(
            concurrency,
            ?policy,
            max_attempts,
            output_dir = %output_dir.display(),
            "creating download pool"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            shared: Arc::new(WorkerShared {
                client,
                output_dir,
                filename_segments,
                policy,
                max_attempts: max_attempts.max(1),
                rename_lock: Mutex::new(()),
                temp_seq: AtomicU64::new(0),
            }),
        })
    }

    /// The configured worker slot count.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Processes the target queue until discovery has finished and every
    /// target reached a terminal outcome.
    ///
    /// The loop dequeues one target at a time, acquires a worker slot
    /// (waiting at the concurrency limit), and spawns the download task.
    /// An empty queue is only terminal once discovery is finished and no
    /// task is in flight - in-flight tasks may still re-enqueue retries.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the slot semaphore is
    /// closed. Individual download failures never fail the run; they are
    /// counted on the context.
    pub async fn run(
        &self,
        queue: Arc<WorkQueue<DownloadTarget>>,
        ctx: Arc<RunContext>,
    ) -> Result<(), EngineError> {
        info!(concurrency = self.concurrency, "download pool started");
        let mut handles = Vec::new();

        loop {
            if let Some(target) = queue.pop() {
                let permit = Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| EngineError::SemaphoreClosed)?;

                let shared = Arc::clone(&self.shared);
                let queue = Arc::clone(&queue);
                let ctx = Arc::clone(&ctx);
                handles.push(tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    process_target(&shared, &queue, &ctx, target).await;
                }));
            } else if ctx.discovery_finished()
                // Slot check precedes the emptiness check: once all permits
                // are free no task can re-enqueue, so a subsequently-empty
                // queue stays empty.
                && self.semaphore.available_permits() == self.concurrency
                && queue.is_empty()
            {
                break;
            } else {
                tokio::time::sleep(IDLE_POLL).await;
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }

        info!(
            downloaded = ctx.downloaded(),
            skipped = ctx.skipped(),
            failed = ctx.failed(),
            total = ctx.total_discovered(),
            "download pool drained"
        );
        Ok(())
    }
}

/// Drives one target to a terminal outcome or a retry re-enqueue.
async fn process_target(
    shared: &WorkerShared,
    queue: &WorkQueue<DownloadTarget>,
    ctx: &RunContext,
    target: DownloadTarget,
) {
    let Ok(parsed) = url::Url::parse(&target.url) else {
        warn!(url = %target.url, "malformed target URL, counting as failed");
        ctx.record_failed();
        return;
    };

    let filename = candidate_filename(&parsed, shared.filename_segments);
    let final_path = shared.output_dir.join(&filename);

    // Ignore policy short-circuits before any network traffic.
    if shared.policy == CollisionPolicy::Ignore && path_exists(&final_path).await {
        debug!(path = %final_path.display(), "destination exists, skipping fetch");
        ctx.record_skipped();
        return;
    }

    let temp_path = shared
        .output_dir
        .join(format!(".{:06}.part", shared.temp_seq.fetch_add(1, Ordering::SeqCst)));

    match fetch_to_temp(&shared.client, &target.url, &temp_path).await {
        Ok(()) => match place_file(shared, &temp_path, &filename, &final_path).await {
            Ok(placed) => {
                if placed {
                    debug!(url = %target.url, path = %final_path.display(), "download completed");
                    ctx.record_downloaded();
                } else {
                    ctx.record_skipped();
                }
            }
            Err(e) => {
                warn!(url = %target.url, error = %e, "failed to move download into place");
                remove_temp(&temp_path).await;
                ctx.record_failed();
            }
        },
        Err(e) if e.is_transient() && target.attempts + 1 < shared.max_attempts => {
            warn!(
                url = %target.url,
                attempt = target.attempts + 1,
                max_attempts = shared.max_attempts,
                error = %e,
                "transient fetch failure, re-enqueueing"
            );
            queue.push(target.bump());
        }
        Err(e) => {
            warn!(
                url = %target.url,
                attempts = target.attempts + 1,
                error = %e,
                "download failed after all attempts"
            );
            ctx.record_failed();
        }
    }
}

/// Streams an HTTP GET into `temp_path`. The temp file is removed on error.
async fn fetch_to_temp(client: &Client, url: &str, temp_path: &Path) -> Result<(), FetchError> {
    let result = stream_response(client, url, temp_path).await;
    if result.is_err() {
        remove_temp(temp_path).await;
    }
    result
}

async fn stream_response(client: &Client, url: &str, temp_path: &Path) -> Result<(), FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::network(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::http_status(url, status.as_u16()));
    }

    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| FetchError::io(temp_path, e))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(temp_path, e))?;
    }

    file.flush()
        .await
        .map_err(|e| FetchError::io(temp_path, e))?;
    Ok(())
}

/// Moves the temp file to its destination under the collision policy.
///
/// Returns `true` when the file was placed (counts as downloaded) and
/// `false` when the Ignore policy dropped it (counts as skipped).
async fn place_file(
    shared: &WorkerShared,
    temp_path: &Path,
    filename: &str,
    final_path: &Path,
) -> Result<bool, FetchError> {
    match shared.policy {
        CollisionPolicy::Overwrite => {
            tokio::fs::rename(temp_path, final_path)
                .await
                .map_err(|e| FetchError::io(final_path, e))?;
            Ok(true)
        }
        CollisionPolicy::Rename => {
            // Critical section: the free-name search re-checks existence on
            // every increment and must not race another worker's rename.
            let _guard = shared.rename_lock.lock().await;
            let destination = next_free_path(&shared.output_dir, filename).await;
            tokio::fs::rename(temp_path, &destination)
                .await
                .map_err(|e| FetchError::io(&destination, e))?;
            Ok(true)
        }
        CollisionPolicy::Ignore => {
            // Re-check under the lock: the destination may have appeared
            // while this worker was fetching.
            let _guard = shared.rename_lock.lock().await;
            if path_exists(final_path).await {
                remove_temp(temp_path).await;
                return Ok(false);
            }
            tokio::fs::rename(temp_path, final_path)
                .await
                .map_err(|e| FetchError::io(final_path, e))?;
            Ok(true)
        }
    }
}

async fn remove_temp(temp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
    }
}
