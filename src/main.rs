//! CLI entry point for the content downloader.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use content_downloader::crawl::{CrawlPlan, LinkFinder, WorkQueue};
use content_downloader::progress::spawn_reporter;
use content_downloader::{Downloader, HtmlSessionFactory, RunContext, SessionPool};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let use_spinner = !args.quiet;
    let config = args.into_config()?;
    debug!(?config, "configuration validated");
    info!(url = %config.root_url, "content downloader starting");

    // Startup-fatal: an uncreatable output directory aborts the run.
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let pool = SessionPool::new(
        config.threads,
        Box::new(HtmlSessionFactory::new()),
        config.auth.clone(),
    );

    // Startup-fatal: surface an unreachable or malformed auth target before
    // any crawl work begins.
    if config.auth.is_some() {
        pool.warm_up()
            .await
            .context("authentication replay failed")?;
    }

    let ctx = Arc::new(RunContext::new());
    let targets = Arc::new(WorkQueue::new());

    let plan = CrawlPlan {
        root_url: config.root_url.to_string(),
        link_selector: config.link_selector.clone(),
        container_selector: config.container_selector.clone(),
        next_container_selector: config.next_container_selector.clone(),
        next_links_selector: config.next_links_selector.clone(),
        container_path: config.container_path.clone(),
    };
    let finder = LinkFinder::new(
        pool.clone(),
        Arc::clone(&ctx),
        Arc::clone(&targets),
        plan,
        config.threads,
    );
    let downloader = Downloader::new(
        config.threads,
        config.output_dir.clone(),
        config.filename_segments,
        config.policy,
        config.max_attempts,
    )?;

    let (reporter, stop) = spawn_reporter(
        use_spinner,
        Arc::clone(&ctx),
        Arc::clone(&targets),
        pool.clone(),
    );

    let (find_result, download_result) = tokio::join!(
        finder.run(),
        downloader.run(Arc::clone(&targets), Arc::clone(&ctx)),
    );

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = reporter {
        let _ = handle.await;
    }
    pool.shutdown();

    find_result.context("discovery failed")?;
    download_result.context("download pool failed")?;

    info!(
        downloaded = ctx.downloaded(),
        skipped = ctx.skipped(),
        failed = ctx.failed(),
        total = ctx.total_discovered(),
        elapsed_secs = ctx.elapsed().as_secs(),
        "finished"
    );
    Ok(())
}
