//! Two-level pagination crawl: walker, queues, and orchestration.

mod finder;
mod queue;
mod walker;

pub use finder::{CrawlPlan, LinkFinder};
pub use queue::WorkQueue;
pub use walker::{PageWalker, WalkOutcome};
