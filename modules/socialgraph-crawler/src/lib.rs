pub mod engine;
pub mod fetcher;
pub mod report;
pub mod sink;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod visited;

pub use engine::{CrawlConfig, CrawlReport, CrawlStats, Crawler};
pub use fetcher::RateLimitedFetcher;
pub use sink::UpsertSink;
pub use visited::VisitedRegistry;
