pub mod cache;
pub mod checker;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod report;
pub mod scheduler;
pub mod sitemap;

pub use cache::{CacheStats, LruCache};
pub use checker::{CheckOutcome, Verdict, check_link, is_cascade_login};
pub use config::{CacheConfig, CacheMode, CheckerConfig, ConfigError, CrawlConfig};
pub use engine::{CrawlReport, PageRow, RunSummary, ViolationKind, ViolationRow, crawl_all};
pub use fetch::{FetchFailure, FetchedPage, Fetcher, HttpFetcher};
pub use scheduler::{SchedulerMode, order_urls};
