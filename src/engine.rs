use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::LruCache;
use crate::checker::{CheckOutcome, Verdict, check_link, is_cascade_login};
use crate::config::{CacheMode, ConfigError, CrawlConfig};
use crate::extract::extract_internal_links;
use crate::fetch::{FailingFetcher, Fetcher, HttpFetcher};
use crate::normalize::comparison_form;
use crate::scheduler::order_urls;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One row per crawled page.
#[derive(Debug, Clone, Serialize)]
pub struct PageRow {
    pub url: String,
    /// Reported status: the raw code, or 301 whenever the normalized final
    /// URL differs from the normalized request URL. A 200 that was reached
    /// through a redirect therefore reports as 301; downstream aggregates
    /// depend on this collapse.
    pub status: String,
    pub time_ms: String,
    pub thread: String,
    pub start_utc: String,
    pub end_utc: String,
    pub error: String,
    /// Empty when the page was not extracted (failure or non-HTML).
    pub internal_links_found: Option<usize>,
    pub final_url: String,
    pub content_type: String,
    /// Sorted `+`-joined distinct violation kinds on this page, or `none`.
    pub violation_summary: String,
    pub violations_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BrokenLink,
    CascadeLogin,
}

impl ViolationKind {
    pub fn label(self) -> &'static str {
        match self {
            ViolationKind::BrokenLink => "broken_link",
            ViolationKind::CascadeLogin => "cascade_login",
        }
    }
}

/// One row per offending page-to-link edge.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationRow {
    pub page_url: String,
    pub link_url: String,
    pub violation_type: ViolationKind,
    pub status: String,
    pub final_url: String,
    pub note: String,
}

/// One row per crawl invocation, appended to the summary CSV.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ts_utc: String,
    pub scheduler: String,
    pub threads: usize,
    pub delay_s: f64,
    pub urls_total: usize,
    pub duration_s: String,
    pub urls_per_s: String,
    pub broken_links_total: usize,
    pub cascade_logins_total: usize,
    pub pages_with_violations: usize,
    pub total_links_found: usize,
    pub cache_mode: String,
    pub cache_max_size: usize,
    pub cache_accesses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: String,
    /// Process sampling is an external collaborator; left empty here.
    pub cpu_percent_avg: String,
    pub memory_rss_mb: String,
}

pub struct CrawlReport {
    pub pages: Vec<PageRow>,
    pub violations: Vec<ViolationRow>,
    pub summary: RunSummary,
    pub throughput: f64,
}

// Completed work flowing from a worker to the collector. Rows travel over
// the channel instead of through lock-guarded shared lists.
struct WorkerReport {
    row: PageRow,
    violations: Vec<ViolationRow>,
}

/// Per-worker pacing clock. Owned state on the worker, never shared: the
/// enforced gap is between one worker's own consecutive requests, so global
/// throughput approximates threads / delay when the delay dominates.
struct RequestPacer {
    delay: Duration,
    last: Option<Instant>,
}

impl RequestPacer {
    fn new(delay_secs: f64) -> Self {
        Self {
            delay: Duration::from_secs_f64(delay_secs.max(0.0)),
            last: None,
        }
    }

    async fn pace(&mut self) {
        if self.delay.is_zero() {
            return;
        }
        let wait = match self.last {
            // The first request is also throttled by the full delay.
            None => self.delay,
            Some(last) => self.delay.saturating_sub(last.elapsed()),
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.last = Some(Instant::now());
    }
}

fn now_utc() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

fn error_row(url: String, thread: &str, start_utc: String, elapsed_ms: f64, error: String) -> PageRow {
    PageRow {
        url,
        status: String::new(),
        time_ms: format!("{elapsed_ms:.2}"),
        thread: thread.to_string(),
        start_utc,
        end_utc: now_utc(),
        error,
        internal_links_found: None,
        final_url: String::new(),
        content_type: String::new(),
        violation_summary: "none".to_string(),
        violations_count: 0,
    }
}

async fn check_page_links(
    page_url: &str,
    links: &[String],
    fetcher: &dyn Fetcher,
    cfg: &CrawlConfig,
    cache: Option<&LruCache<String, CheckOutcome>>,
) -> Vec<ViolationRow> {
    let mut violations = Vec::new();
    for link_url in links {
        // Mailto and friends are filtered upstream; re-checked for safety.
        if !link_url.starts_with("http://") && !link_url.starts_with("https://") {
            continue;
        }

        if is_cascade_login(link_url, &cfg.checker.cascade_login_patterns) {
            violations.push(ViolationRow {
                page_url: page_url.to_string(),
                link_url: link_url.clone(),
                violation_type: ViolationKind::CascadeLogin,
                status: String::new(),
                final_url: String::new(),
                note: "cascade login link".to_string(),
            });
            continue;
        }

        let outcome = check_link(link_url, fetcher, &cfg.checker, cache).await;
        if outcome.verdict == Verdict::BrokenLink {
            violations.push(ViolationRow {
                page_url: page_url.to_string(),
                link_url: link_url.clone(),
                violation_type: ViolationKind::BrokenLink,
                status: outcome.status.map(|s| s.to_string()).unwrap_or_default(),
                final_url: outcome.final_url,
                note: outcome.note,
            });
        }
    }
    violations
}

fn violation_summary(violations: &[ViolationRow]) -> String {
    if violations.is_empty() {
        return "none".to_string();
    }
    let mut kinds: Vec<&str> = violations
        .iter()
        .map(|v| v.violation_type.label())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    kinds.sort_unstable();
    kinds.join("+")
}

async fn page_worker(
    worker_id: usize,
    frontier: Arc<Mutex<VecDeque<String>>>,
    visited: Arc<Mutex<HashSet<String>>>,
    fetcher: Arc<dyn Fetcher>,
    cfg: Arc<CrawlConfig>,
    cache: Option<Arc<LruCache<String, CheckOutcome>>>,
    processed: Arc<AtomicUsize>,
    total: usize,
    tx: UnboundedSender<WorkerReport>,
) {
    let thread_name = format!("worker-{worker_id}");
    let mut pacer = RequestPacer::new(cfg.delay);

    loop {
        // Non-blocking pop; an empty frontier drains this worker.
        let url = {
            let mut queue = frontier.lock().expect("frontier lock poisoned");
            queue.pop_front()
        };
        let Some(url) = url else {
            break;
        };

        // Atomic check-and-insert under one lock: each URL is dispatched to
        // at most one worker for the lifetime of the run.
        let first_visit = {
            let mut seen = visited.lock().expect("visited lock poisoned");
            seen.insert(url.clone())
        };
        if !first_visit {
            continue;
        }

        pacer.pace().await;

        let start_utc = now_utc();
        let started = Instant::now();

        let report = match fetcher.fetch(&url).await {
            Err(failure) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                debug!(url = %url, note = %failure.note(), "page fetch failed");
                WorkerReport {
                    row: error_row(url, &thread_name, start_utc, elapsed_ms, failure.note()),
                    violations: Vec::new(),
                }
            }
            Ok(page) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

                // Collapse any effective redirect to a reported 301, even
                // when the raw status of the final hop is 200.
                let report_status = if comparison_form(&url) != comparison_form(&page.final_url) {
                    301
                } else {
                    page.status
                };

                let is_html = page.content_type.to_ascii_lowercase().contains("text/html");
                let mut links_found = None;
                let mut violations = Vec::new();

                if cfg.extract_links && page.status < 400 && is_html {
                    let extracted = extract_internal_links(
                        &url,
                        &page.body,
                        &cfg.domain_allowlist,
                        cfg.count_duplicates,
                    );
                    links_found = Some(extracted.count);

                    // Cap before checking; the found-count above is pre-cap.
                    let mut links = extracted.links;
                    let cap = cfg.checker.max_links_per_page;
                    if cap > 0 && links.len() > cap {
                        links.truncate(cap);
                    }

                    violations =
                        check_page_links(&url, &links, fetcher.as_ref(), &cfg, cache.as_deref())
                            .await;
                }

                WorkerReport {
                    row: PageRow {
                        url,
                        status: report_status.to_string(),
                        time_ms: format!("{elapsed_ms:.2}"),
                        thread: thread_name.clone(),
                        start_utc,
                        end_utc: now_utc(),
                        error: String::new(),
                        internal_links_found: links_found,
                        final_url: page.final_url,
                        content_type: page.content_type,
                        violation_summary: violation_summary(&violations),
                        violations_count: violations.len(),
                    },
                    violations,
                }
            }
        };

        let _ = tx.send(report);

        let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 100 == 0 || n == total {
            info!("processed {n}/{total} pages");
        }
    }
}

/// Run the full crawl over the seed list with per-worker `HttpFetcher`s.
pub async fn crawl_all(urls: &[String], cfg: &CrawlConfig) -> Result<CrawlReport, ConfigError> {
    let timeout = cfg.timeout;
    let user_agent = cfg.user_agent.clone();
    crawl_all_with(urls, cfg, move |worker_id| {
        match HttpFetcher::new(timeout, &user_agent) {
            Ok(fetcher) => Arc::new(fetcher) as Arc<dyn Fetcher>,
            Err(failure) => {
                warn!(worker_id, note = %failure.note(), "http client build failed");
                Arc::new(FailingFetcher::new(failure))
            }
        }
    })
    .await
}

/// Same as [`crawl_all`] but with an injectable fetcher per worker, so the
/// engine can be driven by canned pages in tests.
pub async fn crawl_all_with(
    urls: &[String],
    cfg: &CrawlConfig,
    make_fetcher: impl Fn(usize) -> Arc<dyn Fetcher>,
) -> Result<CrawlReport, ConfigError> {
    cfg.validate()?;

    let mut ordered = order_urls(urls, cfg.scheduler);
    if cfg.max_urls > 0 && ordered.len() > cfg.max_urls {
        ordered.truncate(cfg.max_urls);
    }
    let total = ordered.len();

    let cache = match cfg.cache.mode {
        CacheMode::Lru => Some(Arc::new(LruCache::new(cfg.cache.max_size)?)),
        CacheMode::None => None,
    };

    info!(
        mode = cfg.scheduler.label(),
        threads = cfg.threads,
        delay = cfg.delay,
        total,
        "starting crawl"
    );

    let frontier = Arc::new(Mutex::new(ordered.into_iter().collect::<VecDeque<_>>()));
    let visited = Arc::new(Mutex::new(HashSet::new()));
    let processed = Arc::new(AtomicUsize::new(0));
    let shared_cfg = Arc::new(cfg.clone());
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerReport>();

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for worker_id in 0..cfg.threads {
        workers.spawn(page_worker(
            worker_id,
            frontier.clone(),
            visited.clone(),
            make_fetcher(worker_id),
            shared_cfg.clone(),
            cache.clone(),
            processed.clone(),
            total,
            tx.clone(),
        ));
    }
    drop(tx);

    let mut pages = Vec::with_capacity(total);
    let mut violations = Vec::new();
    while let Some(report) = rx.recv().await {
        pages.push(report.row);
        violations.extend(report.violations);
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            warn!("worker task failed: {err}");
        }
    }
    let duration = started.elapsed().as_secs_f64();

    let throughput = if duration > 0.0 {
        pages.len() as f64 / duration
    } else {
        0.0
    };
    info!(
        "done: {} URLs in {duration:.2}s -> {throughput:.2} URLs/s",
        pages.len()
    );

    let broken_links_total = violations
        .iter()
        .filter(|v| v.violation_type == ViolationKind::BrokenLink)
        .count();
    let cascade_logins_total = violations
        .iter()
        .filter(|v| v.violation_type == ViolationKind::CascadeLogin)
        .count();
    let pages_with_violations = violations
        .iter()
        .map(|v| v.page_url.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_links_found = pages
        .iter()
        .map(|row| row.internal_links_found.unwrap_or(0))
        .sum();

    let cache_stats = cache.as_ref().map(|c| c.stats());
    let summary = RunSummary {
        ts_utc: now_utc(),
        scheduler: cfg.scheduler.label().to_string(),
        threads: cfg.threads,
        delay_s: cfg.delay,
        urls_total: total,
        duration_s: format!("{duration:.2}"),
        urls_per_s: format!("{throughput:.2}"),
        broken_links_total,
        cascade_logins_total,
        pages_with_violations,
        total_links_found,
        cache_mode: cfg.cache.mode.label().to_string(),
        cache_max_size: cfg.cache.max_size,
        cache_accesses: cache_stats.map(|s| s.accesses).unwrap_or(0),
        cache_hits: cache_stats.map(|s| s.hits).unwrap_or(0),
        cache_misses: cache_stats.map(|s| s.misses).unwrap_or(0),
        cache_hit_ratio: format!("{:.4}", cache_stats.map(|s| s.hit_ratio).unwrap_or(0.0)),
        cpu_percent_avg: String::new(),
        memory_rss_mb: String::new(),
    };

    info!(
        broken_links = broken_links_total,
        cascade_logins = cascade_logins_total,
        pages_with_violations,
        "violation totals"
    );

    Ok(CrawlReport {
        pages,
        violations,
        summary,
        throughput,
    })
}
