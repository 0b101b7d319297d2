use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use linkpatrol::config::{CacheConfig, CacheMode, CheckerConfig, CrawlConfig};
use linkpatrol::engine::{ViolationKind, crawl_all_with};
use linkpatrol::fetch::{FetchFailure, FetchedPage, Fetcher};

/// Serves canned responses by exact request URL and counts every fetch.
/// Unknown URLs fail like a refused connection.
struct SiteFetcher {
    pages: HashMap<String, FetchedPage>,
    calls: Arc<AtomicUsize>,
}

impl SiteFetcher {
    fn new(pages: Vec<(&str, FetchedPage)>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Self {
            pages: pages
                .into_iter()
                .map(|(url, page)| (url.to_string(), page))
                .collect(),
            calls: calls.clone(),
        };
        (fetcher, calls)
    }
}

#[async_trait::async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(page) => Ok(page.clone()),
            None => Err(FetchFailure::new("connect", format!("no route to {url}"))),
        }
    }
}

fn html_page(url: &str, body: &str) -> FetchedPage {
    FetchedPage {
        status: 200,
        final_url: url.to_string(),
        content_type: "text/html; charset=utf-8".to_string(),
        body: body.to_string(),
        redirects: 0,
    }
}

fn status_page(url: &str, status: u16) -> FetchedPage {
    FetchedPage {
        status,
        final_url: url.to_string(),
        content_type: "text/html".to_string(),
        body: String::new(),
        redirects: 0,
    }
}

fn test_config(threads: usize) -> CrawlConfig {
    CrawlConfig {
        threads,
        delay: 0.0,
        domain_allowlist: vec!["example.edu".to_string()],
        ..CrawlConfig::default()
    }
}

#[tokio::test]
async fn crawl_checks_links_and_records_broken_ones() {
    let page_url = "https://example.edu/a";
    let body = r#"
        <html><body><main>
          <a href="/b">fine</a>
          <a href="/missing">gone</a>
          <a href="mailto:Dean@example.edu">mail</a>
        </main></body></html>
    "#;
    let seeds = vec![page_url.to_string()];
    let cfg = test_config(2);

    let (fetcher, _) = SiteFetcher::new(vec![
        (page_url, html_page(page_url, body)),
        ("https://example.edu/b", status_page("https://example.edu/b", 200)),
        (
            "https://example.edu/missing",
            status_page("https://example.edu/missing", 404),
        ),
    ]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 1);
    let row = &report.pages[0];
    assert_eq!(row.url, page_url);
    assert_eq!(row.status, "200");
    assert_eq!(row.error, "");
    // The mailto counts as a found link but is never dispatched.
    assert_eq!(row.internal_links_found, Some(3));
    assert_eq!(row.violation_summary, "broken_link");
    assert_eq!(row.violations_count, 1);

    assert_eq!(report.violations.len(), 1);
    let violation = &report.violations[0];
    assert_eq!(violation.page_url, page_url);
    assert_eq!(violation.link_url, "https://example.edu/missing");
    assert_eq!(violation.violation_type, ViolationKind::BrokenLink);
    assert_eq!(violation.status, "404");
    assert_eq!(violation.note, "status>=400");

    assert_eq!(report.summary.urls_total, 1);
    assert_eq!(report.summary.broken_links_total, 1);
    assert_eq!(report.summary.cascade_logins_total, 0);
    assert_eq!(report.summary.pages_with_violations, 1);
    assert_eq!(report.summary.total_links_found, 3);
}

#[tokio::test]
async fn duplicate_seeds_are_fetched_exactly_once() {
    let a = "https://example.edu/a";
    let b = "https://example.edu/b";
    let seeds = vec![a.to_string(), a.to_string(), b.to_string(), a.to_string()];
    let cfg = CrawlConfig {
        extract_links: false,
        domain_allowlist: Vec::new(),
        ..test_config(4)
    };

    let (fetcher, calls) =
        SiteFetcher::new(vec![(a, status_page(a, 200)), (b, status_page(b, 200))]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn effective_redirect_reports_as_301() {
    let old = "https://example.edu/old";
    let new = "https://example.edu/new";
    let seeds = vec![old.to_string()];
    let cfg = CrawlConfig {
        extract_links: false,
        domain_allowlist: Vec::new(),
        ..test_config(1)
    };

    let landed = FetchedPage {
        status: 200,
        final_url: new.to_string(),
        content_type: "text/html".to_string(),
        body: String::new(),
        redirects: 1,
    };
    let (fetcher, _) = SiteFetcher::new(vec![(old, landed)]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    let row = &report.pages[0];
    assert_eq!(row.status, "301");
    assert_eq!(row.final_url, new);
}

#[tokio::test]
async fn shared_link_target_is_checked_once_with_the_cache_on() {
    let one = "https://example.edu/one";
    let two = "https://example.edu/two";
    let shared = "https://example.edu/shared";
    let seeds = vec![one.to_string(), two.to_string()];
    let cfg = CrawlConfig {
        cache: CacheConfig {
            mode: CacheMode::Lru,
            max_size: 64,
        },
        ..test_config(1)
    };

    let body = r#"<main><a href="/shared">s</a></main>"#;
    let (fetcher, calls) = SiteFetcher::new(vec![
        (one, html_page(one, body)),
        (two, html_page(two, body)),
        (shared, status_page(shared, 200)),
    ]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    // Two page fetches plus one shared-link check; the second check hits.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.summary.cache_accesses, 2);
    assert_eq!(report.summary.cache_hits, 1);
    assert_eq!(report.summary.cache_misses, 1);
    assert_eq!(report.summary.cache_hit_ratio, "0.5000");
    assert!(report.violations.is_empty());
}

#[tokio::test]
async fn cascade_login_links_are_flagged_without_a_request() {
    let page_url = "https://example.edu/degrees";
    let seeds = vec![page_url.to_string()];
    let cfg = CrawlConfig {
        checker: CheckerConfig {
            cascade_login_patterns: vec!["cascade/login".to_string()],
            ..CheckerConfig::default()
        },
        ..test_config(1)
    };

    let body = r#"<main><a href="/cascade/login?service=cms">edit</a></main>"#;
    let (fetcher, calls) = SiteFetcher::new(vec![(page_url, html_page(page_url, body))]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    // Only the page itself is fetched.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(
        report.violations[0].violation_type,
        ViolationKind::CascadeLogin
    );
    assert_eq!(report.pages[0].violation_summary, "cascade_login");
    assert_eq!(report.summary.cascade_logins_total, 1);
}

#[tokio::test]
async fn transport_failure_becomes_an_error_row() {
    let seeds = vec!["https://example.edu/unreachable".to_string()];
    let cfg = CrawlConfig {
        extract_links: false,
        domain_allowlist: Vec::new(),
        ..test_config(1)
    };

    let (fetcher, _) = SiteFetcher::new(vec![]);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 1);
    let row = &report.pages[0];
    assert_eq!(row.status, "");
    assert!(row.error.starts_with("connect: no route to"));
    assert_eq!(row.internal_links_found, None);
    assert!(report.violations.is_empty());
}

#[tokio::test]
async fn max_urls_caps_the_frontier() {
    let cfg = CrawlConfig {
        extract_links: false,
        domain_allowlist: Vec::new(),
        max_urls: 2,
        ..test_config(2)
    };
    let seeds: Vec<String> = (0..5)
        .map(|i| format!("https://example.edu/p{i}"))
        .collect();

    let pages = seeds
        .iter()
        .map(|u| (u.as_str(), status_page(u, 200)))
        .collect::<Vec<_>>();
    let (fetcher, calls) = SiteFetcher::new(pages);
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

    let report = crawl_all_with(&seeds, &cfg, |_| fetcher.clone())
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.summary.urls_total, 2);
}
