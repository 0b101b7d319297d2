use clap::ValueEnum;
use serde::Deserialize;
use url::Url;

/// Ordering policy applied to the seed list before the frontier is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    Fifo,
    Priority,
}

impl SchedulerMode {
    pub fn label(self) -> &'static str {
        match self {
            SchedulerMode::Fifo => "fifo",
            SchedulerMode::Priority => "priority",
        }
    }
}

fn path_depth(url: &str) -> usize {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().matches('/').count(),
        Err(_) => url.matches('/').count(),
    }
}

// Lower score = higher priority. Query strings are lightly deprioritized so
// parameterized pages sort after their plain counterparts at equal depth.
fn priority_score(url: &str) -> usize {
    let has_query = Url::parse(url)
        .map(|u| u.query().is_some())
        .unwrap_or_else(|_| url.contains('?'));
    path_depth(url) + if has_query { 2 } else { 0 }
}

/// Reorder the seed list. Never adds or drops URLs; truncation to the
/// configured maximum happens in the caller after ordering.
pub fn order_urls(urls: &[String], mode: SchedulerMode) -> Vec<String> {
    let mut ordered = urls.to_vec();
    if mode == SchedulerMode::Priority {
        // Stable sort keeps the original order for full ties.
        ordered.sort_by_key(|u| (priority_score(u), u.len()));
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fifo_is_identity() {
        let input = urls(&[
            "https://example.edu/z/deep/page",
            "https://example.edu/a",
            "https://example.edu/m?x=1",
        ]);
        assert_eq!(order_urls(&input, SchedulerMode::Fifo), input);
    }

    #[test]
    fn priority_puts_shallow_paths_first() {
        let input = urls(&[
            "https://example.edu/a/b/c",
            "https://example.edu/a",
            "https://example.edu/a/b",
        ]);
        let ordered = order_urls(&input, SchedulerMode::Priority);
        assert_eq!(
            ordered,
            urls(&[
                "https://example.edu/a",
                "https://example.edu/a/b",
                "https://example.edu/a/b/c",
            ])
        );
    }

    #[test]
    fn priority_penalizes_query_strings() {
        let input = urls(&[
            "https://example.edu/page?utm=1",
            "https://example.edu/page",
        ]);
        let ordered = order_urls(&input, SchedulerMode::Priority);
        assert_eq!(ordered[0], "https://example.edu/page");
        assert_eq!(ordered[1], "https://example.edu/page?utm=1");
    }

    #[test]
    fn priority_breaks_depth_ties_by_length() {
        let input = urls(&[
            "https://example.edu/catalog-archive",
            "https://example.edu/news",
        ]);
        let ordered = order_urls(&input, SchedulerMode::Priority);
        assert_eq!(ordered[0], "https://example.edu/news");
    }

    #[test]
    fn priority_is_deterministic_and_stable() {
        let input = urls(&[
            "https://example.edu/bb",
            "https://example.edu/aa",
            "https://example.edu/cc",
        ]);
        let first = order_urls(&input, SchedulerMode::Priority);
        let second = order_urls(&input, SchedulerMode::Priority);
        assert_eq!(first, second);
        // Equal score and length: original order survives.
        assert_eq!(first, input);
    }

    #[test]
    fn ordering_never_drops_urls() {
        let input = urls(&[
            "https://example.edu/a?q=1",
            "not-a-parseable-url",
            "https://example.edu/b/c",
        ]);
        let ordered = order_urls(&input, SchedulerMode::Priority);
        assert_eq!(ordered.len(), input.len());
        for u in &input {
            assert!(ordered.contains(u));
        }
    }
}
