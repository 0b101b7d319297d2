use crate::cache::LruCache;
use crate::config::CheckerConfig;
use crate::fetch::{FetchedPage, Fetcher};
use crate::normalize::cache_key_form;

/// Binary outcome of checking one link target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    BrokenLink,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::BrokenLink => "broken_link",
        }
    }
}

/// Immutable result of one link check; cached wholesale under the
/// cache-key-normalized target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    /// None when the request failed without any HTTP response.
    pub status: Option<u16>,
    pub final_url: String,
    pub note: String,
}

/// Substring match against the configured cascade-login patterns,
/// case-insensitive. Other login providers stay untouched unless listed.
pub fn is_cascade_login(url: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let lowered = url.to_ascii_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| lowered.contains(&p.to_ascii_lowercase()))
}

/// Pure classification of a completed response: hard failures first, then
/// the redirect policy, then success.
pub fn classify_response(page: &FetchedPage, treat_redirect_as_ok: bool) -> CheckOutcome {
    if page.status >= 400 {
        return CheckOutcome {
            verdict: Verdict::BrokenLink,
            status: Some(page.status),
            final_url: page.final_url.clone(),
            note: "status>=400".to_string(),
        };
    }
    if (300..400).contains(&page.status) {
        let (verdict, note) = if treat_redirect_as_ok {
            (Verdict::Ok, "redirect ok")
        } else {
            (Verdict::BrokenLink, "redirect treated as broken")
        };
        return CheckOutcome {
            verdict,
            status: Some(page.status),
            final_url: page.final_url.clone(),
            note: note.to_string(),
        };
    }
    let note = if page.redirects > 0 {
        format!("redirect chain len={}", page.redirects)
    } else {
        "ok".to_string()
    };
    CheckOutcome {
        verdict: Verdict::Ok,
        status: Some(page.status),
        final_url: page.final_url.clone(),
        note,
    }
}

/// Validate one link target, serving from the cache when possible and
/// writing the computed outcome through on a miss. Transport failures are
/// terminal broken-link classifications, never retried.
pub async fn check_link(
    url: &str,
    fetcher: &dyn Fetcher,
    checker: &CheckerConfig,
    cache: Option<&LruCache<String, CheckOutcome>>,
) -> CheckOutcome {
    let key = cache_key_form(url);
    if let Some(cache) = cache
        && let Some(cached) = cache.get(&key)
    {
        return cached;
    }

    let outcome = match fetcher.fetch(url).await {
        Ok(page) => classify_response(&page, checker.treat_redirect_as_ok),
        Err(failure) => CheckOutcome {
            verdict: Verdict::BrokenLink,
            status: None,
            final_url: String::new(),
            note: failure.note(),
        },
    };

    if let Some(cache) = cache {
        cache.set(key, outcome.clone());
    }
    outcome
}
