use url::Url;

/// Normalized form used to decide whether a fetch was redirected somewhere
/// else: scheme and host lowercased, trailing slash stripped, fragment
/// dropped, query kept verbatim.
pub fn comparison_form(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let scheme = url.scheme().to_ascii_lowercase();
            let host = url.host_str().unwrap_or("").to_ascii_lowercase();
            let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            let query = url
                .query()
                .map(|q| format!("?{q}"))
                .unwrap_or_default();
            format!("{scheme}://{host}{port}{path}{query}")
        }
        Err(_) => fallback_normalize(raw, true),
    }
}

/// Normalized form used as the link-check cache key: like `comparison_form`
/// but with the query dropped as well, so tracking-parameter variants share
/// one cache entry.
pub fn cache_key_form(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let scheme = url.scheme().to_ascii_lowercase();
            let host = url.host_str().unwrap_or("").to_ascii_lowercase();
            let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            format!("{scheme}://{host}{port}{path}")
        }
        Err(_) => fallback_normalize(raw, false),
    }
}

// Best effort for hrefs the url crate refuses to parse. Never fails: the
// crawl must not crash on a malformed link target.
fn fallback_normalize(raw: &str, keep_query: bool) -> String {
    let mut s = raw.trim().to_string();
    if let Some(pos) = s.find('#') {
        s.truncate(pos);
    }
    if !keep_query
        && let Some(pos) = s.find('?')
    {
        s.truncate(pos);
    }
    s.trim_end_matches('/').to_string()
}
