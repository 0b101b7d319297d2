use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

const SKIP_SCHEMES: [&str; 3] = ["tel", "javascript", "data"];

// Structural site chrome whose links never count as page content.
const CHROME_TAGS: [&str; 4] = ["header", "nav", "footer", "aside"];
const CHROME_CLASSES: [&str; 3] = ["site-header", "site-footer", "global-nav"];

/// In-scope links found in a page's main content region.
#[derive(Debug, Clone, Default)]
pub struct ExtractedLinks {
    /// Normalized targets in document order, duplicates preserved.
    pub links: Vec<String>,
    /// Occurrence count, or unique-target count when duplicates are folded.
    pub count: usize,
}

fn in_site_chrome(el: &ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
        let value = ancestor.value();
        CHROME_TAGS.contains(&value.name())
            || CHROME_CLASSES.iter().any(|class| value.has_class(
                class,
                scraper::CaseSensitivity::AsciiCaseInsensitive,
            ))
    })
}

fn main_region<'a>(doc: &'a Html) -> Option<ElementRef<'a>> {
    for selector in ["main", "div#content", "div.content"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(found) = doc.select(&sel).next() {
            return Some(found);
        }
    }
    None
}

fn host_in_allowlist(host: &str, allow_domains: &[String]) -> bool {
    allow_domains.iter().any(|dom| host.ends_with(dom.as_str()))
}

/// Extract in-scope hyperlinks from the page's main content region,
/// excluding anything inside header/nav/footer/aside chrome. Soft-fails on
/// unparseable hrefs: a malformed link is dropped, never an error.
pub fn extract_internal_links(
    page_url: &str,
    html: &str,
    allow_domains: &[String],
    count_duplicates: bool,
) -> ExtractedLinks {
    let doc = Html::parse_document(html);
    let anchor_sel = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return ExtractedLinks::default(),
    };
    let base = Url::parse(page_url).ok();

    let region = main_region(&doc);
    let anchors: Vec<ElementRef<'_>> = match region {
        Some(area) => area.select(&anchor_sel).collect(),
        None => doc.select(&anchor_sel).collect(),
    };

    let mut links = Vec::new();
    let mut uniq_targets = HashSet::new();
    let mut occurrences = 0usize;

    for anchor in anchors {
        if in_site_chrome(&anchor) {
            continue;
        }
        let Some(raw) = anchor.value().attr("href") else {
            continue;
        };
        let raw = raw.trim();

        let resolved = match &base {
            Some(base) => base.join(raw).ok(),
            None => Url::parse(raw).ok(),
        };
        let Some(target) = resolved else {
            continue;
        };

        if target.scheme() == "mailto" {
            let email = target.path().trim().to_ascii_lowercase();
            if let Some((_, domain)) = email.rsplit_once('@')
                && host_in_allowlist(domain, allow_domains)
            {
                let norm_mail = format!("mailto:{email}");
                occurrences += 1;
                links.push(norm_mail.clone());
                uniq_targets.insert(norm_mail);
            }
            continue;
        }

        if SKIP_SCHEMES.contains(&target.scheme()) {
            continue;
        }
        if !matches!(target.scheme(), "http" | "https") {
            continue;
        }
        let Some(host) = target.host_str() else {
            continue;
        };
        if !host_in_allowlist(host, allow_domains) {
            continue;
        }
        if target.path().is_empty() {
            continue;
        }

        let port = target.port().map(|p| format!(":{p}")).unwrap_or_default();
        let norm = format!(
            "{}://{}{}{}",
            target.scheme(),
            host,
            port,
            target.path()
        )
        .trim_end_matches('/')
        .to_string();

        occurrences += 1;
        links.push(norm.clone());
        uniq_targets.insert(norm);
    }

    let count = if count_duplicates {
        occurrences
    } else {
        uniq_targets.len()
    };

    ExtractedLinks { links, count }
}
