use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::fetch::{FetchFailure, Fetcher};

// Plain string scan instead of a full XML parser: sitemap files are flat
// and <loc> values never nest.
fn extract_xml_loc_values(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(open_idx) = xml[start..].find("<loc>") {
        let open = start + open_idx + 5;
        let Some(close_rel) = xml[open..].find("</loc>") else {
            break;
        };
        let close = open + close_rel;
        let value = xml[open..close].trim();
        if !value.is_empty() {
            out.push(value.to_string());
        }
        start = close + 6;
    }
    out
}

// Seed normalization: upgrade to https, drop fragments and trailing
// slashes so the dedup below collapses the common variants.
fn normalize_seed(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    if let Some(pos) = url.find('#') {
        url.truncate(pos);
    }
    url.trim_end_matches('/').to_string()
}

/// Pull seed URLs out of sitemap XML: `<loc>` values, normalized and
/// deduplicated with the original order preserved.
pub fn seed_urls_from_xml(xml: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for loc in extract_xml_loc_values(xml) {
        let normalized = normalize_seed(&loc);
        if normalized.starts_with("https://") && seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

/// Fetch a sitemap over HTTP and extract its seed URLs.
pub async fn fetch_sitemap_seeds(
    fetcher: &dyn Fetcher,
    sitemap_url: &str,
) -> Result<Vec<String>, FetchFailure> {
    let page = fetcher.fetch(sitemap_url).await?;
    if page.status >= 400 {
        return Err(FetchFailure::new(
            "status",
            format!("sitemap fetch returned {}", page.status),
        ));
    }
    Ok(seed_urls_from_xml(&page.body))
}

/// Read a seed list file: one URL per line, an optional leading `url`
/// header, blank lines ignored.
pub fn load_seed_file(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut urls = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if idx == 0 && trimmed.eq_ignore_ascii_case("url") {
            continue;
        }
        urls.push(trimmed.to_string());
    }
    Ok(urls)
}

/// Write the seed list as a single-column CSV, returning the URL count.
pub fn write_seed_csv(path: &Path, urls: &[String]) -> io::Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    writeln!(file, "url")?;
    for url in urls {
        writeln!(file, "{url}")?;
    }
    Ok(urls.len())
}
