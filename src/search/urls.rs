//! Candidate URL extraction from search-result pages
//!
//! Three strategies run in order until enough candidates are found:
//! markdown links, `href` attributes, then bare `http(s)://` URLs.

use crate::search::ScrapedPage;
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Search engines, ad networks and asset hosts never worth scraping
const EXCLUDED_DOMAINS: &[&str] = &[
    "google.com",
    "googleusercontent.com",
    "googleadservices.com",
    "googlesyndication.com",
    "googletagmanager.com",
    "gstatic.com",
    "doubleclick.net",
    "bing.com",
    "duckduckgo.com",
    "yahoo.com",
    "schema.org",
    "w3.org",
];

#[derive(Debug, Clone, PartialEq)]
pub struct UrlCandidate {
    pub url: String,
    pub title: Option<String>,
}

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]*)\]\(([^)\s]+)(?:\s+[^)]*)?\)").expect("valid markdown link regex")
    })
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid href regex"))
}

fn bare_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("valid bare url regex"))
}

/// True when the host is, or is a subdomain of, an excluded domain
pub fn is_excluded_domain(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    let host = host.trim_start_matches("www.");
    EXCLUDED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

/// Resolve a raw link target into an absolute http(s) URL.
///
/// Google result links of the form `/url?q=<target>` are unwrapped.
fn normalize(raw: &str) -> Option<String> {
    let raw = raw
        .trim()
        .replace("&amp;", "&")
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .to_string();

    let parsed = if raw.starts_with("/url?") {
        Url::parse("https://www.google.com").ok()?.join(&raw).ok()?
    } else {
        Url::parse(&raw).ok()?
    };

    let is_redirect = parsed.path() == "/url"
        && parsed
            .host_str()
            .map(|h| h.trim_start_matches("www.") == "google.com")
            .unwrap_or(false);
    let target = if is_redirect {
        let (_, q) = parsed.query_pairs().find(|(k, _)| k == "q" || k == "url")?;
        Url::parse(&q).ok()?
    } else {
        parsed
    };

    match target.scheme() {
        "http" | "https" => {
            let mut target = target;
            target.set_fragment(None);
            Some(target.to_string())
        }
        _ => None,
    }
}

fn markdown_links(text: &str) -> Vec<(String, Option<String>)> {
    markdown_link_re()
        .captures_iter(text)
        .map(|c| {
            let title = c[1].trim();
            let title = (!title.is_empty() && !title.starts_with('!')).then(|| title.to_string());
            (c[2].to_string(), title)
        })
        .collect()
}

fn href_links(text: &str) -> Vec<(String, Option<String>)> {
    href_re()
        .captures_iter(text)
        .map(|c| (c[1].to_string(), None))
        .collect()
}

fn bare_links(text: &str) -> Vec<(String, Option<String>)> {
    bare_url_re()
        .find_iter(text)
        .map(|m| (m.as_str().to_string(), None))
        .collect()
}

/// Up to `limit` scrapeable result URLs from a search page, skipping any in `seen`
pub fn extract_candidate_urls(
    page: &ScrapedPage,
    limit: usize,
    seen: &HashSet<String>,
) -> Vec<UrlCandidate> {
    let html = page.html.as_deref().unwrap_or("");
    let strategies: [Box<dyn Fn() -> Vec<(String, Option<String>)>>; 3] = [
        Box::new(|| markdown_links(&page.markdown)),
        Box::new(|| {
            let mut links = href_links(html);
            links.extend(href_links(&page.markdown));
            links
        }),
        Box::new(|| {
            let mut links = bare_links(&page.markdown);
            links.extend(bare_links(html));
            links
        }),
    ];

    let mut found: Vec<UrlCandidate> = Vec::new();
    for strategy in strategies.iter() {
        if found.len() >= limit {
            break;
        }
        for (raw, title) in strategy() {
            if found.len() >= limit {
                break;
            }
            let Some(url) = normalize(&raw) else {
                continue;
            };
            if is_excluded_domain(&url)
                || seen.contains(&url)
                || found.iter().any(|c| c.url == url)
            {
                continue;
            }
            found.push(UrlCandidate { url, title });
        }
    }
    found
}
