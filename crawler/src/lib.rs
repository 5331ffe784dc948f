//! Polite breadth-first web crawler. Fetches pages from seed URLs,
//! honors robots.txt, and hands extracted text to a caller-supplied sink.

use anyhow::Result;
use reqwest::{header, Client};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use unicode_normalization::UnicodeNormalization;

pub use url::Url;

/// Upper bound on accepted HTML payloads.
const MAX_HTML_BYTES: usize = 2 * 1024 * 1024;

/// Link targets that never contain indexable text.
const SKIP_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".gif", ".zip", ".css", ".js"];

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Stop after indexing this many pages.
    pub max_pages: usize,
    /// Links are followed only from pages shallower than this depth.
    pub max_depth: usize,
    /// Politeness delay between fetches when robots.txt names none.
    pub delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    /// Pages with body text at or below this length are visited but not indexed.
    pub min_body_chars: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 2,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            user_agent: "tern-bot/0.1 (+https://example.com/bot)".to_string(),
            min_body_chars: 100,
        }
    }
}

/// A fetched page ready for indexing. `id` is the SHA-1 hex digest of the
/// normalized URL, so re-crawling a page keeps a stable identity.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    /// Pages delivered to the sink.
    pub pages_indexed: usize,
    /// Pages fetched successfully, indexed or not.
    pub pages_visited: usize,
}

#[derive(Debug, Clone, Default)]
struct Robots {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay: Option<Duration>,
}

struct Selectors {
    title: Selector,
    h1: Selector,
    body: Selector,
    links: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            title: Selector::parse("title").expect("valid selector"),
            h1: Selector::parse("h1").expect("valid selector"),
            body: Selector::parse("body").expect("valid selector"),
            links: Selector::parse("a[href]").expect("valid selector"),
        }
    }
}

pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    robots: HashMap<String, Robots>,
    selectors: Selectors,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            robots: HashMap::new(),
            selectors: Selectors::new(),
        })
    }

    /// Crawl breadth-first from `seeds`, delivering each substantial page
    /// to `sink`. Thin pages are skipped and their links are not followed.
    ///
    /// One fetch at a time with a politeness delay after each, per the
    /// robots.txt crawl-delay when the host declares one.
    pub async fn run<F>(&mut self, seeds: Vec<Url>, mut sink: F) -> Result<CrawlSummary>
    where
        F: FnMut(Page),
    {
        let mut frontier: VecDeque<(Url, usize)> = seeds.into_iter().map(|u| (u, 0)).collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut summary = CrawlSummary::default();

        while summary.pages_indexed < self.config.max_pages {
            let Some((url, depth)) = frontier.pop_front() else {
                break;
            };
            let key = normalized(&url);
            if depth > self.config.max_depth || !visited.insert(key.clone()) {
                continue;
            }

            if !self.allowed(&url).await {
                tracing::debug!(url = %url, "disallowed by robots.txt");
                continue;
            }

            match self.fetch(&url).await {
                Ok(Some(html)) => {
                    summary.pages_visited += 1;
                    let (title, body, links) = extract_page(&self.selectors, &url, &html);

                    if body.chars().count() > self.config.min_body_chars {
                        tracing::debug!(url = %key, depth, "indexed page");
                        sink(Page {
                            id: page_id(&key),
                            title,
                            body,
                            url: key,
                        });
                        summary.pages_indexed += 1;

                        if depth < self.config.max_depth {
                            for link in links {
                                if !visited.contains(&normalized(&link)) {
                                    frontier.push_back((link, depth + 1));
                                }
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(url = %url, error = %err, "fetch failed"),
            }

            let delay = self.crawl_delay(&url).unwrap_or(self.config.delay);
            sleep(delay).await;
        }

        Ok(summary)
    }

    /// Check the host's robots.txt, fetching and caching it on first
    /// contact. Unreachable robots files permit everything.
    async fn allowed(&mut self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.robots.contains_key(host) {
            let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
            let txt = match self.client.get(&robots_url).send().await {
                Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
                _ => String::new(),
            };
            self.robots.insert(host.to_string(), parse_robots(&txt));
        }
        self.robots
            .get(host)
            .map_or(true, |rules| path_allowed(url.path(), rules))
    }

    fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        let host = url.host_str()?;
        self.robots.get(host).and_then(|r| r.crawl_delay)
    }

    /// Fetch one URL. `Ok(None)` means the response was not indexable
    /// HTML (bad status, wrong content type, or oversized payload).
    async fn fetch(&self, url: &Url) -> Result<Option<String>> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            if let Ok(v) = ct.to_str() {
                if !v.starts_with("text/html") {
                    return Ok(None);
                }
            }
        }
        let bytes = resp.bytes().await?;
        if bytes.len() > MAX_HTML_BYTES {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Parse a seed entry, defaulting to https when no scheme is given.
/// Blank lines and comments yield `None`.
pub fn parse_seed(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{}", raw)))
        .ok()
}

/// Canonical form used for dedup and page identity: the URL without
/// its fragment.
fn normalized(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.to_string()
}

fn page_id(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn extract_page(selectors: &Selectors, base: &Url, html: &str) -> (String, String, Vec<Url>) {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&selectors.title)
        .next()
        .or_else(|| doc.select(&selectors.h1).next())
        .map(|n| clean_text(&n.text().collect::<String>()))
        .unwrap_or_default();

    let body = doc
        .select(&selectors.body)
        .next()
        .map(|el| {
            let mut raw = String::new();
            readable_text(el, &mut raw);
            clean_text(&raw)
        })
        .unwrap_or_default();

    let mut links = Vec::new();
    for a in doc.select(&selectors.links) {
        if let Some(href) = a.value().attr("href") {
            if let Ok(resolved) = Url::parse(href).or_else(|_| base.join(href)) {
                if resolved.scheme().starts_with("http") && !skip_extension(&resolved) {
                    links.push(resolved);
                }
            }
        }
    }

    (title, body, links)
}

/// Collect text nodes below `el`, leaving out script and style subtrees.
fn readable_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if name != "script" && name != "style" {
                readable_text(child_el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// NFKC-normalize and collapse runs of whitespace to single spaces.
fn clean_text(text: &str) -> String {
    text.nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn skip_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn parse_robots(txt: &str) -> Robots {
    // minimal parser for the '*' group
    let mut active = false;
    let mut robots = Robots::default();
    for line in txt.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "user-agent" => active = value == "*",
            "allow" if active => robots.allows.push(value.to_string()),
            // An empty Disallow means the whole site is allowed.
            "disallow" if active && !value.is_empty() => robots.disallows.push(value.to_string()),
            "crawl-delay" if active => {
                if let Ok(secs) = value.parse::<f64>() {
                    robots.crawl_delay = Some(Duration::from_millis((secs * 1000.0) as u64));
                }
            }
            _ => {}
        }
    }
    robots
}

/// Rule precedence: the longest matching prefix wins, with Allow
/// breaking length ties.
fn path_allowed(path: &str, rules: &Robots) -> bool {
    let best_allow = rules
        .allows
        .iter()
        .filter(|p| path.starts_with(p.as_str()))
        .map(|p| p.len())
        .max();
    let best_disallow = rules
        .disallows
        .iter()
        .filter(|p| path.starts_with(p.as_str()))
        .map(|p| p.len())
        .max();
    match (best_allow, best_disallow) {
        (Some(a), Some(d)) => a >= d,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robots_longest_match_wins() {
        let robots = parse_robots(
            "User-agent: *\nDisallow: /private\nAllow: /private/public\nCrawl-delay: 2\n",
        );
        assert!(path_allowed("/", &robots));
        assert!(!path_allowed("/private/page", &robots));
        assert!(path_allowed("/private/public/page", &robots));
        assert_eq!(robots.crawl_delay, Some(Duration::from_secs(2)));
    }

    #[test]
    fn robots_empty_disallow_permits_everything() {
        let robots = parse_robots("User-agent: *\nDisallow:\n");
        assert!(path_allowed("/anything", &robots));
    }

    #[test]
    fn robots_rules_for_other_agents_are_ignored() {
        let robots = parse_robots("User-agent: somebot\nDisallow: /\n");
        assert!(path_allowed("/page", &robots));
    }

    #[test]
    fn missing_robots_file_permits_everything() {
        let robots = parse_robots("");
        assert!(path_allowed("/any/path", &robots));
    }

    #[test]
    fn extracts_title_body_and_links() {
        let selectors = Selectors::new();
        let base = Url::parse("https://example.com/a/").unwrap();
        let html = r#"<html><head><title> Example  Page </title></head><body>
            <script>var tracking = true;</script>
            <style>p { color: red; }</style>
            <p>Hello   world</p>
            <a href="/next"></a>
            <a href="relative.html"></a>
            <a href="https://example.com/file.pdf"></a>
            <a href="mailto:someone@example.com"></a>
            </body></html>"#;

        let (title, body, links) = extract_page(&selectors, &base, html);
        assert_eq!(title, "Example Page");
        assert_eq!(body, "Hello world");

        let links: Vec<String> = links.iter().map(|u| u.to_string()).collect();
        assert!(links.contains(&"https://example.com/next".to_string()));
        assert!(links.contains(&"https://example.com/a/relative.html".to_string()));
        assert!(!links.iter().any(|l| l.ends_with(".pdf")));
        assert!(!links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn title_falls_back_to_first_heading() {
        let selectors = Selectors::new();
        let base = Url::parse("https://example.com/").unwrap();
        let html = "<html><body><h1>Fallback Heading</h1><p>text</p></body></html>";
        let (title, _, _) = extract_page(&selectors, &base, html);
        assert_eq!(title, "Fallback Heading");
    }

    #[test]
    fn page_ids_are_stable_hex_digests() {
        let id = page_id("https://example.com/");
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, page_id("https://example.com/"));
        assert_ne!(id, page_id("https://example.com/other"));
    }

    #[test]
    fn seeds_default_to_https() {
        assert_eq!(
            parse_seed("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            parse_seed("http://example.com/page").unwrap().as_str(),
            "http://example.com/page"
        );
        assert!(parse_seed("").is_none());
        assert!(parse_seed("# comment").is_none());
    }

    #[test]
    fn normalization_drops_fragments() {
        let url = Url::parse("https://example.com/page#section-2").unwrap();
        assert_eq!(normalized(&url), "https://example.com/page");
    }
}
