//! Headless-Chrome content source
//!
//! Loads a page in a shared headless browser, reads its visible text and
//! rewrites anchor labels as markdown links so downstream agents keep the
//! page's references.

use crate::runtime::ContentSource;
use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    fetcher::{BrowserFetcher, BrowserFetcherOptions},
    Page,
};
use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time given to client-side rendering after navigation completes
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Collects body text plus every labelled anchor, in document order
const EXTRACT_SCRIPT: &str = r"(() => {
    const body = document.body;
    if (!body) { return { text: '', links: [] }; }
    const links = Array.from(document.querySelectorAll('a[href]'))
        .map(a => ({ text: (a.innerText || '').trim(), href: a.href }))
        .filter(l => l.text.length > 0 && l.href.length > 0);
    return { text: body.innerText || '', links };
})()";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL '{0}': only http and https pages can be fetched")]
    InvalidUrl(String),
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Timeout after {0:?} waiting for page load")]
    Timeout(Duration),
    #[error("Failed to read page content: {0}")]
    Extraction(String),
    #[error("Page at {0} has no readable text")]
    EmptyPage(String),
}

/// Browser settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Explicit Chrome executable; otherwise system Chrome, then a fetched Chromium
    pub chrome_path: Option<PathBuf>,
    pub page_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Self {
        let chrome_path = std::env::var("TUTOR_CHROME_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let page_timeout = std::env::var("TUTOR_PAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(DEFAULT_PAGE_TIMEOUT, Duration::from_secs);
        Self {
            chrome_path,
            page_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Deserialize)]
struct PageContent {
    text: String,
    #[serde(default)]
    links: Vec<PageLink>,
}

/// A launched browser plus the task pumping its CDP events
struct LaunchedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl Drop for LaunchedBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// [`ContentSource`] backed by headless Chrome
pub struct BrowserContentSource {
    config: ScraperConfig,
    browser: Mutex<Option<LaunchedBrowser>>,
}

impl BrowserContentSource {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    fn fetcher_cache_dir() -> PathBuf {
        let base = std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from);
        base.join(".cache/ai-teacher/chromium")
    }

    fn browser_config(executable: Option<&Path>) -> Result<BrowserConfig, FetchError> {
        let user_data_dir =
            std::env::temp_dir().join(format!("ai-teacher-chrome-{}", std::process::id()));
        // Stale profile from a crashed run holds Chrome's SingletonLock
        let _ = std::fs::remove_dir_all(&user_data_dir);

        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .user_data_dir(&user_data_dir);

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(FetchError::Launch)
    }

    async fn launch_with(executable: Option<&Path>) -> Result<LaunchedBrowser, FetchError> {
        let config = Self::browser_config(executable)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        Ok(LaunchedBrowser {
            browser,
            handler_task,
        })
    }

    /// Configured executable, else system Chrome, else a downloaded Chromium
    async fn launch(&self) -> Result<LaunchedBrowser, FetchError> {
        if let Some(path) = &self.config.chrome_path {
            return Self::launch_with(Some(path)).await;
        }

        match Self::launch_with(None).await {
            Ok(browser) => return Ok(browser),
            Err(e) => tracing::info!("System Chrome not available ({e}), trying fetcher..."),
        }

        let cache_dir = Self::fetcher_cache_dir();
        tracing::info!("Downloading Chrome to {cache_dir:?} (first run only)...");
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            FetchError::Launch(format!(
                "Failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;

        let options = BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| FetchError::Launch(format!("Fetcher config error: {e}")))?;
        let info = BrowserFetcher::new(options)
            .fetch()
            .await
            .map_err(|e| FetchError::Launch(format!("Chrome download failed: {e:#}")))?;

        tracing::info!("Using Chrome at {:?}", info.executable_path);
        Self::launch_with(Some(&info.executable_path)).await
    }

    /// Open a blank tab, launching the browser on first use
    async fn open_page(&self) -> Result<Page, FetchError> {
        let mut slot = self.browser.lock().await;
        if slot.is_none() {
            *slot = Some(self.launch().await?);
        }
        let Some(launched) = slot.as_ref() else {
            return Err(FetchError::Launch("browser unavailable".to_string()));
        };

        let opened = launched.browser.new_page("about:blank").await;
        match opened {
            Ok(page) => Ok(page),
            Err(e) => {
                // Forget a browser that stopped responding so the next fetch relaunches
                slot.take();
                Err(FetchError::Launch(e.to_string()))
            }
        }
    }

    async fn load_page(&self, url: &Url) -> Result<PageContent, FetchError> {
        let page = self.open_page().await?;

        let timeout = self.config.page_timeout;
        let result: Result<PageContent, FetchError> = async {
            match tokio::time::timeout(timeout, page.goto(url.to_string())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(FetchError::Navigation(e.to_string())),
                Err(_) => return Err(FetchError::Timeout(timeout)),
            }
            tokio::time::sleep(SETTLE_DELAY).await;

            match tokio::time::timeout(timeout, page.evaluate(EXTRACT_SCRIPT.to_string())).await {
                Ok(Ok(evaluated)) => match evaluated.value() {
                    Some(value) => serde_json::from_value::<PageContent>(value.clone())
                        .map_err(|e| FetchError::Extraction(e.to_string())),
                    None => Err(FetchError::Extraction("script returned no value".to_string())),
                },
                Ok(Err(e)) => Err(FetchError::Extraction(e.to_string())),
                Err(_) => Err(FetchError::Timeout(timeout)),
            }
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "Failed to close page");
        }
        result
    }
}

#[async_trait]
impl ContentSource for BrowserContentSource {
    async fn fetch_page_text(&self, url: &str) -> Result<String, FetchError> {
        let url = validate_url(url)?;
        tracing::info!(url = %url, "Fetching page");

        let content = self.load_page(&url).await?;
        let text = linkify(content.text.trim(), &content.links);
        if text.trim().is_empty() {
            return Err(FetchError::EmptyPage(url.to_string()));
        }

        tracing::info!(url = %url, chars = text.len(), links = content.links.len(), "Page fetched");
        Ok(text)
    }
}

/// Accept only absolute http(s) URLs
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

/// Rewrite anchor labels in `text` as `[label](href)`.
///
/// Links are matched in document order, each against the text after the
/// previous match, so a label is linked once and never inside an earlier link.
pub fn linkify(text: &str, links: &[PageLink]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    for link in links {
        let label = link.text.trim();
        if label.is_empty() || link.href.is_empty() {
            continue;
        }
        if let Some(pos) = rest.find(label) {
            let (before, after) = rest.split_at(pos);
            out.push_str(before);
            let _ = write!(out, "[{label}]({})", link.href);
            rest = after.get(label.len()..).unwrap_or_default();
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str, href: &str) -> PageLink {
        PageLink {
            text: text.to_string(),
            href: href.to_string(),
        }
    }

    #[test]
    fn test_linkify_in_document_order() {
        let text = "Read the Book, then the Reference. The Book is free.";
        let links = vec![
            link("Book", "https://doc.rust-lang.org/book"),
            link("Reference", "https://doc.rust-lang.org/reference"),
        ];

        assert_eq!(
            linkify(text, &links),
            "Read the [Book](https://doc.rust-lang.org/book), then the \
             [Reference](https://doc.rust-lang.org/reference). The Book is free."
        );
    }

    #[test]
    fn test_linkify_skips_missing_and_empty_labels() {
        let text = "Home | Docs";
        let links = vec![
            link("  ", "https://a"),
            link("Hidden", "https://b"),
            link("Docs", "https://c/docs"),
        ];
        assert_eq!(linkify(text, &links), "Home | [Docs](https://c/docs)");
        assert_eq!(linkify("plain", &[]), "plain");
    }

    #[test]
    fn test_linkify_handles_multibyte_text() {
        let text = "Übersicht — Kapitel eins";
        let links = vec![link("Kapitel", "https://x/k")];
        assert_eq!(linkify(text, &links), "Übersicht — [Kapitel](https://x/k) eins");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://doc.rust-lang.org/book/").is_ok());
        assert!(validate_url(" http://localhost:8080/page ").is_ok());
        for bad in [
            "not a url",
            "ftp://example.com/file",
            "file:///etc/passwd",
            "javascript:alert(1)",
        ] {
            assert!(
                matches!(validate_url(bad), Err(FetchError::InvalidUrl(_))),
                "{bad} should be rejected"
            );
        }
    }
}
