//! Sitemap sources.
//!
//! A source yields the current `url -> lastmod` mapping for one run. The
//! analysis only sees the trait, so tests and offline runs can swap the
//! HTTP fetcher for a local file or an in-memory map.

pub mod http;
pub mod xml;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

pub use http::HttpSitemapSource;
pub use xml::parse_sitemap;

/// Page URL to its optional `<lastmod>` value, as published.
pub type SitemapEntries = BTreeMap<String, Option<String>>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Couldn't get the document at all: transport error, timeout, bad
    /// status, unreadable file.
    #[error("could not retrieve sitemap: {0}")]
    Network(String),

    /// Got a document but it isn't a usable sitemap.
    #[error("could not parse sitemap: {0}")]
    Parse(String),
}

pub trait SitemapSource {
    /// Where the sitemap comes from, for logs.
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<SitemapEntries, FetchError>;
}

/// Reads a sitemap saved on disk.
pub struct FileSitemapSource {
    path: PathBuf,
}

impl FileSitemapSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSitemapSource { path: path.into() }
    }
}

impl SitemapSource for FileSitemapSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<SitemapEntries, FetchError> {
        let body = fs::read_to_string(&self.path)
            .map_err(|e| FetchError::Network(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), bytes = body.len(), "read sitemap file");
        parse_sitemap(&body)
    }
}

/// Fixed mapping, handy for tests and for re-running an analysis on data
/// fetched elsewhere.
pub struct StaticSitemapSource {
    entries: SitemapEntries,
}

impl StaticSitemapSource {
    pub fn new(entries: SitemapEntries) -> Self {
        StaticSitemapSource { entries }
    }
}

impl SitemapSource for StaticSitemapSource {
    fn describe(&self) -> String {
        format!("static list of {} urls", self.entries.len())
    }

    fn fetch(&self) -> Result<SitemapEntries, FetchError> {
        Ok(self.entries.clone())
    }
}
