//! Run reports.
//!
//! Four sinks record every run:
//! - category stats: live URL count per category plus a total (append)
//! - change summary: product IN/OUT counts (append)
//! - change log: one row per product URL that came or went (append)
//! - last run: same rows as the change log, latest run only (overwrite)
//!
//! Sinks sit behind `ReportSink` so the storage (csv files, sqlite) can
//! change without touching the analysis. The timestamped product export is
//! always a csv file, see `export`.

pub mod export;
pub mod files;
pub mod json;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod table;

use serde::Serialize;
use thiserror::Error;

use crate::classify::CategoryTally;
use crate::config::{Backend, Config};

pub use export::{ExportFile, ExportWriter};
pub use files::CsvReports;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteReports;

/// Timestamp format of every `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed report data: {0}")]
    Malformed(String),

    #[error("export {} already exists", .0.display())]
    ExportExists(std::path::PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::In => "IN",
            ChangeType::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(ChangeType::In),
            "OUT" => Some(ChangeType::Out),
            _ => None,
        }
    }
}

/// One URL that appeared or disappeared. Removed URLs have no lastmod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeLogEntry {
    pub date: String,
    #[serde(rename = "type")]
    pub change: ChangeType,
    pub url: String,
    pub lastmod: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSummaryRow {
    pub date: String,
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatsRow {
    pub date: String,
    /// Rule order, fallback last.
    pub counts: Vec<(String, usize)>,
    pub total: usize,
}

impl CategoryStatsRow {
    pub fn from_tally(date: &str, tally: &CategoryTally) -> Self {
        CategoryStatsRow {
            date: date.to_string(),
            counts: tally.counts.clone(),
            total: tally.total(),
        }
    }
}

/// Everything the append-only sinks have accumulated, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct History {
    pub change_summaries: Vec<ChangeSummaryRow>,
    pub category_stats: Vec<CategoryStatsRow>,
}

impl History {
    /// Keep only the most recent `n` rows of each series.
    pub fn truncate_to_last(&mut self, n: usize) {
        let skip = self.change_summaries.len().saturating_sub(n);
        self.change_summaries.drain(..skip);
        let skip = self.category_stats.len().saturating_sub(n);
        self.category_stats.drain(..skip);
    }
}

pub trait ReportSink {
    fn record_category_stats(&mut self, row: &CategoryStatsRow) -> Result<(), ReportError>;
    fn record_change_summary(&mut self, row: &ChangeSummaryRow) -> Result<(), ReportError>;
    fn append_change_log(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError>;
    fn replace_last_run(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError>;
    fn load_history(&self) -> Result<History, ReportError>;
}

/// Open the sink selected by `config.backend`.
pub fn open_sink(config: &Config) -> Result<Box<dyn ReportSink>, ReportError> {
    match config.backend {
        Backend::Csv => Ok(Box::new(CsvReports::from_config(config))),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Ok(Box::new(SqliteReports::open(
            &config.data_path(&config.files.database),
        )?)),
        #[cfg(not(feature = "sqlite"))]
        Backend::Sqlite => Err(ReportError::Malformed(
            "sqlite backend not compiled in".to_string(),
        )),
    }
}
