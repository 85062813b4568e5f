//! One analysis run.
//!
//! fetch -> plan (categorize, diff) -> commit (reports, snapshot, export).
//!
//! Nothing is written until the fetch has succeeded with at least one URL.
//! A failed or empty fetch leaves the previous snapshot authoritative.
//! Runs are not safe to execute concurrently against the same data dir;
//! callers serialize them.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::{CategoryTally, RuleSet};
use crate::config::{Config, ConfigError};
use crate::fetch::{
    FetchError, FileSitemapSource, HttpSitemapSource, SitemapEntries, SitemapSource,
};
use crate::report::{
    self, CategoryStatsRow, ChangeLogEntry, ChangeSummaryRow, ChangeType, ExportWriter,
    ReportError, ReportSink, DATE_FORMAT,
};
use crate::store::{diff, SnapshotStore, UrlDiff};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The sitemap was fetched and parsed but listed no URLs. Saving that
    /// would mark every known URL as removed, so nothing is written.
    #[error("no urls retrieved from the sitemap, nothing recorded")]
    EmptyResult,

    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write reports: {0}")]
    Report(#[source] ReportError),

    #[error("failed to write export: {0}")]
    Export(#[source] ReportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a run will record, computed without side effects.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_at: NaiveDateTime,
    pub first_run: bool,
    pub current: BTreeSet<String>,
    /// All categories.
    pub diff: UrlDiff,
    /// Product category only, what the IN/OUT reports track.
    pub product_diff: UrlDiff,
    pub tally: CategoryTally,
    /// Live product pages with their lastmod.
    pub products: SitemapEntries,
    pub changes: Vec<ChangeLogEntry>,
}

impl RunPlan {
    pub fn date(&self) -> String {
        self.run_at.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_at: String,
    pub source: String,
    pub dry_run: bool,
    pub first_run: bool,
    pub total_urls: usize,
    pub categories: CategoryTally,
    pub added_total: usize,
    pub removed_total: usize,
    pub product_category: String,
    pub live_products: usize,
    pub changes: Vec<ChangeLogEntry>,
    /// Path of the product export. None on dry runs.
    pub export: Option<PathBuf>,
}

impl RunOutcome {
    fn from_plan(plan: &RunPlan, source: String, product_category: &str) -> Self {
        RunOutcome {
            run_at: plan.date(),
            source,
            dry_run: true,
            first_run: plan.first_run,
            total_urls: plan.current.len(),
            categories: plan.tally.clone(),
            added_total: plan.diff.added.len(),
            removed_total: plan.diff.removed.len(),
            product_category: product_category.to_string(),
            live_products: plan.products.len(),
            changes: plan.changes.clone(),
            export: None,
        }
    }

    pub fn products_in(&self) -> impl Iterator<Item = &ChangeLogEntry> {
        self.changes.iter().filter(|c| c.change == ChangeType::In)
    }

    pub fn products_out(&self) -> impl Iterator<Item = &ChangeLogEntry> {
        self.changes.iter().filter(|c| c.change == ChangeType::Out)
    }
}

pub struct Analysis {
    rules: RuleSet,
    product_category: String,
    snapshots: SnapshotStore,
    exports: ExportWriter,
}

impl Analysis {
    pub fn new(
        rules: RuleSet,
        product_category: &str,
        snapshots: SnapshotStore,
        exports: ExportWriter,
    ) -> Self {
        Analysis {
            rules,
            product_category: product_category.to_string(),
            snapshots,
            exports,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.rule_set()?,
            &config.product_category,
            SnapshotStore::new(config.snapshot_path()),
            ExportWriter::new(&config.data_dir, &config.files.export_prefix),
        ))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Categorize and diff `entries` against the stored snapshot.
    pub fn plan(
        &self,
        entries: SitemapEntries,
        run_at: NaiveDateTime,
    ) -> Result<RunPlan, AnalysisError> {
        if entries.is_empty() {
            return Err(AnalysisError::EmptyResult);
        }

        let first_run = !self.snapshots.exists();
        let previous = self
            .snapshots
            .load()
            .map_err(|source| AnalysisError::Snapshot {
                path: self.snapshots.path().to_path_buf(),
                source,
            })?;
        let current: BTreeSet<String> = entries.keys().cloned().collect();

        let diff = diff(&previous, &current);
        let product_diff = diff.restrict(&self.rules, &self.product_category);
        let tally = self.rules.tally(&current);

        let products: SitemapEntries = entries
            .into_iter()
            .filter(|(url, _)| self.rules.categorize(url) == self.product_category)
            .collect();

        let date = run_at.format(DATE_FORMAT).to_string();
        let changes = change_entries(&date, &product_diff, &products);

        debug!(
            previous = previous.len(),
            current = current.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "computed diff"
        );

        Ok(RunPlan {
            run_at,
            first_run,
            current,
            diff,
            product_diff,
            tally,
            products,
            changes,
        })
    }

    /// Write reports, replace the snapshot, write the export.
    ///
    /// Every row and the export file name carry `plan.run_at`, the time the
    /// run started, so a run's report rows and its export share one stamp.
    /// An export already present under that stamp aborts before any write.
    pub fn commit(
        &self,
        plan: &RunPlan,
        reports: &mut dyn ReportSink,
    ) -> Result<PathBuf, AnalysisError> {
        let export_path = self.exports.path_for(plan.run_at);
        if export_path.exists() {
            return Err(AnalysisError::Export(ReportError::ExportExists(export_path)));
        }

        let date = plan.date();

        reports
            .record_category_stats(&CategoryStatsRow::from_tally(&date, &plan.tally))
            .map_err(AnalysisError::Report)?;
        reports
            .record_change_summary(&ChangeSummaryRow {
                date: date.clone(),
                added: plan.product_diff.added.len(),
                removed: plan.product_diff.removed.len(),
            })
            .map_err(AnalysisError::Report)?;
        reports
            .append_change_log(&plan.changes)
            .map_err(AnalysisError::Report)?;
        reports
            .replace_last_run(&plan.changes)
            .map_err(AnalysisError::Report)?;

        self.snapshots
            .save(&plan.current)
            .map_err(|source| AnalysisError::Snapshot {
                path: self.snapshots.path().to_path_buf(),
                source,
            })?;

        self.exports
            .write(plan.run_at, &plan.products)
            .map_err(AnalysisError::Export)
    }

    /// Fetch and plan, nothing written.
    pub fn preview(
        &self,
        source: &dyn SitemapSource,
        run_at: NaiveDateTime,
    ) -> Result<RunOutcome, AnalysisError> {
        let entries = source.fetch()?;
        let plan = self.plan(entries, run_at)?;
        Ok(RunOutcome::from_plan(&plan, source.describe(), &self.product_category))
    }

    /// Fetch, plan and record into `reports`.
    pub fn run(
        &self,
        source: &dyn SitemapSource,
        reports: &mut dyn ReportSink,
        run_at: NaiveDateTime,
    ) -> Result<RunOutcome, AnalysisError> {
        let plan = self.fetch_plan(source, run_at)?;
        self.record(&plan, source, reports)
    }

    /// Like `run`, but the sink is only opened once there is something to
    /// record. Opening a sink can create files (the sqlite database), and a
    /// failed or empty fetch must leave the data dir as it was.
    pub fn run_with<F>(
        &self,
        source: &dyn SitemapSource,
        open_reports: F,
        run_at: NaiveDateTime,
    ) -> Result<RunOutcome, AnalysisError>
    where
        F: FnOnce() -> Result<Box<dyn ReportSink>, ReportError>,
    {
        let plan = self.fetch_plan(source, run_at)?;
        let mut reports = open_reports().map_err(AnalysisError::Report)?;
        self.record(&plan, source, reports.as_mut())
    }

    fn fetch_plan(
        &self,
        source: &dyn SitemapSource,
        run_at: NaiveDateTime,
    ) -> Result<RunPlan, AnalysisError> {
        info!(source = %source.describe(), "starting analysis");

        let entries = match source.fetch() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "fetch failed, previous snapshot kept");
                return Err(e.into());
            }
        };

        let plan = match self.plan(entries, run_at) {
            Err(AnalysisError::EmptyResult) => {
                warn!("sitemap listed no urls, previous snapshot kept");
                return Err(AnalysisError::EmptyResult);
            }
            other => other?,
        };

        if plan.first_run {
            info!(path = %self.snapshots.path().display(), "no previous snapshot, every url counts as new");
        }
        Ok(plan)
    }

    fn record(
        &self,
        plan: &RunPlan,
        source: &dyn SitemapSource,
        reports: &mut dyn ReportSink,
    ) -> Result<RunOutcome, AnalysisError> {
        let export = self.commit(plan, reports)?;

        info!(
            urls = plan.current.len(),
            products_in = plan.product_diff.added.len(),
            products_out = plan.product_diff.removed.len(),
            export = %export.display(),
            "analysis complete"
        );

        let mut outcome = RunOutcome::from_plan(plan, source.describe(), &self.product_category);
        outcome.dry_run = false;
        outcome.export = Some(export);
        Ok(outcome)
    }
}

/// Sitemap source selected by the config: a local file when set, else HTTP.
pub fn source_for(config: &Config) -> Result<Box<dyn SitemapSource>, FetchError> {
    match &config.sitemap_file {
        Some(path) => Ok(Box::new(FileSitemapSource::new(path))),
        None => Ok(Box::new(HttpSitemapSource::new(
            &config.sitemap_url,
            config.timeout,
        )?)),
    }
}

/// Run one full analysis with everything taken from `config`. Returns the
/// outcome, whose `export` names the new product file.
pub fn run_analysis(config: &Config) -> Result<RunOutcome, AnalysisError> {
    let analysis = Analysis::from_config(config)?;
    let source = source_for(config)?;
    analysis.run_with(
        source.as_ref(),
        || report::open_sink(config),
        Local::now().naive_local(),
    )
}

/// IN rows then OUT rows, each sorted by URL. Removed URLs have no lastmod.
fn change_entries(
    date: &str,
    diff: &UrlDiff,
    live: &SitemapEntries,
) -> Vec<ChangeLogEntry> {
    let added = diff.added.iter().map(|url| ChangeLogEntry {
        date: date.to_string(),
        change: ChangeType::In,
        url: url.clone(),
        lastmod: live.get(url).cloned().flatten().unwrap_or_default(),
    });
    let removed = diff.removed.iter().map(|url| ChangeLogEntry {
        date: date.to_string(),
        change: ChangeType::Out,
        url: url.clone(),
        lastmod: String::new(),
    });
    added.chain(removed).collect()
}
