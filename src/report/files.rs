//! CSV file sinks.
//!
//! Append sinks write their header only when the file is new (or empty),
//! then one record per call. The last-run file is truncated every time.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use tracing::debug;

use super::{
    CategoryStatsRow, ChangeLogEntry, ChangeSummaryRow, History, ReportError, ReportSink,
};
use crate::config::Config;

const CHANGE_LOG_HEADER: [&str; 4] = ["date", "type", "url", "lastmod"];

#[derive(Debug, Clone)]
pub struct CsvReports {
    category_stats: PathBuf,
    change_summary: PathBuf,
    change_log: PathBuf,
    last_run: PathBuf,
    /// Category whose IN/OUT counts the summary file tracks.
    product_category: String,
}

impl CsvReports {
    pub fn from_config(config: &Config) -> Self {
        CsvReports {
            category_stats: config.data_path(&config.files.category_stats),
            change_summary: config.data_path(&config.files.change_summary),
            change_log: config.data_path(&config.files.change_log),
            last_run: config.data_path(&config.files.last_run),
            product_category: config.product_category.clone(),
        }
    }

    pub fn category_stats_path(&self) -> &Path {
        &self.category_stats
    }

    pub fn change_summary_path(&self) -> &Path {
        &self.change_summary
    }

    pub fn change_log_path(&self) -> &Path {
        &self.change_log
    }

    pub fn last_run_path(&self) -> &Path {
        &self.last_run
    }

    fn summary_header(&self) -> [String; 3] {
        [
            "date".to_string(),
            format!("in_{}", self.product_category),
            format!("out_{}", self.product_category),
        ]
    }

    fn read_change_summaries(&self) -> Result<Vec<ChangeSummaryRow>, ReportError> {
        let Some((_, records)) = read_records(&self.change_summary)? else {
            return Ok(Vec::new());
        };

        records
            .iter()
            .map(|record| -> Result<ChangeSummaryRow, ReportError> {
                Ok(ChangeSummaryRow {
                    date: field(record, 0)?.to_string(),
                    added: parse_count(field(record, 1)?)?,
                    removed: parse_count(field(record, 2)?)?,
                })
            })
            .collect()
    }

    fn read_category_stats(&self) -> Result<Vec<CategoryStatsRow>, ReportError> {
        let Some((header, records)) = read_records(&self.category_stats)? else {
            return Ok(Vec::new());
        };

        // date, <categories...>, total
        if header.len() < 2 {
            return Err(ReportError::Malformed(format!(
                "{}: header has {} columns",
                self.category_stats.display(),
                header.len()
            )));
        }
        let names: Vec<&str> = header.iter().skip(1).take(header.len() - 2).collect();

        records
            .iter()
            .map(|record| -> Result<CategoryStatsRow, ReportError> {
                let mut counts = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    counts.push((name.to_string(), parse_count(field(record, i + 1)?)?));
                }
                Ok(CategoryStatsRow {
                    date: field(record, 0)?.to_string(),
                    counts,
                    total: parse_count(field(record, header.len() - 1)?)?,
                })
            })
            .collect()
    }
}

impl ReportSink for CsvReports {
    fn record_category_stats(&mut self, row: &CategoryStatsRow) -> Result<(), ReportError> {
        let mut header = vec!["date".to_string()];
        header.extend(row.counts.iter().map(|(name, _)| name.clone()));
        header.push("total".to_string());

        let mut record = vec![row.date.clone()];
        record.extend(row.counts.iter().map(|(_, count)| count.to_string()));
        record.push(row.total.to_string());

        let mut writer = open_append(&self.category_stats, &header)?;
        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }

    fn record_change_summary(&mut self, row: &ChangeSummaryRow) -> Result<(), ReportError> {
        let mut writer = open_append(&self.change_summary, &self.summary_header())?;
        writer.write_record([
            row.date.clone(),
            row.added.to_string(),
            row.removed.to_string(),
        ])?;
        writer.flush()?;
        Ok(())
    }

    fn append_change_log(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError> {
        let mut writer = open_append(&self.change_log, &CHANGE_LOG_HEADER)?;
        write_entries(&mut writer, entries)?;
        debug!(path = %self.change_log.display(), rows = entries.len(), "appended change log");
        Ok(())
    }

    fn replace_last_run(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError> {
        ensure_parent(&self.last_run)?;
        let mut writer = Writer::from_writer(File::create(&self.last_run)?);
        writer.write_record(CHANGE_LOG_HEADER)?;
        write_entries(&mut writer, entries)?;
        Ok(())
    }

    fn load_history(&self) -> Result<History, ReportError> {
        Ok(History {
            change_summaries: self.read_change_summaries()?,
            category_stats: self.read_category_stats()?,
        })
    }
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// header goes in only when the file is new or was left empty. Rows are
// positional, so appending under a different header is refused.
fn open_append<H>(path: &Path, header: H) -> Result<Writer<File>, ReportError>
where
    H: IntoIterator,
    H::Item: AsRef<[u8]>,
{
    ensure_parent(path)?;
    let header: Vec<Vec<u8>> = header.into_iter().map(|h| h.as_ref().to_vec()).collect();
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if !needs_header {
        check_header(path, &header)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(&header)?;
    }
    Ok(writer)
}

fn check_header(path: &Path, expected: &[Vec<u8>]) -> Result<(), ReportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut found = ByteRecord::new();
    reader.read_byte_record(&mut found)?;

    if found.iter().eq(expected.iter().map(Vec::as_slice)) {
        return Ok(());
    }

    let join = |fields: Vec<&[u8]>| {
        fields
            .into_iter()
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(",")
    };
    Err(ReportError::Malformed(format!(
        "{}: columns are [{}] but this run writes [{}]; move the file aside to start a new history",
        path.display(),
        join(found.iter().collect()),
        join(expected.iter().map(Vec::as_slice).collect()),
    )))
}

fn write_entries(writer: &mut Writer<File>, entries: &[ChangeLogEntry]) -> Result<(), ReportError> {
    for entry in entries {
        writer.write_record([
            entry.date.as_str(),
            entry.change.as_str(),
            entry.url.as_str(),
            entry.lastmod.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn read_records(path: &Path) -> Result<Option<(StringRecord, Vec<StringRecord>)>, ReportError> {
    if !path.is_file() {
        return Ok(None);
    }

    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let header = reader.headers()?.clone();
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    if let Some(bad) = records.iter().find(|r| r.len() != header.len()) {
        return Err(ReportError::Malformed(format!(
            "{}: line {} has {} columns, header has {}",
            path.display(),
            bad.position().map(|p| p.line()).unwrap_or(0),
            bad.len(),
            header.len()
        )));
    }
    Ok(Some((header, records)))
}

fn field(record: &StringRecord, index: usize) -> Result<&str, ReportError> {
    record.get(index).ok_or_else(|| {
        ReportError::Malformed(format!("row {:?} has no column {index}", record))
    })
}

fn parse_count(value: &str) -> Result<usize, ReportError> {
    value
        .trim()
        .parse()
        .map_err(|_| ReportError::Malformed(format!("'{value}' is not a count")))
}
