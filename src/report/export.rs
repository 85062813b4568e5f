//! Timestamped product exports.
//!
//! Each successful run writes `<prefix>_<YYYY-MM-DD_HH-MM-SS>.csv` with the
//! live product URLs and their lastmod. Listing only picks up files whose
//! name has exactly that shape, so the `<prefix>_in_out*.csv` reports that
//! share the prefix are never taken for exports.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::Writer;
use serde::Serialize;
use walkdir::WalkDir;

use super::ReportError;
use crate::fetch::SitemapEntries;

pub const EXPORT_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ExportWriter {
    dir: PathBuf,
    prefix: String,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        ExportWriter {
            dir: dir.into(),
            prefix: prefix.to_string(),
        }
    }

    pub fn path_for(&self, taken_at: NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.csv",
            self.prefix,
            taken_at.format(EXPORT_STAMP_FORMAT)
        ))
    }

    /// Write `pages` (sorted by URL) and return the new file's path. Never
    /// replaces an existing export with the same stamp.
    pub fn write(
        &self,
        taken_at: NaiveDateTime,
        pages: &SitemapEntries,
    ) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(taken_at);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ReportError::ExportExists(path));
            }
            Err(e) => return Err(e.into()),
        };
        let mut writer = Writer::from_writer(file);
        writer.write_record(["url", "lastmod"])?;
        for (url, lastmod) in pages {
            writer.write_record([url.as_str(), lastmod.as_deref().unwrap_or("")])?;
        }
        writer.flush()?;

        Ok(path)
    }

    /// Existing exports, newest first.
    pub fn list(&self) -> Result<Vec<ExportFile>, ReportError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<ExportFile> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let taken_at = self.parse_name(e.path())?;
                Some(ExportFile {
                    path: e.into_path(),
                    taken_at,
                })
            })
            .collect();

        files.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(files)
    }

    fn parse_name(&self, path: &Path) -> Option<NaiveDateTime> {
        let name = path.file_name()?.to_str()?;
        let stamp = name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')?
            .strip_suffix(".csv")?;
        NaiveDateTime::parse_from_str(stamp, EXPORT_STAMP_FORMAT).ok()
    }
}
