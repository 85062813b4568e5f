use std::path::Path;

use rusqlite::{params, Connection};

use super::{
    CategoryStatsRow, ChangeLogEntry, ChangeSummaryRow, ChangeType, History, ReportError,
    ReportSink,
};

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            total INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_counts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            category TEXT NOT NULL,
            count INTEGER NOT NULL,
            FOREIGN KEY(run_id) REFERENCES category_runs(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS change_summary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            added INTEGER NOT NULL,
            removed INTEGER NOT NULL
        )",
        [],
    )?;

    // change_log keeps every run, last_run only the latest
    for table in ["change_log", "last_run"] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    change_type TEXT NOT NULL CHECK (change_type IN ('IN', 'OUT')),
                    url TEXT NOT NULL,
                    lastmod TEXT NOT NULL
                )"
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_counts_run_id ON category_counts(run_id)",
        [],
    )?;

    Ok(())
}

/// SQLite-backed report sinks. Open once per command.
pub struct SqliteReports {
    conn: Connection,
}

impl SqliteReports {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ReportError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ReportError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(SqliteReports { conn })
    }

    /// Rows of the last-run table, in insertion order.
    pub fn last_run(&self) -> Result<Vec<ChangeLogEntry>, ReportError> {
        self.load_entries("last_run")
    }

    pub fn change_log(&self) -> Result<Vec<ChangeLogEntry>, ReportError> {
        self.load_entries("change_log")
    }

    fn load_entries(&self, table: &str) -> Result<Vec<ChangeLogEntry>, ReportError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT date, change_type, url, lastmod FROM {table} ORDER BY id"
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, change, url, lastmod)| -> Result<ChangeLogEntry, ReportError> {
                let change = ChangeType::parse(&change).ok_or_else(|| {
                    ReportError::Malformed(format!("unknown change type '{change}' in {table}"))
                })?;
                Ok(ChangeLogEntry {
                    date,
                    change,
                    url,
                    lastmod,
                })
            })
            .collect()
    }

    fn insert_entries(
        tx: &rusqlite::Transaction,
        table: &str,
        entries: &[ChangeLogEntry],
    ) -> rusqlite::Result<()> {
        let mut stmt = tx.prepare_cached(&format!(
            "INSERT INTO {table} (date, change_type, url, lastmod) VALUES (?1, ?2, ?3, ?4)"
        ))?;
        for entry in entries {
            stmt.execute(params![
                entry.date,
                entry.change.as_str(),
                entry.url,
                entry.lastmod
            ])?;
        }
        Ok(())
    }
}

impl ReportSink for SqliteReports {
    fn record_category_stats(&mut self, row: &CategoryStatsRow) -> Result<(), ReportError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO category_runs (date, total) VALUES (?1, ?2)",
            params![row.date, i64::try_from(row.total).unwrap_or(i64::MAX)],
        )?;
        let run_id = tx.last_insert_rowid();

        let mut stmt = tx.prepare_cached(
            "INSERT INTO category_counts (run_id, position, category, count)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, (category, count)) in row.counts.iter().enumerate() {
            stmt.execute(params![
                run_id,
                i64::try_from(position).unwrap_or(i64::MAX),
                category,
                i64::try_from(*count).unwrap_or(i64::MAX)
            ])?;
        }

        drop(stmt);
        tx.commit()?;
        Ok(())
    }

    fn record_change_summary(&mut self, row: &ChangeSummaryRow) -> Result<(), ReportError> {
        self.conn.execute(
            "INSERT INTO change_summary (date, added, removed) VALUES (?1, ?2, ?3)",
            params![
                row.date,
                i64::try_from(row.added).unwrap_or(i64::MAX),
                i64::try_from(row.removed).unwrap_or(i64::MAX)
            ],
        )?;
        Ok(())
    }

    fn append_change_log(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError> {
        let tx = self.conn.transaction()?;
        Self::insert_entries(&tx, "change_log", entries)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_last_run(&mut self, entries: &[ChangeLogEntry]) -> Result<(), ReportError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM last_run", [])?;
        Self::insert_entries(&tx, "last_run", entries)?;
        tx.commit()?;
        Ok(())
    }

    fn load_history(&self) -> Result<History, ReportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, added, removed FROM change_summary ORDER BY id")?;
        let change_summaries = stmt
            .query_map([], |row| {
                Ok(ChangeSummaryRow {
                    date: row.get(0)?,
                    added: row.get::<_, i64>(1)?.max(0) as usize,
                    removed: row.get::<_, i64>(2)?.max(0) as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut runs_stmt = self
            .conn
            .prepare("SELECT id, date, total FROM category_runs ORDER BY id")?;
        let runs = runs_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?.max(0) as usize,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts_stmt = self.conn.prepare(
            "SELECT category, count FROM category_counts WHERE run_id = ?1 ORDER BY position",
        )?;
        let mut category_stats = Vec::with_capacity(runs.len());
        for (run_id, date, total) in runs {
            let counts = counts_stmt
                .query_map(params![run_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as usize))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            category_stats.push(CategoryStatsRow {
                date,
                counts,
                total,
            });
        }

        Ok(History {
            change_summaries,
            category_stats,
        })
    }
}
