use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use sitedrift::analysis::{self, Analysis, AnalysisError};
use sitedrift::config::{Backend, Config};
use sitedrift::fetch::{FileSitemapSource, SitemapEntries, StaticSitemapSource};
use sitedrift::report::{CsvReports, ExportWriter, ReportSink};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn config_in(dir: &Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        backend: Backend::Csv,
        ..Config::default()
    }
}

fn entries(urls: &[&str]) -> SitemapEntries {
    urls.iter().map(|u| (u.to_string(), None)).collect()
}

fn write_sitemap(path: &Path, urls: &[(&str, Option<&str>)]) {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );
    for (url, lastmod) in urls {
        body.push_str(&format!("  <url><loc>{url}</loc>"));
        if let Some(lastmod) = lastmod {
            body.push_str(&format!("<lastmod>{lastmod}</lastmod>"));
        }
        body.push_str("</url>\n");
    }
    body.push_str("</urlset>\n");
    fs::write(path, body).unwrap();
}

fn dir_listing(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| {
            (
                p.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read_to_string(&p).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

#[test]
fn first_run_records_everything_as_new() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);

    let source = StaticSitemapSource::new(entries(&["https://site/x.html"]));
    let outcome = analysis.run(&source, &mut reports, at(1, 8)).unwrap();

    assert!(outcome.first_run);
    assert_eq!(outcome.added_total, 1);
    assert_eq!(outcome.removed_total, 0);

    let snapshot = fs::read_to_string(config.snapshot_path()).unwrap();
    assert_eq!(snapshot.lines().collect::<Vec<_>>(), vec!["https://site/x.html"]);

    assert_eq!(
        fs::read_to_string(reports.change_summary_path()).unwrap(),
        "date,in_pages_produits,out_pages_produits\n2025-03-01 08:00:00,1,0\n"
    );
    assert_eq!(
        fs::read_to_string(reports.last_run_path()).unwrap(),
        "date,type,url,lastmod\n2025-03-01 08:00:00,IN,https://site/x.html,\n"
    );

    let export = outcome.export.unwrap();
    assert_eq!(
        export.file_name().unwrap(),
        "pages_produits_2025-03-01_08-00-00.csv"
    );
}

#[test]
fn second_run_reports_product_changes_only() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);

    let before = entries(&[
        "https://site/a.html",
        "https://site/b.html",
        "https://site/guides/old.html",
    ]);
    let after = entries(&[
        "https://site/b.html",
        "https://site/c.html",
        "https://site/guides/new.html",
    ]);

    analysis
        .run(&StaticSitemapSource::new(before), &mut reports, at(1, 8))
        .unwrap();
    let outcome = analysis
        .run(&StaticSitemapSource::new(after), &mut reports, at(2, 8))
        .unwrap();

    assert!(!outcome.first_run);
    assert_eq!(outcome.added_total, 2);
    assert_eq!(outcome.removed_total, 2);

    let ins: Vec<_> = outcome.products_in().map(|e| e.url.as_str()).collect();
    let outs: Vec<_> = outcome.products_out().map(|e| e.url.as_str()).collect();
    assert_eq!(ins, vec!["https://site/c.html"]);
    assert_eq!(outs, vec!["https://site/a.html"]);

    assert_eq!(
        fs::read_to_string(reports.last_run_path()).unwrap(),
        "date,type,url,lastmod\n\
         2025-03-02 08:00:00,IN,https://site/c.html,\n\
         2025-03-02 08:00:00,OUT,https://site/a.html,\n"
    );

    // header once, one row per run
    let log = fs::read_to_string(reports.change_log_path()).unwrap();
    assert_eq!(log.matches("date,type,url,lastmod").count(), 1);
    assert_eq!(log.lines().count(), 1 + 2 + 2);

    let history = reports.load_history().unwrap();
    assert_eq!(history.change_summaries.len(), 2);
    assert_eq!(history.category_stats.len(), 2);
    let latest = &history.category_stats[1];
    assert_eq!(latest.total, 3);
    assert!(latest.counts.contains(&("CATEGORIE".to_string(), 1)));
    assert!(latest.counts.contains(&("pages_produits".to_string(), 2)));
}

#[test]
fn unchanged_source_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);
    let urls = entries(&["https://site/a.html", "https://site/cgv"]);

    analysis
        .run(&StaticSitemapSource::new(urls.clone()), &mut reports, at(1, 8))
        .unwrap();
    let snapshot = fs::read_to_string(config.snapshot_path()).unwrap();

    let outcome = analysis
        .run(&StaticSitemapSource::new(urls), &mut reports, at(1, 9))
        .unwrap();

    assert_eq!(outcome.added_total, 0);
    assert_eq!(outcome.removed_total, 0);
    assert!(outcome.changes.is_empty());
    assert_eq!(fs::read_to_string(config.snapshot_path()).unwrap(), snapshot);
    assert_eq!(
        fs::read_to_string(reports.last_run_path()).unwrap(),
        "date,type,url,lastmod\n"
    );
}

#[test]
fn empty_fetch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);

    analysis
        .run(
            &StaticSitemapSource::new(entries(&["https://site/a.html"])),
            &mut reports,
            at(1, 8),
        )
        .unwrap();
    let before = dir_listing(dir.path());

    let err = analysis
        .run(&StaticSitemapSource::new(SitemapEntries::new()), &mut reports, at(2, 8))
        .unwrap_err();

    assert!(matches!(err, AnalysisError::EmptyResult));
    assert_eq!(dir_listing(dir.path()), before);
}

#[test]
fn empty_fetch_on_first_run_creates_no_files() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);

    let err = analysis
        .run(&StaticSitemapSource::new(SitemapEntries::new()), &mut reports, at(1, 8))
        .unwrap_err();

    assert!(matches!(err, AnalysisError::EmptyResult));
    assert!(dir_listing(dir.path()).is_empty());
}

#[test]
fn fetch_error_leaves_files_untouched() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let sitemap = dir.path().join("sitemap.xml");
    let config = config_in(&data);
    let analysis = Analysis::from_config(&config).unwrap();
    let mut reports = CsvReports::from_config(&config);

    write_sitemap(&sitemap, &[("https://site/a.html", Some("2025-02-01"))]);
    analysis
        .run(&FileSitemapSource::new(&sitemap), &mut reports, at(1, 8))
        .unwrap();
    let before = dir_listing(&data);

    fs::write(&sitemap, "<urlset><url><loc>https://site/b.html").unwrap();
    let err = analysis
        .run(&FileSitemapSource::new(&sitemap), &mut reports, at(2, 8))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Fetch(_)));

    let err = analysis
        .run(
            &FileSitemapSource::new(dir.path().join("missing.xml")),
            &mut reports,
            at(3, 8),
        )
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Fetch(_)));

    assert_eq!(dir_listing(&data), before);
}

#[test]
fn run_analysis_reads_everything_from_config() {
    let dir = TempDir::new().unwrap();
    let sitemap = dir.path().join("sitemap.xml");
    write_sitemap(
        &sitemap,
        &[
            ("https://site/p1.html", Some("2025-02-01")),
            ("https://site/telephone-filaire/model.html", None),
            ("https://site/mentions-legales", None),
            ("https://site/blog/post", None),
        ],
    );

    let mut config = config_in(&dir.path().join("out"));
    config.sitemap_file = Some(sitemap);

    let outcome = analysis::run_analysis(&config).unwrap();
    assert_eq!(outcome.total_urls, 4);
    assert_eq!(outcome.live_products, 1);
    assert_eq!(outcome.categories.get("CATEGORIE"), 1);
    assert_eq!(outcome.categories.get("autre"), 1);
    assert_eq!(outcome.categories.get("brand_or_content"), 1);

    let export = outcome.export.unwrap();
    assert_eq!(
        fs::read_to_string(&export).unwrap(),
        "url,lastmod\nhttps://site/p1.html,2025-02-01\n"
    );

    let listed = ExportWriter::new(&config.data_dir, &config.files.export_prefix)
        .list()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].path, export);
}

#[test]
fn dry_run_leaves_data_dir_empty() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let analysis = Analysis::from_config(&config).unwrap();

    let outcome = analysis
        .preview(
            &StaticSitemapSource::new(entries(&["https://site/a.html"])),
            at(1, 8),
        )
        .unwrap();

    assert!(outcome.dry_run);
    assert!(outcome.export.is_none());
    assert_eq!(outcome.products_in().count(), 1);
    assert!(dir_listing(dir.path()).is_empty());
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_backend_records_the_same_runs() {
    use sitedrift::report::open_sink;

    let dir = TempDir::new().unwrap();
    let config = Config {
        backend: Backend::Sqlite,
        ..config_in(dir.path())
    };
    let analysis = Analysis::from_config(&config).unwrap();

    {
        let mut sink = open_sink(&config).unwrap();
        analysis
            .run(
                &StaticSitemapSource::new(entries(&["https://site/a.html"])),
                sink.as_mut(),
                at(1, 8),
            )
            .unwrap();
        analysis
            .run(
                &StaticSitemapSource::new(entries(&["https://site/b.html"])),
                sink.as_mut(),
                at(2, 8),
            )
            .unwrap();
    }

    let sink = open_sink(&config).unwrap();
    let history = sink.load_history().unwrap();
    let counts: Vec<_> = history
        .change_summaries
        .iter()
        .map(|r| (r.added, r.removed))
        .collect();
    assert_eq!(counts, vec![(1, 0), (1, 1)]);
    assert!(dir.path().join(&config.files.database).is_file());
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_backend_failed_runs_create_nothing() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let sitemap = dir.path().join("sitemap.xml");

    let mut config = Config {
        backend: Backend::Sqlite,
        ..config_in(&data)
    };

    config.sitemap_file = Some(dir.path().join("missing.xml"));
    let err = analysis::run_analysis(&config).unwrap_err();
    assert!(matches!(err, AnalysisError::Fetch(_)));
    assert!(!data.exists());

    write_sitemap(&sitemap, &[]);
    config.sitemap_file = Some(sitemap);
    let err = analysis::run_analysis(&config).unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyResult));
    assert!(!data.exists());
}
