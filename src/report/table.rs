//! Terminal rendering.
//!
//! - run outcome: per-category counts, product IN/OUT list, export path
//! - history: IN/OUT summary and category stats, oldest first
//! - export listing

use crate::analysis::RunOutcome;

use super::{ExportFile, History};

pub fn render_outcome(outcome: &RunOutcome) -> String {
    let mut output = String::new();

    output.push_str(&format!("\nSitemap: {}\n", outcome.source));
    output.push_str(&format!("Run at:  {}\n", outcome.run_at));
    if outcome.first_run {
        output.push_str("First run, no previous snapshot: every URL counts as new.\n");
    }

    output.push_str("\nCategories\n");
    output.push_str(&"-".repeat(44));
    output.push('\n');
    for (name, count) in &outcome.categories.counts {
        output.push_str(&format!("  {:30} {:>10}\n", truncate(name, 30), count));
    }
    output.push_str(&format!("  {:30} {:>10}\n", "total", outcome.total_urls));

    output.push_str(&format!(
        "\nAll categories: +{} / -{}\n",
        outcome.added_total, outcome.removed_total
    ));

    let ins: Vec<_> = outcome.products_in().collect();
    let outs: Vec<_> = outcome.products_out().collect();
    output.push_str(&format!(
        "{}: {} in, {} out ({} live)\n",
        outcome.product_category,
        ins.len(),
        outs.len(),
        outcome.live_products
    ));

    if ins.is_empty() && outs.is_empty() {
        output.push_str("No product changes detected.\n");
    }
    for entry in ins {
        if entry.lastmod.is_empty() {
            output.push_str(&format!("  [in]  {}\n", entry.url));
        } else {
            output.push_str(&format!("  [in]  {} ({})\n", entry.url, entry.lastmod));
        }
    }
    for entry in outs {
        output.push_str(&format!("  [out] {}\n", entry.url));
    }

    match &outcome.export {
        Some(path) => output.push_str(&format!("\nExport: {}\n", path.display())),
        None if outcome.dry_run => output.push_str("\nDry run, nothing written.\n"),
        None => {}
    }

    output
}

pub fn render_history(history: &History) -> String {
    if history.change_summaries.is_empty() && history.category_stats.is_empty() {
        return String::from("No history yet. Run 'sitedrift run' to record one.\n");
    }

    let mut output = String::new();

    output.push_str("\nIN/OUT history\n");
    output.push_str(&"-".repeat(44));
    output.push('\n');
    output.push_str(&format!("  {:<20} {:>10} {:>10}\n", "date", "in", "out"));
    for row in &history.change_summaries {
        output.push_str(&format!(
            "  {:<20} {:>10} {:>10}\n",
            row.date, row.added, row.removed
        ));
    }

    // columns come from the most recent row; rules may have changed since
    // older rows were written
    if let Some(latest) = history.category_stats.last() {
        output.push_str("\nCategory history\n");

        let widths: Vec<usize> = latest
            .counts
            .iter()
            .map(|(name, _)| name.chars().count().max(6))
            .collect();
        let rule_width = 22 + widths.iter().map(|w| w + 1).sum::<usize>() + 7;
        output.push_str(&"-".repeat(rule_width));
        output.push('\n');

        output.push_str(&format!("  {:<20}", "date"));
        for ((name, _), width) in latest.counts.iter().zip(&widths) {
            output.push_str(&format!(" {:>width$}", name, width = width));
        }
        output.push_str(&format!(" {:>6}\n", "total"));

        for row in &history.category_stats {
            output.push_str(&format!("  {:<20}", row.date));
            for ((name, _), width) in latest.counts.iter().zip(&widths) {
                let count = row
                    .counts
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, c)| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(" {:>width$}", count, width = width));
            }
            output.push_str(&format!(" {:>6}\n", row.total));
        }
    }

    output
}

pub fn render_exports(files: &[ExportFile]) -> String {
    if files.is_empty() {
        return String::from("No exports found. Run 'sitedrift run' to create one.\n");
    }

    let mut output = String::new();
    output.push_str(&format!("{:<20} {}\n", "Date", "File"));
    output.push_str(&"-".repeat(60));
    output.push('\n');
    for file in files {
        output.push_str(&format!(
            "{:<20} {}\n",
            file.taken_at.format(super::DATE_FORMAT),
            file.path.display()
        ));
    }
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
