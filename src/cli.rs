use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitedrift")]
#[command(about = "Tracks sitemap changes between runs")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config dir, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch the sitemap, record changes and write a product export
    Run(RunArgs),

    /// Show the recorded IN/OUT and category history
    History(HistoryArgs),

    /// List timestamped product exports, newest first
    Exports(ExportsArgs),

    /// Print the category of each URL under the configured rules
    Classify(ClassifyArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Sitemap to fetch (overrides the config file)
    #[arg(long, conflicts_with = "sitemap_file")]
    pub sitemap_url: Option<String>,

    /// Read the sitemap from a local file instead of fetching it
    #[arg(long)]
    pub sitemap_file: Option<PathBuf>,

    /// Directory holding the snapshot, reports and exports
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Fetch timeout, e.g. "30s" or "2m"
    #[arg(long)]
    pub timeout: Option<String>,

    /// Compute and print the changes without writing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Output as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Only show the most recent N runs
    #[arg(long)]
    pub limit: Option<usize>,

    /// Directory holding the reports
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ExportsArgs {
    /// Directory holding the exports
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ClassifyArgs {
    /// URLs to categorize
    #[arg(required = true)]
    pub urls: Vec<String>,
}
