use chrono::Local;
use clap::Parser;
use serde::Serialize;
use sitedrift::analysis::{self, Analysis, AnalysisError};
use sitedrift::cli::{Cli, Command};
use sitedrift::config::Config;
use sitedrift::report::{self, ExportWriter};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "sitedrift=debug" } else { "sitedrift=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match report::json::render(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to encode json: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Run(args) => {
            if let Err(e) = config.apply_run_args(&args) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }

            let result = if args.dry_run {
                Analysis::from_config(&config)
                    .map_err(AnalysisError::from)
                    .and_then(|runner| {
                        let source = analysis::source_for(&config)?;
                        runner.preview(source.as_ref(), Local::now().naive_local())
                    })
            } else {
                analysis::run_analysis(&config)
            };

            match result {
                Ok(outcome) => {
                    if args.json {
                        print_json(&outcome);
                    } else {
                        print!("{}", report::table::render_outcome(&outcome));
                    }
                }
                Err(AnalysisError::EmptyResult) => {
                    eprintln!("warning: {}", AnalysisError::EmptyResult);
                    std::process::exit(2);
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::History(args) => {
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }

            let history = report::open_sink(&config).and_then(|sink| sink.load_history());
            let mut history = match history {
                Ok(history) => history,
                Err(e) => {
                    eprintln!("Error loading history: {e}");
                    std::process::exit(1);
                }
            };
            if let Some(limit) = args.limit {
                history.truncate_to_last(limit);
            }

            if args.json {
                print_json(&history);
            } else {
                print!("{}", report::table::render_history(&history));
            }
        }
        Command::Exports(args) => {
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }

            let writer = ExportWriter::new(&config.data_dir, &config.files.export_prefix);
            match writer.list() {
                Ok(files) => print!("{}", report::table::render_exports(&files)),
                Err(e) => {
                    eprintln!("Error listing exports: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Classify(args) => {
            let rules = match config.rule_set() {
                Ok(rules) => rules,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };

            for url in &args.urls {
                println!("{:<20} {url}", rules.categorize(url));
            }
        }
    }
}
