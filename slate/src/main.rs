use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use slate::{demo_registry, SuiteRunner, TableSource, TestSummary};

/// Runs script tables against the built-in fixtures and prints each
/// table back with pass/fail markup.
#[derive(Parser, Debug)]
#[command(name = "slate", version, about = "table-driven acceptance test runner")]
struct Args {
    /// Table files, one pipe-text table per file.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Log engine activity to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let mut sources = Vec::new();
    for file in &args.files {
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(err) => {
                error!("cannot read {}: {err}", file.display());
                return ExitCode::from(2);
            }
        };
        let name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table".to_owned());
        sources.push(TableSource { name, text });
    }

    let mut suite = SuiteRunner::new(Arc::new(demo_registry()));
    suite.add_path("slate");
    let outcomes = suite.run(&sources);

    let mut total = TestSummary::default();
    let mut broken = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(run) => {
                print!("{}", run.rendered);
                total.add(&run.summary);
            }
            Err(message) => {
                error!("table {}: {message}", outcome.name);
                broken += 1;
            }
        }
    }
    info!(
        "{} right, {} wrong, {} ignored, {} exceptions",
        total.right, total.wrong, total.ignores, total.exceptions
    );

    if broken > 0 || !total.all_passed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
