use std::path::PathBuf;

use clap::Parser;
use log::{LevelFilter, debug};

use anmlconv::logging;

#[derive(Parser, Debug)]
#[command(
    name = "diff_reports",
    about = "Compare two simulation report files of key:value lines"
)]
struct Cli {
    /// Past report file
    file1: PathBuf,

    /// Current report file
    file2: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    logging::init(logging::parse_level(&cli.log_level, LevelFilter::Warn));
    debug!(cli:?; "Parsed arguments");

    let diff = anmlconv::diff_report_files(&cli.file1, &cli.file2).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(2);
    });

    print!("{diff}");
    if diff.has_differences() {
        std::process::exit(1);
    }
}
