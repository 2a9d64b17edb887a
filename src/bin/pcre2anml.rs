use std::path::PathBuf;

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use anmlconv::{logging, regex_batch};

#[derive(Parser, Debug)]
#[command(
    name = "pcre2anml",
    about = "Convert a file of PCRE patterns into an ANML automata network"
)]
struct Cli {
    /// Network name; the output is written to `<name>.anml`
    #[arg(short, long)]
    name: String,

    /// File with one pattern per line
    #[arg(short, long)]
    regex: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    logging::init(logging::parse_level(&cli.log_level, LevelFilter::Info));
    debug!(cli:?; "Parsed arguments");

    let patterns = std::fs::read_to_string(&cli.regex).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to read {}: {e}", cli.regex.display());
        std::process::exit(1);
    });

    let report = regex_batch::convert(&cli.name, &patterns);
    info!(
        added = report.added.len(),
        skipped = report.skipped.len();
        "Exporting ANML"
    );

    let outfile = format!("{}.anml", cli.name);
    if let Err(e) = report.network.export(&outfile) {
        error!(outfile = outfile.as_str(), error:% = e; "Error exporting ANML");
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}
