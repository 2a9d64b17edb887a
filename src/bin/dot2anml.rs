use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{LevelFilter, debug, info};

use anmlconv::{BuildOptions, logging};

#[derive(Parser, Debug)]
#[command(
    name = "dot2anml",
    about = "Convert a graph-of-tiles DOT file into an ANML automata network"
)]
struct Cli {
    /// Input DOT file (`-` reads from stdin)
    dotfile: PathBuf,

    /// Output ANML file (`-` writes to stdout)
    outfile: PathBuf,

    /// Print progress while converting
    #[arg(short, long)]
    verbose: bool,

    /// Suffix element ids with subgraph, block and row
    #[arg(short, long)]
    blockrows: bool,

    /// Log level (off, error, warn, info, debug, trace); overrides --verbose
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let level = match &cli.log_level {
        Some(value) => logging::parse_level(value, default_level),
        None => default_level,
    };
    logging::init(level);
    debug!(cli:?; "Parsed arguments");

    let input = read_input(&cli.dotfile).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to read {}: {e}", cli.dotfile.display());
        std::process::exit(1);
    });

    let options = BuildOptions {
        block_rows: cli.blockrows,
    };
    let anml = anmlconv::dot_to_anml(&input, &options).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    });

    if let Err(e) = write_output(&cli.outfile, &anml) {
        eprintln!("ERROR: failed to write {}: {e}", cli.outfile.display());
        std::process::exit(1);
    }
    info!(outfile:? = cli.outfile; "Exported ANML");
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> std::io::Result<String> {
    if is_stdio(path) {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    info!(dotfile:? = path; "Reading DOT file");
    std::fs::read_to_string(path)
}

fn write_output(path: &Path, anml: &str) -> std::io::Result<()> {
    if is_stdio(path) {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(anml.as_bytes())?;
        return stdout.flush();
    }
    std::fs::write(path, anml)
}
