use std::str::FromStr;

use log::LevelFilter;

/// Parses a `--log-level` value, falling back to `default` with a warning
/// on stderr when it is not a level name.
pub fn parse_level(value: &str, default: LevelFilter) -> LevelFilter {
    LevelFilter::from_str(value).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {value}. Using '{default}' instead.");
        default
    })
}

/// Installs `env_logger` at `level`. `RUST_LOG` still applies per module.
pub fn init(level: LevelFilter) {
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .format_timestamp(None)
        .init();
}
