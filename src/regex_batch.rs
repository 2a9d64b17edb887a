use std::fmt;

use log::{error, info, warn};

use crate::anml::AutomataNetwork;
use crate::error::PatternError;
use crate::regex_compiler::{self, CompiledPattern};
use crate::regex_parser::parse_pattern;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Empty,
    CountedRepetition,
    Rejected(PatternError),
    Unrecoverable(PatternError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty line"),
            SkipReason::CountedRepetition => write!(f, "counted repetition is not supported"),
            SkipReason::Rejected(err) => write!(f, "{err}"),
            SkipReason::Unrecoverable(err) => write!(f, "unrecoverable: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: u32,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct BatchReport {
    pub network: AutomataNetwork,
    pub added: Vec<u32>,
    pub skipped: Vec<SkippedLine>,
}

pub fn convert(name: &str, patterns: &str) -> BatchReport {
    let mut scratch = AutomataNetwork::new(format!("{name}_tmp"));
    let mut report = BatchReport {
        network: AutomataNetwork::new(name),
        added: Vec::new(),
        skipped: Vec::new(),
    };

    for (index, raw) in patterns.lines().enumerate() {
        let line = index as u32 + 1;
        let source = raw.trim();
        let id = format!("_{line}");

        if source.is_empty() {
            info!(line; "Found empty pattern, skipping");
            report.skip(line, SkipReason::Empty);
            continue;
        }

        let compiled = match compile_line(source) {
            Ok(compiled) => compiled,
            Err(reason) => {
                warn!(line, pattern = source, reason:% = reason; "Skipping pattern");
                report.skip(line, reason);
                continue;
            }
        };

        info!(line, pattern = source, states = compiled.len(); "Adding pattern");
        if let Err(err) = compiled.instantiate(&mut scratch, &id, line) {
            let reason = SkipReason::Rejected(err.into());
            warn!(line, pattern = source, reason:% = reason; "Skipping pattern");
            report.skip(line, reason);
            continue;
        }
        match compiled.instantiate(&mut report.network, &id, line) {
            Ok(_) => report.added.push(line),
            Err(err) => {
                error!(line, pattern = source, error:% = err; "Unrecoverable error adding pattern");
                report.skip(line, SkipReason::Unrecoverable(err.into()));
            }
        }
    }

    info!(
        added = report.added.len(),
        skipped = report.skipped.len();
        "Done adding patterns"
    );
    report
}

fn compile_line(source: &str) -> Result<CompiledPattern, SkipReason> {
    let pattern = parse_pattern(source).map_err(SkipReason::Rejected)?;
    if pattern.regex.has_counted_repetition() {
        return Err(SkipReason::CountedRepetition);
    }
    regex_compiler::compile(&pattern).map_err(SkipReason::Rejected)
}

impl BatchReport {
    fn skip(&mut self, line: u32, reason: SkipReason) {
        self.skipped.push(SkippedLine { line, reason });
    }
}
