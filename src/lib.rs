pub mod anml;
pub mod dot_ast;
pub mod dot_parser;
pub mod element;
pub mod error;
pub mod logging;
pub mod network_builder;
pub mod regex_ast;
pub mod regex_batch;
pub mod regex_compiler;
pub mod regex_parser;
pub mod report_diff;

use std::fs;
use std::path::Path;

use log::info;

pub use anml::AutomataNetwork;
pub use error::Error;
pub use network_builder::BuildOptions;
pub use report_diff::ReportDiff;

pub fn convert_dot(input: &str, options: &BuildOptions) -> Result<AutomataNetwork, Error> {
    let graph = dot_parser::parse_dot(input)?;
    info!(
        nodes = graph.body.nodes.len(),
        subgraphs = graph.body.subgraphs.len();
        "Parsed DOT graph"
    );
    Ok(network_builder::build(&graph, options)?)
}

pub fn dot_to_anml(input: &str, options: &BuildOptions) -> Result<String, Error> {
    Ok(convert_dot(input, options)?.to_anml()?)
}

pub fn diff_report_files(past: &Path, current: &Path) -> Result<ReportDiff, Error> {
    let past = report_diff::read_reports(&fs::read_to_string(past)?)?;
    let current = report_diff::read_reports(&fs::read_to_string(current)?)?;
    Ok(ReportDiff::between(&past, &current))
}
