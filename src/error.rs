use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Dot(#[from] DotError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Error, PartialEq)]
pub enum DotError {
    #[error("syntax error in DOT input at line {line}, column {column}: unexpected `{context}`")]
    Syntax {
        line: usize,
        column: usize,
        context: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("node `{node}` has no N<node>..B(<b1>,<b2>):R<row> identifier in its own or its subgraph's label")]
    MissingTileId { node: String },

    #[error("node `{node}` has no label")]
    MissingLabel { node: String },

    #[error("record node `{node}` is neither a counter (CTR_o) nor a boolean (BOOL_o)")]
    UnsupportedRecord { node: String },

    #[error("counter `{node}` has no valid count=<N> threshold")]
    MissingThreshold { node: String },

    #[error("counter `{node}` has unknown mode; expected one of `roll pulse`, `stop pulse`, `stop hold`")]
    UnknownCounterMode { node: String },

    #[error("boolean `{node}` has unknown mode `{mode}`")]
    UnknownBooleanMode { node: String, mode: String },

    #[error("edge references unknown node `{name}`")]
    UnknownNode { name: String },

    #[error("edge into `{node}` uses unknown port `{port}`")]
    UnknownPort { node: String, port: String },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NetworkError {
    #[error("duplicate element id `{0}`")]
    DuplicateId(String),

    #[error("element `{target}` has no port `{port}`")]
    InvalidPort { target: String, port: String },

    #[error("counter `{0}` must have a target of at least 1")]
    ZeroTarget(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PatternError {
    #[error("syntax error in pattern at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unsupported pattern feature: {0}")]
    Unsupported(String),

    #[error("pattern matches the empty string")]
    MatchesEmpty,

    #[error("pattern needs {positions} states, limit is {limit}")]
    TooLarge { positions: usize, limit: usize },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("line {line}: expected `key:value`, got `{text}`")]
    MissingSeparator { line: usize, text: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write ANML: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode ANML: {0}")]
    Xml(String),

    #[error("ANML output is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}
