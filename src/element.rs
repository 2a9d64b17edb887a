use std::sync::LazyLock;

use regex::Regex;

use crate::anml::{BooleanMode, CounterMode, StartType};
use crate::dot_ast::Node;
use crate::error::BuildError;

/// Fill color marking a non-reporting state as a start-of-data entry.
pub const START_OF_DATA_FILL: &str = "#008000";
/// Outline color marking an element as reporting (and reporting states as
/// start-of-data).
pub const REPORT_COLOR: &str = "#FF00FF";

const COUNTER_MARKER: &str = "CTR_o";
const BOOLEAN_MARKER: &str = "BOOL_o";

static TILE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s).*N(\d+).*B\((\d+),(\d+)\):R(\d+)").expect("tile id pattern is valid")
});
static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"count=(\d+)").expect("count pattern is valid"));
static MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mode=([A-Za-z0-9]+)").expect("mode pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Ste {
        symbol_set: String,
        reporting: bool,
        start: StartType,
    },
    Counter {
        target: u32,
        mode: CounterMode,
        reporting: bool,
    },
    Boolean {
        mode: BooleanMode,
        reporting: bool,
    },
    /// Fan-in point with no hardware element of its own. Edges into it are
    /// collected and stand in for it wherever it is used as a source.
    Junction,
}

/// Hardware placement of an element: node, block pair and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileId {
    pub node: u32,
    pub block: (u32, u32),
    pub row: u32,
}

pub fn parse_tile_id(label: &str) -> Option<TileId> {
    let caps = TILE_ID.captures(label)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    Some(TileId {
        node: number(1)?,
        block: (number(2)?, number(3)?),
        row: number(4)?,
    })
}

/// Junction nodes are named with an `or` suffix by the tools that emit
/// graph-of-tiles DOT files.
pub fn is_junction_name(name: &str) -> bool {
    name.ends_with("or")
}

pub fn interpret(node: &Node) -> Result<Option<ElementKind>, BuildError> {
    match node.shape().unwrap_or_default() {
        "circle" => {
            let start = if has_color(node, "fillcolor", START_OF_DATA_FILL) {
                StartType::StartOfData
            } else {
                StartType::None
            };
            Ok(Some(ElementKind::Ste {
                symbol_set: required_label(node)?,
                reporting: false,
                start,
            }))
        }
        "doublecircle" => {
            let start = if has_color(node, "color", REPORT_COLOR) {
                StartType::StartOfData
            } else {
                StartType::None
            };
            Ok(Some(ElementKind::Ste {
                symbol_set: required_label(node)?,
                reporting: true,
                start,
            }))
        }
        "record" => interpret_record(node).map(Some),
        _ if is_junction_name(&node.id) => Ok(Some(ElementKind::Junction)),
        _ => Ok(None),
    }
}

fn interpret_record(node: &Node) -> Result<ElementKind, BuildError> {
    let label = node.label().unwrap_or_default();
    let reporting = has_color(node, "color", REPORT_COLOR);

    if label.contains(COUNTER_MARKER) {
        let (target, mode) = parse_counter(&label).map_err(|kind| match kind {
            CounterField::Threshold => BuildError::MissingThreshold {
                node: node.id.clone(),
            },
            CounterField::Mode => BuildError::UnknownCounterMode {
                node: node.id.clone(),
            },
        })?;
        Ok(ElementKind::Counter {
            target,
            mode,
            reporting,
        })
    } else if label.contains(BOOLEAN_MARKER) {
        let mode = parse_boolean(&label).map_err(|mode| BuildError::UnknownBooleanMode {
            node: node.id.clone(),
            mode,
        })?;
        Ok(ElementKind::Boolean { mode, reporting })
    } else if is_junction_name(&node.id) {
        Ok(ElementKind::Junction)
    } else {
        Err(BuildError::UnsupportedRecord {
            node: node.id.clone(),
        })
    }
}

#[derive(Debug, PartialEq)]
enum CounterField {
    Threshold,
    Mode,
}

fn parse_counter(label: &str) -> Result<(u32, CounterMode), CounterField> {
    let target = COUNT
        .captures(label)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .ok_or(CounterField::Threshold)?;
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let mode = [
        ("roll pulse", CounterMode::RolloverPulse),
        ("stop pulse", CounterMode::StopPulse),
        ("stop hold", CounterMode::StopHold),
    ]
    .into_iter()
    .find(|(keyword, _)| label.contains(keyword))
    .map(|(_, mode)| mode)
    .ok_or(CounterField::Mode)?;
    Ok((target, mode))
}

/// On failure returns the mode text that was not recognised.
fn parse_boolean(label: &str) -> Result<BooleanMode, String> {
    let Some(caps) = MODE.captures(label) else {
        return Err(String::new());
    };
    let mode = match caps[1].to_ascii_uppercase().as_str() {
        "NOT" => BooleanMode::Not,
        "OR" => BooleanMode::Or,
        "AND" => BooleanMode::And,
        "NAND" => BooleanMode::Nand,
        "NOR" => BooleanMode::Nor,
        "SOP" => BooleanMode::Sop,
        "POS" => BooleanMode::Pos,
        "NSOP" => BooleanMode::Nsop,
        "NPOS" => BooleanMode::Npos,
        _ => return Err(caps[1].to_string()),
    };
    Ok(mode)
}

fn has_color(node: &Node, attr: &str, sentinel: &str) -> bool {
    node.attrs
        .get(attr)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(sentinel))
}

fn required_label(node: &Node) -> Result<String, BuildError> {
    node.label().ok_or_else(|| BuildError::MissingLabel {
        node: node.id.clone(),
    })
}
