use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::anml::{AutomataNetwork, ElementRef, Port};
use crate::dot_ast::*;
use crate::element::{self, ElementKind, TileId};
use crate::error::BuildError;

const DEFAULT_NETWORK_ID: &str = "anml";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Suffix element ids with subgraph, block and row so that identical
    /// node names in repeated tiles stay distinct.
    pub block_rows: bool,
}

#[derive(Debug)]
enum Entry {
    Element(ElementRef),
    Junction(Vec<String>),
}

struct ScopeContext<'a> {
    id: &'a str,
    parent_id: &'a str,
    tile: Option<TileId>,
}

struct Builder<'o> {
    network: AutomataNetwork,
    registry: HashMap<String, Entry>,
    options: &'o BuildOptions,
}

/// Translates a parsed DOT graph into an automata network.
///
/// Runs in three passes over the scope tree: every element is declared
/// before any edge is looked at, junction fan-in is collected from the
/// whole graph, and only then are edges wired. An edge may therefore
/// reference a node declared anywhere in the graph.
pub fn build(graph: &DotGraph, options: &BuildOptions) -> Result<AutomataNetwork, BuildError> {
    let id = graph
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_NETWORK_ID.to_string());
    let mut builder = Builder {
        network: AutomataNetwork::new(id),
        registry: HashMap::new(),
        options,
    };

    let root = ScopeContext {
        id: "",
        parent_id: "",
        tile: graph
            .body
            .attrs
            .get("label")
            .map(decode_label)
            .and_then(|label| element::parse_tile_id(&label)),
    };
    builder.declare(&graph.body, &root)?;
    builder.collect_junctions(&graph.body)?;
    builder.wire(&graph.body)?;

    info!(summary:% = builder.network.summary(); "Network built");
    Ok(builder.network)
}

impl Builder<'_> {
    fn declare(&mut self, scope: &Scope, ctx: &ScopeContext<'_>) -> Result<(), BuildError> {
        for node in &scope.nodes {
            debug!(scope = ctx.id, node = node.id.as_str(); "Declaring node");
            match element::interpret(node)? {
                None => {
                    warn!(node = node.id.as_str(); "Node shape has no automaton meaning, skipping");
                }
                Some(ElementKind::Junction) => {
                    self.registry
                        .entry(node.id.clone())
                        .or_insert_with(|| Entry::Junction(Vec::new()));
                }
                Some(kind) => {
                    let tile = ctx
                        .tile
                        .or_else(|| node.label().and_then(|l| element::parse_tile_id(&l)))
                        .ok_or_else(|| BuildError::MissingTileId {
                            node: node.id.clone(),
                        })?;
                    let handle = self.add_element(node, kind, tile, ctx)?;
                    if self
                        .registry
                        .insert(node.id.clone(), Entry::Element(handle))
                        .is_some()
                    {
                        warn!(node = node.id.as_str(); "Node declared again, later declaration wins");
                    }
                }
            }
        }

        for subgraph in &scope.subgraphs {
            info!(subgraph = subgraph.name.as_deref().unwrap_or("<anonymous>"); "Parsing subgraph");
            let child = ScopeContext {
                id: subgraph.short_id(),
                parent_id: ctx.id,
                tile: subgraph
                    .label()
                    .and_then(|label| element::parse_tile_id(&label)),
            };
            self.declare(&subgraph.body, &child)?;
        }
        Ok(())
    }

    fn add_element(
        &mut self,
        node: &Node,
        kind: ElementKind,
        tile: TileId,
        ctx: &ScopeContext<'_>,
    ) -> Result<ElementRef, BuildError> {
        let handle = match kind {
            ElementKind::Ste {
                symbol_set,
                reporting,
                start,
            } => {
                let id = self.anml_id(&node.id, ctx.parent_id, tile);
                self.network.add_ste(symbol_set, id, reporting, start)?
            }
            ElementKind::Counter {
                target,
                mode,
                reporting,
            } => {
                let id = self.anml_id(&node.id, ctx.id, tile);
                self.network.add_counter(target, id, reporting, mode)?
            }
            ElementKind::Boolean { mode, reporting } => {
                let id = self.anml_id(&node.id, ctx.id, tile);
                self.network.add_boolean(mode, id, reporting)?
            }
            ElementKind::Junction => unreachable!("junctions have no network element"),
        };
        Ok(handle)
    }

    fn anml_id(&self, name: &str, scope_id: &str, tile: TileId) -> String {
        if !self.options.block_rows {
            return name.to_string();
        }
        let (b1, b2) = tile.block;
        format!("{name}_S{scope_id}_B{b1}_{b2}R{}", tile.row)
    }

    fn collect_junctions(&mut self, scope: &Scope) -> Result<(), BuildError> {
        for subgraph in &scope.subgraphs {
            self.collect_junctions(&subgraph.body)?;
        }

        for edge in &scope.edges {
            let dest = edge.to.node.as_str();
            if !self.is_junction(dest) {
                continue;
            }
            let source = edge.from.node.as_str();
            if !self.registry.contains_key(source) && !element::is_junction_name(source) {
                return Err(BuildError::UnknownNode {
                    name: source.to_string(),
                });
            }
            debug!(source = source, junction = dest; "Collecting junction source");
            let entry = self
                .registry
                .entry(dest.to_string())
                .or_insert_with(|| Entry::Junction(Vec::new()));
            if let Entry::Junction(sources) = entry {
                if !sources.iter().any(|s| s == source) {
                    sources.push(source.to_string());
                }
            }
        }
        Ok(())
    }

    fn is_junction(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(Entry::Junction(_)) => true,
            Some(Entry::Element(_)) => false,
            None => element::is_junction_name(name),
        }
    }

    fn wire(&mut self, scope: &Scope) -> Result<(), BuildError> {
        for subgraph in &scope.subgraphs {
            self.wire(&subgraph.body)?;
        }

        for edge in &scope.edges {
            if self.is_junction(&edge.to.node) {
                continue;
            }
            let port = resolve_port(&edge.to)?;
            let sources = self.resolve(&edge.from.node)?;
            let targets = self.resolve(&edge.to.node)?;
            if sources.is_empty() {
                warn!(source = edge.from.node.as_str(); "Junction has no upstream sources");
            }
            for &from in &sources {
                for &to in &targets {
                    self.network.add_edge(from, to, port)?;
                }
            }
        }
        Ok(())
    }

    /// Every element a node name stands for. Junctions expand to the
    /// elements feeding them, following chained junctions.
    fn resolve(&self, name: &str) -> Result<Vec<ElementRef>, BuildError> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        self.resolve_into(name, &mut visited, &mut found)?;
        Ok(found)
    }

    fn resolve_into<'s>(
        &'s self,
        name: &'s str,
        visited: &mut HashSet<&'s str>,
        found: &mut Vec<ElementRef>,
    ) -> Result<(), BuildError> {
        if !visited.insert(name) {
            return Ok(());
        }
        match self.registry.get(name) {
            Some(Entry::Element(handle)) => {
                if !found.contains(handle) {
                    found.push(*handle);
                }
            }
            Some(Entry::Junction(sources)) => {
                for source in sources {
                    self.resolve_into(source, visited, found)?;
                }
            }
            None if element::is_junction_name(name) => {}
            None => {
                return Err(BuildError::UnknownNode {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn resolve_port(endpoint: &Endpoint) -> Result<Port, BuildError> {
    let Some(port) = endpoint.port.as_deref() else {
        return Ok(Port::Default);
    };
    match port {
        "in" => Ok(Port::Count),
        "rst" => Ok(Port::Reset),
        "t0" => Ok(Port::Terminal(1)),
        "t1" => Ok(Port::Terminal(2)),
        "t2" => Ok(Port::Terminal(3)),
        other => Err(BuildError::UnknownPort {
            node: endpoint.node.clone(),
            port: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anml::{BooleanMode, CounterMode, ElementData, StartType};
    use crate::dot_parser::parse_dot;
    use pretty_assertions::assert_eq;

    fn build_str(input: &str, block_rows: bool) -> Result<AutomataNetwork, BuildError> {
        let graph = parse_dot(input).unwrap();
        build(&graph, &BuildOptions { block_rows })
    }

    fn ids(net: &AutomataNetwork) -> Vec<&str> {
        net.elements().map(|e| e.id.as_str()).collect()
    }

    const TILE: &str = r##"
digraph got {
  subgraph cluster_0 {
    label="N0 B(1,2):R3";
    start [shape=circle, label="a", fillcolor="#008000"];
    mid [shape=circle, label="b"];
    hit [shape=doublecircle, label="c"];
    start -> mid;
    mid -> hit;
  }
}
"##;

    #[test]
    fn builds_states_and_edges() {
        let net = build_str(TILE, false).unwrap();
        assert_eq!(net.id(), "got");
        assert_eq!(ids(&net), vec!["start", "mid", "hit"]);
        assert_eq!(
            net.edges(),
            vec![
                ("start", "mid", Port::Default),
                ("mid", "hit", Port::Default)
            ]
        );
        let start = net.find("start").unwrap();
        assert_eq!(
            start.data,
            ElementData::Ste {
                symbol_set: "a".to_string(),
                start: StartType::StartOfData
            }
        );
        assert!(net.find("hit").unwrap().reporting);
    }

    #[test]
    fn block_row_suffixes() {
        let input = r#"
digraph {
  subgraph cluster_7 {
    label="N0 B(1,2):R3";
    subgraph cluster_9 {
      label="N0 B(1,2):R3";
      s [shape=circle, label="a"];
      c [shape=record, label="CTR_o count=2 stop hold"];
      s -> c:rst;
    }
  }
}
"#;
        let net = build_str(input, true).unwrap();
        assert_eq!(ids(&net), vec!["s_S7_B1_2R3", "c_S9_B1_2R3"]);
        assert_eq!(
            net.edges(),
            vec![("s_S7_B1_2R3", "c_S9_B1_2R3", Port::Reset)]
        );
    }

    #[test]
    fn tile_id_falls_back_to_node_label() {
        let input = r#"
digraph {
  subgraph top {
    g [shape=record, label="BOOL_o mode=NOR N4 B(5,6):R7"];
  }
}
"#;
        let net = build_str(input, true).unwrap();
        assert_eq!(ids(&net), vec!["g_Stop_B5_6R7"]);
        assert_eq!(
            net.find("g_Stop_B5_6R7").unwrap().data,
            ElementData::Boolean {
                mode: BooleanMode::Nor
            }
        );
    }

    #[test]
    fn missing_tile_id_is_fatal() {
        let input = "digraph { subgraph s { a [shape=circle, label=\"x\"] } }";
        assert_eq!(
            build_str(input, false).unwrap_err(),
            BuildError::MissingTileId {
                node: "a".to_string()
            }
        );
    }

    #[test]
    fn edges_may_reference_deeper_scopes() {
        let input = r#"
digraph {
  subgraph outer {
    label="N0 B(0,0):R0";
    a [shape=circle, label="a"];
    subgraph inner {
      label="N0 B(0,1):R0";
      b [shape=doublecircle, label="b"];
    }
    a -> b;
  }
}
"#;
        let net = build_str(input, false).unwrap();
        assert_eq!(net.edges(), vec![("a", "b", Port::Default)]);
    }

    #[test]
    fn unknown_node_is_fatal() {
        let input = r#"
digraph {
  subgraph s {
    label="N0 B(0,0):R0";
    a [shape=circle, label="a"];
    a -> ghost;
  }
}
"#;
        assert_eq!(
            build_str(input, false).unwrap_err(),
            BuildError::UnknownNode {
                name: "ghost".to_string()
            }
        );
    }

    #[test]
    fn unknown_port_is_fatal() {
        let input = r#"
digraph {
  subgraph s {
    label="N0 B(0,0):R0";
    a [shape=circle, label="a"];
    b [shape=circle, label="b"];
    a -> b:q;
  }
}
"#;
        assert!(matches!(
            build_str(input, false).unwrap_err(),
            BuildError::UnknownPort { .. }
        ));
    }

    #[test]
    fn junction_fans_in_before_wiring() {
        let input = r##"
digraph {
  subgraph s {
    label="N0 B(0,0):R0";
    a [shape=circle, label="a"];
    b [shape=circle, label="b"];
    c [shape=record, label="CTR_o count=4 roll pulse", color="#FF00FF"];
    got_or -> c:in;
    a -> got_or;
    b -> got_or;
  }
}
"##;
        let net = build_str(input, false).unwrap();
        assert_eq!(
            net.edges(),
            vec![("a", "c", Port::Count), ("b", "c", Port::Count)]
        );
        let counter = net.find("c").unwrap();
        assert!(counter.reporting);
        assert_eq!(
            counter.data,
            ElementData::Counter {
                target: 4,
                mode: CounterMode::RolloverPulse
            }
        );
    }

    #[test]
    fn chained_junctions_expand() {
        let input = r#"
digraph {
  subgraph s {
    label="N0 B(0,0):R0";
    a [shape=circle, label="a"];
    b [shape=circle, label="b"];
    g [shape=record, label="BOOL_o mode=SOP"];
    a -> first_or;
    first_or -> second_or;
    b -> second_or;
    second_or -> g:t2;
  }
}
"#;
        let net = build_str(input, false).unwrap();
        assert_eq!(
            net.edges(),
            vec![("a", "g", Port::Terminal(3)), ("b", "g", Port::Terminal(3))]
        );
    }

    #[test]
    fn junction_with_unknown_source_is_fatal() {
        let input = r#"
digraph {
  subgraph s {
    label="N0 B(0,0):R0";
    ghost -> x_or;
  }
}
"#;
        assert_eq!(
            build_str(input, false).unwrap_err(),
            BuildError::UnknownNode {
                name: "ghost".to_string()
            }
        );
    }

    #[test]
    fn duplicate_ids_without_block_rows_fail() {
        let input = r#"
digraph {
  subgraph a_1 { label="N0 B(0,0):R0"; s [shape=circle, label="a"] }
  subgraph a_2 { label="N0 B(0,1):R0"; s [shape=circle, label="a"] }
}
"#;
        assert!(matches!(
            build_str(input, false).unwrap_err(),
            BuildError::Network(_)
        ));
        let net = build_str(input, true).unwrap();
        assert_eq!(ids(&net), vec!["s_S_B0_0R0", "s_S_B0_1R0"]);
    }

    #[test]
    fn anonymous_graph_gets_default_id() {
        let net = build_str("digraph { }", false).unwrap();
        assert_eq!(net.id(), DEFAULT_NETWORK_ID);
        assert!(net.is_empty());
    }
}
