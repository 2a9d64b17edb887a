use winnow::ascii::{Caseless, digit0, digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, eof, not, opt, preceded, repeat, terminated};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_until, take_while};

use crate::dot_ast::*;
use crate::error::DotError;

pub fn parse_dot(input: &str) -> Result<DotGraph, DotError> {
    let mut rest = input;
    dot_graph(&mut rest).map_err(|_| syntax_error(input, rest))
}

fn syntax_error(input: &str, rest: &str) -> DotError {
    let consumed = &input[..input.len() - rest.len()];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.len() - consumed.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    let context = rest.lines().next().unwrap_or("").trim();
    let context = if context.chars().count() > 40 {
        format!("{}...", context.chars().take(40).collect::<String>())
    } else if context.is_empty() {
        "end of input".to_string()
    } else {
        context.to_string()
    };
    DotError::Syntax {
        line,
        column,
        context,
    }
}

fn dot_graph(input: &mut &str) -> winnow::Result<DotGraph> {
    ws.parse_next(input)?;
    let strict = opt(terminated(keyword("strict"), ws))
        .parse_next(input)?
        .is_some();
    let kind = alt((
        keyword("digraph").value(GraphKind::Directed),
        keyword("graph").value(GraphKind::Undirected),
    ))
    .parse_next(input)?;
    ws.parse_next(input)?;
    let name = opt(terminated(id, ws)).parse_next(input)?;
    let stmts = block.parse_next(input)?;
    ws.parse_next(input)?;
    eof.parse_next(input)?;

    Ok(DotGraph {
        strict,
        kind,
        name,
        body: collect_scope(stmts, &Attributes::new(), &Attributes::new()),
    })
}

#[derive(Debug)]
enum Stmt {
    Node(String, Attributes),
    Edges(Vec<Endpoint>, Attributes),
    Defaults(DefaultTarget, Attributes),
    Assign(String, String),
    Subgraph(Option<String>, Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DefaultTarget {
    Graph,
    Node,
    Edge,
}

/// Builds a scope from its statements. `node [..]` and `edge [..]` defaults
/// seen so far flow into later statements and nested subgraphs; graph
/// attributes stay with the scope that sets them.
fn collect_scope(stmts: Vec<Stmt>, node_defaults: &Attributes, edge_defaults: &Attributes) -> Scope {
    let mut scope = Scope::default();
    let mut node_defaults = node_defaults.clone();
    let mut edge_defaults = edge_defaults.clone();

    for stmt in stmts {
        match stmt {
            Stmt::Node(id, attrs) => {
                if let Some(existing) = scope.nodes.iter_mut().find(|n| n.id == id) {
                    existing.attrs.merge(&attrs);
                } else {
                    let mut merged = node_defaults.clone();
                    merged.merge(&attrs);
                    scope.nodes.push(Node { id, attrs: merged });
                }
            }
            Stmt::Edges(chain, attrs) => {
                let mut merged = edge_defaults.clone();
                merged.merge(&attrs);
                for pair in chain.windows(2) {
                    scope.edges.push(Edge {
                        from: pair[0].clone(),
                        to: pair[1].clone(),
                        attrs: merged.clone(),
                    });
                }
            }
            Stmt::Defaults(DefaultTarget::Graph, attrs) => scope.attrs.merge(&attrs),
            Stmt::Defaults(DefaultTarget::Node, attrs) => node_defaults.merge(&attrs),
            Stmt::Defaults(DefaultTarget::Edge, attrs) => edge_defaults.merge(&attrs),
            Stmt::Assign(key, value) => scope.attrs.set(key, value),
            Stmt::Subgraph(name, inner) => {
                let body = collect_scope(inner, &node_defaults, &edge_defaults);
                scope.subgraphs.push(Subgraph { name, body });
            }
        }
    }

    scope
}

fn block(input: &mut &str) -> winnow::Result<Vec<Stmt>> {
    '{'.parse_next(input)?;
    ws.parse_next(input)?;
    let stmts: Vec<Stmt> = repeat(
        0..,
        terminated(stmt, (ws, opt(one_of([';', ','])), ws)),
    )
    .parse_next(input)?;
    '}'.parse_next(input)?;
    Ok(stmts)
}

fn stmt(input: &mut &str) -> winnow::Result<Stmt> {
    alt((subgraph_stmt, defaults_stmt, edge_stmt, assign_stmt, node_stmt)).parse_next(input)
}

fn subgraph_stmt(input: &mut &str) -> winnow::Result<Stmt> {
    let name = opt(preceded(
        (keyword("subgraph"), ws),
        opt(terminated(id, ws)),
    ))
    .parse_next(input)?
    .flatten();
    let stmts = block.parse_next(input)?;
    Ok(Stmt::Subgraph(name, stmts))
}

fn defaults_stmt(input: &mut &str) -> winnow::Result<Stmt> {
    let target = alt((
        keyword("graph").value(DefaultTarget::Graph),
        keyword("node").value(DefaultTarget::Node),
        keyword("edge").value(DefaultTarget::Edge),
    ))
    .parse_next(input)?;
    ws.parse_next(input)?;
    let attrs = attr_list.parse_next(input)?;
    Ok(Stmt::Defaults(target, attrs))
}

fn edge_stmt(input: &mut &str) -> winnow::Result<Stmt> {
    let first = endpoint.parse_next(input)?;
    let rest: Vec<Endpoint> =
        repeat(1.., preceded((ws, edge_op, ws), endpoint)).parse_next(input)?;
    let attrs = opt(preceded(ws, attr_list)).parse_next(input)?;

    let mut chain = vec![first];
    chain.extend(rest);
    Ok(Stmt::Edges(chain, attrs.unwrap_or_default()))
}

fn edge_op<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    alt(("->", "--")).parse_next(input)
}

fn assign_stmt(input: &mut &str) -> winnow::Result<Stmt> {
    let (key, value) = attr_pair.parse_next(input)?;
    Ok(Stmt::Assign(key, value))
}

fn node_stmt(input: &mut &str) -> winnow::Result<Stmt> {
    let node = endpoint.parse_next(input)?;
    let attrs = opt(preceded(ws, attr_list)).parse_next(input)?;
    Ok(Stmt::Node(node.node, attrs.unwrap_or_default()))
}

/// `name`, `name:port` or `name:port:compass`. The compass point is dropped.
fn endpoint(input: &mut &str) -> winnow::Result<Endpoint> {
    let node = id.parse_next(input)?;
    let port = opt(preceded((ws, ':', ws), id)).parse_next(input)?;
    if port.is_some() {
        let _compass = opt(preceded((ws, ':', ws), id)).parse_next(input)?;
    }
    Ok(Endpoint { node, port })
}

/// One or more `[ .. ]` groups, concatenated.
fn attr_list(input: &mut &str) -> winnow::Result<Attributes> {
    let groups: Vec<Vec<(String, String)>> =
        repeat(1.., terminated(attr_group, ws)).parse_next(input)?;
    Ok(groups.into_iter().flatten().collect())
}

fn attr_group(input: &mut &str) -> winnow::Result<Vec<(String, String)>> {
    '['.parse_next(input)?;
    ws.parse_next(input)?;
    let pairs: Vec<(String, String)> = repeat(
        0..,
        terminated(attr_pair, (ws, opt(one_of([';', ','])), ws)),
    )
    .parse_next(input)?;
    ']'.parse_next(input)?;
    Ok(pairs)
}

fn attr_pair(input: &mut &str) -> winnow::Result<(String, String)> {
    let key = id.parse_next(input)?;
    (ws, '=', ws).parse_next(input)?;
    let value = id.parse_next(input)?;
    Ok((key, value))
}

fn id(input: &mut &str) -> winnow::Result<String> {
    alt((
        quoted_id,
        html_id,
        numeral.map(str::to_string),
        identifier.map(str::to_string),
    ))
    .parse_next(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_' || !c.is_ascii()),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

fn numeral<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (
        opt('-'),
        alt((('.', digit1).void(), (digit1, opt(('.', digit0))).void())),
    )
        .take()
        .parse_next(input)
}

/// A quoted string, optionally concatenated with `+`.
fn quoted_id(input: &mut &str) -> winnow::Result<String> {
    let first = quoted_part.parse_next(input)?;
    let rest: Vec<String> = repeat(0.., preceded((ws, '+', ws), quoted_part)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |mut acc, part| {
        acc.push_str(&part);
        acc
    }))
}

/// Only `\"` is an escape at this level; other backslash pairs belong to the
/// attribute value and are decoded where the value is interpreted.
fn quoted_part(input: &mut &str) -> winnow::Result<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let c: char = any.parse_next(input)?;
        match c {
            '"' => break,
            '\\' => {
                let next: char = any.parse_next(input)?;
                match next {
                    '"' => out.push('"'),
                    '\n' => {}
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn html_id(input: &mut &str) -> winnow::Result<String> {
    '<'.parse_next(input)?;
    let start = *input;
    let mut depth = 1usize;
    while depth > 0 {
        let c: char = any.parse_next(input)?;
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            _ => {}
        }
    }
    let inner = &start[..start.len() - input.len() - 1];
    Ok(inner.to_string())
}

fn keyword<'s>(kw: &'static str) -> impl Parser<&'s str, &'s str, winnow::error::ContextError> {
    terminated(literal(Caseless(kw)), not(one_of(is_ident_char)))
}

/// Whitespace and comments, including `#` preprocessor lines.
fn ws(input: &mut &str) -> winnow::Result<()> {
    repeat(
        0..,
        alt((
            multispace1.void(),
            ("//", till_line_ending).void(),
            ("/*", take_until(0.., "*/"), "*/").void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)
}
