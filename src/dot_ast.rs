use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphKind {
    Undirected,
    Directed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DotGraph {
    pub strict: bool,
    pub kind: GraphKind,
    pub name: Option<String>,
    pub body: Scope,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    pub attrs: Attributes,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub subgraphs: Vec<Subgraph>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    pub name: Option<String>,
    pub body: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: Endpoint,
    pub to: Endpoint,
    pub attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub node: String,
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(IndexMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, other: &Attributes) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Node {
    pub fn label(&self) -> Option<String> {
        self.attrs.get("label").map(decode_label)
    }

    pub fn shape(&self) -> Option<&str> {
        self.attrs.get("shape")
    }
}

impl Subgraph {
    pub fn short_id(&self) -> &str {
        match &self.name {
            Some(name) => name.rsplit('_').next().unwrap_or(name.as_str()),
            None => "",
        }
    }

    pub fn label(&self) -> Option<String> {
        self.body.attrs.get("label").map(decode_label)
    }
}

pub fn decode_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n' | 'l' | 'r') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
