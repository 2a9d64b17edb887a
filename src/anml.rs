use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{ExportError, NetworkError};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartType {
    None,
    StartOfData,
    AllInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    RolloverPulse,
    StopPulse,
    StopHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanMode {
    Not,
    Or,
    And,
    Nand,
    Nor,
    Sop,
    Pos,
    Nsop,
    Npos,
}

impl BooleanMode {
    pub fn terminals(self) -> u8 {
        match self {
            Self::Not | Self::Or | Self::And | Self::Nand | Self::Nor => 1,
            Self::Sop | Self::Pos | Self::Nsop | Self::Npos => 3,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Not => "inverter",
            Self::Or => "or",
            Self::And => "and",
            Self::Nand => "nand",
            Self::Nor => "nor",
            Self::Sop => "sum-of-products",
            Self::Pos => "product-of-sums",
            Self::Nsop => "nsum-of-products",
            Self::Npos => "nproduct-of-sums",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Default,
    Count,
    Reset,
    Terminal(u8),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Default => write!(f, "default"),
            Port::Count => write!(f, "cnt"),
            Port::Reset => write!(f, "rst"),
            Port::Terminal(n) => write!(f, "t{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementData {
    Ste { symbol_set: String, start: StartType },
    Counter { target: u32, mode: CounterMode },
    Boolean { mode: BooleanMode },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub data: ElementData,
    pub reporting: bool,
    pub report_code: Option<u32>,
    pub outputs: Vec<(ElementRef, Port)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkSummary {
    pub states: usize,
    pub counters: usize,
    pub booleans: usize,
    pub edges: usize,
}

impl fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} states, {} counters, {} booleans, {} edges",
            self.states, self.counters, self.booleans, self.edges
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutomataNetwork {
    id: String,
    elements: IndexMap<String, Element>,
}

impl AutomataNetwork {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn add_ste(
        &mut self,
        symbol_set: impl Into<String>,
        id: impl Into<String>,
        reporting: bool,
        start: StartType,
    ) -> Result<ElementRef, NetworkError> {
        let data = ElementData::Ste {
            symbol_set: symbol_set.into(),
            start,
        };
        self.insert(id.into(), data, reporting)
    }

    pub fn add_counter(
        &mut self,
        target: u32,
        id: impl Into<String>,
        reporting: bool,
        mode: CounterMode,
    ) -> Result<ElementRef, NetworkError> {
        let id = id.into();
        if target == 0 {
            return Err(NetworkError::ZeroTarget(id));
        }
        self.insert(id, ElementData::Counter { target, mode }, reporting)
    }

    pub fn add_boolean(
        &mut self,
        mode: BooleanMode,
        id: impl Into<String>,
        reporting: bool,
    ) -> Result<ElementRef, NetworkError> {
        self.insert(id.into(), ElementData::Boolean { mode }, reporting)
    }

    fn insert(
        &mut self,
        id: String,
        data: ElementData,
        reporting: bool,
    ) -> Result<ElementRef, NetworkError> {
        if self.elements.contains_key(&id) {
            return Err(NetworkError::DuplicateId(id));
        }
        debug!(id = id.as_str(); "Adding element");
        let (index, _) = self.elements.insert_full(
            id.clone(),
            Element {
                id,
                data,
                reporting,
                report_code: None,
                outputs: Vec::new(),
            },
        );
        Ok(ElementRef(index))
    }

    pub fn add_edge(
        &mut self,
        from: ElementRef,
        to: ElementRef,
        port: Port,
    ) -> Result<(), NetworkError> {
        let target = &self.elements[to.0];
        // a counter's default input is its count port
        let port = match (&target.data, port) {
            (ElementData::Counter { .. }, Port::Default) => Port::Count,
            (_, port) => port,
        };
        let accepted = match (&target.data, port) {
            (_, Port::Default) => true,
            (ElementData::Counter { .. }, Port::Count | Port::Reset) => true,
            (ElementData::Boolean { mode }, Port::Terminal(n)) => n >= 1 && n <= mode.terminals(),
            _ => false,
        };
        if !accepted {
            return Err(NetworkError::InvalidPort {
                target: target.id.clone(),
                port: port.to_string(),
            });
        }

        let outputs = &mut self.elements[from.0].outputs;
        if !outputs.contains(&(to, port)) {
            outputs.push((to, port));
        }
        Ok(())
    }

    pub fn set_report_code(&mut self, element: ElementRef, code: u32) {
        let element = &mut self.elements[element.0];
        element.reporting = true;
        element.report_code = Some(code);
    }

    pub fn get(&self, element: ElementRef) -> &Element {
        &self.elements[element.0]
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn edges(&self) -> Vec<(&str, &str, Port)> {
        self.elements
            .values()
            .flat_map(|e| {
                e.outputs
                    .iter()
                    .map(move |(to, port)| (e.id.as_str(), self.elements[to.0].id.as_str(), *port))
            })
            .collect()
    }

    pub fn summary(&self) -> NetworkSummary {
        let mut summary = NetworkSummary::default();
        for element in self.elements.values() {
            match element.data {
                ElementData::Ste { .. } => summary.states += 1,
                ElementData::Counter { .. } => summary.counters += 1,
                ElementData::Boolean { .. } => summary.booleans += 1,
            }
            summary.edges += element.outputs.len();
        }
        summary
    }

    pub fn to_anml(&self) -> Result<String, ExportError> {
        let mut writer = AnmlWriter::new();
        writer.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("anml");
        root.push_attribute(("version", "1.0"));
        root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        writer.event(Event::Start(root))?;

        let mut network = BytesStart::new("automata-network");
        network.push_attribute(("id", self.id.as_str()));
        writer.event(Event::Start(network))?;

        for element in self.elements.values() {
            self.write_element(&mut writer, element)?;
        }

        writer.event(Event::End(BytesEnd::new("automata-network")))?;
        writer.event(Event::End(BytesEnd::new("anml")))?;
        writer.finish()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let anml = self.to_anml()?;
        fs::write(path, anml)?;
        Ok(())
    }

    fn write_element(&self, writer: &mut AnmlWriter, element: &Element) -> Result<(), ExportError> {
        let (tag, activate, report) = match &element.data {
            ElementData::Ste { .. } => (
                "state-transition-element",
                "activate-on-match",
                "report-on-match",
            ),
            ElementData::Counter { .. } => ("counter", "activate-on-target", "report-on-target"),
            ElementData::Boolean { mode } => (mode.tag(), "activate-on-high", "report-on-high"),
        };

        let mut start = BytesStart::new(tag);
        start.push_attribute(("id", element.id.as_str()));
        match &element.data {
            ElementData::Ste { symbol_set, start: start_type } => {
                start.push_attribute(("symbol-set", symbol_set.as_str()));
                start.push_attribute(("start", start_name(*start_type)));
            }
            ElementData::Counter { target, mode } => {
                start.push_attribute(("target", target.to_string().as_str()));
                start.push_attribute(("at-target", at_target_name(*mode)));
            }
            ElementData::Boolean { .. } => {}
        }

        if element.outputs.is_empty() && !element.reporting {
            return writer.event(Event::Empty(start));
        }
        writer.event(Event::Start(start))?;

        for (to, port) in &element.outputs {
            let target = &self.elements[to.0];
            let reference = match (port, &target.data) {
                (Port::Count, _) => format!("{}:cnt", target.id),
                (Port::Default, _) => target.id.clone(),
                (Port::Reset, _) => format!("{}:rst", target.id),
                (Port::Terminal(n), _) => format!("{}:t{n}", target.id),
            };
            let mut activate_tag = BytesStart::new(activate);
            activate_tag.push_attribute(("element", reference.as_str()));
            writer.event(Event::Empty(activate_tag))?;
        }

        if element.reporting {
            let mut report_tag = BytesStart::new(report);
            if let Some(code) = element.report_code {
                report_tag.push_attribute(("reportcode", code.to_string().as_str()));
            }
            writer.event(Event::Empty(report_tag))?;
        }

        writer.event(Event::End(BytesEnd::new(tag)))
    }
}

fn start_name(start: StartType) -> &'static str {
    match start {
        StartType::None => "none",
        StartType::StartOfData => "start-of-data",
        StartType::AllInput => "all-input",
    }
}

fn at_target_name(mode: CounterMode) -> &'static str {
    match mode {
        CounterMode::RolloverPulse => "roll",
        CounterMode::StopPulse => "pulse",
        CounterMode::StopHold => "latch",
    }
}

struct AnmlWriter {
    inner: Writer<Vec<u8>>,
}

impl AnmlWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.inner
            .write_event(event)
            .map_err(|e| ExportError::Xml(e.to_string()))
    }

    fn finish(self) -> Result<String, ExportError> {
        let mut bytes = self.inner.into_inner();
        bytes.push(b'\n');
        Ok(String::from_utf8(bytes)?)
    }
}
