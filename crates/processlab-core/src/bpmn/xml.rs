//! BPMN 2.0 XML projection of the canonical document.
//!
//! [`to_xml`] emits definitions, a collaboration with one participant, the
//! process (documentation, lane set, flow nodes, sequence flows) and a DI
//! section with a deterministic left-to-right layout. Fields BPMN has no slot
//! for travel in the `processlab` extension namespace, so that [`from_xml`]
//! reproduces the exact document:
//!
//! - `processlab:laneId` on flow nodes,
//! - `<processlab:meta>` inside `extensionElements`,
//! - `processlab:flowType` on flows with a non-default type,
//! - `processlab:generatedId="true"` on flows whose id was synthesized.
//!
//! [`from_xml`] reads the first process of any BPMN 2.0 document, matching
//! element names regardless of namespace prefix and ignoring DI.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::document::{
    BpmnDocument, DEFAULT_FLOW_TYPE, Element, ElementMeta, ElementType, Lane, ProcessInfo,
    SequenceFlow,
};
use crate::{Error, Result, TRACING_TARGET_BPMN};

/// Namespace of the ProcessLab extension attributes and elements.
pub const PROCESSLAB_NS: &str = "https://processlab.dev/schema/bpmn";

const BPMN_MODEL_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const BPMN_DI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
const DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
const DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";

// Layout geometry.
const ORIGIN_X: i64 = 160;
const ORIGIN_Y: i64 = 80;
const LABEL_BAND: i64 = 30;
const COLUMN_WIDTH: i64 = 150;
const ROW_HEIGHT: i64 = 120;
const FIRST_COLUMN_OFFSET: i64 = 100;

/// Elements allowed under a process that carry no flow semantics.
const IGNORED_PROCESS_CHILDREN: &[&str] = &[
    "extensionElements",
    "textAnnotation",
    "association",
    "group",
    "dataObject",
    "dataObjectReference",
    "dataStoreReference",
    "property",
    "ioSpecification",
];

/// Encodes a document as BPMN 2.0 XML.
///
/// The output is deterministic for a given document and decodes back to it
/// with [`from_xml`].
pub fn to_xml(document: &BpmnDocument) -> Result<String> {
    let pid = &document.process.id;
    let flow_ids = FlowIds::assign(document);
    let layout = Layout::compute(document);

    let mut xml = String::new();
    writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        xml,
        r#"<bpmn:definitions xmlns:bpmn="{BPMN_MODEL_NS}" xmlns:bpmndi="{BPMN_DI_NS}" xmlns:dc="{DC_NS}" xmlns:di="{DI_NS}" xmlns:processlab="{PROCESSLAB_NS}" id="Definitions_{}" targetNamespace="http://bpmn.io/schema/bpmn">"#,
        attr(pid)
    )?;

    writeln!(xml, r#"  <bpmn:collaboration id="Collaboration_{}">"#, attr(pid))?;
    writeln!(
        xml,
        r#"    <bpmn:participant id="Participant_{}"{} processRef="{}" />"#,
        attr(pid),
        name_attr(document.process.name.as_deref()),
        attr(pid)
    )?;
    writeln!(xml, "  </bpmn:collaboration>")?;

    writeln!(
        xml,
        r#"  <bpmn:process id="{}"{} isExecutable="false">"#,
        attr(pid),
        name_attr(document.process.name.as_deref())
    )?;
    write_process_body(&mut xml, document, &flow_ids)?;
    writeln!(xml, "  </bpmn:process>")?;

    write_diagram(&mut xml, document, &flow_ids, &layout)?;
    writeln!(xml, "</bpmn:definitions>")?;

    tracing::trace!(
        target: TRACING_TARGET_BPMN,
        process_id = %pid,
        bytes = xml.len(),
        "Encoded BPMN XML"
    );

    Ok(xml)
}

fn write_process_body(xml: &mut String, document: &BpmnDocument, flow_ids: &FlowIds) -> Result<()> {
    if let Some(documentation) = &document.process.documentation {
        writeln!(
            xml,
            "    <bpmn:documentation>{}</bpmn:documentation>",
            text(documentation)
        )?;
    }

    if !document.lanes.is_empty() {
        writeln!(
            xml,
            r#"    <bpmn:laneSet id="LaneSet_{}">"#,
            attr(&document.process.id)
        )?;
        for lane in &document.lanes {
            let name = name_attr(lane.name.as_deref());
            if lane.child_element_ids.is_empty() {
                writeln!(xml, r#"      <bpmn:lane id="{}"{name} />"#, attr(&lane.id))?;
                continue;
            }
            writeln!(xml, r#"      <bpmn:lane id="{}"{name}>"#, attr(&lane.id))?;
            for child in &lane.child_element_ids {
                writeln!(
                    xml,
                    "        <bpmn:flowNodeRef>{}</bpmn:flowNodeRef>",
                    text(child)
                )?;
            }
            writeln!(xml, "      </bpmn:lane>")?;
        }
        writeln!(xml, "    </bpmn:laneSet>")?;
    }

    for element in &document.elements {
        write_element(xml, document, element, flow_ids)?;
    }

    for (index, flow) in document.flows.iter().enumerate() {
        let id = flow_ids.get(index);
        let mut extra = String::new();
        if flow.kind != DEFAULT_FLOW_TYPE {
            write!(extra, r#" processlab:flowType="{}""#, attr(&flow.kind))?;
        }
        if flow.id.is_none() {
            extra.push_str(r#" processlab:generatedId="true""#);
        }
        writeln!(
            xml,
            r#"    <bpmn:sequenceFlow id="{}"{} sourceRef="{}" targetRef="{}"{extra} />"#,
            attr(id),
            name_attr(flow.name.as_deref()),
            attr(&flow.source),
            attr(&flow.target)
        )?;
    }

    Ok(())
}

fn write_element(
    xml: &mut String,
    document: &BpmnDocument,
    element: &Element,
    flow_ids: &FlowIds,
) -> Result<()> {
    let tag = element.kind.as_ref();
    let lane = element
        .lane_id
        .as_deref()
        .map(|lane_id| format!(r#" processlab:laneId="{}""#, attr(lane_id)))
        .unwrap_or_default();

    let incoming: Vec<&str> = document
        .flows
        .iter()
        .enumerate()
        .filter(|(_, f)| f.target == element.id)
        .map(|(i, _)| flow_ids.get(i))
        .collect();
    let outgoing: Vec<&str> = document
        .flows
        .iter()
        .enumerate()
        .filter(|(_, f)| f.source == element.id)
        .map(|(i, _)| flow_ids.get(i))
        .collect();

    let open = format!(
        r#"    <bpmn:{tag} id="{}"{}{lane}"#,
        attr(&element.id),
        name_attr(element.name.as_deref())
    );

    if element.meta.is_none() && incoming.is_empty() && outgoing.is_empty() {
        writeln!(xml, "{open} />")?;
        return Ok(());
    }

    writeln!(xml, "{open}>")?;
    if let Some(meta) = &element.meta {
        writeln!(xml, "      <bpmn:extensionElements>")?;
        let mut meta_attrs = String::new();
        if let Some(source) = &meta.source_artifact_id {
            write!(meta_attrs, r#" sourceArtifactId="{}""#, attr(source))?;
        }
        if let Some(page) = meta.page_number {
            write!(meta_attrs, r#" pageNumber="{page}""#)?;
        }
        writeln!(xml, "        <processlab:meta{meta_attrs} />")?;
        writeln!(xml, "      </bpmn:extensionElements>")?;
    }
    for id in incoming {
        writeln!(xml, "      <bpmn:incoming>{}</bpmn:incoming>", text(id))?;
    }
    for id in outgoing {
        writeln!(xml, "      <bpmn:outgoing>{}</bpmn:outgoing>", text(id))?;
    }
    writeln!(xml, "    </bpmn:{tag}>")?;
    Ok(())
}

fn write_diagram(
    xml: &mut String,
    document: &BpmnDocument,
    flow_ids: &FlowIds,
    layout: &Layout,
) -> Result<()> {
    let pid = attr(&document.process.id);
    writeln!(xml, r#"  <bpmndi:BPMNDiagram id="BPMNDiagram_{pid}">"#)?;
    writeln!(
        xml,
        r#"    <bpmndi:BPMNPlane id="BPMNPlane_{pid}" bpmnElement="Collaboration_{pid}">"#
    )?;

    let participant = layout.participant;
    write_shape(
        xml,
        &format!("Participant_{}", document.process.id),
        participant,
        true,
    )?;
    for lane in &document.lanes {
        if let Some(bounds) = layout.lanes.get(lane.id.as_str()) {
            write_shape(xml, &lane.id, *bounds, true)?;
        }
    }
    for element in &document.elements {
        if let Some(bounds) = layout.elements.get(element.id.as_str()) {
            write_shape(xml, &element.id, *bounds, false)?;
        }
    }

    for (index, flow) in document.flows.iter().enumerate() {
        let (Some(source), Some(target)) = (
            layout.elements.get(flow.source.as_str()),
            layout.elements.get(flow.target.as_str()),
        ) else {
            continue;
        };
        let id = attr(flow_ids.get(index));
        writeln!(
            xml,
            r#"      <bpmndi:BPMNEdge id="{id}_di" bpmnElement="{id}">"#
        )?;
        for (x, y) in waypoints(*source, *target) {
            writeln!(xml, r#"        <di:waypoint x="{x}" y="{y}" />"#)?;
        }
        writeln!(xml, "      </bpmndi:BPMNEdge>")?;
    }

    writeln!(xml, "    </bpmndi:BPMNPlane>")?;
    writeln!(xml, "  </bpmndi:BPMNDiagram>")?;
    Ok(())
}

fn write_shape(xml: &mut String, id: &str, bounds: Bounds, horizontal: bool) -> Result<()> {
    let id = attr(id);
    let orientation = if horizontal { r#" isHorizontal="true""# } else { "" };
    writeln!(
        xml,
        r#"      <bpmndi:BPMNShape id="{id}_di" bpmnElement="{id}"{orientation}>"#
    )?;
    writeln!(
        xml,
        r#"        <dc:Bounds x="{}" y="{}" width="{}" height="{}" />"#,
        bounds.x, bounds.y, bounds.width, bounds.height
    )?;
    writeln!(xml, "      </bpmndi:BPMNShape>")?;
    Ok(())
}

fn waypoints(source: Bounds, target: Bounds) -> Vec<(i64, i64)> {
    let (sx, sy) = (source.x + source.width, source.y + source.height / 2);
    let (tx, ty) = (target.x, target.y + target.height / 2);
    if sy == ty {
        return vec![(sx, sy), (tx, ty)];
    }
    let mid = sx + (tx - sx) / 2;
    vec![(sx, sy), (mid, sy), (mid, ty), (tx, ty)]
}

/// Escapes an attribute value, keeping whitespace characters intact on decode.
fn attr(value: &str) -> String {
    escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

/// Escapes text content.
fn text(value: &str) -> String {
    escape(value).replace('\r', "&#13;")
}

fn name_attr(name: Option<&str>) -> String {
    name.map(|n| format!(r#" name="{}""#, attr(n)))
        .unwrap_or_default()
}

/// Ids written for each flow, synthesizing unique ones for id-less flows.
struct FlowIds {
    ids: Vec<String>,
}

impl FlowIds {
    fn assign(document: &BpmnDocument) -> Self {
        let mut taken: HashSet<String> = document
            .elements
            .iter()
            .map(|e| e.id.clone())
            .chain(document.lanes.iter().map(|l| l.id.clone()))
            .chain(document.flows.iter().filter_map(|f| f.id.clone()))
            .collect();

        let mut counter = 0usize;
        let ids = document
            .flows
            .iter()
            .map(|flow| match &flow.id {
                Some(id) => id.clone(),
                None => loop {
                    counter += 1;
                    let candidate = format!("Flow_generated_{counter}");
                    if taken.insert(candidate.clone()) {
                        break candidate;
                    }
                },
            })
            .collect();

        Self { ids }
    }

    fn get(&self, index: usize) -> &str {
        self.ids.get(index).map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

/// Deterministic left-to-right layout: columns by longest path from the
/// sources, one horizontal band per lane.
struct Layout {
    participant: Bounds,
    lanes: HashMap<String, Bounds>,
    elements: HashMap<String, Bounds>,
}

impl Layout {
    fn compute(document: &BpmnDocument) -> Self {
        let count = document.elements.len();
        let index: HashMap<&str, usize> = document
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str(), i))
            .collect();

        let mut graph = Graph::new(count);
        for flow in &document.flows {
            if let (Some(&s), Some(&t)) =
                (index.get(flow.source.as_str()), index.get(flow.target.as_str()))
                && s != t
            {
                graph.adjacency[s].push(t);
                graph.indegree[t] += 1;
            }
        }
        let columns = graph.columns();

        // Bands: one per lane, then one for elements outside every lane.
        let band_count = document.lanes.len() + 1;
        let lane_index: HashMap<&str, usize> = document
            .lanes
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.as_str(), i))
            .collect();
        let bands: Vec<usize> = document
            .elements
            .iter()
            .map(|e| {
                document
                    .lane_of(&e.id)
                    .and_then(|l| lane_index.get(l.id.as_str()).copied())
                    .unwrap_or(band_count - 1)
            })
            .collect();

        let mut slots = vec![0i64; count];
        let mut used: HashMap<(usize, i64), i64> = HashMap::new();
        for i in 0..count {
            let slot = used.entry((bands[i], columns[i])).or_insert(0);
            slots[i] = *slot;
            *slot += 1;
        }

        let mut band_rows = vec![0i64; band_count];
        for i in 0..count {
            band_rows[bands[i]] = band_rows[bands[i]].max(slots[i] + 1);
        }
        for (band, rows) in band_rows.iter_mut().enumerate() {
            if band < document.lanes.len() || (band == band_count - 1 && document.lanes.is_empty())
            {
                *rows = (*rows).max(1);
            }
        }

        let mut band_tops = vec![ORIGIN_Y; band_count];
        let mut top = ORIGIN_Y;
        for band in 0..band_count {
            band_tops[band] = top;
            top += band_rows[band] * ROW_HEIGHT;
        }
        let total_height = (top - ORIGIN_Y).max(ROW_HEIGHT);

        let max_column = columns.iter().copied().max().unwrap_or(0);
        let width = LABEL_BAND + FIRST_COLUMN_OFFSET * 2 + (max_column + 1) * COLUMN_WIDTH;

        let participant = Bounds {
            x: ORIGIN_X,
            y: ORIGIN_Y,
            width,
            height: total_height,
        };

        let lanes = document
            .lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| {
                let bounds = Bounds {
                    x: ORIGIN_X + LABEL_BAND,
                    y: band_tops[i],
                    width: width - LABEL_BAND,
                    height: band_rows[i] * ROW_HEIGHT,
                };
                (lane.id.clone(), bounds)
            })
            .collect();

        let elements = document
            .elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let (w, h) = shape_size(element.kind);
                let cx = ORIGIN_X + LABEL_BAND + FIRST_COLUMN_OFFSET + columns[i] * COLUMN_WIDTH;
                let cy = band_tops[bands[i]] + slots[i] * ROW_HEIGHT + ROW_HEIGHT / 2;
                let bounds = Bounds {
                    x: cx - w / 2,
                    y: cy - h / 2,
                    width: w,
                    height: h,
                };
                (element.id.clone(), bounds)
            })
            .collect();

        Self {
            participant,
            lanes,
            elements,
        }
    }
}

/// Flow graph over element indices.
struct Graph {
    adjacency: Vec<Vec<usize>>,
    indegree: Vec<usize>,
}

impl Graph {
    fn new(count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); count],
            indegree: vec![0; count],
        }
    }

    /// Longest-path column of every node, ignoring back edges.
    fn columns(&self) -> Vec<i64> {
        let count = self.adjacency.len();
        let mut state = vec![Visit::New; count];
        let mut forward = vec![Vec::new(); count];
        let mut postorder = Vec::with_capacity(count);

        let roots = (0..count).filter(|&i| self.indegree[i] == 0).chain(0..count);
        for root in roots {
            if state[root] == Visit::New {
                self.visit(root, &mut state, &mut forward, &mut postorder);
            }
        }

        let mut columns = vec![0i64; count];
        for &node in postorder.iter().rev() {
            for &next in &forward[node] {
                columns[next] = columns[next].max(columns[node] + 1);
            }
        }
        columns
    }

    fn visit(
        &self,
        node: usize,
        state: &mut [Visit],
        forward: &mut [Vec<usize>],
        postorder: &mut Vec<usize>,
    ) {
        state[node] = Visit::Active;
        for &next in &self.adjacency[node] {
            match state[next] {
                Visit::New => {
                    forward[node].push(next);
                    self.visit(next, state, forward, postorder);
                }
                Visit::Done => forward[node].push(next),
                Visit::Active => {}
            }
        }
        state[node] = Visit::Done;
        postorder.push(node);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

fn shape_size(kind: ElementType) -> (i64, i64) {
    if kind.is_task() {
        (100, 80)
    } else if kind.is_gateway() {
        (50, 50)
    } else {
        (36, 36)
    }
}

/// Decodes the first process of a BPMN 2.0 document.
///
/// DI and unknown extension elements are ignored. Flow-node kinds the
/// canonical model cannot represent are rejected with a conversion error.
pub fn from_xml(xml: &str) -> Result<BpmnDocument> {
    let mut reader = Reader::from_str(xml);
    let mut extended = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local(&e) == b"definitions" => {
                extended = declares_processlab_ns(&e)?;
            }
            Event::Start(e) if local(&e) == b"process" => {
                let mut parser = ProcessParser::new(process_info(&e)?, extended);
                parser.parse(&mut reader)?;
                return Ok(parser.finish());
            }
            Event::Empty(e) if local(&e) == b"process" => {
                return Ok(BpmnDocument {
                    process: process_info(&e)?,
                    ..Default::default()
                });
            }
            Event::Eof => {
                return Err(Error::conversion().with_message("No BPMN process found in XML"));
            }
            _ => {}
        }
    }
}

fn local<'a>(e: &'a BytesStart<'_>) -> &'a [u8] {
    e.local_name().into_inner()
}

fn local_str(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(local(e)).into_owned()
}

fn declares_processlab_ns(e: &BytesStart<'_>) -> Result<bool> {
    for attribute in e.attributes() {
        let attribute = attribute?;
        let is_declaration = attribute
            .key
            .prefix()
            .is_some_and(|p| p.as_ref() == b"xmlns")
            || attribute.key.as_ref() == b"xmlns";
        if is_declaration && attribute.unescape_value()? == PROCESSLAB_NS {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Attributes of one element, split into plain and prefixed (extension) ones.
#[derive(Default)]
struct Attributes {
    plain: HashMap<String, String>,
    extension: HashMap<String, String>,
}

impl Attributes {
    fn read(e: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Self::default();
        for attribute in e.attributes() {
            let attribute = attribute?;
            let name = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            match attribute.key.prefix() {
                Some(prefix) if prefix.as_ref() == b"xmlns" => {}
                Some(_) => {
                    attributes.extension.insert(name, value);
                }
                None => {
                    attributes.plain.insert(name, value);
                }
            }
        }
        Ok(attributes)
    }

    fn get(&self, name: &str) -> Option<String> {
        self.plain.get(name).cloned()
    }

    fn require(&self, name: &str, element: &str) -> Result<String> {
        self.get(name).ok_or_else(|| {
            Error::conversion().with_message(format!("<{element}> is missing the '{name}' attribute"))
        })
    }

    fn extension(&self, name: &str) -> Option<String> {
        self.extension.get(name).cloned()
    }
}

fn process_info(e: &BytesStart<'_>) -> Result<ProcessInfo> {
    let attributes = Attributes::read(e)?;
    Ok(ProcessInfo {
        id: attributes.require("id", "process")?,
        name: attributes.get("name"),
        documentation: None,
    })
}

/// Reads the text content of the element just opened, up to its end tag.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut content = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Text(t) if depth == 0 => content.push_str(&t.unescape()?),
            Event::CData(c) if depth == 0 => content.push_str(std::str::from_utf8(&c)?),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(content),
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(Error::conversion().with_message("Unexpected end of BPMN XML"));
            }
            _ => {}
        }
    }
}

/// Skips the element just opened, including all of its children.
fn skip(reader: &mut Reader<&[u8]>, e: &BytesStart<'_>) -> Result<()> {
    reader.read_to_end(e.name())?;
    Ok(())
}

struct ProcessParser {
    process: ProcessInfo,
    extended: bool,
    lanes: Vec<Lane>,
    elements: Vec<Element>,
    flows: Vec<SequenceFlow>,
}

impl ProcessParser {
    fn new(process: ProcessInfo, extended: bool) -> Self {
        Self {
            process,
            extended,
            lanes: Vec::new(),
            elements: Vec::new(),
            flows: Vec::new(),
        }
    }

    fn parse(&mut self, reader: &mut Reader<&[u8]>) -> Result<()> {
        loop {
            match reader.read_event()? {
                Event::Start(e) => self.child(reader, &e, true)?,
                Event::Empty(e) => self.child(reader, &e, false)?,
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(Error::conversion().with_message("Unterminated <process> element"));
                }
                _ => {}
            }
        }
    }

    fn child(&mut self, reader: &mut Reader<&[u8]>, e: &BytesStart<'_>, open: bool) -> Result<()> {
        let name = local_str(e);
        match name.as_str() {
            "documentation" => {
                let documentation = if open { read_text(reader)? } else { String::new() };
                self.process.documentation = Some(documentation);
            }
            "laneSet" if open => self.lane_set(reader)?,
            "laneSet" => {}
            "sequenceFlow" => {
                self.flow(e)?;
                if open {
                    skip(reader, e)?;
                }
            }
            other => {
                if let Ok(kind) = other.parse::<ElementType>() {
                    let mut element = self.element(e, kind)?;
                    if open {
                        element.meta = read_node_children(reader)?;
                    }
                    self.elements.push(element);
                } else if IGNORED_PROCESS_CHILDREN.contains(&other) {
                    if open {
                        skip(reader, e)?;
                    }
                } else {
                    let id = Attributes::read(e)?.get("id").unwrap_or_default();
                    return Err(Error::conversion().with_message(format!(
                        "Unsupported BPMN element <{other}> '{id}'"
                    )));
                }
            }
        }
        Ok(())
    }

    fn lane_set(&mut self, reader: &mut Reader<&[u8]>) -> Result<()> {
        loop {
            match reader.read_event()? {
                Event::Start(e) if local(&e) == b"lane" => {
                    let attributes = Attributes::read(&e)?;
                    let index = self.lanes.len();
                    self.lanes.push(Lane {
                        id: attributes.require("id", "lane")?,
                        name: attributes.get("name"),
                        child_element_ids: Vec::new(),
                    });
                    self.lane(reader, index)?;
                }
                Event::Empty(e) if local(&e) == b"lane" => {
                    let attributes = Attributes::read(&e)?;
                    self.lanes.push(Lane {
                        id: attributes.require("id", "lane")?,
                        name: attributes.get("name"),
                        child_element_ids: Vec::new(),
                    });
                }
                Event::Start(e) => skip(reader, &e)?,
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(Error::conversion().with_message("Unterminated <laneSet> element"));
                }
                _ => {}
            }
        }
    }

    /// Reads one lane's children; nested lane sets are flattened after it.
    fn lane(&mut self, reader: &mut Reader<&[u8]>, index: usize) -> Result<()> {
        loop {
            match reader.read_event()? {
                Event::Start(e) if local(&e) == b"flowNodeRef" => {
                    let id = read_text(reader)?.trim().to_owned();
                    self.lanes[index].child_element_ids.push(id);
                }
                Event::Start(e) if local(&e) == b"childLaneSet" => self.lane_set(reader)?,
                Event::Start(e) => skip(reader, &e)?,
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(Error::conversion().with_message("Unterminated <lane> element"));
                }
                _ => {}
            }
        }
    }

    fn element(&self, e: &BytesStart<'_>, kind: ElementType) -> Result<Element> {
        let attributes = Attributes::read(e)?;
        Ok(Element {
            id: attributes.require("id", kind.as_ref())?,
            kind,
            name: attributes.get("name"),
            lane_id: attributes.extension("laneId"),
            meta: None,
        })
    }

    fn flow(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let attributes = Attributes::read(e)?;
        let generated = attributes.extension("generatedId").as_deref() == Some("true");
        let id = attributes.get("id").filter(|_| !generated);

        self.flows.push(SequenceFlow {
            id,
            source: attributes.require("sourceRef", "sequenceFlow")?,
            target: attributes.require("targetRef", "sequenceFlow")?,
            kind: attributes
                .extension("flowType")
                .unwrap_or_else(|| DEFAULT_FLOW_TYPE.to_owned()),
            name: attributes.get("name"),
        });
        Ok(())
    }

    fn finish(mut self) -> BpmnDocument {
        // Documents from other modelers carry lane membership only.
        if !self.extended {
            for element in &mut self.elements {
                element.lane_id = self
                    .lanes
                    .iter()
                    .find(|l| l.child_element_ids.contains(&element.id))
                    .map(|l| l.id.clone());
            }
        }

        BpmnDocument {
            process: self.process,
            lanes: self.lanes,
            elements: self.elements,
            flows: self.flows,
        }
    }
}

/// Reads a flow node's children, returning its `processlab:meta` if any.
fn read_node_children(reader: &mut Reader<&[u8]>) -> Result<Option<ElementMeta>> {
    let mut meta = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if local(&e) == b"extensionElements" => {
                meta = read_extension_elements(reader)?.or(meta);
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => return Ok(meta),
            Event::Eof => {
                return Err(Error::conversion().with_message("Unterminated flow node element"));
            }
            _ => {}
        }
    }
}

fn read_extension_elements(reader: &mut Reader<&[u8]>) -> Result<Option<ElementMeta>> {
    let mut meta = None;
    loop {
        match reader.read_event()? {
            Event::Empty(e) if local(&e) == b"meta" && e.name().prefix().is_some() => {
                meta = Some(read_meta(&e)?);
            }
            Event::Start(e) if local(&e) == b"meta" && e.name().prefix().is_some() => {
                meta = Some(read_meta(&e)?);
                skip(reader, &e)?;
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => return Ok(meta),
            Event::Eof => {
                return Err(Error::conversion().with_message("Unterminated <extensionElements>"));
            }
            _ => {}
        }
    }
}

fn read_meta(e: &BytesStart<'_>) -> Result<ElementMeta> {
    let attributes = Attributes::read(e)?;
    let page_number = attributes
        .get("pageNumber")
        .map(|page| {
            page.trim().parse::<u32>().map_err(|error| {
                Error::conversion()
                    .with_message(format!("Invalid pageNumber '{page}'"))
                    .with_source(error)
            })
        })
        .transpose()?;

    Ok(ElementMeta {
        source_artifact_id: attributes.get("sourceArtifactId"),
        page_number,
    })
}
