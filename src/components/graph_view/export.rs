//! Download formats.
//!
//! JSON and GEXF serialize the graph itself, SVG serializes what is on
//! screen. PNG goes through the canvas and lives in the component.

use std::fmt::Write;

use indexmap::IndexMap;

use super::camera::Projection;
use super::graph::Graph;
use super::reducers::Frame;
use super::theme::{Theme, parse_color};
use super::types::{AttrValue, Attributes, GraphType};
use super::visual::EdgeType;
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
	Png,
	Svg,
	Gexf,
	Json,
}

impl ExportFormat {
	pub const ALL: [ExportFormat; 4] =
		[ExportFormat::Png, ExportFormat::Svg, ExportFormat::Gexf, ExportFormat::Json];

	/// Button caption.
	pub fn name(self) -> &'static str {
		match self {
			ExportFormat::Png => "png",
			ExportFormat::Svg => "svg",
			ExportFormat::Gexf => "gexf",
			ExportFormat::Json => "json",
		}
	}

	pub fn file_name(self) -> String {
		format!("graph.{}", self.name())
	}

	pub fn mime(self) -> &'static str {
		match self {
			ExportFormat::Png => "image/png",
			ExportFormat::Svg => "image/svg+xml",
			ExportFormat::Gexf => "application/xml",
			ExportFormat::Json => "application/json",
		}
	}
}

/// Pretty-printed serialized graph, current positions included.
pub fn export_json(graph: &Graph) -> Result<String> {
	Ok(serde_json::to_string_pretty(&graph.to_data())?)
}

fn escape_xml(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&apos;"),
			c => escaped.push(c),
		}
	}
	escaped
}

/// GEXF attribute type inferred from every non-null value of a column.
fn infer_type<'a>(values: impl Iterator<Item = &'a AttrValue>) -> &'static str {
	let mut kind = None;
	for value in values {
		let current = match value {
			AttrValue::Null => continue,
			AttrValue::Number(_) => "double",
			AttrValue::Bool(_) => "boolean",
			AttrValue::String(_) | AttrValue::Json(_) => "string",
		};
		match kind {
			None => kind = Some(current),
			Some(k) if k != current => return "string",
			_ => {}
		}
	}
	kind.unwrap_or("string")
}

const NODE_VIZ: [&str; 3] = ["label", "size", "color"];
const EDGE_VIZ: [&str; 3] = ["label", "size", "color"];

/// Attribute columns, in first-seen order, excluding viz attributes.
fn columns<'a>(bags: impl Iterator<Item = &'a Attributes> + Clone, viz: &[&str]) -> IndexMap<String, &'static str> {
	let mut names: Vec<&str> = Vec::new();
	for bag in bags.clone() {
		for name in bag.keys() {
			if !viz.contains(&name.as_str()) && !names.contains(&name.as_str()) {
				names.push(name);
			}
		}
	}
	names
		.into_iter()
		.map(|name| {
			let kind = infer_type(bags.clone().filter_map(|bag| bag.get(name)));
			(name.to_string(), kind)
		})
		.collect()
}

fn write_attributes_block(out: &mut String, class: &str, columns: &IndexMap<String, &'static str>) {
	if columns.is_empty() {
		return;
	}
	let _ = writeln!(out, "    <attributes class=\"{class}\">");
	for (i, (name, kind)) in columns.iter().enumerate() {
		let _ = writeln!(
			out,
			"      <attribute id=\"{i}\" title=\"{}\" type=\"{kind}\"/>",
			escape_xml(name)
		);
	}
	let _ = writeln!(out, "    </attributes>");
}

fn write_attvalues(out: &mut String, attributes: &Attributes, columns: &IndexMap<String, &'static str>) {
	let values: Vec<(usize, &AttrValue)> = columns
		.keys()
		.enumerate()
		.filter_map(|(i, name)| attributes.get(name).filter(|v| !v.is_null()).map(|v| (i, v)))
		.collect();
	if values.is_empty() {
		return;
	}
	let _ = writeln!(out, "        <attvalues>");
	for (i, value) in values {
		let _ = writeln!(
			out,
			"          <attvalue for=\"{i}\" value=\"{}\"/>",
			escape_xml(&value.to_string())
		);
	}
	let _ = writeln!(out, "        </attvalues>");
}

fn write_viz_color(out: &mut String, attributes: &Attributes) {
	if let Some(color) = attributes.get("color").and_then(AttrValue::as_str).and_then(parse_color) {
		let _ = write!(out, "        <viz:color r=\"{}\" g=\"{}\" b=\"{}\"", color.r, color.g, color.b);
		if color.a < 1.0 {
			let _ = write!(out, " a=\"{}\"", color.a);
		}
		let _ = writeln!(out, "/>");
	}
}

/// GEXF 1.2 document with `viz` positions, sizes and colors.
pub fn export_gexf(graph: &Graph) -> String {
	let node_columns = columns(graph.nodes().iter().map(|n| &n.attributes), &NODE_VIZ);
	let edge_columns = columns(graph.edges().iter().map(|e| &e.attributes), &EDGE_VIZ);
	let default_type = match graph.kind() {
		GraphType::Undirected => "undirected",
		GraphType::Directed => "directed",
		GraphType::Mixed => "mixed",
	};

	let mut out = String::new();
	out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
	out.push_str(
		"<gexf xmlns=\"http://www.gexf.net/1.2draft\" xmlns:viz=\"http://www.gexf.net/1.2draft/viz\" version=\"1.2\">\n",
	);
	out.push_str("  <meta>\n    <creator>graph-explorer</creator>\n  </meta>\n");
	let _ = writeln!(out, "  <graph defaultedgetype=\"{default_type}\">");
	write_attributes_block(&mut out, "node", &node_columns);
	write_attributes_block(&mut out, "edge", &edge_columns);

	out.push_str("    <nodes>\n");
	for node in graph.nodes() {
		let label = node
			.attributes
			.get("label")
			.filter(|v| v.is_truthy())
			.map(|v| v.to_string())
			.unwrap_or_else(|| node.key.clone());
		let _ = writeln!(
			out,
			"      <node id=\"{}\" label=\"{}\">",
			escape_xml(&node.key),
			escape_xml(&label)
		);
		write_attvalues(&mut out, &node.attributes, &node_columns);
		let _ = writeln!(
			out,
			"        <viz:position x=\"{}\" y=\"{}\" z=\"0\"/>",
			node.position.x, node.position.y
		);
		if let Some(size) = node.attributes.get("size").and_then(AttrValue::as_f64) {
			let _ = writeln!(out, "        <viz:size value=\"{size}\"/>");
		}
		write_viz_color(&mut out, &node.attributes);
		out.push_str("      </node>\n");
	}
	out.push_str("    </nodes>\n");

	out.push_str("    <edges>\n");
	for (i, edge) in graph.edges().iter().enumerate() {
		let (source, target) = graph.extremities(i);
		let _ = write!(
			out,
			"      <edge id=\"{}\" source=\"{}\" target=\"{}\"",
			escape_xml(&edge.key),
			escape_xml(source),
			escape_xml(target)
		);
		if graph.kind() == GraphType::Mixed {
			let _ = write!(out, " type=\"{}\"", if edge.undirected { "undirected" } else { "directed" });
		}
		if let Some(label) = edge.attributes.get("label").filter(|v| v.is_truthy()) {
			let _ = write!(out, " label=\"{}\"", escape_xml(&label.to_string()));
		}
		out.push_str(">\n");
		write_attvalues(&mut out, &edge.attributes, &edge_columns);
		if let Some(size) = edge.attributes.get("size").and_then(AttrValue::as_f64) {
			let _ = writeln!(out, "        <viz:thickness value=\"{size}\"/>");
		}
		write_viz_color(&mut out, &edge.attributes);
		out.push_str("      </edge>\n");
	}
	out.push_str("    </edges>\n");
	out.push_str("  </graph>\n</gexf>\n");
	out
}

/// SVG rendering of a frame, as seen through `projection`.
///
/// Hidden edges are skipped and muted nodes are drawn below the others.
/// Labels follow the canvas rule: only nodes at least `label_threshold`
/// large get one.
pub fn export_svg(graph: &Graph, frame: &Frame, projection: &Projection, theme: &Theme) -> String {
	let mut out = String::new();
	let _ = writeln!(
		out,
		"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
		w = projection.width,
		h = projection.height
	);
	let _ = writeln!(
		out,
		"<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
		theme.background.to_css()
	);

	let viewport: Vec<(f64, f64)> = frame
		.nodes
		.iter()
		.map(|n| projection.graph_to_viewport(super::graph::Position { x: n.x, y: n.y }))
		.collect();

	out.push_str("<g>\n");
	for (i, edge) in frame.edges.iter().enumerate() {
		if edge.hidden {
			continue;
		}
		let e = graph.edge(i);
		let ((x1, y1), (x2, y2)) = (viewport[e.source], viewport[e.target]);
		let _ = write!(
			out,
			"<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"{}\" stroke-width=\"{:.2}\"",
			escape_xml(&edge.color),
			edge.size
		);
		if frame.edge_type == EdgeType::Arrow && !e.undirected {
			out.push_str(" marker-end=\"url(#arrow)\"");
		}
		out.push_str("/>\n");
	}
	out.push_str("</g>\n");

	let mut order: Vec<usize> = (0..frame.nodes.len()).collect();
	order.sort_by_key(|&i| frame.nodes[i].z_index);

	out.push_str("<g>\n");
	for &i in &order {
		let node = &frame.nodes[i];
		let (cx, cy) = viewport[i];
		let _ = writeln!(
			out,
			"<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
			projection.node_radius(node.size),
			escape_xml(&node.color)
		);
	}
	out.push_str("</g>\n");

	out.push_str("<g>\n");
	for &i in &order {
		let node = &frame.nodes[i];
		if node.label.is_empty() || node.size < frame.label_threshold {
			continue;
		}
		let (cx, cy) = viewport[i];
		let _ = writeln!(
			out,
			"<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
			cx + projection.node_radius(node.size) + 3.0,
			cy + theme.label_size / 3.0,
			theme.label_font,
			theme.label_size,
			theme.label_color.to_css(),
			escape_xml(&node.label)
		);
	}
	out.push_str("</g>\n");

	if frame.edge_type == EdgeType::Arrow {
		out.push_str(
			"<defs><marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"#999\"/></marker></defs>\n",
		);
	}
	out.push_str("</svg>\n");
	out
}
