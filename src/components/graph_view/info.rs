//! Side panel content: graph description, search options and details about
//! the selected item.

use super::graph::Graph;
use super::interaction::EntityKind;
use super::types::AttrValue;
use super::visual::KWARG_PREFIX;

/// Attributes shown under "Known viz data" rather than "Attributes".
const NODE_VIZ_ATTRIBUTES: [&str; 5] = ["label", "size", "color", "x", "y"];
const EDGE_VIZ_ATTRIBUTES: [&str; 3] = ["label", "size", "color"];

/// Which tab of the information display is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoTab {
	#[default]
	Legend,
	Info,
}

/// Braille frames of the layout button spinner.
pub const SPINNER_FRAMES: [char; 8] = ['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];
const SPINNER_FRAME_MS: f64 = 80.0;

/// Spinner frame shown `elapsed_ms` after the layout started.
pub fn spinner_frame(elapsed_ms: f64) -> char {
	let step = (elapsed_ms.max(0.0) / SPINNER_FRAME_MS) as usize;
	SPINNER_FRAMES[step % SPINNER_FRAMES.len()]
}

/// Formats an integer with thousands separators: `12345` -> `"12,345"`.
pub fn comma_number(n: usize) -> String {
	let digits = n.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			out.push(',');
		}
		out.push(c);
	}
	out
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphDescription {
	pub title: String,
	pub nodes: String,
	pub edges: String,
}

pub fn describe(graph: &Graph) -> GraphDescription {
	GraphDescription {
		title: graph.title(),
		nodes: comma_number(graph.order()),
		edges: comma_number(graph.size()),
	}
}

/// An entry of the node search box.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOption {
	pub key: String,
	/// Label attribute, only when it differs from the key.
	pub label: Option<String>,
}

pub fn search_options(graph: &Graph, label_attribute: Option<&str>) -> Vec<SearchOption> {
	graph
		.nodes()
		.iter()
		.map(|node| SearchOption {
			key: node.key.clone(),
			label: label_attribute
				.and_then(|a| node.attributes.get(a))
				.filter(|v| v.is_truthy())
				.map(|v| v.to_string())
				.filter(|label| *label != node.key),
		})
		.collect()
}

impl SearchOption {
	/// Text of the entry in the search results.
	pub fn text(&self) -> String {
		match &self.label {
			Some(label) => format!("{label} ({})", self.key),
			None => self.key.clone(),
		}
	}
}

/// Options whose key or label contains `query`, ignoring case, in node
/// order and capped at `limit`. A blank query matches nothing.
pub fn filter_search_options<'a>(options: &'a [SearchOption], query: &str, limit: usize) -> Vec<&'a SearchOption> {
	let query = query.trim().to_lowercase();
	if query.is_empty() {
		return Vec::new();
	}
	options
		.iter()
		.filter(|option| {
			option.key.to_lowercase().contains(&query)
				|| option.label.as_ref().is_some_and(|l| l.to_lowercase().contains(&query))
		})
		.take(limit)
		.collect()
}

/// Text shown in the info tab while nothing is selected.
pub fn placeholder(clickable_edges: bool) -> &'static str {
	if clickable_edges {
		"Click on a node/edge or search a node to display information about it..."
	} else {
		"Click on a node or search a node to display information about it..."
	}
}

/// One `name value` line of the info tab.
#[derive(Clone, Debug, PartialEq)]
pub struct InfoEntry {
	pub name: String,
	pub value: AttrValue,
}

impl InfoEntry {
	fn new(name: &str, value: AttrValue) -> Self {
		Self {
			name: name.to_string(),
			value,
		}
	}
}

/// Details about the selected node or edge.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemInfo {
	pub kind: EntityKind,
	/// Node key, or edge key unless it was generated.
	pub key: Option<String>,
	/// Source and target keys, for edges.
	pub extremities: Option<(String, String)>,
	pub kwargs: Vec<InfoEntry>,
	pub attributes: Vec<InfoEntry>,
	pub viz: Vec<InfoEntry>,
	/// Degree metrics, for nodes.
	pub metrics: Vec<InfoEntry>,
}

fn split_attributes<'a>(
	attributes: impl Iterator<Item = (&'a String, &'a AttrValue)>,
	viz_attributes: &[&str],
) -> (Vec<InfoEntry>, Vec<InfoEntry>, Vec<InfoEntry>) {
	let (mut kwargs, mut plain, mut viz) = (Vec::new(), Vec::new(), Vec::new());
	for (name, value) in attributes {
		if viz_attributes.contains(&name.as_str()) {
			viz.push(InfoEntry::new(name, value.clone()));
		} else if let Some(stripped) = name.strip_prefix(KWARG_PREFIX) {
			kwargs.push(InfoEntry::new(stripped, value.clone()));
		} else {
			plain.push(InfoEntry::new(name, value.clone()));
		}
	}
	(kwargs, plain, viz)
}

pub fn node_info(graph: &Graph, node: usize) -> ItemInfo {
	let n = graph.node(node);
	let position = [
		("x".to_string(), AttrValue::Number(n.position.x)),
		("y".to_string(), AttrValue::Number(n.position.y)),
	];
	let (kwargs, attributes, viz) = split_attributes(
		n.attributes.iter().chain(position.iter().map(|(k, v)| (k, v))),
		&NODE_VIZ_ATTRIBUTES,
	);

	let mut metrics = vec![InfoEntry::new("degree", AttrValue::Number(graph.degree(node) as f64))];
	if graph.directed_size() != 0 {
		metrics.push(InfoEntry::new("indegree", AttrValue::Number(graph.in_degree(node) as f64)));
		metrics.push(InfoEntry::new("outdegree", AttrValue::Number(graph.out_degree(node) as f64)));
	}

	ItemInfo {
		kind: EntityKind::Node,
		key: Some(n.key.clone()),
		extremities: None,
		kwargs,
		attributes,
		viz,
		metrics,
	}
}

pub fn edge_info(graph: &Graph, edge: usize) -> ItemInfo {
	let e = graph.edge(edge);
	let (source, target) = graph.extremities(edge);
	let (kwargs, attributes, viz) = split_attributes(e.attributes.iter(), &EDGE_VIZ_ATTRIBUTES);
	ItemInfo {
		kind: EntityKind::Edge,
		key: (!e.key.starts_with("geid_")).then(|| e.key.clone()),
		extremities: Some((source.to_string(), target.to_string())),
		kwargs,
		attributes,
		viz,
		metrics: Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_view::graph::{build_graph, create_rng};
	use crate::components::graph_view::types::{EdgeRecord, GraphData, GraphOptions, GraphType, NodeRecord};

	#[test]
	fn spinner_cycles_every_eight_frames() {
		assert_eq!(spinner_frame(0.0), '⣾');
		assert_eq!(spinner_frame(79.0), '⣾');
		assert_eq!(spinner_frame(80.0), '⣽');
		assert_eq!(spinner_frame(8.0 * 80.0), '⣾');
	}

	#[test]
	fn comma_number_groups_thousands() {
		assert_eq!(comma_number(0), "0");
		assert_eq!(comma_number(999), "999");
		assert_eq!(comma_number(1000), "1,000");
		assert_eq!(comma_number(1234567), "1,234,567");
	}

	fn graph(kind: GraphType) -> Graph {
		let data = GraphData {
			options: GraphOptions {
				kind,
				multi: true,
				..Default::default()
			},
			nodes: vec![
				NodeRecord::new("a")
					.with_attr("label", "Alpha")
					.with_attr("$$group", "g1")
					.with_attr("age", 3.0),
				NodeRecord::new("b").with_attr("label", "b"),
			],
			edges: vec![
				EdgeRecord::new("a", "b").with_attr("size", 2.0),
				EdgeRecord {
					key: Some("named".into()),
					..EdgeRecord::new("b", "a")
				},
			],
			..Default::default()
		};
		build_graph(&data, &mut create_rng(0)).unwrap()
	}

	#[test]
	fn description_and_search() {
		let g = graph(GraphType::Undirected);
		let description = describe(&g);
		assert_eq!(description.title, "Multi Undirected Graph");
		assert_eq!((description.nodes.as_str(), description.edges.as_str()), ("2", "2"));

		let options = search_options(&g, Some("label"));
		assert_eq!(options[0].label.as_deref(), Some("Alpha"));
		assert_eq!(options[1].label, None);
	}

	#[test]
	fn search_filters_by_key_or_label() {
		let options = vec![
			SearchOption {
				key: "a".into(),
				label: Some("Alpha".into()),
			},
			SearchOption {
				key: "alps".into(),
				label: None,
			},
			SearchOption {
				key: "b".into(),
				label: Some("Beta".into()),
			},
		];
		let keys = |query: &str, limit: usize| -> Vec<String> {
			filter_search_options(&options, query, limit).into_iter().map(|o| o.key.clone()).collect()
		};
		assert_eq!(keys("AL", 10), vec!["a", "alps"]);
		assert_eq!(keys("al", 1), vec!["a"]);
		assert_eq!(keys("bet", 10), vec!["b"]);
		assert!(keys("  ", 10).is_empty());
		assert!(keys("zz", 10).is_empty());
		assert_eq!(options[0].text(), "Alpha (a)");
		assert_eq!(options[1].text(), "alps");
	}

	#[test]
	fn node_info_groups_attributes() {
		let info = node_info(&graph(GraphType::Directed), 0);
		assert_eq!(info.kwargs, vec![InfoEntry::new("group", "g1".into())]);
		assert_eq!(info.attributes, vec![InfoEntry::new("age", 3.0.into())]);
		let viz: Vec<&str> = info.viz.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(viz, vec!["label", "x", "y"]);
		let metrics: Vec<&str> = info.metrics.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(metrics, vec!["degree", "indegree", "outdegree"]);
	}

	#[test]
	fn undirected_nodes_only_report_degree() {
		let info = node_info(&graph(GraphType::Undirected), 0);
		assert_eq!(info.metrics, vec![InfoEntry::new("degree", 2.0.into())]);
	}

	#[test]
	fn generated_edge_keys_are_hidden() {
		let g = graph(GraphType::Directed);
		let info = edge_info(&g, 0);
		assert_eq!(info.key, None);
		assert_eq!(info.extremities, Some(("a".into(), "b".into())));
		assert_eq!(info.viz, vec![InfoEntry::new("size", 2.0.into())]);
		assert_eq!(edge_info(&g, 1).key.as_deref(), Some("named"));
		assert_eq!(placeholder(false), "Click on a node or search a node to display information about it...");
	}
}
