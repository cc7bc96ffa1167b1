//! In-memory attributed multigraph built from the host's serialized data.
//!
//! Node positions are pulled out of the attribute bags into [`Position`] so
//! the layout code can update them without touching the maps. They are put
//! back as `x`/`y` attributes when the graph is exported.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::types::{AttrValue, Attributes, EdgeRecord, GraphData, GraphOptions, GraphType, NodeRecord};
use crate::error::GraphError;

/// A node position in graph space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
}

/// Node key -> position mapping persisted to the host under `layout`.
pub type LayoutSnapshot = IndexMap<String, Position>;

#[derive(Clone, Debug)]
pub struct Node {
	pub key: String,
	pub attributes: Attributes,
	pub position: Position,
}

#[derive(Clone, Debug)]
pub struct Edge {
	pub key: String,
	pub source: usize,
	pub target: usize,
	pub attributes: Attributes,
	pub undirected: bool,
}

impl Edge {
	pub fn is_self_loop(&self) -> bool {
		self.source == self.target
	}
}

/// Attributed multigraph. Nodes and edges are addressed by dense indices;
/// keys are resolved through lookup tables.
#[derive(Clone, Debug)]
pub struct Graph {
	options: GraphOptions,
	attributes: Attributes,
	nodes: Vec<Node>,
	node_index: HashMap<String, usize>,
	edges: Vec<Edge>,
	edge_index: HashMap<String, usize>,
	incidence: Vec<Vec<usize>>,
}

/// Seeded generator used for every pseudo-random decision in the widget.
pub fn create_rng(seed: u64) -> StdRng {
	StdRng::seed_from_u64(seed)
}

fn valid_coordinate(value: Option<&AttrValue>) -> Option<f64> {
	value.and_then(AttrValue::as_f64)
}

/// Builds the graph, assigning random coordinates in `[0, 1)` to nodes
/// lacking a finite `x` or `y`.
///
/// Fails if an edge references an undefined node. Attribute values are
/// otherwise passed through untouched.
pub fn build_graph<R: Rng>(data: &GraphData, rng: &mut R) -> Result<Graph, GraphError> {
	let mut nodes = Vec::with_capacity(data.nodes.len());
	let mut node_index = HashMap::with_capacity(data.nodes.len());

	for record in &data.nodes {
		if node_index.contains_key(&record.key) {
			return Err(GraphError::DuplicateNode(record.key.clone()));
		}
		let mut attributes = record.attributes.clone();
		let x = valid_coordinate(attributes.get("x")).unwrap_or_else(|| rng.r#gen::<f64>());
		let y = valid_coordinate(attributes.get("y")).unwrap_or_else(|| rng.r#gen::<f64>());
		attributes.shift_remove("x");
		attributes.shift_remove("y");

		node_index.insert(record.key.clone(), nodes.len());
		nodes.push(Node {
			key: record.key.clone(),
			attributes,
			position: Position { x, y },
		});
	}

	let mut edges = Vec::with_capacity(data.edges.len());
	let mut edge_index = HashMap::with_capacity(data.edges.len());
	let mut incidence = vec![Vec::new(); nodes.len()];
	let mut generated = 0usize;
	let explicit_keys: HashSet<&str> = data.edges.iter().filter_map(|e| e.key.as_deref()).collect();

	for record in &data.edges {
		let key = match &record.key {
			Some(key) => {
				if edge_index.contains_key(key) {
					return Err(GraphError::DuplicateEdge(key.clone()));
				}
				key.clone()
			}
			None => loop {
				let candidate = format!("geid_{generated}");
				generated += 1;
				if !edge_index.contains_key(&candidate) && !explicit_keys.contains(candidate.as_str()) {
					break candidate;
				}
			},
		};

		let resolve = |node: &str, endpoint: &'static str| {
			node_index.get(node).copied().ok_or_else(|| GraphError::DanglingEdge {
				edge: key.clone(),
				endpoint,
				node: node.to_string(),
			})
		};
		let source = resolve(&record.source, "source")?;
		let target = resolve(&record.target, "target")?;

		let undirected = match data.options.kind {
			GraphType::Undirected => true,
			GraphType::Directed => false,
			GraphType::Mixed => record.undirected,
		};

		if source == target && !data.options.allow_self_loops {
			return Err(GraphError::SelfLoop(key));
		}
		if !data.options.multi {
			let parallel = incidence[source].iter().any(|&e| {
				let edge: &Edge = &edges[e];
				edge.undirected == undirected
					&& ((edge.source == source && edge.target == target)
						|| (undirected && edge.source == target && edge.target == source))
			});
			if parallel {
				return Err(GraphError::ParallelEdge {
					edge: key,
					from: record.source.clone(),
					to: record.target.clone(),
				});
			}
		}

		let idx = edges.len();
		incidence[source].push(idx);
		if target != source {
			incidence[target].push(idx);
		}
		edge_index.insert(key.clone(), idx);
		edges.push(Edge {
			key,
			source,
			target,
			attributes: record.attributes.clone(),
			undirected,
		});
	}

	debug!("graph built: {} nodes, {} edges", nodes.len(), edges.len());

	Ok(Graph {
		options: data.options.clone(),
		attributes: data.attributes.clone(),
		nodes,
		node_index,
		edges,
		edge_index,
		incidence,
	})
}

impl Graph {
	pub fn order(&self) -> usize {
		self.nodes.len()
	}

	pub fn size(&self) -> usize {
		self.edges.len()
	}

	pub fn kind(&self) -> GraphType {
		self.options.kind
	}

	pub fn is_multi(&self) -> bool {
		self.options.multi
	}

	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	pub fn node(&self, idx: usize) -> &Node {
		&self.nodes[idx]
	}

	pub fn edge(&self, idx: usize) -> &Edge {
		&self.edges[idx]
	}

	pub fn node_index(&self, key: &str) -> Option<usize> {
		self.node_index.get(key).copied()
	}

	pub fn edge_index(&self, key: &str) -> Option<usize> {
		self.edge_index.get(key).copied()
	}

	pub fn node_attributes_mut(&mut self, idx: usize) -> &mut Attributes {
		&mut self.nodes[idx].attributes
	}

	/// Source and target node keys of an edge.
	pub fn extremities(&self, edge: usize) -> (&str, &str) {
		let e = &self.edges[edge];
		(&self.nodes[e.source].key, &self.nodes[e.target].key)
	}

	pub fn incident_edges(&self, node: usize) -> &[usize] {
		&self.incidence[node]
	}

	/// Distinct adjacent nodes, regardless of edge direction.
	pub fn neighbors(&self, node: usize) -> Vec<usize> {
		let mut seen = HashSet::new();
		self.incidence[node]
			.iter()
			.map(|&e| {
				let edge = &self.edges[e];
				if edge.source == node { edge.target } else { edge.source }
			})
			.filter(|n| seen.insert(*n))
			.collect()
	}

	/// Number of incident edges, self loops counted twice.
	pub fn degree(&self, node: usize) -> usize {
		self.incidence[node]
			.iter()
			.map(|&e| if self.edges[e].is_self_loop() { 2 } else { 1 })
			.sum()
	}

	pub fn in_degree(&self, node: usize) -> usize {
		self.incidence[node]
			.iter()
			.filter(|&&e| !self.edges[e].undirected && self.edges[e].target == node)
			.count()
	}

	pub fn out_degree(&self, node: usize) -> usize {
		self.incidence[node]
			.iter()
			.filter(|&&e| !self.edges[e].undirected && self.edges[e].source == node)
			.count()
	}

	/// Number of directed edges.
	pub fn directed_size(&self) -> usize {
		self.edges.iter().filter(|e| !e.undirected).count()
	}

	/// First edge going from `source` to `target`. Undirected edges match in
	/// either orientation.
	pub fn find_edge(&self, source: &str, target: &str) -> Option<usize> {
		let (s, t) = (self.node_index(source)?, self.node_index(target)?);
		self.incidence[s].iter().copied().find(|&e| {
			let edge = &self.edges[e];
			(edge.source == s && edge.target == t)
				|| (edge.undirected && edge.source == t && edge.target == s)
		})
	}

	pub fn position(&self, node: usize) -> Position {
		self.nodes[node].position
	}

	pub fn set_position(&mut self, node: usize, position: Position) {
		self.nodes[node].position = position;
	}

	pub fn positions(&self) -> Vec<Position> {
		self.nodes.iter().map(|n| n.position).collect()
	}

	/// Snapshot of every node position, keyed by node.
	pub fn collect_layout(&self) -> LayoutSnapshot {
		self.nodes.iter().map(|n| (n.key.clone(), n.position)).collect()
	}

	/// Moves nodes present in `layout`; others keep their position.
	pub fn apply_layout(&mut self, layout: &LayoutSnapshot) {
		for node in &mut self.nodes {
			if let Some(pos) = layout.get(&node.key) {
				node.position = *pos;
			}
		}
	}

	/// Headline used by the description panel, e.g. "Multi Undirected Graph".
	pub fn title(&self) -> String {
		format!(
			"{}{} Graph",
			if self.options.multi { "Multi " } else { "" },
			if self.options.kind == GraphType::Undirected { "Undirected" } else { "Directed" }
		)
	}

	/// Serializes the graph back to the host format, positions included.
	pub fn to_data(&self) -> GraphData {
		let nodes = self
			.nodes
			.iter()
			.map(|n| {
				let mut attributes = n.attributes.clone();
				attributes.insert("x".to_string(), AttrValue::Number(n.position.x));
				attributes.insert("y".to_string(), AttrValue::Number(n.position.y));
				NodeRecord {
					key: n.key.clone(),
					attributes,
				}
			})
			.collect();
		let edges = self
			.edges
			.iter()
			.map(|e| EdgeRecord {
				key: Some(e.key.clone()),
				source: self.nodes[e.source].key.clone(),
				target: self.nodes[e.target].key.clone(),
				attributes: e.attributes.clone(),
				undirected: self.options.kind == GraphType::Mixed && e.undirected,
			})
			.collect();
		GraphData {
			attributes: self.attributes.clone(),
			options: self.options.clone(),
			nodes,
			edges,
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use proptest::prelude::*;

	pub(crate) fn sample_data() -> GraphData {
		GraphData {
			options: GraphOptions {
				kind: GraphType::Undirected,
				..Default::default()
			},
			nodes: vec![
				NodeRecord::new("a").with_attr("x", 0.0).with_attr("y", 0.0),
				NodeRecord::new("b").with_attr("x", 1.0),
				NodeRecord::new("c"),
				NodeRecord::new("d").with_attr("x", "not a number"),
			],
			edges: vec![EdgeRecord::new("a", "b"), EdgeRecord::new("a", "c")],
			..Default::default()
		}
	}

	#[test]
	fn missing_positions_are_filled_in_unit_square() {
		let graph = build_graph(&sample_data(), &mut create_rng(1)).unwrap();
		assert_eq!(graph.position(0), Position { x: 0.0, y: 0.0 });
		assert_eq!(graph.position(1).x, 1.0);
		for node in graph.nodes() {
			assert!(node.position.x.is_finite() && node.position.y.is_finite());
			assert!(!node.attributes.contains_key("x"));
		}
		let d = graph.position(3);
		assert!((0.0..1.0).contains(&d.x));
	}

	#[test]
	fn dangling_edge_is_rejected() {
		let mut data = sample_data();
		data.edges.push(EdgeRecord::new("a", "zz"));
		let err = build_graph(&data, &mut create_rng(1)).unwrap_err();
		assert_eq!(
			err,
			GraphError::DanglingEdge {
				edge: "geid_2".into(),
				endpoint: "target",
				node: "zz".into()
			}
		);
	}

	#[test]
	fn duplicate_node_is_rejected() {
		let mut data = sample_data();
		data.nodes.push(NodeRecord::new("a"));
		assert_eq!(
			build_graph(&data, &mut create_rng(1)).unwrap_err(),
			GraphError::DuplicateNode("a".into())
		);
	}

	#[test]
	fn generated_edge_keys_skip_explicit_ones() {
		let mut data = sample_data();
		data.edges[1].key = Some("geid_0".into());
		let graph = build_graph(&data, &mut create_rng(1)).unwrap();
		assert_eq!(graph.edge(0).key, "geid_1");
		assert_eq!(graph.edge(1).key, "geid_0");
	}

	#[test]
	fn large_unkeyed_edge_sets_get_unique_keys() {
		let n = 20_000;
		let mut edges: Vec<EdgeRecord> =
			(0..n).map(|i| EdgeRecord::new(i.to_string(), ((i + 1) % n).to_string())).collect();
		edges[n - 1].key = Some("geid_5".into());
		let data = GraphData {
			options: GraphOptions {
				kind: GraphType::Directed,
				..Default::default()
			},
			nodes: (0..n).map(|i| NodeRecord::new(i.to_string())).collect(),
			edges,
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(1)).unwrap();
		assert_eq!(graph.size(), n);
		assert_eq!(graph.edge(5).key, "geid_6");
		assert_eq!(graph.edge(n - 2).key, format!("geid_{}", n - 1));
		assert_eq!(graph.edge_index("geid_5"), Some(n - 1));
	}

	#[test]
	fn simple_graphs_reject_parallel_edges() {
		let mut data = sample_data();
		data.edges.push(EdgeRecord::new("b", "a"));
		assert_eq!(
			build_graph(&data, &mut create_rng(1)).unwrap_err(),
			GraphError::ParallelEdge {
				edge: "geid_2".into(),
				from: "b".into(),
				to: "a".into()
			}
		);

		data.options.multi = true;
		assert_eq!(build_graph(&data, &mut create_rng(1)).unwrap().size(), 3);

		data.options.kind = GraphType::Directed;
		data.options.multi = false;
		assert_eq!(build_graph(&data, &mut create_rng(1)).unwrap().size(), 3);
	}

	#[test]
	fn self_loops_follow_graph_options() {
		let mut data = sample_data();
		data.edges.push(EdgeRecord::new("c", "c"));
		assert!(build_graph(&data, &mut create_rng(1)).unwrap().edge(2).is_self_loop());

		data.options.allow_self_loops = false;
		assert_eq!(
			build_graph(&data, &mut create_rng(1)).unwrap_err(),
			GraphError::SelfLoop("geid_2".into())
		);
	}

	#[test]
	fn neighborhood_and_degrees() {
		let graph = build_graph(&sample_data(), &mut create_rng(1)).unwrap();
		let a = graph.node_index("a").unwrap();
		let mut neighbors: Vec<&str> =
			graph.neighbors(a).into_iter().map(|n| graph.node(n).key.as_str()).collect();
		neighbors.sort();
		assert_eq!(neighbors, vec!["b", "c"]);
		assert_eq!(graph.degree(a), 2);
		assert_eq!(graph.directed_size(), 0);
		assert_eq!(graph.find_edge("b", "a"), Some(0));
		assert_eq!(graph.title(), "Undirected Graph");
	}

	#[test]
	fn directed_edges_only_match_forward() {
		let mut data = sample_data();
		data.options.kind = GraphType::Directed;
		data.options.multi = true;
		let graph = build_graph(&data, &mut create_rng(1)).unwrap();
		assert_eq!(graph.find_edge("b", "a"), None);
		assert_eq!(graph.find_edge("a", "b"), Some(0));
		assert_eq!(graph.out_degree(0), 2);
		assert_eq!(graph.in_degree(1), 1);
		assert_eq!(graph.title(), "Multi Directed Graph");
	}

	#[test]
	fn layout_snapshot_round_trips() {
		let mut graph = build_graph(&sample_data(), &mut create_rng(1)).unwrap();
		let mut layout = graph.collect_layout();
		layout.insert("a".into(), Position { x: 4.0, y: 5.0 });
		layout.shift_remove("b");
		let b_before = graph.position(1);
		graph.apply_layout(&layout);
		assert_eq!(graph.position(0), Position { x: 4.0, y: 5.0 });
		assert_eq!(graph.position(1), b_before);
	}

	proptest! {
		#[test]
		fn fallback_positions_are_deterministic(seed in any::<u64>(), count in 1usize..40) {
			let data = GraphData {
				nodes: (0..count).map(|i| NodeRecord::new(i.to_string())).collect(),
				..Default::default()
			};
			let first = build_graph(&data, &mut create_rng(seed)).unwrap().positions();
			let second = build_graph(&data, &mut create_rng(seed)).unwrap().positions();
			prop_assert_eq!(first, second);
		}
	}
}
