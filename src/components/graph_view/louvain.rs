//! Louvain community detection, used by the `louvain` node metric.
//!
//! Edges are treated as undirected. Nodes are visited in a shuffled order
//! drawn from the widget's seeded generator, so the same graph and seed
//! always yield the same partition.

use std::collections::HashMap;

use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;

use super::graph::Graph;
use super::types::AttrValue;

/// Local moving passes are capped per level to bound pathological inputs.
const MAX_PASSES: usize = 100;
const MIN_GAIN: f64 = 1e-10;

/// Weighted undirected graph over dense indices. Self-loop weights are kept
/// apart from the adjacency lists.
struct Reduced {
	adjacency: Vec<Vec<(usize, f64)>>,
	loops: Vec<f64>,
}

impl Reduced {
	fn from_graph(graph: &Graph, weight_attribute: Option<&str>) -> Self {
		let n = graph.order();
		let mut weights: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
		let mut loops = vec![0.0; n];
		for edge in graph.edges() {
			let weight = weight_attribute
				.and_then(|a| edge.attributes.get(a))
				.and_then(AttrValue::as_f64)
				.unwrap_or(1.0);
			if edge.is_self_loop() {
				loops[edge.source] += weight;
			} else {
				*weights[edge.source].entry(edge.target).or_default() += weight;
				*weights[edge.target].entry(edge.source).or_default() += weight;
			}
		}
		Self {
			adjacency: weights.into_iter().map(sorted_neighbors).collect(),
			loops,
		}
	}

	fn len(&self) -> usize {
		self.loops.len()
	}

	fn degree(&self, node: usize) -> f64 {
		self.adjacency[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.loops[node]
	}

	/// Collapses every community into a single node.
	fn aggregate(&self, community: &[usize], count: usize) -> Self {
		let mut weights: Vec<HashMap<usize, f64>> = vec![HashMap::new(); count];
		let mut loops = vec![0.0; count];
		for (node, neighbors) in self.adjacency.iter().enumerate() {
			let c = community[node];
			loops[c] += self.loops[node];
			for &(other, w) in neighbors {
				let d = community[other];
				if c == d {
					// each internal edge is seen from both ends
					loops[c] += w / 2.0;
				} else {
					*weights[c].entry(d).or_default() += w;
				}
			}
		}
		Self {
			adjacency: weights.into_iter().map(sorted_neighbors).collect(),
			loops,
		}
	}
}

fn sorted_neighbors(map: HashMap<usize, f64>) -> Vec<(usize, f64)> {
	let mut neighbors: Vec<(usize, f64)> = map.into_iter().collect();
	neighbors.sort_by_key(|(n, _)| *n);
	neighbors
}

/// One level of local moving. Returns the community of every node and
/// whether any node moved.
fn local_moving<R: Rng>(graph: &Reduced, rng: &mut R) -> (Vec<usize>, bool) {
	let n = graph.len();
	let degrees: Vec<f64> = (0..n).map(|i| graph.degree(i)).collect();
	let m2: f64 = degrees.iter().sum();
	let mut community: Vec<usize> = (0..n).collect();
	let mut totals = degrees.clone();
	let mut improved = false;

	if m2 <= 0.0 {
		return (community, false);
	}

	let mut order: Vec<usize> = (0..n).collect();
	order.shuffle(rng);

	for _ in 0..MAX_PASSES {
		let mut moved = false;
		for &node in &order {
			let current = community[node];
			let k = degrees[node];

			let mut links: HashMap<usize, f64> = HashMap::new();
			for &(other, w) in &graph.adjacency[node] {
				*links.entry(community[other]).or_default() += w;
			}

			totals[current] -= k;
			let gain = |c: usize, links_to: f64| links_to - totals[c] * k / m2;
			let mut best = current;
			let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));

			let mut candidates: Vec<(usize, f64)> = links.into_iter().collect();
			candidates.sort_by_key(|(c, _)| *c);
			for (c, links_to) in candidates {
				let g = gain(c, links_to);
				if g > best_gain + MIN_GAIN {
					best = c;
					best_gain = g;
				}
			}
			totals[best] += k;

			if best != current {
				community[node] = best;
				moved = true;
				improved = true;
			}
		}
		if !moved {
			break;
		}
	}
	(community, improved)
}

/// Renumbers communities densely, in order of first appearance.
fn renumber(community: &mut [usize]) -> usize {
	let mut ids = HashMap::new();
	for c in community.iter_mut() {
		let next = ids.len();
		*c = *ids.entry(*c).or_insert(next);
	}
	ids.len()
}

/// Community index of every node, in node order.
pub fn detect<R: Rng>(graph: &Graph, weight_attribute: Option<&str>, rng: &mut R) -> Vec<usize> {
	let mut reduced = Reduced::from_graph(graph, weight_attribute);
	let mut membership: Vec<usize> = (0..graph.order()).collect();
	let mut levels = 0;

	loop {
		let (mut community, improved) = local_moving(&reduced, rng);
		if !improved {
			break;
		}
		let count = renumber(&mut community);
		for m in membership.iter_mut() {
			*m = community[*m];
		}
		reduced = reduced.aggregate(&community, count);
		levels += 1;
	}

	let count = renumber(&mut membership);
	debug!("louvain: {count} communities after {levels} levels");
	membership
}

/// Runs [`detect`] and stores each node's community under `attribute`.
pub fn assign<R: Rng>(graph: &mut Graph, attribute: &str, weight_attribute: Option<&str>, rng: &mut R) {
	let membership = detect(graph, weight_attribute, rng);
	for (node, community) in membership.into_iter().enumerate() {
		graph
			.node_attributes_mut(node)
			.insert(attribute.to_string(), AttrValue::Number(community as f64));
	}
}

/// Newman modularity of a partition, edges taken as undirected.
pub fn modularity(graph: &Graph, membership: &[usize], weight_attribute: Option<&str>) -> f64 {
	let reduced = Reduced::from_graph(graph, weight_attribute);
	let m2: f64 = (0..reduced.len()).map(|i| reduced.degree(i)).sum();
	if m2 <= 0.0 {
		return 0.0;
	}
	let mut internal: HashMap<usize, f64> = HashMap::new();
	let mut totals: HashMap<usize, f64> = HashMap::new();
	for node in 0..reduced.len() {
		let c = membership[node];
		*totals.entry(c).or_default() += reduced.degree(node);
		*internal.entry(c).or_default() += 2.0 * reduced.loops[node];
		for &(other, w) in &reduced.adjacency[node] {
			if membership[other] == c {
				*internal.entry(c).or_default() += w;
			}
		}
	}
	totals
		.iter()
		.map(|(c, tot)| internal.get(c).copied().unwrap_or(0.0) / m2 - (tot / m2).powi(2))
		.sum()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_view::graph::{build_graph, create_rng};
	use crate::components::graph_view::types::{EdgeRecord, GraphData, NodeRecord};
	use proptest::prelude::*;

	/// Two 4-cliques joined by a single bridge.
	fn barbell() -> Graph {
		let keys = ["a", "b", "c", "d", "e", "f", "g", "h"];
		let mut edges = Vec::new();
		for group in [&keys[..4], &keys[4..]] {
			for (i, s) in group.iter().enumerate() {
				for t in &group[i + 1..] {
					edges.push(EdgeRecord::new(*s, *t));
				}
			}
		}
		edges.push(EdgeRecord::new("d", "e"));
		let data = GraphData {
			nodes: keys.iter().map(|k| NodeRecord::new(*k)).collect(),
			edges,
			..Default::default()
		};
		build_graph(&data, &mut create_rng(0)).unwrap()
	}

	#[test]
	fn barbell_splits_into_its_cliques() {
		let graph = barbell();
		let membership = detect(&graph, None, &mut create_rng(7));
		assert!(membership[..4].iter().all(|c| *c == membership[0]));
		assert!(membership[4..].iter().all(|c| *c == membership[4]));
		assert_ne!(membership[0], membership[4]);
		assert!(modularity(&graph, &membership, None) > 0.3);
	}

	#[test]
	fn heavy_bridge_pulls_nodes_together() {
		let data = GraphData {
			nodes: ["a", "b", "c", "d"].into_iter().map(NodeRecord::new).collect(),
			edges: vec![
				EdgeRecord::new("a", "b").with_attr("w", 1.0),
				EdgeRecord::new("b", "c").with_attr("w", 50.0),
				EdgeRecord::new("c", "d").with_attr("w", 1.0),
			],
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		let membership = detect(&graph, Some("w"), &mut create_rng(1));
		assert_eq!(membership[1], membership[2]);
	}

	#[test]
	fn edgeless_graph_keeps_singletons() {
		let data = GraphData {
			nodes: ["a", "b", "c"].into_iter().map(NodeRecord::new).collect(),
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		assert_eq!(detect(&graph, None, &mut create_rng(0)), vec![0, 1, 2]);
	}

	#[test]
	fn assign_writes_numeric_communities() {
		let mut graph = barbell();
		assign(&mut graph, "community", None, &mut create_rng(3));
		for node in graph.nodes() {
			assert!(matches!(node.attributes.get("community"), Some(AttrValue::Number(_))));
		}
	}

	proptest! {
		#[test]
		fn same_seed_same_partition(seed in 0u64..1000) {
			let graph = barbell();
			let first = detect(&graph, None, &mut create_rng(seed));
			let second = detect(&graph, None, &mut create_rng(seed));
			prop_assert_eq!(first, second);
		}
	}
}
