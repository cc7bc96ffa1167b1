//! Selection, focus and category filter state.
//!
//! There is no explicit state enum: "idle", "node selected", "edge selected"
//! and "filtered" are combinations of the fields below, the last one being
//! orthogonal to the other two. Every transition returns the host patches it
//! implies so the caller can forward them before the next frame.

use std::collections::HashSet;

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};

use super::graph::Graph;
use super::sync::StatePatch;
use super::types::AttrValue;

/// Nodes or edges, for category filters and legend sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
	Node,
	Edge,
}

/// Snapshot read by the reducers each frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionState {
	pub selected_node: Option<String>,
	pub selected_edge: Option<String>,
	/// Selected node plus its neighbors, or the selected edge's extremities.
	pub focused_nodes: Option<HashSet<String>>,
	/// Node color values kept visible. `None` shows everything.
	pub node_category_values: Option<IndexSet<AttrValue>>,
	pub edge_category_values: Option<IndexSet<AttrValue>>,
}

fn filter_patch(kind: EntityKind, filter: &Option<IndexSet<AttrValue>>) -> StatePatch {
	let values = filter.as_ref().map(|f| f.iter().cloned().collect());
	match kind {
		EntityKind::Node => StatePatch::SelectedNodeCategoryValues(values),
		EntityKind::Edge => StatePatch::SelectedEdgeCategoryValues(values),
	}
}

impl InteractionState {
	pub fn has_selection(&self) -> bool {
		self.selected_node.is_some() || self.selected_edge.is_some()
	}

	pub fn category_filter(&self, kind: EntityKind) -> Option<&IndexSet<AttrValue>> {
		match kind {
			EntityKind::Node => self.node_category_values.as_ref(),
			EntityKind::Edge => self.edge_category_values.as_ref(),
		}
	}

	fn category_filter_mut(&mut self, kind: EntityKind) -> &mut Option<IndexSet<AttrValue>> {
		match kind {
			EntityKind::Node => &mut self.node_category_values,
			EntityKind::Edge => &mut self.edge_category_values,
		}
	}

	/// Replaces a filter without producing a patch, for host-originated updates.
	pub fn set_category_filter(&mut self, kind: EntityKind, values: Option<Vec<AttrValue>>) {
		*self.category_filter_mut(kind) = values.map(|v| v.into_iter().collect());
	}

	/// Whether `node` is outside the focus set.
	pub fn is_unfocused(&self, node: &str) -> bool {
		self.focused_nodes.as_ref().is_some_and(|f| !f.contains(node))
	}

	/// Whether a category value is excluded by the filter of `kind`.
	pub fn is_excluded(&self, kind: EntityKind, value: &AttrValue) -> bool {
		self.category_filter(kind).is_some_and(|f| !f.contains(value))
	}

	/// Selects a node and focuses its neighborhood.
	pub fn select_node(&mut self, graph: &Graph, node: usize) -> Vec<StatePatch> {
		let key = graph.node(node).key.clone();
		let mut focused: HashSet<String> = graph
			.neighbors(node)
			.into_iter()
			.map(|n| graph.node(n).key.clone())
			.collect();
		focused.insert(key.clone());
		debug!("select node {key} ({} focused)", focused.len());

		self.selected_edge = None;
		self.selected_node = Some(key.clone());
		self.focused_nodes = Some(focused);
		vec![StatePatch::SelectedNode(Some(key)), StatePatch::SelectedEdge(None)]
	}

	/// Selects an edge and focuses its extremities.
	pub fn select_edge(&mut self, graph: &Graph, edge: usize) -> Vec<StatePatch> {
		let (source, target) = graph.extremities(edge);
		let (source, target) = (source.to_string(), target.to_string());
		let key = graph.edge(edge).key.clone();
		debug!("select edge {key} ({source} -> {target})");

		self.selected_node = None;
		self.selected_edge = Some(key);
		self.focused_nodes = Some([source.clone(), target.clone()].into_iter().collect());
		vec![
			StatePatch::SelectedEdge(Some((source, target))),
			StatePatch::SelectedNode(None),
		]
	}

	pub fn clear_selection(&mut self) -> Vec<StatePatch> {
		self.selected_node = None;
		self.selected_edge = None;
		self.focused_nodes = None;
		vec![StatePatch::SelectedNode(None), StatePatch::SelectedEdge(None)]
	}

	/// Toggles one category value in the filter of `kind`.
	///
	/// `max` is the number of values in the related palette. A filter that
	/// reaches `max - 1` values collapses back to no filter before the value
	/// itself is looked at, and removing the last value also clears it.
	pub fn toggle_category_value(
		&mut self,
		kind: EntityKind,
		max: usize,
		value: AttrValue,
	) -> Vec<StatePatch> {
		let filter = self.category_filter_mut(kind);
		*filter = match filter.take() {
			None => Some(IndexSet::from([value])),
			Some(set) if set.len() + 1 == max => None,
			Some(mut set) if set.contains(&value) => {
				if set.len() == 1 {
					None
				} else {
					set.shift_remove(&value);
					Some(set)
				}
			}
			Some(mut set) => {
				set.insert(value);
				Some(set)
			}
		};
		debug!("{kind:?} category filter: {:?}", self.category_filter(kind));
		vec![filter_patch(kind, self.category_filter_mut(kind))]
	}
}
