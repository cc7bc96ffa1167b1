//! Per-frame display data.
//!
//! Reducers are pure: they combine resolved visual variables with an
//! immutable [`InteractionState`] snapshot. Nothing here is persisted;
//! the renderer asks for a fresh [`Frame`] every time it draws.

use super::graph::Graph;
use super::interaction::{EntityKind, InteractionState};
use super::types::AttrValue;
use super::visual::{ColorResolver, EdgeType, Endpoint, ResolvedVariables};
use crate::config::WidgetConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDisplayData {
	pub x: f64,
	pub y: f64,
	pub color: String,
	pub size: f64,
	pub label: String,
	/// Label only shown on hover, for muted nodes.
	pub hover_label: Option<String>,
	/// Raw value of the color attribute, checked against node category filters.
	pub category_value: AttrValue,
	pub z_index: u8,
	pub highlighted: bool,
	pub muted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDisplayData {
	pub color: String,
	pub size: f64,
	pub label: Option<String>,
	pub hidden: bool,
}

/// Display data for every node and edge, in graph index order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
	pub nodes: Vec<NodeDisplayData>,
	pub edges: Vec<EdgeDisplayData>,
	pub label_threshold: f64,
	pub render_edge_labels: bool,
	pub edge_type: EdgeType,
}

pub fn reduce_node(
	graph: &Graph,
	node: usize,
	resolved: &ResolvedVariables,
	state: &InteractionState,
	config: &WidgetConfig,
) -> NodeDisplayData {
	let n = graph.node(node);
	let visuals = &resolved.node;
	let category_value = visuals.category_value(&n.attributes);

	let mut data = NodeDisplayData {
		x: n.position.x,
		y: n.position.y,
		color: visuals
			.color(&n.attributes)
			.unwrap_or_else(|| visuals.default_color.clone()),
		size: visuals.size(&n.attributes),
		label: visuals.label(&n.attributes, &n.key).unwrap_or_else(|| n.key.clone()),
		hover_label: None,
		category_value,
		z_index: 1,
		highlighted: state.selected_node.as_deref() == Some(n.key.as_str()),
		muted: false,
	};

	if state.is_unfocused(&n.key) || state.is_excluded(EntityKind::Node, &data.category_value) {
		data.muted = true;
		data.color = config.muted_node_color.clone();
		data.z_index = 0;
		data.size = if data.size != 0.0 && !data.size.is_nan() { data.size / 2.0 } else { 1.0 };
		data.hover_label = Some(std::mem::take(&mut data.label));
	}
	data
}

/// Reduces an edge. `nodes` holds the current frame's node display data,
/// read for `dependent` colors and node category filtering.
pub fn reduce_edge(
	graph: &Graph,
	edge: usize,
	nodes: &[NodeDisplayData],
	resolved: &ResolvedVariables,
	state: &InteractionState,
) -> EdgeDisplayData {
	let e = graph.edge(edge);
	let visuals = &resolved.edge;
	let (source, target) = (&nodes[e.source], &nodes[e.target]);

	let color = match &visuals.color {
		ColorResolver::Dependent(endpoint) => match endpoint {
			Endpoint::Source => source.color.clone(),
			Endpoint::Target => target.color.clone(),
		},
		_ => visuals
			.color(&e.attributes)
			.unwrap_or_else(|| visuals.default_color.clone()),
	};

	let mut hidden = false;
	if let Some(selected) = &state.selected_node {
		let (source_key, target_key) = graph.extremities(edge);
		if state.focused_nodes.is_some() && source_key != selected && target_key != selected {
			hidden = true;
		}
	}
	if state.is_excluded(EntityKind::Node, &source.category_value)
		&& state.is_excluded(EntityKind::Node, &target.category_value)
	{
		hidden = true;
	}
	if state.is_excluded(EntityKind::Edge, &visuals.category_value(&e.attributes)) {
		hidden = true;
	}
	if let Some(selected) = &state.selected_edge {
		hidden = *selected != e.key;
	}

	EdgeDisplayData {
		color,
		size: visuals.size(&e.attributes),
		label: resolved
			.render_edge_labels
			.then(|| visuals.label(&e.attributes, &e.key))
			.flatten(),
		hidden,
	}
}

/// Computes all node display data, then all edges.
pub fn reduce_frame(
	graph: &Graph,
	resolved: &ResolvedVariables,
	state: &InteractionState,
	config: &WidgetConfig,
) -> Frame {
	let nodes: Vec<NodeDisplayData> = (0..graph.order())
		.map(|i| reduce_node(graph, i, resolved, state, config))
		.collect();
	let edges = (0..graph.size())
		.map(|i| reduce_edge(graph, i, &nodes, resolved, state))
		.collect();
	Frame {
		nodes,
		edges,
		label_threshold: resolved.label_threshold,
		render_edge_labels: resolved.render_edge_labels,
		edge_type: resolved.edge_type,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_view::graph::{build_graph, create_rng};
	use crate::components::graph_view::scale::Range;
	use crate::components::graph_view::types::{EdgeRecord, GraphData, NodeRecord};
	use crate::components::graph_view::visual::{ResolveOptions, VisualVariable, VisualVariables, resolve};

	/// a-b, a-c, d-e with a `group` attribute and sizes 1..=5.
	fn fixture(vars: &VisualVariables) -> (Graph, ResolvedVariables) {
		let groups = ["x", "x", "y", "y", "z"];
		let data = GraphData {
			nodes: ["a", "b", "c", "d", "e"]
				.iter()
				.zip(groups)
				.enumerate()
				.map(|(i, (key, group))| {
					NodeRecord::new(*key)
						.with_attr("group", group)
						.with_attr("size", (i + 1) as f64)
				})
				.collect(),
			edges: vec![
				EdgeRecord::new("a", "b").with_attr("kind", "p"),
				EdgeRecord::new("a", "c").with_attr("kind", "q"),
				EdgeRecord::new("d", "e").with_attr("kind", "p"),
			],
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(5)).unwrap();
		let resolved = resolve(&graph, vars, &WidgetConfig::default(), &ResolveOptions::default());
		(graph, resolved)
	}

	fn category_vars() -> VisualVariables {
		VisualVariables {
			node_color: VisualVariable::category("group"),
			edge_color: VisualVariable::category("kind"),
			..Default::default()
		}
	}

	#[test]
	fn idle_state_keeps_visual_variables() {
		let (graph, resolved) = fixture(&category_vars());
		let frame = reduce_frame(&graph, &resolved, &InteractionState::default(), &WidgetConfig::default());
		assert!(frame.nodes.iter().all(|n| !n.muted && n.z_index == 1 && !n.highlighted));
		assert!(frame.edges.iter().all(|e| !e.hidden));
		assert_eq!(frame.nodes[0].label, "a");
		assert_eq!(frame.nodes[0].size, 2.0);
		assert_eq!(frame.nodes[4].size, 12.0);
		assert_eq!(frame.nodes[0].color, frame.nodes[1].color);
		assert_ne!(frame.nodes[0].color, frame.nodes[2].color);
	}

	#[test]
	fn node_selection_mutes_outside_focus_without_stale_state() {
		let (graph, resolved) = fixture(&category_vars());
		let config = WidgetConfig::default();
		let idle = reduce_frame(&graph, &resolved, &InteractionState::default(), &config);
		let mut state = InteractionState::default();

		state.select_node(&graph, 0);
		let frame = reduce_frame(&graph, &resolved, &state, &config);
		assert!(frame.nodes[0].highlighted);
		for i in 0..3 {
			assert_eq!(frame.nodes[i].color, idle.nodes[i].color);
			assert_eq!(frame.nodes[i].size, idle.nodes[i].size);
			assert!(!frame.nodes[i].label.is_empty());
		}
		for i in 3..5 {
			let node = &frame.nodes[i];
			assert!(node.muted);
			assert_eq!(node.color, "#ccc");
			assert_eq!(node.size, idle.nodes[i].size / 2.0);
			assert_eq!(node.label, "");
			assert_eq!(node.hover_label.as_deref(), Some(graph.node(i).key.as_str()));
			assert_eq!(node.z_index, 0);
		}
		assert_eq!(
			frame.edges.iter().map(|e| e.hidden).collect::<Vec<_>>(),
			vec![false, false, true]
		);

		state.select_node(&graph, 3);
		let frame = reduce_frame(&graph, &resolved, &state, &config);
		for i in 0..3 {
			assert!(frame.nodes[i].muted);
			assert!(!frame.nodes[i].highlighted);
		}
		assert_eq!(frame.nodes[3], NodeDisplayData { highlighted: true, ..idle.nodes[3].clone() });
		assert_eq!(frame.nodes[4], idle.nodes[4]);
	}

	#[test]
	fn edge_selection_hides_every_other_edge() {
		let (graph, resolved) = fixture(&category_vars());
		let mut state = InteractionState::default();
		state.select_edge(&graph, 1);
		let frame = reduce_frame(&graph, &resolved, &state, &WidgetConfig::default());
		assert_eq!(
			frame.edges.iter().map(|e| e.hidden).collect::<Vec<_>>(),
			vec![true, false, true]
		);
		assert!(frame.nodes[1].muted);
		assert!(!frame.nodes[0].muted && !frame.nodes[2].muted);
	}

	#[test]
	fn edge_selection_overrides_filters() {
		let (graph, resolved) = fixture(&category_vars());
		let mut state = InteractionState::default();
		state.toggle_category_value(EntityKind::Edge, 2, AttrValue::from("p"));
		state.select_edge(&graph, 1);
		let frame = reduce_frame(&graph, &resolved, &state, &WidgetConfig::default());
		assert!(!frame.edges[1].hidden);
	}

	#[test]
	fn category_filters_mute_nodes_and_hide_edges() {
		let (graph, resolved) = fixture(&category_vars());
		let config = WidgetConfig::default();
		let mut state = InteractionState::default();
		state.toggle_category_value(EntityKind::Node, 3, AttrValue::from("z"));
		let frame = reduce_frame(&graph, &resolved, &state, &config);
		assert_eq!(
			frame.nodes.iter().map(|n| n.muted).collect::<Vec<_>>(),
			vec![true, true, true, true, false]
		);
		// d-e keeps one endpoint in the filter
		assert_eq!(
			frame.edges.iter().map(|e| e.hidden).collect::<Vec<_>>(),
			vec![true, true, false]
		);

		let mut state = InteractionState::default();
		state.toggle_category_value(EntityKind::Edge, 2, AttrValue::from("q"));
		let frame = reduce_frame(&graph, &resolved, &state, &config);
		assert_eq!(
			frame.edges.iter().map(|e| e.hidden).collect::<Vec<_>>(),
			vec![true, false, true]
		);
		assert!(frame.nodes.iter().all(|n| !n.muted));
	}

	#[test]
	fn dependent_edge_colors_follow_endpoint_display_data() {
		let vars = VisualVariables {
			node_color: VisualVariable::category("group"),
			edge_color: VisualVariable::Dependent { value: Endpoint::Target },
			edge_label: Some(VisualVariable::raw("missing")),
			..Default::default()
		};
		let (graph, resolved) = fixture(&vars);
		let mut state = InteractionState::default();
		state.select_node(&graph, 0);
		let frame = reduce_frame(&graph, &resolved, &state, &WidgetConfig::default());
		assert_eq!(frame.edges[0].color, frame.nodes[1].color);
		assert_eq!(frame.edges[2].color, "#ccc");
		assert_eq!(frame.edges[0].label.as_deref(), Some("geid_0"));
	}

	#[test]
	fn zero_sized_muted_nodes_get_unit_size() {
		let vars = VisualVariables {
			node_size: VisualVariable::continuous("size", Range::Numeric([0.0, 0.0])),
			..Default::default()
		};
		let (graph, resolved) = fixture(&vars);
		let mut state = InteractionState::default();
		state.select_node(&graph, 0);
		let frame = reduce_frame(&graph, &resolved, &state, &WidgetConfig::default());
		assert_eq!(frame.nodes[0].size, 0.0);
		assert_eq!(frame.nodes[4].size, 1.0);
	}
}
