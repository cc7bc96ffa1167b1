//! End-to-end flows through the widget controller, driven the way the
//! canvas component drives it.

#![allow(unused_crate_dependencies)]

use graph_explorer::components::graph_view::export::ExportFormat;
use graph_explorer::components::graph_view::graph::{Position, build_graph, create_rng};
use graph_explorer::components::graph_view::interaction::EntityKind;
use graph_explorer::components::graph_view::layout::LayoutKind;
use graph_explorer::components::graph_view::visual::LegendBody;
use graph_explorer::components::graph_view::{HostMessage, MessageOutcome, RecordingSink};
use graph_explorer::{AttrValue, GraphData, GraphWidget, HostState, StatePatch, WidgetConfig, WidgetError};

const HOST: &str = r##"{
	"data": {
		"options": {"type": "undirected"},
		"nodes": [
			{"key": "a", "attributes": {"group": "red", "x": 0, "y": 0}},
			{"key": "b", "attributes": {"group": "red", "x": 1, "y": 0}},
			{"key": "c", "attributes": {"group": "blue", "x": 0, "y": 1}},
			{"key": "d", "attributes": {"group": "green", "x": 1, "y": 1}}
		],
		"edges": [
			{"source": "a", "target": "b"},
			{"source": "b", "target": "c"},
			{"source": "c", "target": "d"}
		]
	},
	"visual_variables": {
		"node_color": {"type": "category", "attribute": "group"}
	},
	"node_color_palette": {"red": "#f00", "blue": "#00f", "green": "#0f0"},
	"height": 400
}"##;

fn widget() -> (GraphWidget, RecordingSink) {
	let host: HostState = serde_json::from_str(HOST).unwrap();
	let sink = RecordingSink::new();
	let widget = GraphWidget::new(host, WidgetConfig::default(), Box::new(sink.clone())).unwrap();
	sink.take();
	(widget, sink)
}

fn red() -> AttrValue {
	AttrValue::String("red".into())
}

#[test]
fn legend_filters_collapse_once_every_value_but_one_is_kept() {
	let (mut w, sink) = widget();

	w.toggle_category(EntityKind::Node, red());
	assert_eq!(
		sink.last("selected_node_category_values"),
		Some(StatePatch::SelectedNodeCategoryValues(Some(vec![red()])))
	);
	let frame = w.frame();
	assert!(!frame.nodes[0].muted && !frame.nodes[1].muted);
	assert!(frame.nodes[2].muted && frame.nodes[3].muted);
	assert_eq!(frame.nodes[2].color, w.config().muted_node_color);

	let legend = w.legend();
	let colors = legend.iter().find(|s| s.title == "Node colors").unwrap();
	let LegendBody::Category { items, .. } = &colors.body else {
		panic!("expected a category legend, got {:?}", colors.body);
	};
	let evicted: Vec<bool> = items.iter().map(|i| i.evicted).collect();
	assert_eq!(evicted, vec![false, true, true]);

	w.toggle_category(EntityKind::Node, AttrValue::String("blue".into()));
	w.toggle_category(EntityKind::Node, AttrValue::String("green".into()));
	assert_eq!(
		sink.last("selected_node_category_values"),
		Some(StatePatch::SelectedNodeCategoryValues(None))
	);
	assert!(w.frame().nodes.iter().all(|n| !n.muted));
}

#[test]
fn force_layout_then_reset_restores_original_positions() {
	let (mut w, sink) = widget();
	let original: Vec<_> = w.graph().positions();

	w.toggle_layout().unwrap();
	assert_eq!(w.running_layout(), Some(LayoutKind::Force));
	assert!(w.controls().spinner());
	for i in 0..30 {
		w.tick(i as f64 * 16.0);
	}
	assert_ne!(w.graph().positions(), original);

	w.toggle_layout().unwrap();
	assert_eq!(w.running_layout(), None);
	assert!(matches!(sink.last("layout"), Some(StatePatch::Layout(_))));
	assert!(w.controls().reset_visible);

	sink.take();
	w.reset_layout(1000.0).unwrap();
	assert!(matches!(sink.last("layout"), Some(StatePatch::Layout(l)) if l.len() == 4));
	w.tick(1000.0 + w.config().reset_layout_ms);
	assert_eq!(w.graph().positions(), original);
}

#[test]
fn layouts_are_mutually_exclusive() {
	let (mut w, _) = widget();
	w.toggle_layout().unwrap();
	assert!(matches!(w.toggle_noverlap(), Err(WidgetError::LayoutBusy { .. })));
	assert!(matches!(w.reset_layout(0.0), Err(WidgetError::LayoutBusy { .. })));
	w.toggle_layout().unwrap();
	w.toggle_noverlap().unwrap();
	assert_eq!(w.running_layout(), Some(LayoutKind::Noverlap));
}

#[test]
fn noverlap_stops_by_itself_and_saves_the_layout() {
	let host = HostState {
		data: GraphData {
			nodes: (0..6)
				.map(|i| {
					graph_explorer::NodeRecord::new(format!("n{i}"))
						.with_attr("x", i as f64 * 0.001)
						.with_attr("y", 0.0)
				})
				.collect(),
			..Default::default()
		},
		..Default::default()
	};
	let sink = RecordingSink::new();
	let mut w = GraphWidget::new(host, WidgetConfig::default(), Box::new(sink.clone())).unwrap();
	sink.take();

	w.toggle_noverlap().unwrap();
	let mut t = 0.0;
	while w.running_layout().is_some() && t < 100_000.0 {
		w.tick(t);
		t += 16.0;
	}
	assert_eq!(w.running_layout(), None);
	assert!(matches!(sink.last("layout"), Some(StatePatch::Layout(_))));
	assert!(w.controls().layout_enabled);
}

#[test]
fn selection_flow_updates_info_and_host() {
	let (mut w, sink) = widget();
	assert_eq!(w.selected_info(), None);

	w.click_node("b").unwrap();
	let info = w.selected_info().unwrap();
	assert_eq!(info.key.as_deref(), Some("b"));
	let frame = w.frame();
	assert!(frame.nodes[3].muted, "d is not a neighbor of b");
	assert!(!frame.nodes[0].muted && !frame.nodes[2].muted);

	w.search_select(Some("d"), 0.0).unwrap();
	assert_eq!(sink.last("selected_node"), Some(StatePatch::SelectedNode(Some("d".into()))));

	assert!(matches!(w.search_select(Some("zz"), 0.0), Err(WidgetError::UnknownNode(_))));
	assert_eq!(w.state().selected_node.as_deref(), Some("d"));
}

#[test]
fn exports_describe_the_current_graph() {
	let (w, _) = widget();
	let json = w.export(ExportFormat::Json).unwrap().unwrap();
	let data: GraphData = serde_json::from_str(&json).unwrap();
	assert_eq!((data.nodes.len(), data.edges.len()), (4, 3));

	let gexf = w.export(ExportFormat::Gexf).unwrap().unwrap();
	assert!(gexf.contains("<gexf"));
	assert!(gexf.contains("defaultedgetype=\"undirected\""));

	let svg = w.export(ExportFormat::Svg).unwrap().unwrap();
	assert_eq!(svg.matches("<circle").count(), 4);
	assert!(w.export(ExportFormat::Png).unwrap().is_none());
}

#[test]
fn json_export_reimports_to_the_same_graph() {
	let (w, _) = widget();
	let json = w.export(ExportFormat::Json).unwrap().unwrap();
	let data: GraphData = serde_json::from_str(&json).unwrap();
	let rebuilt = build_graph(&data, &mut create_rng(99)).unwrap();
	let graph = w.graph();

	assert_eq!(rebuilt.kind(), graph.kind());
	assert_eq!(rebuilt.order(), graph.order());
	for (before, after) in graph.nodes().iter().zip(rebuilt.nodes()) {
		assert_eq!(after.key, before.key);
		assert_eq!(after.attributes, before.attributes);
		assert_eq!(after.position, before.position);
	}
	assert_eq!(rebuilt.size(), graph.size());
	for (before, after) in graph.edges().iter().zip(rebuilt.edges()) {
		assert_eq!(after.key, before.key);
		assert_eq!((after.source, after.target), (before.source, before.target));
		assert_eq!(after.attributes, before.attributes);
		assert_eq!(after.undirected, before.undirected);
	}
}

#[test]
fn host_update_applies_every_valid_key() {
	let (mut w, sink) = widget();
	let message: HostMessage = serde_json::from_str(
		r#"{"msg": "update", "patch": {"selected_node": "zz", "selected_node_category_values": ["red"]}}"#,
	)
	.unwrap();

	let err = w.handle_message(&message).unwrap_err();
	assert!(matches!(&err, WidgetError::HostUpdate(rejected)
		if matches!(rejected.as_slice(), [WidgetError::UnknownNode(key)] if key == "zz")));
	assert_eq!(w.state().node_category_values.as_ref().map(|f| f.len()), Some(1));
	assert!(w.frame().nodes[2].muted);
	assert!(sink.take().is_empty(), "host changes are not echoed back");

	let message: HostMessage =
		serde_json::from_str(r#"{"msg": "update", "patch": {"selected_node": "c"}}"#).unwrap();
	assert_eq!(w.handle_message(&message).unwrap(), MessageOutcome::Applied);
	assert_eq!(w.state().selected_node.as_deref(), Some("c"));
}

#[test]
fn host_layout_wins_over_a_running_force_layout() {
	let mut host: HostState = serde_json::from_str(HOST).unwrap();
	host.start_layout = true;
	let mut w = GraphWidget::new(host, WidgetConfig::default(), Box::new(RecordingSink::new())).unwrap();
	w.tick(0.0);
	assert_eq!(w.running_layout(), Some(LayoutKind::Force));

	let pushed = [("a", 100.0, 100.0), ("b", 200.0, 100.0), ("c", 300.0, 100.0), ("d", 300.0, 200.0)];
	let layout = pushed
		.iter()
		.map(|&(key, x, y)| (key.to_string(), Position { x, y }))
		.collect();
	w.apply_host_patch(StatePatch::Layout(layout)).unwrap();
	w.tick(16.0);
	w.tick(32.0);

	for (&(key, x, y), position) in pushed.iter().zip(w.graph().positions()) {
		assert!(
			(position.x - x).abs() < 20.0 && (position.y - y).abs() < 20.0,
			"{key} drifted to {position:?}"
		);
	}
}

#[test]
fn host_layout_cancels_the_reset_tween() {
	let (mut w, _) = widget();
	w.toggle_layout().unwrap();
	w.tick(0.0);
	w.toggle_layout().unwrap();
	w.reset_layout(100.0).unwrap();

	let layout = [("a", -5.0, 7.0)]
		.iter()
		.map(|&(key, x, y)| (key.to_string(), Position { x, y }))
		.collect();
	w.apply_host_patch(StatePatch::Layout(layout)).unwrap();
	w.tick(100.0 + w.config().reset_layout_ms);
	assert_eq!(w.graph().position(0), Position { x: -5.0, y: 7.0 });
}
