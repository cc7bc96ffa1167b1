//! The widget controller.
//!
//! [`GraphWidget`] owns the graph, the resolved visual variables, the
//! interaction state, the camera, the layout coordinator and the host bridge.
//! UI events and host messages all go through it; the Leptos component only
//! translates DOM events and draws the frames it hands out.
//!
//! Time is always passed in explicitly, in milliseconds.

use indexmap::IndexMap;
use log::{debug, info, warn};

use super::camera::{Camera, CameraState, Normalization, Projection};
use super::export::{ExportFormat, export_gexf, export_json, export_svg};
use super::graph::{Graph, Position, build_graph, create_rng};
use super::info::{self, GraphDescription, InfoTab, ItemInfo, SearchOption};
use super::interaction::{EntityKind, InteractionState};
use super::layout::{LayoutControls, LayoutCoordinator, LayoutKind};
use super::louvain;
use super::reducers::{Frame, reduce_frame};
use super::sync::{HostMessage, HostSink, HostState, StatePatch, SyncBridge};
use super::theme::Theme;
use super::types::AttrValue;
use super::visual::{LegendSection, ResolveOptions, ResolvedVariables, legend, resolve};
use crate::config::WidgetConfig;
use crate::error::{Result, WidgetError};

/// Zoom factor of a single wheel notch.
const WHEEL_ZOOM: f64 = 1.1;
/// Minimum on-screen hit radius for edges, in pixels.
const EDGE_HIT_TOLERANCE: f64 = 3.0;
/// Viewport size assumed until the component reports the real one.
const DEFAULT_VIEWPORT: (f64, f64) = (800.0, 500.0);

/// What the caller has to do after a host message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
	Applied,
	/// Render the current frame and hand it to [`GraphWidget::save_snapshot`].
	SnapshotRequested,
}

pub struct GraphWidget {
	config: WidgetConfig,
	theme: Theme,
	graph: Graph,
	resolved: ResolvedVariables,
	state: InteractionState,
	layout: LayoutCoordinator,
	camera: Camera,
	normalization: Normalization,
	bridge: SyncBridge,
	viewport: (f64, f64),
	height: u32,
	clickable_edges: bool,
	node_metrics: IndexMap<String, String>,
	tab: InfoTab,
}

impl GraphWidget {
	/// Builds the widget from the host model.
	///
	/// Fails on malformed graph data, unknown metrics, or an initial
	/// selection naming a missing node or edge.
	pub fn new(host: HostState, config: WidgetConfig, sink: Box<dyn HostSink>) -> Result<Self> {
		let mut graph = build_graph(&host.data, &mut create_rng(config.rng_seed))?;
		let mut bridge = SyncBridge::new(sink, config.camera_debounce_ms);

		match &host.layout {
			Some(layout) => graph.apply_layout(layout),
			None => bridge.push(vec![StatePatch::Layout(graph.collect_layout())]),
		}
		let original = graph.collect_layout();

		let mut state = InteractionState::default();
		state.set_category_filter(EntityKind::Node, host.selected_node_category_values.clone());
		state.set_category_filter(EntityKind::Edge, host.selected_edge_category_values.clone());

		for (metric, attribute) in &host.node_metrics {
			match metric.as_str() {
				"louvain" => louvain::assign(
					&mut graph,
					attribute,
					host.edge_weight.as_deref(),
					&mut create_rng(config.rng_seed),
				),
				other => return Err(WidgetError::UnknownMetric(other.to_string())),
			}
		}

		let resolved = resolve(
			&graph,
			&host.visual_variables,
			&config,
			&ResolveOptions {
				node_color_palette: host.node_color_palette.as_deref(),
				edge_color_palette: host.edge_color_palette.as_deref(),
				default_node_color: host.default_node_color.as_deref(),
				default_edge_color: host.default_edge_color.as_deref(),
				default_edge_type: host.default_edge_type,
			},
		);

		let layout = LayoutCoordinator::new(
			original,
			host.layout_settings.clone().unwrap_or_default(),
			config.noverlap.clone(),
		);

		let mut widget = Self {
			normalization: Normalization::from_graph(&graph),
			camera: Camera::new(host.camera_state.unwrap_or_default()),
			theme: Theme::default(),
			graph,
			resolved,
			state,
			layout,
			bridge,
			viewport: DEFAULT_VIEWPORT,
			height: host.height,
			clickable_edges: host.clickable_edges,
			node_metrics: host.node_metrics,
			tab: InfoTab::Legend,
			config,
		};

		// The host already holds the initial selection.
		widget.bridge.mute();
		let selected = match (&host.selected_node, &host.selected_edge) {
			(Some(node), _) => widget.select_node_by_key(node),
			(None, Some((source, target))) => widget.select_edge_by_extremities(source, target),
			(None, None) => {
				widget.clear_selected_item();
				Ok(())
			}
		};
		widget.bridge.unmute();
		selected?;

		if host.start_layout {
			widget.layout.start_force(&widget.graph)?;
		}

		info!(
			"widget ready: {} nodes, {} edges",
			widget.graph.order(),
			widget.graph.size()
		);
		Ok(widget)
	}

	pub fn graph(&self) -> &Graph {
		&self.graph
	}

	pub fn config(&self) -> &WidgetConfig {
		&self.config
	}

	pub fn theme(&self) -> &Theme {
		&self.theme
	}

	pub fn state(&self) -> &InteractionState {
		&self.state
	}

	pub fn resolved(&self) -> &ResolvedVariables {
		&self.resolved
	}

	pub fn controls(&self) -> LayoutControls {
		self.layout.controls()
	}

	pub fn running_layout(&self) -> Option<LayoutKind> {
		self.layout.running()
	}

	pub fn camera_state(&self) -> CameraState {
		self.camera.state()
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn clickable_edges(&self) -> bool {
		self.clickable_edges
	}

	/// Node metrics computed at construction, metric name -> attribute.
	pub fn node_metrics(&self) -> &IndexMap<String, String> {
		&self.node_metrics
	}

	pub fn viewport(&self) -> (f64, f64) {
		self.viewport
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		if width > 0.0 && height > 0.0 {
			self.viewport = (width, height);
		}
	}

	pub fn projection(&self) -> Projection {
		Projection::new(self.camera.state(), self.normalization, self.viewport.0, self.viewport.1)
	}

	/// Display data for the current state.
	pub fn frame(&self) -> Frame {
		reduce_frame(&self.graph, &self.resolved, &self.state, &self.config)
	}

	pub fn legend(&self) -> Vec<LegendSection> {
		legend(&self.resolved, &self.state)
	}

	pub fn description(&self) -> GraphDescription {
		info::describe(&self.graph)
	}

	pub fn search_options(&self) -> Vec<SearchOption> {
		info::search_options(&self.graph, self.resolved.node.label_attribute.as_deref())
	}

	/// Value shown in the search box.
	pub fn search_value(&self) -> Option<&str> {
		self.state.selected_node.as_deref()
	}

	pub fn placeholder(&self) -> &'static str {
		info::placeholder(self.clickable_edges)
	}

	pub fn selected_info(&self) -> Option<ItemInfo> {
		if let Some(node) = self.state.selected_node.as_deref().and_then(|k| self.graph.node_index(k)) {
			return Some(info::node_info(&self.graph, node));
		}
		let edge = self.state.selected_edge.as_deref().and_then(|k| self.graph.edge_index(k))?;
		Some(info::edge_info(&self.graph, edge))
	}

	pub fn tab(&self) -> InfoTab {
		self.tab
	}

	/// Switches tab from the tab buttons.
	pub fn select_tab(&mut self, tab: InfoTab) {
		self.tab = tab;
	}

	// Selection

	fn select_node_by_key(&mut self, key: &str) -> Result<()> {
		let node = self
			.graph
			.node_index(key)
			.ok_or_else(|| WidgetError::UnknownNode(key.to_string()))?;
		let patches = self.state.select_node(&self.graph, node);
		self.tab = InfoTab::Info;
		self.bridge.push(patches);
		Ok(())
	}

	fn select_edge_by_index(&mut self, edge: usize) {
		let patches = self.state.select_edge(&self.graph, edge);
		self.tab = InfoTab::Info;
		self.bridge.push(patches);
	}

	fn select_edge_by_extremities(&mut self, source: &str, target: &str) -> Result<()> {
		let edge = self
			.graph
			.find_edge(source, target)
			.ok_or_else(|| WidgetError::UnknownEdge(format!("{source} -> {target}")))?;
		self.select_edge_by_index(edge);
		Ok(())
	}

	fn clear_selected_item(&mut self) {
		let patches = self.state.clear_selection();
		self.tab = InfoTab::Legend;
		self.bridge.push(patches);
	}

	/// Node click. Clicking the selected node again does nothing.
	pub fn click_node(&mut self, key: &str) -> Result<()> {
		if self.state.selected_node.as_deref() == Some(key) {
			return Ok(());
		}
		self.select_node_by_key(key)
	}

	/// Edge click, ignored unless edges are clickable.
	pub fn click_edge(&mut self, key: &str) -> Result<()> {
		if !self.clickable_edges || self.state.selected_edge.as_deref() == Some(key) {
			return Ok(());
		}
		let edge = self
			.graph
			.edge_index(key)
			.ok_or_else(|| WidgetError::UnknownEdge(key.to_string()))?;
		self.select_edge_by_index(edge);
		Ok(())
	}

	/// Click on the background: clears the selection, if any.
	pub fn click_stage(&mut self) {
		if self.state.has_selection() {
			self.clear_selected_item();
		}
	}

	/// Search box change. An empty value clears the selection, otherwise the
	/// node is selected and the camera moves to it unless fully unzoomed.
	pub fn search_select(&mut self, value: Option<&str>, now_ms: f64) -> Result<()> {
		let value = value.filter(|v| !v.is_empty());
		if value == self.state.selected_node.as_deref() {
			return Ok(());
		}
		let Some(key) = value else {
			self.clear_selected_item();
			return Ok(());
		};
		self.select_node_by_key(key)?;
		if self.camera.state().ratio >= 1.0 {
			return Ok(());
		}
		if let Some(node) = self.graph.node_index(key) {
			self.move_camera_to(self.graph.position(node), now_ms);
		}
		Ok(())
	}

	fn move_camera_to(&mut self, position: Position, now_ms: f64) {
		let (x, y) = self.projection().framed(position);
		let target = CameraState {
			x,
			y,
			..self.camera.state()
		};
		self.camera.animate(target, now_ms, self.config.camera_animation_ms);
	}

	/// Legend category click. Values of an entity kind without a palette are
	/// not clickable.
	pub fn toggle_category(&mut self, kind: EntityKind, value: AttrValue) {
		let visuals = match kind {
			EntityKind::Node => &self.resolved.node,
			EntityKind::Edge => &self.resolved.edge,
		};
		let Some(max) = visuals.palette().map(|p| p.len()) else {
			return;
		};
		let patches = self.state.toggle_category_value(kind, max, value);
		self.bridge.push(patches);
	}

	// Camera

	pub fn zoom(&mut self, now_ms: f64) {
		self.camera
			.animated_zoom(self.config.zoom_factor, now_ms, self.config.camera_animation_ms);
	}

	pub fn unzoom(&mut self, now_ms: f64) {
		self.camera
			.animated_unzoom(self.config.zoom_factor, now_ms, self.config.camera_animation_ms);
	}

	/// Fits the graph, shifted left to leave room for the side panel.
	pub fn reset_zoom(&mut self, now_ms: f64) {
		let target = CameraState {
			x: self.config.camera_offset,
			y: 0.5,
			ratio: 1.0,
			angle: 0.0,
		};
		self.camera.animate(target, now_ms, self.config.camera_animation_ms);
	}

	/// Wheel zoom around the cursor. Negative `delta_y` zooms in.
	pub fn wheel(&mut self, vx: f64, vy: f64, delta_y: f64, now_ms: f64) {
		let factor = if delta_y < 0.0 { WHEEL_ZOOM } else { 1.0 / WHEEL_ZOOM };
		let projection = self.projection();
		self.camera.zoom_around(&projection, vx, vy, factor);
		self.bridge.camera_changed(self.camera.state(), now_ms);
	}

	/// Drag of the background by a viewport delta.
	pub fn pan(&mut self, dx: f64, dy: f64, now_ms: f64) {
		let projection = self.projection();
		self.camera.pan(&projection, dx, dy);
		self.bridge.camera_changed(self.camera.state(), now_ms);
	}

	// Layout

	pub fn toggle_layout(&mut self) -> Result<()> {
		let patches = self.layout.toggle_force(&self.graph)?;
		self.bridge.push(patches);
		Ok(())
	}

	pub fn toggle_noverlap(&mut self) -> Result<()> {
		let patches = self.layout.toggle_noverlap(&self.graph)?;
		self.bridge.push(patches);
		Ok(())
	}

	pub fn reset_layout(&mut self, now_ms: f64) -> Result<()> {
		let patches = self.layout.reset(&self.graph, now_ms, self.config.reset_layout_ms)?;
		self.bridge.push(patches);
		Ok(())
	}

	/// Advances animations, the running layout and the camera debouncer.
	/// Returns whether anything visible changed.
	pub fn tick(&mut self, now_ms: f64) -> bool {
		let mut changed = false;

		if self.camera.tick(now_ms) {
			self.bridge.camera_changed(self.camera.state(), now_ms);
			changed = true;
		}

		changed |= self.layout.tick_tween(&mut self.graph, now_ms);

		if self.layout.step_force(&mut self.graph, self.config.layout_tick) {
			self.normalization = Normalization::from_graph(&self.graph);
			changed = true;
		}

		if self.layout.running() == Some(LayoutKind::Noverlap) {
			let projection = self.projection();
			let sizes: Vec<f64> = self.frame().nodes.iter().map(|n| n.size).collect();
			let patches = self.layout.step_noverlap(&mut self.graph, &projection, &sizes);
			self.bridge.push(patches);
			changed = true;
		}

		self.bridge.poll(now_ms);
		changed
	}

	// Host

	/// Applies a change made on the host side without echoing it back.
	pub fn apply_host_patch(&mut self, patch: StatePatch) -> Result<()> {
		self.bridge.mute();
		let result = self.apply_muted(patch);
		self.bridge.unmute();
		result
	}

	fn apply_muted(&mut self, patch: StatePatch) -> Result<()> {
		debug!("host update: {}", patch.key());
		match patch {
			StatePatch::Layout(layout) => {
				self.graph.apply_layout(&layout);
				self.layout.positions_replaced(&self.graph);
				self.normalization = Normalization::from_graph(&self.graph);
			}
			StatePatch::CameraState(state) => {
				self.bridge.cancel_camera();
				self.camera.set_state(state);
			}
			StatePatch::SelectedNode(Some(key)) => {
				if self.state.selected_node.as_deref() != Some(key.as_str()) {
					self.select_node_by_key(&key)?;
				}
			}
			StatePatch::SelectedNode(None) => {
				if self.state.selected_node.is_some() {
					self.clear_selected_item();
				}
			}
			StatePatch::SelectedEdge(Some((source, target))) => {
				self.select_edge_by_extremities(&source, &target)?;
			}
			StatePatch::SelectedEdge(None) => {
				if self.state.selected_edge.is_some() {
					self.clear_selected_item();
				}
			}
			StatePatch::SelectedNodeCategoryValues(values) => {
				self.state.set_category_filter(EntityKind::Node, values);
			}
			StatePatch::SelectedEdgeCategoryValues(values) => {
				self.state.set_category_filter(EntityKind::Edge, values);
			}
			StatePatch::Snapshot(_) => warn!("ignoring host-side snapshot"),
		}
		Ok(())
	}

	/// Handles a host command. Every key of an update is applied even when
	/// some are rejected; the rejected ones are reported together.
	pub fn handle_message(&mut self, message: &HostMessage) -> Result<MessageOutcome> {
		match message {
			HostMessage::RenderSnapshot => Ok(MessageOutcome::SnapshotRequested),
			HostMessage::Update { .. } => {
				let mut rejected = Vec::new();
				for patch in message.patches() {
					let key = patch.key();
					if let Err(err) = self.apply_host_patch(patch) {
						warn!("host update of {key} rejected: {err}");
						rejected.push(err);
					}
				}
				if rejected.is_empty() {
					Ok(MessageOutcome::Applied)
				} else {
					Err(WidgetError::HostUpdate(rejected))
				}
			}
		}
	}

	/// Writes a rendered frame to the host's `snapshot` key.
	pub fn save_snapshot(&mut self, data_url: String) {
		self.bridge.push(vec![StatePatch::Snapshot(data_url)]);
	}

	/// Text exports. PNG needs a canvas and yields `None`.
	pub fn export(&self, format: ExportFormat) -> Result<Option<String>> {
		Ok(match format {
			ExportFormat::Json => Some(export_json(&self.graph)?),
			ExportFormat::Gexf => Some(export_gexf(&self.graph)),
			ExportFormat::Svg => Some(export_svg(&self.graph, &self.frame(), &self.projection(), &self.theme)),
			ExportFormat::Png => None,
		})
	}

	// Hit testing

	/// Topmost node under a viewport point.
	pub fn node_at(&self, frame: &Frame, vx: f64, vy: f64) -> Option<usize> {
		let projection = self.projection();
		frame
			.nodes
			.iter()
			.enumerate()
			.filter(|(_, n)| {
				let (x, y) = projection.graph_to_viewport(Position { x: n.x, y: n.y });
				let radius = projection.node_radius(n.size);
				(x - vx).powi(2) + (y - vy).powi(2) <= radius * radius
			})
			.max_by_key(|(i, n)| (n.z_index, *i))
			.map(|(i, _)| i)
	}

	/// Closest visible edge under a viewport point, if edges are clickable.
	pub fn edge_at(&self, frame: &Frame, vx: f64, vy: f64) -> Option<usize> {
		if !self.clickable_edges {
			return None;
		}
		let projection = self.projection();
		let to_viewport = |i: usize| {
			let n = &frame.nodes[i];
			projection.graph_to_viewport(Position { x: n.x, y: n.y })
		};
		frame
			.edges
			.iter()
			.enumerate()
			.filter(|(_, e)| !e.hidden)
			.filter_map(|(i, e)| {
				let edge = self.graph.edge(i);
				let distance = segment_distance((vx, vy), to_viewport(edge.source), to_viewport(edge.target));
				(distance <= (e.size / 2.0).max(EDGE_HIT_TOLERANCE)).then_some((i, distance))
			})
			.min_by(|a, b| a.1.total_cmp(&b.1))
			.map(|(i, _)| i)
	}
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	let length = dx * dx + dy * dy;
	let t = if length > 0.0 {
		(((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length).clamp(0.0, 1.0)
	} else {
		0.0
	};
	let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
	((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
