//! Layout coordination: force-directed layout, overlap removal and reset.
//!
//! Both algorithms are cooperative loops advanced one step per frame by the
//! widget. Only one may run at a time. Stopping either persists the current
//! positions to the host; stopping takes effect immediately, so no step
//! scheduled afterwards ever moves a node.

use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::camera::{Normalization, Projection, ease_quadratic_in_out};
use super::graph::{Graph, LayoutSnapshot, Position};
use super::noverlap::{self, Circle};
use super::sync::StatePatch;
use crate::config::NoverlapConfig;
use crate::error::{Result, WidgetError};

/// Size of the simulation space the graph is mapped into while the force
/// layout runs. Matches the spacing the force constants are tuned for.
const SIMULATION_SPAN: f64 = 500.0;

/// The `layout_settings` host key.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForceSettings {
	pub force_charge: f32,
	pub force_spring: f32,
	pub force_max: f32,
	pub node_speed: f32,
	pub damping_factor: f32,
	pub node_mass: f32,
}

impl Default for ForceSettings {
	fn default() -> Self {
		Self {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
			node_mass: 10.0,
		}
	}
}

impl ForceSettings {
	fn parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: self.force_charge,
			force_spring: self.force_spring,
			force_max: self.force_max,
			node_speed: self.node_speed,
			damping_factor: self.damping_factor,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
	Force,
	Noverlap,
}

impl LayoutKind {
	pub fn name(self) -> &'static str {
		match self {
			LayoutKind::Force => "layout",
			LayoutKind::Noverlap => "noverlap",
		}
	}
}

/// Button state for the layout controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutControls {
	pub layout_running: bool,
	pub layout_enabled: bool,
	pub noverlap_running: bool,
	pub noverlap_enabled: bool,
	pub reset_visible: bool,
}

impl Default for LayoutControls {
	fn default() -> Self {
		Self {
			layout_running: false,
			layout_enabled: true,
			noverlap_running: false,
			noverlap_enabled: true,
			reset_visible: false,
		}
	}
}

impl LayoutControls {
	pub fn spinner(&self) -> bool {
		self.layout_running || self.noverlap_running
	}
}

/// Force simulation mirroring the graph, in its own coordinate space.
struct ForceLayout {
	simulation: ForceGraph<usize, ()>,
	center: Position,
	/// Simulation units per graph unit.
	scale: f64,
}

impl ForceLayout {
	fn new(graph: &Graph, settings: &ForceSettings) -> Self {
		let normalization = Normalization::from_graph(graph);
		let center = normalization.center();
		let scale = SIMULATION_SPAN / normalization.span();

		let mut simulation = ForceGraph::new(settings.parameters());
		let indices: Vec<_> = graph
			.nodes()
			.iter()
			.enumerate()
			.map(|(i, node)| {
				simulation.add_node(NodeData {
					x: ((node.position.x - center.x) * scale) as f32,
					y: ((node.position.y - center.y) * scale) as f32,
					mass: settings.node_mass,
					is_anchor: false,
					user_data: i,
				})
			})
			.collect();
		for edge in graph.edges().iter().filter(|e| !e.is_self_loop()) {
			simulation.add_edge(indices[edge.source], indices[edge.target], EdgeData::default());
		}

		Self {
			simulation,
			center,
			scale,
		}
	}

	fn step(&mut self, graph: &mut Graph, dt: f32) {
		self.simulation.update(dt);
		let (center, scale) = (self.center, self.scale);
		self.simulation.visit_nodes(|node| {
			graph.set_position(
				node.data.user_data,
				Position {
					x: center.x + node.x() as f64 / scale,
					y: center.y + node.y() as f64 / scale,
				},
			);
		});
	}
}

enum Running {
	Force(ForceLayout),
	Noverlap { iterations: usize },
}

impl Running {
	fn kind(&self) -> LayoutKind {
		match self {
			Running::Force(_) => LayoutKind::Force,
			Running::Noverlap { .. } => LayoutKind::Noverlap,
		}
	}
}

/// Eased interpolation of every node towards target positions.
#[derive(Clone, Debug)]
pub struct NodeTween {
	from: Vec<Position>,
	to: Vec<Position>,
	start_ms: f64,
	duration_ms: f64,
}

impl NodeTween {
	pub fn new(graph: &Graph, target: &LayoutSnapshot, now_ms: f64, duration_ms: f64) -> Self {
		let from = graph.positions();
		let to = graph
			.nodes()
			.iter()
			.zip(&from)
			.map(|(node, current)| target.get(&node.key).copied().unwrap_or(*current))
			.collect();
		Self {
			from,
			to,
			start_ms: now_ms,
			duration_ms,
		}
	}

	/// Moves nodes to their interpolated positions. Returns `true` when done.
	pub fn apply(&self, graph: &mut Graph, now_ms: f64) -> bool {
		let t = if self.duration_ms > 0.0 {
			(now_ms - self.start_ms) / self.duration_ms
		} else {
			1.0
		};
		let done = t >= 1.0;
		let eased = ease_quadratic_in_out(t);
		for (i, (from, to)) in self.from.iter().zip(&self.to).enumerate() {
			let position = if done {
				*to
			} else {
				Position {
					x: from.x + (to.x - from.x) * eased,
					y: from.y + (to.y - from.y) * eased,
				}
			};
			graph.set_position(i, position);
		}
		done
	}
}

/// Start/stop/reset state machine for the two layout algorithms.
pub struct LayoutCoordinator {
	settings: ForceSettings,
	noverlap: NoverlapConfig,
	original: LayoutSnapshot,
	running: Option<Running>,
	tween: Option<NodeTween>,
	controls: LayoutControls,
}

impl LayoutCoordinator {
	/// `original` is the layout restored by [`LayoutCoordinator::reset`].
	pub fn new(original: LayoutSnapshot, settings: ForceSettings, noverlap: NoverlapConfig) -> Self {
		Self {
			settings,
			noverlap,
			original,
			running: None,
			tween: None,
			controls: LayoutControls::default(),
		}
	}

	pub fn controls(&self) -> LayoutControls {
		self.controls
	}

	pub fn running(&self) -> Option<LayoutKind> {
		self.running.as_ref().map(Running::kind)
	}

	pub fn original(&self) -> &LayoutSnapshot {
		&self.original
	}

	pub fn is_tweening(&self) -> bool {
		self.tween.is_some()
	}

	fn ensure_idle(&self, requested: &'static str) -> Result<()> {
		match self.running() {
			Some(kind) => Err(WidgetError::LayoutBusy {
				running: kind.name(),
				requested,
			}),
			None => Ok(()),
		}
	}

	pub fn start_force(&mut self, graph: &Graph) -> Result<()> {
		if self.running() == Some(LayoutKind::Force) {
			return Ok(());
		}
		self.ensure_idle(LayoutKind::Force.name())?;
		info!("starting force layout on {} nodes", graph.order());
		self.tween = None;
		self.running = Some(Running::Force(ForceLayout::new(graph, &self.settings)));
		self.controls.layout_running = true;
		self.controls.noverlap_enabled = false;
		self.controls.reset_visible = false;
		Ok(())
	}

	/// Stops the force layout and snapshots positions. No-op if it is not running.
	pub fn stop_force(&mut self, graph: &Graph) -> Vec<StatePatch> {
		if self.running() != Some(LayoutKind::Force) {
			return Vec::new();
		}
		self.running = None;
		info!("force layout stopped");
		self.controls.layout_running = false;
		self.controls.noverlap_enabled = true;
		self.controls.reset_visible = true;
		vec![StatePatch::Layout(graph.collect_layout())]
	}

	pub fn toggle_force(&mut self, graph: &Graph) -> Result<Vec<StatePatch>> {
		if self.running() == Some(LayoutKind::Force) {
			Ok(self.stop_force(graph))
		} else {
			self.start_force(graph).map(|_| Vec::new())
		}
	}

	pub fn start_noverlap(&mut self) -> Result<()> {
		if self.running() == Some(LayoutKind::Noverlap) {
			return Ok(());
		}
		self.ensure_idle(LayoutKind::Noverlap.name())?;
		info!("starting overlap removal");
		self.tween = None;
		self.running = Some(Running::Noverlap { iterations: 0 });
		self.controls.noverlap_running = true;
		self.controls.layout_enabled = false;
		self.controls.reset_visible = false;
		Ok(())
	}

	/// Stops overlap removal. On convergence the noverlap button is disabled
	/// since running it again would not move anything.
	pub fn stop_noverlap(&mut self, graph: &Graph, converged: bool) -> Vec<StatePatch> {
		if self.running() != Some(LayoutKind::Noverlap) {
			return Vec::new();
		}
		self.running = None;
		info!("overlap removal stopped (converged: {converged})");
		self.controls.noverlap_running = false;
		self.controls.layout_enabled = true;
		self.controls.reset_visible = true;
		if converged {
			self.controls.noverlap_enabled = false;
		}
		vec![StatePatch::Layout(graph.collect_layout())]
	}

	pub fn toggle_noverlap(&mut self, graph: &Graph) -> Result<Vec<StatePatch>> {
		if self.running() == Some(LayoutKind::Noverlap) {
			Ok(self.stop_noverlap(graph, false))
		} else {
			self.start_noverlap().map(|_| Vec::new())
		}
	}

	/// Restores the original layout, tweening nodes back over `duration_ms`.
	pub fn reset(&mut self, graph: &Graph, now_ms: f64, duration_ms: f64) -> Result<Vec<StatePatch>> {
		self.ensure_idle("reset")?;
		debug!("resetting layout");
		self.controls.noverlap_enabled = true;
		self.controls.reset_visible = false;
		self.tween = Some(NodeTween::new(graph, &self.original, now_ms, duration_ms));
		Ok(vec![StatePatch::Layout(self.original.clone())])
	}

	/// Positions were replaced from outside, e.g. by the host. Drops the reset
	/// tween and restarts a running force simulation from the new positions
	/// so neither writes stale coordinates back.
	pub fn positions_replaced(&mut self, graph: &Graph) {
		self.tween = None;
		if let Some(Running::Force(layout)) = &mut self.running {
			debug!("reseeding force layout from replaced positions");
			*layout = ForceLayout::new(graph, &self.settings);
		}
	}

	/// Advances the reset tween. Returns whether positions moved.
	pub fn tick_tween(&mut self, graph: &mut Graph, now_ms: f64) -> bool {
		let Some(tween) = &self.tween else {
			return false;
		};
		if tween.apply(graph, now_ms) {
			self.tween = None;
		}
		true
	}

	/// One force layout step. Returns whether positions moved.
	pub fn step_force(&mut self, graph: &mut Graph, dt: f32) -> bool {
		match &mut self.running {
			Some(Running::Force(layout)) => {
				layout.step(graph, dt);
				true
			}
			_ => false,
		}
	}

	/// One overlap removal iteration in viewport space, `sizes` being the
	/// rendered node sizes. Stops itself on convergence or after the
	/// configured iteration cap and returns the resulting patches.
	pub fn step_noverlap(
		&mut self,
		graph: &mut Graph,
		projection: &Projection,
		sizes: &[f64],
	) -> Vec<StatePatch> {
		let Some(Running::Noverlap { iterations }) = &mut self.running else {
			return Vec::new();
		};
		*iterations += 1;
		let exhausted = *iterations >= self.noverlap.max_iterations;

		let mut circles: Vec<Circle> = graph
			.nodes()
			.iter()
			.zip(sizes)
			.map(|(node, size)| {
				let (x, y) = projection.graph_to_viewport(node.position);
				Circle {
					x,
					y,
					size: projection.node_radius(*size),
				}
			})
			.collect();
		let converged = noverlap::iterate(&mut circles, &self.noverlap);
		for (i, circle) in circles.iter().enumerate() {
			graph.set_position(i, projection.viewport_to_graph(circle.x, circle.y));
		}

		if converged || exhausted {
			self.stop_noverlap(graph, converged)
		} else {
			Vec::new()
		}
	}
}
