//! Camera state and graph <-> viewport projection.
//!
//! Graph coordinates are first normalized into a unit square centered on the
//! graph's bounding box. The camera then lives in that normalized space:
//! `(x, y)` is the point shown at the viewport center and `ratio` is the zoom
//! (smaller = closer). A camera of `{x: 0.5, y: 0.5, ratio: 1}` fits the
//! whole graph in the viewport.

use serde::{Deserialize, Serialize};

use super::graph::{Graph, Position};

const MIN_RATIO: f64 = 0.01;
const MAX_RATIO: f64 = 20.0;

/// The `camera_state` host key.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraState {
	pub x: f64,
	pub y: f64,
	pub ratio: f64,
	pub angle: f64,
}

impl Default for CameraState {
	fn default() -> Self {
		Self {
			x: 0.5,
			y: 0.5,
			ratio: 1.0,
			angle: 0.0,
		}
	}
}

impl CameraState {
	fn clamped(mut self) -> Self {
		if !self.ratio.is_finite() || self.ratio <= 0.0 {
			self.ratio = 1.0;
		}
		self.ratio = self.ratio.clamp(MIN_RATIO, MAX_RATIO);
		self
	}

	fn lerp(self, other: CameraState, t: f64) -> Self {
		let mix = |a: f64, b: f64| a + (b - a) * t;
		Self {
			x: mix(self.x, other.x),
			y: mix(self.y, other.y),
			ratio: mix(self.ratio, other.ratio),
			angle: mix(self.angle, other.angle),
		}
	}
}

/// Quadratic in/out easing on `t` in `[0, 1]`.
pub fn ease_quadratic_in_out(t: f64) -> f64 {
	let t = t.clamp(0.0, 1.0);
	if t < 0.5 {
		2.0 * t * t
	} else {
		-1.0 + (4.0 - 2.0 * t) * t
	}
}

/// Bounding box normalization of graph coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
	center_x: f64,
	center_y: f64,
	span: f64,
}

impl Normalization {
	pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
		let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
		let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
		for p in positions {
			min_x = min_x.min(p.x);
			min_y = min_y.min(p.y);
			max_x = max_x.max(p.x);
			max_y = max_y.max(p.y);
		}
		if !min_x.is_finite() {
			return Self {
				center_x: 0.0,
				center_y: 0.0,
				span: 1.0,
			};
		}
		let span = (max_x - min_x).max(max_y - min_y);
		Self {
			center_x: (min_x + max_x) / 2.0,
			center_y: (min_y + max_y) / 2.0,
			span: if span > 0.0 { span } else { 1.0 },
		}
	}

	pub fn from_graph(graph: &Graph) -> Self {
		Self::from_positions(graph.nodes().iter().map(|n| n.position))
	}

	pub fn center(&self) -> Position {
		Position {
			x: self.center_x,
			y: self.center_y,
		}
	}

	/// Largest side of the bounding box, never zero.
	pub fn span(&self) -> f64 {
		self.span
	}

	fn normalize(&self, p: Position) -> (f64, f64) {
		(
			0.5 + (p.x - self.center_x) / self.span,
			0.5 + (p.y - self.center_y) / self.span,
		)
	}

	fn denormalize(&self, x: f64, y: f64) -> Position {
		Position {
			x: (x - 0.5) * self.span + self.center_x,
			y: (y - 0.5) * self.span + self.center_y,
		}
	}
}

/// Frozen mapping between graph space and viewport pixels for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
	pub camera: CameraState,
	pub width: f64,
	pub height: f64,
	normalization: Normalization,
}

impl Projection {
	pub fn new(camera: CameraState, normalization: Normalization, width: f64, height: f64) -> Self {
		Self {
			camera,
			width,
			height,
			normalization,
		}
	}

	fn scale(&self) -> f64 {
		self.width.min(self.height) / self.camera.ratio
	}

	/// Converts a graph position to viewport pixels. Graph `y` grows upwards.
	pub fn graph_to_viewport(&self, p: Position) -> (f64, f64) {
		let (nx, ny) = self.normalization.normalize(p);
		let (dx, dy) = (nx - self.camera.x, ny - self.camera.y);
		let (sin, cos) = (-self.camera.angle).sin_cos();
		let (rx, ry) = (dx * cos - dy * sin, dx * sin + dy * cos);
		let scale = self.scale();
		(self.width / 2.0 + rx * scale, self.height / 2.0 - ry * scale)
	}

	pub fn viewport_to_graph(&self, vx: f64, vy: f64) -> Position {
		let scale = self.scale();
		let (rx, ry) = ((vx - self.width / 2.0) / scale, (self.height / 2.0 - vy) / scale);
		let (sin, cos) = self.camera.angle.sin_cos();
		let (dx, dy) = (rx * cos - ry * sin, rx * sin + ry * cos);
		self.normalization.denormalize(dx + self.camera.x, dy + self.camera.y)
	}

	/// Camera center in normalized space for a graph position.
	pub fn framed(&self, p: Position) -> (f64, f64) {
		self.normalization.normalize(p)
	}

	/// On-screen radius of a node of display size `size`.
	///
	/// Sizes grow with the square root of the zoom, so zooming in reveals
	/// space between nodes.
	pub fn node_radius(&self, size: f64) -> f64 {
		size / self.camera.ratio.sqrt()
	}
}

/// A timed camera transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraAnimation {
	from: CameraState,
	to: CameraState,
	start_ms: f64,
	duration_ms: f64,
}

impl CameraAnimation {
	/// Interpolated state at `now_ms`, and whether the animation is over.
	pub fn sample(&self, now_ms: f64) -> (CameraState, bool) {
		if self.duration_ms <= 0.0 {
			return (self.to, true);
		}
		let t = (now_ms - self.start_ms) / self.duration_ms;
		if t >= 1.0 {
			(self.to, true)
		} else {
			(self.from.lerp(self.to, ease_quadratic_in_out(t)), false)
		}
	}
}

/// Camera with optional running animation.
#[derive(Clone, Debug, Default)]
pub struct Camera {
	state: CameraState,
	animation: Option<CameraAnimation>,
}

impl Camera {
	pub fn new(state: CameraState) -> Self {
		Self {
			state: state.clamped(),
			animation: None,
		}
	}

	pub fn state(&self) -> CameraState {
		self.state
	}

	pub fn is_animating(&self) -> bool {
		self.animation.is_some()
	}

	/// Jumps to `state`, cancelling any animation.
	pub fn set_state(&mut self, state: CameraState) {
		self.animation = None;
		self.state = state.clamped();
	}

	pub fn animate(&mut self, target: CameraState, now_ms: f64, duration_ms: f64) {
		self.animation = Some(CameraAnimation {
			from: self.state,
			to: target.clamped(),
			start_ms: now_ms,
			duration_ms,
		});
	}

	pub fn animated_zoom(&mut self, factor: f64, now_ms: f64, duration_ms: f64) {
		let target = CameraState {
			ratio: self.target().ratio / factor,
			..self.target()
		};
		self.animate(target, now_ms, duration_ms);
	}

	pub fn animated_unzoom(&mut self, factor: f64, now_ms: f64, duration_ms: f64) {
		self.animated_zoom(1.0 / factor, now_ms, duration_ms);
	}

	/// Zooms by `factor` while keeping the viewport point under the cursor fixed.
	pub fn zoom_around(&mut self, projection: &Projection, vx: f64, vy: f64, factor: f64) {
		let anchor = projection.framed(projection.viewport_to_graph(vx, vy));
		let ratio = (self.state.ratio / factor).clamp(MIN_RATIO, MAX_RATIO);
		let applied = self.state.ratio / ratio;
		self.set_state(CameraState {
			x: anchor.0 + (self.state.x - anchor.0) / applied,
			y: anchor.1 + (self.state.y - anchor.1) / applied,
			ratio,
			..self.state
		});
	}

	/// Moves the camera by a viewport-space delta.
	pub fn pan(&mut self, projection: &Projection, dx: f64, dy: f64) {
		let scale = projection.width.min(projection.height) / self.state.ratio;
		let (sin, cos) = self.state.angle.sin_cos();
		let (rx, ry) = (dx / scale, -dy / scale);
		self.set_state(CameraState {
			x: self.state.x - (rx * cos - ry * sin),
			y: self.state.y - (rx * sin + ry * cos),
			..self.state
		});
	}

	/// Advances the animation. Returns whether the state changed.
	pub fn tick(&mut self, now_ms: f64) -> bool {
		let Some(animation) = self.animation else {
			return false;
		};
		let (state, done) = animation.sample(now_ms);
		self.state = state;
		if done {
			self.animation = None;
		}
		true
	}

	fn target(&self) -> CameraState {
		self.animation.map(|a| a.to).unwrap_or(self.state)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn unit_projection(camera: CameraState) -> Projection {
		let norm = Normalization::from_positions([Position { x: 0.0, y: 0.0 }, Position { x: 10.0, y: 10.0 }]);
		Projection::new(camera, norm, 200.0, 100.0)
	}

	#[test]
	fn projection_round_trips() {
		let camera = CameraState {
			x: 0.4,
			y: 0.7,
			ratio: 0.5,
			angle: 0.3,
		};
		let projection = unit_projection(camera);
		let p = Position { x: 3.0, y: 8.0 };
		let (vx, vy) = projection.graph_to_viewport(p);
		let back = projection.viewport_to_graph(vx, vy);
		assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
	}

	#[test]
	fn default_camera_centers_the_graph() {
		let projection = unit_projection(CameraState::default());
		assert_eq!(projection.graph_to_viewport(Position { x: 5.0, y: 5.0 }), (100.0, 50.0));
		// y grows upwards
		let (_, top) = projection.graph_to_viewport(Position { x: 5.0, y: 10.0 });
		assert_eq!(top, 0.0);
	}

	#[test]
	fn animation_eases_to_target() {
		let mut camera = Camera::new(CameraState::default());
		camera.animated_zoom(2.0, 0.0, 500.0);
		assert!(camera.tick(250.0));
		let halfway = camera.state().ratio;
		assert!(halfway < 1.0 && halfway > 0.5);
		assert!(camera.tick(600.0));
		assert_eq!(camera.state().ratio, 0.5);
		assert!(!camera.is_animating());
		assert!(!camera.tick(700.0));
	}

	#[test]
	fn zoom_around_keeps_anchor_fixed() {
		let mut camera = Camera::new(CameraState::default());
		let before = unit_projection(camera.state());
		let anchor = before.viewport_to_graph(150.0, 20.0);
		camera.zoom_around(&before, 150.0, 20.0, 1.5);
		let after = unit_projection(camera.state());
		let (vx, vy) = after.graph_to_viewport(anchor);
		assert!((vx - 150.0).abs() < 1e-9 && (vy - 20.0).abs() < 1e-9);
	}

	#[test]
	fn easing_is_symmetric() {
		assert_eq!(ease_quadratic_in_out(0.0), 0.0);
		assert_eq!(ease_quadratic_in_out(0.5), 0.5);
		assert_eq!(ease_quadratic_in_out(1.0), 1.0);
		assert!((ease_quadratic_in_out(0.25) + ease_quadratic_in_out(0.75) - 1.0).abs() < 1e-12);
	}
}
