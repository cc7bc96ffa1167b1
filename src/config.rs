//! Widget configuration.
//!
//! Every field has a default, so an empty JSON object (or no config block at
//! all) yields the stock behavior.

use serde::{Deserialize, Serialize};

/// Overlap-removal tuning.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NoverlapConfig {
	/// Multiplier applied to every node radius before collision checks.
	pub ratio: f64,
	/// Extra spacing, in pixels, kept around each node.
	pub margin: f64,
	/// Target spacing factor applied when separating a colliding pair.
	pub expansion: f64,
	/// Step speed multiplier.
	pub speed: f64,
	/// Hard cap on iterations for a single run.
	pub max_iterations: usize,
}

impl Default for NoverlapConfig {
	fn default() -> Self {
		Self {
			ratio: 1.0,
			margin: 3.0,
			expansion: 1.1,
			speed: 3.0,
			max_iterations: 500,
		}
	}
}

/// Controller-wide constants that would otherwise be globals.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WidgetConfig {
	/// Maximum number of distinct values a category palette assigns colors to.
	pub category_max_count: usize,
	/// Color of nodes outside the focus set or excluded by a category filter.
	pub muted_node_color: String,
	pub default_node_color: String,
	pub default_edge_color: String,
	/// Trailing debounce applied to camera state write-back.
	pub camera_debounce_ms: f64,
	pub camera_animation_ms: f64,
	/// Duration of the tween back to the original layout.
	pub reset_layout_ms: f64,
	pub zoom_factor: f64,
	/// Horizontal camera position used by "reset zoom", leaving room for the side panel.
	pub camera_offset: f64,
	/// Seed for fallback node positions and community detection.
	pub rng_seed: u64,
	/// Simulated seconds per force-layout step.
	pub layout_tick: f32,
	pub noverlap: NoverlapConfig,
}

impl Default for WidgetConfig {
	fn default() -> Self {
		Self {
			category_max_count: 10,
			muted_node_color: "#ccc".to_string(),
			default_node_color: "#999".to_string(),
			default_edge_color: "#ccc".to_string(),
			camera_debounce_ms: 500.0,
			camera_animation_ms: 500.0,
			reset_layout_ms: 250.0,
			zoom_factor: 1.5,
			camera_offset: 0.65,
			rng_seed: 0x5167_6d61,
			layout_tick: 0.016,
			noverlap: NoverlapConfig::default(),
		}
	}
}
