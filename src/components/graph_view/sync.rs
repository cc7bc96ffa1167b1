//! Host synchronization: the key/value property protocol.
//!
//! The host (notebook kernel or embedding page) is the system of record.
//! The widget reads [`HostState`] once at construction, then pushes
//! [`StatePatch`] batches through a [`HostSink`]. Selection, filter and
//! layout patches go out immediately; camera updates are debounced.
//!
//! Host-originated changes arrive as [`HostMessage::Update`] and are applied
//! with the bridge muted so they are not echoed back.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Deserializer, Serialize};

use super::camera::CameraState;
use super::graph::LayoutSnapshot;
use super::layout::ForceSettings;
use super::types::{AttrValue, GraphData};
use super::visual::{EdgeType, VisualVariables};
use crate::error::Result;

/// Full host model, as serialized into the page.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostState {
	pub data: GraphData,
	/// Widget height in pixels.
	pub height: u32,
	pub start_layout: bool,
	pub layout: Option<LayoutSnapshot>,
	pub layout_settings: Option<ForceSettings>,
	pub camera_state: Option<CameraState>,
	pub selected_node: Option<String>,
	/// Selected edge, as its `[source, target]` extremities.
	pub selected_edge: Option<(String, String)>,
	pub selected_node_category_values: Option<Vec<AttrValue>>,
	pub selected_edge_category_values: Option<Vec<AttrValue>>,
	#[serde(deserialize_with = "palette_entries")]
	pub node_color_palette: Option<Vec<(AttrValue, String)>>,
	#[serde(deserialize_with = "palette_entries")]
	pub edge_color_palette: Option<Vec<(AttrValue, String)>>,
	pub visual_variables: VisualVariables,
	pub clickable_edges: bool,
	pub default_node_color: Option<String>,
	pub default_edge_color: Option<String>,
	pub default_edge_type: Option<EdgeType>,
	/// Edge attribute holding weights for widget-side metrics.
	pub edge_weight: Option<String>,
	/// Metric name -> node attribute receiving the result.
	pub node_metrics: IndexMap<String, String>,
	pub snapshot: Option<String>,
}

impl Default for HostState {
	fn default() -> Self {
		Self {
			data: GraphData::default(),
			height: 500,
			start_layout: false,
			layout: None,
			layout_settings: None,
			camera_state: None,
			selected_node: None,
			selected_edge: None,
			selected_node_category_values: None,
			selected_edge_category_values: None,
			node_color_palette: None,
			edge_color_palette: None,
			visual_variables: VisualVariables::default(),
			clickable_edges: false,
			default_node_color: None,
			default_edge_color: None,
			default_edge_type: None,
			edge_weight: None,
			node_metrics: IndexMap::new(),
			snapshot: None,
		}
	}
}

/// Palettes are accepted both as `[[value, color], ...]` and as a
/// `{value: color}` object.
fn palette_entries<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<(AttrValue, String)>>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Entries {
		Pairs(Vec<(AttrValue, String)>),
		Object(IndexMap<String, String>),
	}

	Ok(Option::<Entries>::deserialize(deserializer)?.map(|entries| match entries {
		Entries::Pairs(pairs) => pairs,
		Entries::Object(map) => map.into_iter().map(|(k, v)| (AttrValue::String(k), v)).collect(),
	}))
}

/// A single host key update.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum StatePatch {
	Layout(LayoutSnapshot),
	CameraState(CameraState),
	SelectedNode(Option<String>),
	SelectedEdge(Option<(String, String)>),
	SelectedNodeCategoryValues(Option<Vec<AttrValue>>),
	SelectedEdgeCategoryValues(Option<Vec<AttrValue>>),
	/// Rendered frame as a data URL.
	Snapshot(String),
}

impl StatePatch {
	pub fn key(&self) -> &'static str {
		match self {
			StatePatch::Layout(_) => "layout",
			StatePatch::CameraState(_) => "camera_state",
			StatePatch::SelectedNode(_) => "selected_node",
			StatePatch::SelectedEdge(_) => "selected_edge",
			StatePatch::SelectedNodeCategoryValues(_) => "selected_node_category_values",
			StatePatch::SelectedEdgeCategoryValues(_) => "selected_edge_category_values",
			StatePatch::Snapshot(_) => "snapshot",
		}
	}

	/// Parses a `key: value` pair sent by the host.
	pub fn from_entry(key: &str, value: serde_json::Value) -> Result<Self> {
		Ok(serde_json::from_value(serde_json::json!({ "key": key, "value": value }))?)
	}
}

/// Custom messages sent by the host.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum HostMessage {
	/// Render the current frame and write it to `snapshot`.
	RenderSnapshot,
	/// Host-side changes to apply without echoing them back.
	Update {
		patch: serde_json::Map<String, serde_json::Value>,
	},
}

impl HostMessage {
	/// Patches carried by an update. Unknown or malformed keys are skipped.
	pub fn patches(&self) -> Vec<StatePatch> {
		let HostMessage::Update { patch } = self else {
			return Vec::new();
		};
		patch
			.iter()
			.filter_map(|(key, value)| match StatePatch::from_entry(key, value.clone()) {
				Ok(patch) => Some(patch),
				Err(e) => {
					warn!("ignoring host update for \"{key}\": {e}");
					None
				}
			})
			.collect()
	}
}

/// Receiver of widget -> host updates.
pub trait HostSink {
	fn sync(&mut self, patches: Vec<StatePatch>);
}

/// Sink that keeps every patch, shareable so the log can be read while the
/// widget owns the sink.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
	log: Rc<RefCell<Vec<StatePatch>>>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drains the patches received so far.
	pub fn take(&self) -> Vec<StatePatch> {
		self.log.borrow_mut().drain(..).collect()
	}

	/// Last patch received for `key`.
	pub fn last(&self, key: &str) -> Option<StatePatch> {
		self.log.borrow().iter().rev().find(|p| p.key() == key).cloned()
	}
}

impl HostSink for RecordingSink {
	fn sync(&mut self, patches: Vec<StatePatch>) {
		self.log.borrow_mut().extend(patches);
	}
}

/// Trailing debounce: only the last value pushed within the delay is emitted,
/// once the delay has elapsed since that push.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
	delay_ms: f64,
	pending: Option<(T, f64)>,
}

impl<T> Debouncer<T> {
	pub fn new(delay_ms: f64) -> Self {
		Self {
			delay_ms,
			pending: None,
		}
	}

	pub fn push(&mut self, value: T, now_ms: f64) {
		self.pending = Some((value, now_ms + self.delay_ms));
	}

	pub fn is_pending(&self) -> bool {
		self.pending.is_some()
	}

	/// Returns the pending value if its deadline has passed.
	pub fn poll(&mut self, now_ms: f64) -> Option<T> {
		let due = matches!(&self.pending, Some((_, deadline)) if now_ms >= *deadline);
		if due { self.pending.take().map(|(v, _)| v) } else { None }
	}

	pub fn cancel(&mut self) {
		self.pending = None;
	}
}

/// Outgoing side of the protocol.
pub struct SyncBridge {
	sink: Box<dyn HostSink>,
	camera: Debouncer<CameraState>,
	muted: bool,
}

impl SyncBridge {
	pub fn new(sink: Box<dyn HostSink>, camera_debounce_ms: f64) -> Self {
		Self {
			sink,
			camera: Debouncer::new(camera_debounce_ms),
			muted: false,
		}
	}

	/// Sends patches right away, unless a host update is being applied.
	pub fn push(&mut self, patches: Vec<StatePatch>) {
		if patches.is_empty() {
			return;
		}
		if self.muted {
			trace!("suppressed echo of {} patches", patches.len());
			return;
		}
		debug!(
			"syncing {}",
			patches.iter().map(StatePatch::key).collect::<Vec<_>>().join(", ")
		);
		self.sink.sync(patches);
	}

	/// Records a camera change, sent once the camera settles.
	pub fn camera_changed(&mut self, state: CameraState, now_ms: f64) {
		if self.muted {
			return;
		}
		self.camera.push(state, now_ms);
	}

	/// Emits the debounced camera state when due.
	pub fn poll(&mut self, now_ms: f64) {
		if let Some(state) = self.camera.poll(now_ms) {
			self.push(vec![StatePatch::CameraState(state)]);
		}
	}

	pub fn camera_pending(&self) -> bool {
		self.camera.is_pending()
	}

	/// Mutes outgoing patches while host-originated changes are applied.
	pub fn mute(&mut self) {
		self.muted = true;
	}

	pub fn unmute(&mut self) {
		self.muted = false;
	}

	/// Drops a pending local camera update, superseded by the host's.
	pub fn cancel_camera(&mut self) {
		self.camera.cancel();
	}
}
