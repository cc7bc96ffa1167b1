//! graph-explorer: Interactive graph exploration widget.
//!
//! This crate provides a WASM-based widget that renders a graph with visual
//! variables mapped from node and edge attributes, lets users select, filter
//! and lay out the graph, and keeps its state in sync with an embedding host.

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info, warn};
use serde::de::DeserializeOwned;
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub mod components;
pub mod config;
pub mod error;

pub use components::graph_view::{
	AttrValue, EdgeRecord, GraphData, GraphView, GraphWidget, HostMessage, HostSink, HostState, NodeRecord,
	StatePatch,
};
pub use config::{NoverlapConfig, WidgetConfig};
pub use error::{GraphError, Result, WidgetError};

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("graph-explorer: logging initialized");
}

/// Parse the JSON content of the script element with the given id.
fn load_script_json<T: DeserializeOwned>(id: &str) -> Option<T> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id(id)?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	let json_text = script.text().ok()?;

	match serde_json::from_str::<T>(&json_text) {
		Ok(value) => Some(value),
		Err(e) => {
			warn!("graph-explorer: failed to parse #{id}: {e}");
			None
		}
	}
}

/// Main application component.
/// Loads the host state from `#graph-data` and the optional widget
/// configuration from `#graph-config`.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let host: HostState = load_script_json("graph-data").unwrap_or_default();
	let config: WidgetConfig = load_script_json("graph-config").unwrap_or_default();
	info!(
		"graph-explorer: loaded {} nodes, {} edges",
		host.data.nodes.len(),
		host.data.edges.len()
	);

	view! {
		<Html attr:lang="en" attr:dir="ltr" />
		<Title text="Graph Explorer" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<GraphView host=host config=config />
	}
}
