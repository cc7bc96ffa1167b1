//! Interactive graph exploration widget.
//!
//! Displays a graph on an HTML canvas with:
//! - Visual variables mapping node and edge attributes to color, size and label
//! - Node and edge selection with neighborhood focus
//! - Category filters driven by the legend
//! - Force-directed and overlap-removal layouts
//! - Two-way state sync with an embedding host
//! - PNG, SVG, GEXF and JSON downloads
//!
//! The canvas-free parts ([`widget::GraphWidget`] and everything below it)
//! are plain Rust and can be driven without a browser.
//!
//! # Example
//!
//! ```ignore
//! use graph_explorer::{GraphView, HostState};
//!
//! let host: HostState = serde_json::from_str(json)?;
//! view! { <GraphView host=host /> }
//! ```

mod component;
pub mod camera;
pub mod export;
pub mod graph;
pub mod info;
pub mod interaction;
pub mod layout;
pub mod louvain;
pub mod noverlap;
pub mod palette;
pub mod reducers;
pub mod render;
pub mod scale;
pub mod sync;
pub mod theme;
pub mod types;
pub mod visual;
pub mod widget;

pub use component::{GraphView, PostMessageSink};
pub use sync::{HostMessage, HostSink, HostState, RecordingSink, StatePatch};
pub use theme::Theme;
pub use types::{AttrValue, EdgeRecord, GraphData, NodeRecord};
pub use widget::{GraphWidget, MessageOutcome};
