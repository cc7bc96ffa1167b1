//! Error types for graph import and widget operations.

use thiserror::Error;

/// Errors raised while importing the serialized graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
	#[error("edge {edge} references unknown {endpoint} node \"{node}\"")]
	DanglingEdge {
		edge: String,
		endpoint: &'static str,
		node: String,
	},

	#[error("duplicate node key \"{0}\"")]
	DuplicateNode(String),

	#[error("duplicate edge key \"{0}\"")]
	DuplicateEdge(String),

	#[error("edge {edge} duplicates an existing {from} -> {to} edge in a simple graph")]
	ParallelEdge {
		edge: String,
		from: String,
		to: String,
	},

	#[error("self loop {0} in a graph that forbids them")]
	SelfLoop(String),
}

/// Errors surfaced by the widget controller.
#[derive(Error, Debug)]
pub enum WidgetError {
	#[error("malformed graph: {0}")]
	Graph(#[from] GraphError),

	#[error("unknown metric \"{0}\"")]
	UnknownMetric(String),

	#[error("unknown node \"{0}\"")]
	UnknownNode(String),

	#[error("unknown edge \"{0}\"")]
	UnknownEdge(String),

	#[error("cannot start {requested} while {running} is running")]
	LayoutBusy {
		running: &'static str,
		requested: &'static str,
	},

	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),

	/// Keys of a host update that could not be applied. The other keys of
	/// the same update were applied.
	#[error("host update rejected: {}", join(.0))]
	HostUpdate(Vec<WidgetError>),
}

fn join(errors: &[WidgetError]) -> String {
	errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

pub type Result<T, E = WidgetError> = std::result::Result<T, E>;
