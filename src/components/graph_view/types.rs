//! Graph data structures exchanged with the host.
//!
//! The serialized form follows the common `{attributes, options, nodes,
//! edges}` layout used by graph libraries for JSON import/export, so a graph
//! exported by the widget can be fed straight back into it.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// A primitive attribute value attached to a node, an edge or the graph.
///
/// Attribute bags are schema-less and host-supplied, so anything JSON can
/// express is accepted. Nested values are kept verbatim in [`AttrValue::Json`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
	#[default]
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Json(serde_json::Value),
}

/// Ordered attribute map. Insertion order is preserved for display and export.
pub type Attributes = IndexMap<String, AttrValue>;

impl AttrValue {
	/// Returns the value as a finite number, if it is one.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			AttrValue::Number(n) if n.is_finite() => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			AttrValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, AttrValue::Null)
	}

	/// JS-like truthiness, used where a falsy label falls back to the key.
	pub fn is_truthy(&self) -> bool {
		match self {
			AttrValue::Null => false,
			AttrValue::Bool(b) => *b,
			AttrValue::Number(n) => *n != 0.0 && !n.is_nan(),
			AttrValue::String(s) => !s.is_empty(),
			AttrValue::Json(_) => true,
		}
	}

	/// Type tag shown next to values in the information panel.
	pub fn type_name(&self) -> &'static str {
		match self {
			AttrValue::Number(_) => "number",
			AttrValue::String(_) => "string",
			AttrValue::Bool(_) => "boolean",
			AttrValue::Null | AttrValue::Json(_) => "unknown",
		}
	}

	fn normalized_bits(n: f64) -> u64 {
		if n == 0.0 { 0.0f64.to_bits() } else { n.to_bits() }
	}
}

impl PartialEq for AttrValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(AttrValue::Null, AttrValue::Null) => true,
			(AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
			(AttrValue::Number(a), AttrValue::Number(b)) => {
				Self::normalized_bits(*a) == Self::normalized_bits(*b)
			}
			(AttrValue::String(a), AttrValue::String(b)) => a == b,
			(AttrValue::Json(a), AttrValue::Json(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::mem::discriminant(self).hash(state);
		match self {
			AttrValue::Null => {}
			AttrValue::Bool(b) => b.hash(state),
			AttrValue::Number(n) => Self::normalized_bits(*n).hash(state),
			AttrValue::String(s) => s.hash(state),
			AttrValue::Json(v) => v.to_string().hash(state),
		}
	}
}

impl fmt::Display for AttrValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AttrValue::Null => f.write_str("null"),
			AttrValue::Bool(b) => write!(f, "{b}"),
			AttrValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{n:.0}"),
			AttrValue::Number(n) => write!(f, "{n}"),
			AttrValue::String(s) => f.write_str(s),
			AttrValue::Json(v) => write!(f, "{v}"),
		}
	}
}

impl From<&str> for AttrValue {
	fn from(value: &str) -> Self {
		AttrValue::String(value.to_string())
	}
}

impl From<String> for AttrValue {
	fn from(value: String) -> Self {
		AttrValue::String(value)
	}
}

impl From<f64> for AttrValue {
	fn from(value: f64) -> Self {
		AttrValue::Number(value)
	}
}

impl From<bool> for AttrValue {
	fn from(value: bool) -> Self {
		AttrValue::Bool(value)
	}
}

/// Edge orientation model of the whole graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
	Directed,
	Undirected,
	#[default]
	Mixed,
}

/// Graph-level options.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphOptions {
	#[serde(rename = "type")]
	pub kind: GraphType,
	pub multi: bool,
	#[serde(rename = "allowSelfLoops")]
	pub allow_self_loops: bool,
}

impl Default for GraphOptions {
	fn default() -> Self {
		Self {
			kind: GraphType::Mixed,
			multi: false,
			allow_self_loops: true,
		}
	}
}

/// A serialized node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NodeRecord {
	/// Unique identifier. Numeric keys are accepted and stringified.
	#[serde(deserialize_with = "key_from_value")]
	pub key: String,
	#[serde(default)]
	pub attributes: Attributes,
}

/// A serialized edge.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EdgeRecord {
	/// Optional edge key. A `geid_<n>` key is generated when absent.
	#[serde(
		default,
		deserialize_with = "optional_key_from_value",
		skip_serializing_if = "Option::is_none"
	)]
	pub key: Option<String>,
	#[serde(deserialize_with = "key_from_value")]
	pub source: String,
	#[serde(deserialize_with = "key_from_value")]
	pub target: String,
	#[serde(default)]
	pub attributes: Attributes,
	#[serde(default, skip_serializing_if = "is_false")]
	pub undirected: bool,
}

/// Complete serialized graph: the `data` key of the host state.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphData {
	pub attributes: Attributes,
	pub options: GraphOptions,
	pub nodes: Vec<NodeRecord>,
	pub edges: Vec<EdgeRecord>,
}

impl NodeRecord {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			attributes: Attributes::new(),
		}
	}

	pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
		self.attributes.insert(name.to_string(), value.into());
		self
	}
}

impl EdgeRecord {
	pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			key: None,
			source: source.into(),
			target: target.into(),
			attributes: Attributes::new(),
			undirected: false,
		}
	}

	pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
		self.attributes.insert(name.to_string(), value.into());
		self
	}
}

fn is_false(value: &bool) -> bool {
	!*value
}

fn key_from_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	AttrValue::deserialize(deserializer).map(|v| v.to_string())
}

fn optional_key_from_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = AttrValue::deserialize(deserializer)?;
	Ok((!value.is_null()).then(|| value.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn numeric_keys_are_stringified() {
		let data: GraphData = serde_json::from_str(
			r#"{"nodes": [{"key": 1}, {"key": "b"}], "edges": [{"source": 1, "target": "b"}]}"#,
		)
		.unwrap();
		assert_eq!(data.nodes[0].key, "1");
		assert_eq!(data.edges[0].source, "1");
		assert_eq!(data.edges[0].key, None);
		assert_eq!(data.options.kind, GraphType::Mixed);
	}

	#[test]
	fn attr_values_hash_numbers_by_value() {
		use std::collections::HashSet;
		let mut set = HashSet::new();
		set.insert(AttrValue::Number(0.0));
		assert!(set.contains(&AttrValue::Number(-0.0)));
		assert!(!set.contains(&AttrValue::String("0".into())));
	}

	#[test]
	fn display_matches_js_number_formatting() {
		assert_eq!(AttrValue::Number(3.0).to_string(), "3");
		assert_eq!(AttrValue::Number(2.5).to_string(), "2.5");
		assert_eq!(AttrValue::Bool(true).to_string(), "true");
	}

	#[test]
	fn nested_values_are_preserved() {
		let record: NodeRecord =
			serde_json::from_str(r#"{"key": "a", "attributes": {"tags": [1, 2]}}"#).unwrap();
		assert!(matches!(record.attributes["tags"], AttrValue::Json(_)));
		assert_eq!(record.attributes["tags"].type_name(), "unknown");
	}
}
