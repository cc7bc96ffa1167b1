//! Visual variables: declarative attribute -> color/size/label mappings.
//!
//! [`resolve`] scans the graph once per entity kind, collecting category
//! domains for palettes and numeric extents for scales. The result is an
//! immutable [`ResolvedVariables`] read by the reducers on every frame.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::graph::Graph;
use super::interaction::{EntityKind, InteractionState};
use super::palette::{Palette, PaletteBuilder};
use super::scale::{ColorScale, Extent, NumericScale, Range, coerce_numeric};
use super::types::{AttrValue, Attributes, GraphType};
use crate::config::WidgetConfig;

/// Prefix marking attributes that were supplied as keyword arguments.
pub const KWARG_PREFIX: &str = "$$";

/// Which endpoint a `dependent` edge color follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
	Source,
	Target,
}

impl Endpoint {
	pub fn as_str(self) -> &'static str {
		match self {
			Endpoint::Source => "source",
			Endpoint::Target => "target",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VisualVariable {
	Raw { attribute: String },
	Category { attribute: String },
	Continuous { attribute: String, range: Range },
	Dependent { value: Endpoint },
}

impl VisualVariable {
	pub fn raw(attribute: &str) -> Self {
		VisualVariable::Raw {
			attribute: attribute.to_string(),
		}
	}

	pub fn category(attribute: &str) -> Self {
		VisualVariable::Category {
			attribute: attribute.to_string(),
		}
	}

	pub fn continuous(attribute: &str, range: Range) -> Self {
		VisualVariable::Continuous {
			attribute: attribute.to_string(),
			range,
		}
	}

	pub fn attribute(&self) -> Option<&str> {
		match self {
			VisualVariable::Raw { attribute }
			| VisualVariable::Category { attribute }
			| VisualVariable::Continuous { attribute, .. } => Some(attribute),
			VisualVariable::Dependent { .. } => None,
		}
	}

	/// Attribute read for color and category values. `dependent` variables
	/// still expose the `color` attribute as their category value.
	fn color_attribute(&self) -> String {
		self.attribute()
			.filter(|a| !a.is_empty())
			.unwrap_or("color")
			.to_string()
	}
}

/// The `visual_variables` host key.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualVariables {
	pub node_color: VisualVariable,
	pub node_size: VisualVariable,
	pub node_label: VisualVariable,
	pub edge_color: VisualVariable,
	pub edge_size: VisualVariable,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub edge_label: Option<VisualVariable>,
}

impl Default for VisualVariables {
	fn default() -> Self {
		Self {
			node_color: VisualVariable::raw("color"),
			node_size: VisualVariable::continuous("size", Range::Numeric([2.0, 12.0])),
			node_label: VisualVariable::raw("label"),
			edge_color: VisualVariable::raw("color"),
			edge_size: VisualVariable::continuous("size", Range::Numeric([0.5, 10.0])),
			edge_label: None,
		}
	}
}

/// Edge drawing style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
	Arrow,
	Line,
}

/// How an entity's color is computed.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorResolver {
	/// Attribute value used as-is; non-string values fall back to the default color.
	Raw,
	Palette(Palette),
	Scale(ColorScale),
	/// Color of an edge endpoint's display data.
	Dependent(Endpoint),
}

/// How an entity's size is computed.
#[derive(Clone, Debug, PartialEq)]
pub enum SizeResolver {
	Raw,
	Scale(NumericScale),
}

/// Color/size/label resolution for one entity kind.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityVisuals {
	pub color_attribute: String,
	pub color: ColorResolver,
	pub size_attribute: String,
	pub size: SizeResolver,
	pub label_attribute: Option<String>,
	pub default_color: String,
	/// Extent of the coerced size attribute, before scaling.
	pub size_extent: Extent,
}

impl EntityVisuals {
	/// Raw value of the color attribute, used for category filtering.
	pub fn category_value(&self, attributes: &Attributes) -> AttrValue {
		attributes.get(&self.color_attribute).cloned().unwrap_or_default()
	}

	/// Resolved color, or `None` for `dependent` colors which need the
	/// endpoint's display data.
	pub fn color(&self, attributes: &Attributes) -> Option<String> {
		let value = attributes.get(&self.color_attribute);
		match &self.color {
			ColorResolver::Palette(palette) => {
				Some(palette.get(value.unwrap_or(&AttrValue::Null)).to_string())
			}
			ColorResolver::Scale(scale) => Some(scale.apply(coerce_numeric(value))),
			ColorResolver::Raw => Some(
				value
					.and_then(AttrValue::as_str)
					.filter(|s| !s.is_empty())
					.unwrap_or(&self.default_color)
					.to_string(),
			),
			ColorResolver::Dependent(_) => None,
		}
	}

	pub fn size(&self, attributes: &Attributes) -> f64 {
		let value = coerce_numeric(attributes.get(&self.size_attribute));
		match &self.size {
			SizeResolver::Raw => value,
			SizeResolver::Scale(scale) => scale.apply(value),
		}
	}

	/// Label attribute value, or `fallback` when it is missing or falsy.
	pub fn label(&self, attributes: &Attributes, fallback: &str) -> Option<String> {
		let attribute = self.label_attribute.as_ref()?;
		Some(match attributes.get(attribute) {
			Some(value) if value.is_truthy() => value.to_string(),
			_ => fallback.to_string(),
		})
	}

	pub fn palette(&self) -> Option<&Palette> {
		match &self.color {
			ColorResolver::Palette(palette) => Some(palette),
			_ => None,
		}
	}
}

/// Everything the reducers and the legend need, computed once per graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedVariables {
	pub variables: VisualVariables,
	pub node: EntityVisuals,
	pub edge: EntityVisuals,
	/// Nodes rendered smaller than this have their labels hidden.
	pub label_threshold: f64,
	pub render_edge_labels: bool,
	pub edge_type: EdgeType,
}

/// Host-supplied overrides that take part in resolution.
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions<'a> {
	pub node_color_palette: Option<&'a [(AttrValue, String)]>,
	pub edge_color_palette: Option<&'a [(AttrValue, String)]>,
	pub default_node_color: Option<&'a str>,
	pub default_edge_color: Option<&'a str>,
	pub default_edge_type: Option<EdgeType>,
}

/// Per-kind accumulator for the single resolution pass.
struct Scan {
	palette: Option<PaletteBuilder>,
	color_extent: Option<Extent>,
	size_extent: Extent,
}

impl Scan {
	fn new(color: &VisualVariable, has_host_palette: bool, max: usize, default_color: &str) -> Self {
		Self {
			palette: (matches!(color, VisualVariable::Category { .. }) && !has_host_palette)
				.then(|| PaletteBuilder::new(max, default_color)),
			color_extent: matches!(color, VisualVariable::Continuous { .. }).then(Extent::default),
			size_extent: Extent::default(),
		}
	}

	fn visit(&mut self, attributes: &Attributes, color_attribute: &str, size_attribute: &str) {
		let color = attributes.get(color_attribute);
		if let Some(builder) = &mut self.palette {
			builder.add(color);
		} else if let Some(extent) = &mut self.color_extent {
			extent.add(coerce_numeric(color));
		}
		self.size_extent.add(coerce_numeric(attributes.get(size_attribute)));
	}
}

fn size_attribute(variable: &VisualVariable) -> String {
	match variable {
		VisualVariable::Continuous { attribute, .. } | VisualVariable::Raw { attribute } => {
			attribute.clone()
		}
		_ => "size".to_string(),
	}
}

fn size_resolver(variable: &VisualVariable, extent: Extent, kind: &str) -> SizeResolver {
	match variable {
		VisualVariable::Continuous {
			range: Range::Numeric(range),
			..
		} => SizeResolver::Scale(NumericScale::new(extent, *range)),
		VisualVariable::Raw { .. } => SizeResolver::Raw,
		other => {
			warn!("{kind} size cannot use {other:?}, falling back to raw sizes");
			SizeResolver::Raw
		}
	}
}

fn color_resolver(
	variable: &VisualVariable,
	scan: &mut Scan,
	host_palette: Option<&[(AttrValue, String)]>,
	default_color: &str,
	kind: &str,
) -> ColorResolver {
	if let Some(builder) = scan.palette.take() {
		return ColorResolver::Palette(builder.build());
	}
	if let Some(entries) = host_palette {
		return ColorResolver::Palette(Palette::from_entries(entries, default_color));
	}
	match variable {
		VisualVariable::Continuous {
			range: Range::Color(range),
			..
		} => ColorResolver::Scale(ColorScale::new(scan.color_extent.unwrap_or_default(), range)),
		VisualVariable::Continuous { .. } => {
			warn!("{kind} color has a numeric range, falling back to raw colors");
			ColorResolver::Raw
		}
		VisualVariable::Dependent { value } if kind == "edge" => ColorResolver::Dependent(*value),
		VisualVariable::Dependent { .. } => {
			warn!("{kind} color cannot be dependent, falling back to raw colors");
			ColorResolver::Raw
		}
		_ => ColorResolver::Raw,
	}
}

/// Computes palettes, scales and renderer settings for the graph.
pub fn resolve(
	graph: &Graph,
	variables: &VisualVariables,
	config: &WidgetConfig,
	options: &ResolveOptions<'_>,
) -> ResolvedVariables {
	let default_node_color = options
		.default_node_color
		.unwrap_or(&config.default_node_color)
		.to_string();
	let default_edge_color = options
		.default_edge_color
		.unwrap_or(&config.default_edge_color)
		.to_string();

	let node_color_attribute = variables.node_color.color_attribute();
	let node_size_attribute = size_attribute(&variables.node_size);
	let mut node_scan = Scan::new(
		&variables.node_color,
		options.node_color_palette.is_some(),
		config.category_max_count,
		&default_node_color,
	);
	for node in graph.nodes() {
		node_scan.visit(&node.attributes, &node_color_attribute, &node_size_attribute);
	}

	let edge_color_attribute = variables.edge_color.color_attribute();
	let edge_size_attribute = size_attribute(&variables.edge_size);
	let mut edge_scan = Scan::new(
		&variables.edge_color,
		options.edge_color_palette.is_some(),
		config.category_max_count,
		&default_edge_color,
	);
	for edge in graph.edges() {
		edge_scan.visit(&edge.attributes, &edge_color_attribute, &edge_size_attribute);
	}

	let node = EntityVisuals {
		color: color_resolver(
			&variables.node_color,
			&mut node_scan,
			options.node_color_palette,
			&default_node_color,
			"node",
		),
		color_attribute: node_color_attribute,
		size: size_resolver(&variables.node_size, node_scan.size_extent, "node"),
		size_attribute: node_size_attribute,
		label_attribute: variables.node_label.attribute().map(str::to_string),
		default_color: default_node_color,
		size_extent: node_scan.size_extent,
	};

	let edge_label_attribute = variables
		.edge_label
		.as_ref()
		.and_then(VisualVariable::attribute)
		.filter(|a| !a.is_empty())
		.map(str::to_string);
	let edge = EntityVisuals {
		color: color_resolver(
			&variables.edge_color,
			&mut edge_scan,
			options.edge_color_palette,
			&default_edge_color,
			"edge",
		),
		color_attribute: edge_color_attribute,
		size: size_resolver(&variables.edge_size, edge_scan.size_extent, "edge"),
		size_attribute: edge_size_attribute,
		label_attribute: edge_label_attribute,
		default_color: default_edge_color,
		size_extent: edge_scan.size_extent,
	};

	let edge_type = options.default_edge_type.unwrap_or(if graph.kind() != GraphType::Undirected {
		EdgeType::Arrow
	} else {
		EdgeType::Line
	});

	let resolved = ResolvedVariables {
		variables: variables.clone(),
		label_threshold: node.size_extent.max.min(6.0),
		render_edge_labels: edge.label_attribute.is_some(),
		node,
		edge,
		edge_type,
	};
	debug!(
		"visual variables resolved: node palette {:?}, edge palette {:?}",
		resolved.node.palette().map(Palette::len),
		resolved.edge.palette().map(Palette::len)
	);
	resolved
}

/// Where a legend attribute comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeSource {
	Attribute,
	Kwarg,
}

impl AttributeSource {
	pub fn as_str(self) -> &'static str {
		match self {
			AttributeSource::Attribute => "attribute",
			AttributeSource::Kwarg => "kwarg",
		}
	}
}

/// A clickable category value in the legend.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryItem {
	pub value: AttrValue,
	pub color: String,
	/// Excluded by the active category filter.
	pub evicted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LegendBody {
	Dependent(Endpoint),
	Raw {
		name: String,
		source: AttributeSource,
	},
	Continuous {
		name: String,
		source: AttributeSource,
		range: Range,
	},
	Category {
		name: String,
		source: AttributeSource,
		items: Vec<CategoryItem>,
		/// Default color shown with an ellipsis when the palette overflows.
		overflow: Option<String>,
		/// Single "default" swatch when there is no palette at all.
		fallback: Option<String>,
	},
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendSection {
	pub title: &'static str,
	pub kind: EntityKind,
	pub body: LegendBody,
}

fn split_attribute(attribute: &str) -> (String, AttributeSource) {
	match attribute.strip_prefix(KWARG_PREFIX) {
		Some(name) => (name.to_string(), AttributeSource::Kwarg),
		None => (attribute.to_string(), AttributeSource::Attribute),
	}
}

fn legend_section(
	title: &'static str,
	kind: EntityKind,
	variable: &VisualVariable,
	visuals: Option<&EntityVisuals>,
	state: &InteractionState,
) -> LegendSection {
	let body = match variable {
		VisualVariable::Dependent { value } => LegendBody::Dependent(*value),
		VisualVariable::Raw { attribute } => {
			let (name, source) = split_attribute(attribute);
			LegendBody::Raw { name, source }
		}
		VisualVariable::Continuous { attribute, range } => {
			let (name, source) = split_attribute(attribute);
			LegendBody::Continuous {
				name,
				source,
				range: range.clone(),
			}
		}
		VisualVariable::Category { attribute } => {
			let (name, source) = split_attribute(attribute);
			let filter = state.category_filter(kind);
			match visuals.and_then(EntityVisuals::palette) {
				Some(palette) => LegendBody::Category {
					name,
					source,
					items: palette
						.iter()
						.map(|(value, color)| CategoryItem {
							value: value.clone(),
							color: color.to_string(),
							evicted: filter.is_some_and(|f| !f.contains(value)),
						})
						.collect(),
					overflow: palette.overflowing().then(|| palette.default_color().to_string()),
					fallback: None,
				},
				None => LegendBody::Category {
					name,
					source,
					items: Vec::new(),
					overflow: None,
					fallback: visuals.map(|v| v.default_color.clone()),
				},
			}
		}
	};
	LegendSection { title, kind, body }
}

/// Legend sections in display order. The edge labels section only exists
/// when an edge label variable was given.
pub fn legend(resolved: &ResolvedVariables, state: &InteractionState) -> Vec<LegendSection> {
	let vars = &resolved.variables;
	let mut sections = vec![
		legend_section("Node labels", EntityKind::Node, &vars.node_label, None, state),
		legend_section(
			"Node colors",
			EntityKind::Node,
			&vars.node_color,
			Some(&resolved.node),
			state,
		),
		legend_section("Node sizes", EntityKind::Node, &vars.node_size, None, state),
		legend_section(
			"Edge colors",
			EntityKind::Edge,
			&vars.edge_color,
			Some(&resolved.edge),
			state,
		),
		legend_section("Edge sizes", EntityKind::Edge, &vars.edge_size, None, state),
	];
	if let Some(label) = &vars.edge_label {
		sections.push(legend_section("Edge labels", EntityKind::Edge, label, None, state));
	}
	sections
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_view::graph::{build_graph, create_rng};
	use crate::components::graph_view::types::{EdgeRecord, GraphData, NodeRecord};

	fn graph_with_sizes(sizes: &[f64]) -> Graph {
		let data = GraphData {
			nodes: sizes
				.iter()
				.enumerate()
				.map(|(i, s)| NodeRecord::new(i.to_string()).with_attr("size", *s))
				.collect(),
			..Default::default()
		};
		build_graph(&data, &mut create_rng(0)).unwrap()
	}

	#[test]
	fn variables_deserialize_from_host_json() {
		let vars: VisualVariables = serde_json::from_str(
			r#"{
				"node_color": {"type": "category", "attribute": "$$group"},
				"node_size": {"type": "continuous", "attribute": "degree", "range": [3, 15]},
				"node_label": {"type": "raw", "attribute": "label"},
				"edge_color": {"type": "dependent", "value": "source"},
				"edge_size": {"type": "continuous", "attribute": "size", "range": [1, 2]}
			}"#,
		)
		.unwrap();
		assert_eq!(vars.node_color, VisualVariable::category("$$group"));
		assert_eq!(vars.edge_color, VisualVariable::Dependent { value: Endpoint::Source });
		assert_eq!(vars.edge_label, None);
	}

	#[test]
	fn equal_sizes_resolve_to_range_start() {
		let graph = graph_with_sizes(&[5.0, 5.0, 5.0]);
		let resolved = resolve(&graph, &VisualVariables::default(), &WidgetConfig::default(), &ResolveOptions::default());
		for node in graph.nodes() {
			assert_eq!(resolved.node.size(&node.attributes), 2.0);
		}
		assert_eq!(resolved.label_threshold, 5.0);
	}

	#[test]
	fn label_threshold_is_capped() {
		let graph = graph_with_sizes(&[1.0, 40.0]);
		let resolved = resolve(&graph, &VisualVariables::default(), &WidgetConfig::default(), &ResolveOptions::default());
		assert_eq!(resolved.label_threshold, 6.0);
		assert_eq!(resolved.node.size(&graph.node(1).attributes), 12.0);
	}

	#[test]
	fn fifteen_categories_overflow_into_default_color() {
		let data = GraphData {
			nodes: (0..15)
				.map(|i| NodeRecord::new(format!("n{i}")).with_attr("kind", i as f64))
				.collect(),
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		let vars = VisualVariables {
			node_color: VisualVariable::category("kind"),
			..Default::default()
		};
		let resolved = resolve(&graph, &vars, &WidgetConfig::default(), &ResolveOptions::default());
		let palette = resolved.node.palette().unwrap();
		assert_eq!(palette.len(), 10);
		assert!(palette.overflowing());
		let colors: Vec<String> =
			graph.nodes().iter().filter_map(|n| resolved.node.color(&n.attributes)).collect();
		assert!(colors[10..].iter().all(|c| c == "#999"));
		assert!(colors[..10].iter().all(|c| c != "#999"));
	}

	#[test]
	fn host_palette_wins_over_builder() {
		let graph = graph_with_sizes(&[1.0]);
		let entries = vec![(AttrValue::from("x"), "#f00".to_string())];
		let vars = VisualVariables {
			node_color: VisualVariable::category("kind"),
			..Default::default()
		};
		let options = ResolveOptions {
			node_color_palette: Some(&entries),
			default_node_color: Some("#123456"),
			..Default::default()
		};
		let resolved = resolve(&graph, &vars, &WidgetConfig::default(), &options);
		let palette = resolved.node.palette().unwrap();
		assert!(palette.overflowing());
		assert_eq!(palette.default_color(), "#123456");
	}

	#[test]
	fn edge_type_follows_graph_type() {
		let mut data = GraphData {
			nodes: vec![NodeRecord::new("a"), NodeRecord::new("b")],
			edges: vec![EdgeRecord::new("a", "b").with_attr("w", "heavy")],
			..Default::default()
		};
		let config = WidgetConfig::default();
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		let resolved = resolve(&graph, &VisualVariables::default(), &config, &ResolveOptions::default());
		assert_eq!(resolved.edge_type, EdgeType::Arrow);
		assert!(!resolved.render_edge_labels);

		data.options.kind = GraphType::Undirected;
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		let vars = VisualVariables {
			edge_label: Some(VisualVariable::raw("w")),
			..Default::default()
		};
		let resolved = resolve(&graph, &vars, &config, &ResolveOptions::default());
		assert_eq!(resolved.edge_type, EdgeType::Line);
		assert!(resolved.render_edge_labels);
		assert_eq!(resolved.edge.label(&graph.edge(0).attributes, "geid_0").as_deref(), Some("heavy"));
	}

	#[test]
	fn legend_reports_kwargs_overflow_and_eviction() {
		let data = GraphData {
			nodes: vec![
				NodeRecord::new("a").with_attr("$$group", "x"),
				NodeRecord::new("b").with_attr("$$group", "y"),
			],
			..Default::default()
		};
		let graph = build_graph(&data, &mut create_rng(0)).unwrap();
		let vars = VisualVariables {
			node_color: VisualVariable::category("$$group"),
			edge_color: VisualVariable::category("type"),
			..Default::default()
		};
		let resolved = resolve(&graph, &vars, &WidgetConfig::default(), &ResolveOptions::default());
		let mut state = InteractionState::default();
		state.toggle_category_value(EntityKind::Node, 2, AttrValue::from("x"));

		let sections = legend(&resolved, &state);
		assert_eq!(sections.len(), 5);
		let LegendBody::Category { name, source, items, overflow, .. } = &sections[1].body else {
			panic!("expected a category section");
		};
		assert_eq!(name, "group");
		assert_eq!(*source, AttributeSource::Kwarg);
		assert_eq!(overflow, &None);
		assert!(!items[0].evicted);
		assert!(items[1].evicted);

		let LegendBody::Category { items, fallback, .. } = &sections[3].body else {
			panic!("expected a category section");
		};
		assert!(items.is_empty());
		assert_eq!(fallback, &None);
		assert_eq!(sections[4].body, LegendBody::Continuous {
			name: "size".into(),
			source: AttributeSource::Attribute,
			range: Range::Numeric([0.5, 10.0]),
		});
	}
}
