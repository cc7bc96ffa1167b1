//! Canvas rendering of a [`Frame`].
//!
//! Everything is drawn in viewport pixels, in passes:
//! 1. Background
//! 2. Visible edges, with arrow heads for directed edges
//! 3. Nodes by ascending z-index, then the selection ring
//! 4. Node labels above the size threshold, then edge labels
//! 5. The hover box of the hovered node

use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::camera::Projection;
use super::graph::{Graph, Position};
use super::reducers::{Frame, NodeDisplayData};
use super::theme::Theme;
use super::visual::EdgeType;

/// Per-frame pointer and selection info not carried by the frame itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overlay {
	pub hovered: Option<usize>,
	pub selected: Option<usize>,
}

/// Renders the complete frame to the canvas.
pub fn render(
	ctx: &CanvasRenderingContext2d,
	graph: &Graph,
	frame: &Frame,
	projection: &Projection,
	theme: &Theme,
	overlay: Overlay,
) {
	ctx.set_fill_style_str(&theme.background.to_css());
	ctx.fill_rect(0.0, 0.0, projection.width, projection.height);

	let viewport: Vec<(f64, f64)> = frame
		.nodes
		.iter()
		.map(|n| projection.graph_to_viewport(Position { x: n.x, y: n.y }))
		.collect();
	let order = z_order(&frame.nodes);

	draw_edges(ctx, graph, frame, projection, theme, &viewport);
	draw_nodes(ctx, frame, projection, theme, &viewport, &order, overlay.selected);
	draw_labels(ctx, frame, projection, theme, &viewport, &order);
	if frame.render_edge_labels {
		draw_edge_labels(ctx, graph, frame, theme, &viewport);
	}
	if let Some(hovered) = overlay.hovered {
		draw_hover(ctx, &frame.nodes[hovered], projection, theme, viewport[hovered]);
	}
}

/// Node indices sorted by z-index, stable within a level.
pub fn z_order(nodes: &[NodeDisplayData]) -> Vec<usize> {
	let mut order: Vec<usize> = (0..nodes.len()).collect();
	order.sort_by_key(|&i| nodes[i].z_index);
	order
}

fn draw_edges(
	ctx: &CanvasRenderingContext2d,
	graph: &Graph,
	frame: &Frame,
	projection: &Projection,
	theme: &Theme,
	viewport: &[(f64, f64)],
) {
	for (i, edge) in frame.edges.iter().enumerate() {
		if edge.hidden {
			continue;
		}
		let e = graph.edge(i);
		let (from, to) = (viewport[e.source], viewport[e.target]);
		let width = edge.size.max(0.5);

		ctx.set_stroke_style_str(&edge.color);
		ctx.set_line_width(width);

		if e.is_self_loop() {
			let radius = projection.node_radius(frame.nodes[e.source].size) * 1.5;
			ctx.begin_path();
			let _ = ctx.arc(from.0, from.1 - radius, radius, 0.0, PI * 2.0);
			ctx.stroke();
			continue;
		}

		let arrow = frame.edge_type == EdgeType::Arrow && !e.undirected;
		let target_radius = projection.node_radius(frame.nodes[e.target].size);
		let head = arrow_head(from, to, target_radius, width * theme.arrow_head_ratio);

		ctx.begin_path();
		ctx.move_to(from.0, from.1);
		match (arrow, head) {
			(true, Some(head)) => ctx.line_to(head.base.0, head.base.1),
			_ => ctx.line_to(to.0, to.1),
		}
		ctx.stroke();

		if let (true, Some(head)) = (arrow, head) {
			ctx.set_fill_style_str(&edge.color);
			ctx.begin_path();
			ctx.move_to(head.tip.0, head.tip.1);
			ctx.line_to(head.left.0, head.left.1);
			ctx.line_to(head.right.0, head.right.1);
			ctx.close_path();
			ctx.fill();
		}
	}
}

/// Arrow head geometry, in viewport pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrowHead {
	/// On the target node's border.
	pub tip: (f64, f64),
	/// Where the edge line stops.
	pub base: (f64, f64),
	pub left: (f64, f64),
	pub right: (f64, f64),
}

/// Arrow head pointing at a target of radius `target_radius`, or `None`
/// when the endpoints are too close for one.
pub fn arrow_head(from: (f64, f64), to: (f64, f64), target_radius: f64, length: f64) -> Option<ArrowHead> {
	let (dx, dy) = (to.0 - from.0, to.1 - from.1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist <= target_radius + length {
		return None;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	let tip = (to.0 - ux * target_radius, to.1 - uy * target_radius);
	let base = (tip.0 - ux * length, tip.1 - uy * length);
	let (px, py) = (-uy * length * 0.5, ux * length * 0.5);
	Some(ArrowHead {
		tip,
		base,
		left: (base.0 + px, base.1 + py),
		right: (base.0 - px, base.1 - py),
	})
}

fn draw_nodes(
	ctx: &CanvasRenderingContext2d,
	frame: &Frame,
	projection: &Projection,
	theme: &Theme,
	viewport: &[(f64, f64)],
	order: &[usize],
	selected: Option<usize>,
) {
	for &i in order {
		let node = &frame.nodes[i];
		let (x, y) = viewport[i];
		ctx.set_fill_style_str(&node.color);
		ctx.begin_path();
		let _ = ctx.arc(x, y, projection.node_radius(node.size), 0.0, PI * 2.0);
		ctx.fill();
	}

	if let Some(i) = selected {
		let (x, y) = viewport[i];
		ctx.set_stroke_style_str(&theme.highlight_ring.to_css());
		ctx.set_line_width(2.0);
		ctx.begin_path();
		let _ = ctx.arc(x, y, projection.node_radius(frame.nodes[i].size) + 2.0, 0.0, PI * 2.0);
		ctx.stroke();
	}
}

/// Whether a node's label is drawn without hovering it.
pub fn shows_label(node: &NodeDisplayData, threshold: f64) -> bool {
	!node.label.is_empty() && node.size >= threshold
}

fn draw_labels(
	ctx: &CanvasRenderingContext2d,
	frame: &Frame,
	projection: &Projection,
	theme: &Theme,
	viewport: &[(f64, f64)],
	order: &[usize],
) {
	ctx.set_font(&format!("{}px {}", theme.label_size, theme.label_font));
	ctx.set_fill_style_str(&theme.label_color.to_css());
	for &i in order {
		let node = &frame.nodes[i];
		if !shows_label(node, frame.label_threshold) {
			continue;
		}
		let (x, y) = viewport[i];
		let radius = projection.node_radius(node.size);
		let _ = ctx.fill_text(&node.label, x + radius + 3.0, y + theme.label_size / 3.0);
	}
}

fn draw_edge_labels(
	ctx: &CanvasRenderingContext2d,
	graph: &Graph,
	frame: &Frame,
	theme: &Theme,
	viewport: &[(f64, f64)],
) {
	ctx.set_font(&format!("{}px {}", theme.edge_label_size, theme.label_font));
	ctx.set_text_align("center");
	for (i, edge) in frame.edges.iter().enumerate() {
		let Some(label) = edge.label.as_deref().filter(|_| !edge.hidden) else {
			continue;
		};
		let e = graph.edge(i);
		let (from, to) = (viewport[e.source], viewport[e.target]);
		ctx.set_fill_style_str(&edge.color);
		let _ = ctx.fill_text(label, (from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0 - 2.0);
	}
	ctx.set_text_align("start");
}

/// Label box of the hovered node, drawn over everything else.
fn draw_hover(
	ctx: &CanvasRenderingContext2d,
	node: &NodeDisplayData,
	projection: &Projection,
	theme: &Theme,
	(x, y): (f64, f64),
) {
	let label = node.hover_label.as_deref().unwrap_or(node.label.as_str());
	let radius = projection.node_radius(node.size);
	ctx.set_font(&format!("{}px {}", theme.label_size, theme.label_font));

	let text_width = ctx.measure_text(label).map(|m| m.width()).unwrap_or(0.0);
	let padding = 2.0;
	let box_height = theme.label_size + padding * 2.0;

	ctx.save();
	ctx.set_shadow_color(&theme.hover_shadow.to_css());
	ctx.set_shadow_blur(8.0);
	ctx.set_fill_style_str(&theme.hover_box.to_css());
	ctx.begin_path();
	if label.is_empty() {
		let _ = ctx.arc(x, y, radius + padding, 0.0, PI * 2.0);
	} else {
		ctx.rect(x, y - box_height / 2.0, radius + text_width + padding * 2.0 + 3.0, box_height);
		let _ = ctx.arc(x, y, radius + padding, 0.0, PI * 2.0);
	}
	ctx.fill();
	ctx.restore();

	ctx.set_fill_style_str(&node.color);
	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, PI * 2.0);
	ctx.fill();

	if !label.is_empty() {
		ctx.set_fill_style_str(&theme.label_color.to_css());
		let _ = ctx.fill_text(label, x + radius + 3.0, y + theme.label_size / 3.0);
	}
}
