//! Visual theming for the graph canvas.
//!
//! Provides the color type shared by scales and palettes, the categorical
//! color sequence, and canvas style configuration.

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	pub fn with_alpha(self, a: f64) -> Self {
		Self { a, ..self }
	}

	/// Lighten the color by a factor (0.0 = unchanged, 1.0 = white)
	pub fn lighten(self, factor: f64) -> Self {
		let f = factor.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 + (255.0 - self.r as f64) * f) as u8,
			g: (self.g as f64 + (255.0 - self.g as f64) * f) as u8,
			b: (self.b as f64 + (255.0 - self.b as f64) * f) as u8,
			a: self.a,
		}
	}

	/// Linear interpolation between two colors, rounded per channel.
	pub fn lerp(self, other: Color, t: f64) -> Self {
		let t = t.clamp(0.0, 1.0);
		let mix = |a: u8, b: u8| (a as f64 * (1.0 - t) + b as f64 * t).round() as u8;
		Self {
			r: mix(self.r, other.r),
			g: mix(self.g, other.g),
			b: mix(self.b, other.b),
			a: self.a * (1.0 - t) + other.a * t,
		}
	}

	/// HSL constructor, hue in degrees, saturation and lightness in `[0, 1]`.
	pub fn hsl(h: f64, s: f64, l: f64) -> Self {
		let h = h.rem_euclid(360.0) / 360.0;
		let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
		let p = 2.0 * l - q;
		let channel = |t: f64| {
			let t = t.rem_euclid(1.0);
			let v = if t < 1.0 / 6.0 {
				p + (q - p) * 6.0 * t
			} else if t < 0.5 {
				q
			} else if t < 2.0 / 3.0 {
				p + (q - p) * (2.0 / 3.0 - t) * 6.0
			} else {
				p
			};
			(v * 255.0).round() as u8
		};
		Self::rgb(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}

	pub fn to_css_rgb(self) -> String {
		format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}
}

/// Parses a CSS color string into a [`Color`].
/// Supports hex (`#RGB`, `#RRGGBB`) and `rgb()`/`rgba()` functional notation.
pub fn parse_color(color_str: &str) -> Option<Color> {
	let color_str = color_str.trim();
	if let Some(hex) = color_str.strip_prefix('#') {
		let channel = |s: &str| u8::from_str_radix(s, 16).ok();
		return match hex.len() {
			3 => {
				let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
				Some(Color::rgb(expand(0)?, expand(1)?, expand(2)?))
			}
			6 => Some(Color::rgb(
				channel(&hex[0..2])?,
				channel(&hex[2..4])?,
				channel(&hex[4..6])?,
			)),
			_ => None,
		};
	}
	if color_str.starts_with("rgb") {
		let nums: Vec<&str> = color_str
			.trim_start_matches("rgba(")
			.trim_start_matches("rgb(")
			.trim_end_matches(')')
			.split(',')
			.collect();
		let r = nums.first().and_then(|s| s.trim().parse().ok())?;
		let g = nums.get(1).and_then(|s| s.trim().parse().ok())?;
		let b = nums.get(2).and_then(|s| s.trim().parse().ok())?;
		let a = nums.get(3).and_then(|s| s.trim().parse().ok()).unwrap_or(1.0);
		return Some(Color::rgba(r, g, b, a));
	}
	None
}

/// Qualitative color sequence used for category palettes.
const CATEGORY_COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

/// Color for the `index`-th category. Past the fixed sequence, hues are
/// spread by the golden angle so colors stay distinct and deterministic.
pub fn category_color(index: usize) -> String {
	match CATEGORY_COLORS.get(index) {
		Some(color) => color.to_string(),
		None => {
			let extra = index - CATEGORY_COLORS.len();
			Color::hsl(extra as f64 * 137.508, 0.55, 0.5).to_css_rgb()
		}
	}
}

/// Canvas style configuration.
#[derive(Clone, Debug)]
pub struct Theme {
	pub background: Color,
	pub label_color: Color,
	pub label_font: &'static str,
	pub label_size: f64,
	pub edge_label_size: f64,
	/// Box drawn behind hovered node labels.
	pub hover_box: Color,
	pub hover_shadow: Color,
	/// Ring around the selected node.
	pub highlight_ring: Color,
	pub arrow_head_ratio: f64,
}

impl Default for Theme {
	fn default() -> Self {
		Self {
			background: Color::rgb(255, 255, 255),
			label_color: Color::rgb(0, 0, 0),
			label_font: "Arial",
			label_size: 14.0,
			edge_label_size: 12.0,
			hover_box: Color::rgb(255, 255, 255),
			hover_shadow: Color::rgba(0, 0, 0, 0.5),
			highlight_ring: Color::rgb(0, 0, 0),
			arrow_head_ratio: 2.5,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_short_and_long_hex() {
		assert_eq!(parse_color("#ccc"), Some(Color::rgb(204, 204, 204)));
		assert_eq!(parse_color("#1f77b4"), Some(Color::rgb(31, 119, 180)));
		assert_eq!(parse_color("rgba(1, 2, 3, 0.5)"), Some(Color::rgba(1, 2, 3, 0.5)));
		assert_eq!(parse_color("teal"), None);
	}

	#[test]
	fn lerp_hits_endpoints() {
		let (a, b) = (Color::rgb(0, 0, 0), Color::rgb(255, 255, 255));
		assert_eq!(a.lerp(b, 0.0).to_css_rgb(), "#000000");
		assert_eq!(a.lerp(b, 1.0).to_css_rgb(), "#ffffff");
		assert_eq!(a.lerp(b, 0.5).to_css_rgb(), "#808080");
	}

	#[test]
	fn category_colors_are_distinct_past_the_sequence() {
		let colors: std::collections::HashSet<String> = (0..25).map(category_color).collect();
		assert_eq!(colors.len(), 25);
	}
}
