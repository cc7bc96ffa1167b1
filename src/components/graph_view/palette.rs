//! Bounded color assignment for categorical attributes.

use indexmap::IndexMap;

use super::theme::category_color;
use super::types::AttrValue;

/// Category value -> color mapping with a shared fallback color.
///
/// Built once from the full value domain and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
	entries: IndexMap<AttrValue, String>,
	default_color: String,
	overflowing: bool,
}

impl Palette {
	/// Palette supplied by the host as `[value, color]` pairs.
	///
	/// The host may color only part of the domain, so these palettes always
	/// report themselves as overflowing.
	pub fn from_entries(entries: &[(AttrValue, String)], default_color: &str) -> Self {
		Self {
			entries: entries.iter().cloned().collect(),
			default_color: default_color.to_string(),
			overflowing: true,
		}
	}

	pub fn get(&self, value: &AttrValue) -> &str {
		self.entries.get(value).unwrap_or(&self.default_color)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn overflowing(&self) -> bool {
		self.overflowing
	}

	pub fn default_color(&self) -> &str {
		&self.default_color
	}

	pub fn iter(&self) -> impl Iterator<Item = (&AttrValue, &str)> {
		self.entries.iter().map(|(v, c)| (v, c.as_str()))
	}

	pub fn values(&self) -> impl Iterator<Item = &AttrValue> {
		self.entries.keys()
	}
}

/// Collects distinct category values during a single pass over the graph.
///
/// The first `max_count` distinct values, in encounter order, receive colors.
/// Anything beyond the cap maps to the default color.
#[derive(Clone, Debug)]
pub struct PaletteBuilder {
	max_count: usize,
	default_color: String,
	values: IndexMap<AttrValue, ()>,
	overflowing: bool,
}

impl PaletteBuilder {
	pub fn new(max_count: usize, default_color: &str) -> Self {
		Self {
			max_count,
			default_color: default_color.to_string(),
			values: IndexMap::new(),
			overflowing: false,
		}
	}

	/// Registers a value. Missing attributes do not form a category.
	pub fn add(&mut self, value: Option<&AttrValue>) {
		let Some(value) = value.filter(|v| !v.is_null()) else {
			return;
		};
		if self.values.contains_key(value) {
			return;
		}
		if self.values.len() < self.max_count {
			self.values.insert(value.clone(), ());
		} else {
			self.overflowing = true;
		}
	}

	pub fn build(self) -> Palette {
		let entries = self
			.values
			.into_keys()
			.enumerate()
			.map(|(i, value)| (value, category_color(i)))
			.collect();
		Palette {
			entries,
			default_color: self.default_color,
			overflowing: self.overflowing,
		}
	}
}
