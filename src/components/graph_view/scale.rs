//! Linear scales backing `continuous` visual variables.
//!
//! A scale is built from the attribute domain found by a single pass over the
//! graph. Values are always coerced first: anything that is not a finite
//! number counts as `1`, which keeps heterogeneous attribute data renderable.
//!
//! # Degenerate domains
//!
//! When every value is equal, or no value was seen at all (`min` is still
//! `+inf`), the scale is constant and returns the first bound of the range.
//! This avoids a division by zero during interpolation.

use serde::{Deserialize, Serialize};

use super::theme::{Color, parse_color};
use super::types::AttrValue;

/// Coerces an attribute to a number, falling back to `1`.
pub fn coerce_numeric(value: Option<&AttrValue>) -> f64 {
	value.and_then(AttrValue::as_f64).unwrap_or(1.0)
}

/// Output range of a continuous visual variable.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Range {
	/// Pixel sizes.
	Numeric([f64; 2]),
	/// Two-color gradient.
	Color([String; 2]),
}

/// Running min/max accumulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
	pub min: f64,
	pub max: f64,
}

impl Default for Extent {
	fn default() -> Self {
		Self {
			min: f64::INFINITY,
			max: f64::NEG_INFINITY,
		}
	}
}

impl Extent {
	pub fn add(&mut self, value: f64) {
		if value < self.min {
			self.min = value;
		}
		if value > self.max {
			self.max = value;
		}
	}

	fn is_degenerate(&self) -> bool {
		self.min == f64::INFINITY || self.min == self.max
	}

	/// Position of `value` in the domain. Not clamped.
	fn normalize(&self, value: f64) -> f64 {
		(value - self.min) / (self.max - self.min)
	}
}

/// Maps a numeric domain to a numeric range.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericScale {
	Constant(f64),
	Linear { domain: Extent, range: [f64; 2] },
}

impl NumericScale {
	pub fn new(domain: Extent, range: [f64; 2]) -> Self {
		if domain.is_degenerate() {
			NumericScale::Constant(range[0])
		} else {
			NumericScale::Linear { domain, range }
		}
	}

	pub fn apply(&self, value: f64) -> f64 {
		match self {
			NumericScale::Constant(v) => *v,
			NumericScale::Linear { domain, range } => {
				range[0] + domain.normalize(value) * (range[1] - range[0])
			}
		}
	}
}

/// Maps a numeric domain to a two-color gradient, interpolated in RGB.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorScale {
	Constant(String),
	Linear {
		domain: Extent,
		from: Color,
		to: Color,
	},
}

impl ColorScale {
	/// Unparseable colors degrade to a constant scale on the first bound.
	pub fn new(domain: Extent, range: &[String; 2]) -> Self {
		if domain.is_degenerate() {
			return ColorScale::Constant(range[0].clone());
		}
		match (parse_color(&range[0]), parse_color(&range[1])) {
			(Some(from), Some(to)) => ColorScale::Linear { domain, from, to },
			_ => ColorScale::Constant(range[0].clone()),
		}
	}

	pub fn apply(&self, value: f64) -> String {
		match self {
			ColorScale::Constant(c) => c.clone(),
			ColorScale::Linear { domain, from, to } => {
				from.lerp(*to, domain.normalize(value)).to_css()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn extent_of(values: &[f64]) -> Extent {
		let mut extent = Extent::default();
		for v in values {
			extent.add(*v);
		}
		extent
	}

	#[test]
	fn non_numbers_coerce_to_one() {
		assert_eq!(coerce_numeric(None), 1.0);
		assert_eq!(coerce_numeric(Some(&AttrValue::String("12".into()))), 1.0);
		assert_eq!(coerce_numeric(Some(&AttrValue::Number(f64::NAN))), 1.0);
		assert_eq!(coerce_numeric(Some(&AttrValue::Number(7.5))), 7.5);
	}

	#[test]
	fn linear_scale_interpolates() {
		let scale = NumericScale::new(extent_of(&[0.0, 10.0]), [2.0, 12.0]);
		assert_eq!(scale.apply(0.0), 2.0);
		assert_eq!(scale.apply(5.0), 7.0);
		assert_eq!(scale.apply(10.0), 12.0);
	}

	#[test]
	fn empty_domain_is_constant() {
		let scale = NumericScale::new(Extent::default(), [3.0, 15.0]);
		assert_eq!(scale, NumericScale::Constant(3.0));
		assert_eq!(scale.apply(100.0), 3.0);
	}

	#[test]
	fn color_scale_spans_the_gradient() {
		let scale = ColorScale::new(extent_of(&[0.0, 1.0]), &["#000000".into(), "#ffffff".into()]);
		assert_eq!(scale.apply(0.0), "#000000");
		assert_eq!(scale.apply(1.0), "#ffffff");
		let constant = ColorScale::new(extent_of(&[4.0, 4.0]), &["red".into(), "blue".into()]);
		assert_eq!(constant.apply(4.0), "red");
	}

	#[test]
	fn range_deserializes_both_kinds() {
		let numeric: Range = serde_json::from_str("[1, 5]").unwrap();
		assert_eq!(numeric, Range::Numeric([1.0, 5.0]));
		let colors: Range = serde_json::from_str(r##"["#fff", "#000"]"##).unwrap();
		assert_eq!(colors, Range::Color(["#fff".into(), "#000".into()]));
	}

	proptest! {
		#[test]
		fn constant_domain_returns_first_bound(value in -1e6f64..1e6, n in 1usize..50, lo in 0.0f64..20.0, hi in 0.0f64..20.0) {
			let scale = NumericScale::new(extent_of(&vec![value; n]), [lo, hi]);
			for probe in [value, value + 1.0, 0.0] {
				prop_assert_eq!(scale.apply(probe), lo);
			}
		}
	}
}
