//! Overlap removal.
//!
//! Each iteration looks at every pair of nodes and pushes colliding pairs
//! apart along the line joining their centers. Nodes are circles in viewport
//! space so the result matches what is on screen at the current zoom.

use crate::config::NoverlapConfig;

/// A node as seen by the overlap remover.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
	pub x: f64,
	pub y: f64,
	pub size: f64,
}

/// Runs one iteration in place. Returns `true` once no pair collides.
pub fn iterate(circles: &mut [Circle], settings: &NoverlapConfig) -> bool {
	let n = circles.len();
	let mut deltas = vec![(0.0f64, 0.0f64); n];
	let mut converged = true;
	let radius = |c: &Circle| c.size * settings.ratio + settings.margin;

	for i in 0..n {
		for j in (i + 1)..n {
			let (a, b) = (circles[i], circles[j]);
			let (ra, rb) = (radius(&a), radius(&b));
			let (mut dx, mut dy) = (b.x - a.x, b.y - a.y);
			let mut dist = (dx * dx + dy * dy).sqrt();
			if dist >= ra + rb {
				continue;
			}
			converged = false;

			// Coincident nodes get a deterministic direction.
			if dist < 1e-9 {
				let angle = (i * 31 + j * 17) as f64;
				(dx, dy) = (angle.cos(), angle.sin());
				dist = 1.0;
			}
			let push = ((ra + rb) * settings.expansion - dist) / dist / 2.0;
			deltas[i].0 -= dx * push;
			deltas[i].1 -= dy * push;
			deltas[j].0 += dx * push;
			deltas[j].1 += dy * push;
		}
	}

	if !converged {
		let step = 0.1 * settings.speed;
		for (circle, (dx, dy)) in circles.iter_mut().zip(deltas) {
			circle.x += dx * step;
			circle.y += dy * step;
		}
	}
	converged
}
