//! Uniform placement of micro-cells inside a disk.

use crate::geo::{GeoPoint, Vector2d};
use std::f64::consts::PI;

/// The smallest radius a micro-cell may have, in m.
const MIN_MICRO_RADIUS: f64 = 10.0; // m

/// Scales the micro-cell radius so neighbouring cells overlap.
const COVERAGE_FACTOR: f64 = 1.5;

/// Places `count` points inside the disk of the given centre and radius on a
/// sunflower spiral, returning each point with the radius its cell should have.
///
/// The first point is always the centre of the disk.
pub(crate) fn sunflower(
    centre: GeoPoint,
    radius: f64,
    count: usize,
) -> impl Iterator<Item = (GeoPoint, f64)> {
    let golden_angle = PI * (3.0 - f64::sqrt(5.0));
    let n = count.max(1) as f64;
    let cell_radius = f64::max(
        f64::min(COVERAGE_FACTOR * radius / n.sqrt(), radius),
        MIN_MICRO_RADIUS,
    );

    (0..count).map(move |i| {
        let r = radius * (i as f64 / n).sqrt();
        let theta = i as f64 * golden_angle;
        let delta = Vector2d::new(r * theta.cos(), r * theta.sin());
        (centre.offset(delta), cell_radius)
    })
}
