//! Geographic positions and distances.

use cgmath::Vector2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A displacement in a local tangent plane, in m.
/// The x-axis points east and the y-axis points north.
pub type Vector2d = Vector2<f64>;

/// The mean radius of the Earth in m.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// The length of one degree used by the flat-earth approximation, in m.
const FLAT_METRES_PER_DEGREE: f64 = 111_000.0;

/// A position on the surface of the Earth, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The great-circle distance to another point in m, using the haversine formula.
    pub fn distance(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let d_phi = phi2 - phi1;
        let d_lambda = (other.lon - self.lon).to_radians();

        let a = (0.5 * d_phi).sin().powi(2) + phi1.cos() * phi2.cos() * (0.5 * d_lambda).sin().powi(2);
        2.0 * EARTH_RADIUS * a.sqrt().min(1.0).asin()
    }

    /// An equirectangular approximation of the distance to another point in m.
    ///
    /// This is considerably cheaper than [GeoPoint::distance] and accurate to
    /// within a fraction of a percent when the points are a few kilometres apart.
    /// The longitude is scaled at the mean latitude of the two points,
    /// so the result does not depend on argument order.
    pub fn flat_distance(&self, other: &GeoPoint) -> f64 {
        let mean_lat = (0.5 * (self.lat + other.lat)).to_radians();
        let d_lat = (other.lat - self.lat) * FLAT_METRES_PER_DEGREE;
        let d_lon = (other.lon - self.lon) * FLAT_METRES_PER_DEGREE * mean_lat.cos();
        d_lat.hypot(d_lon)
    }

    /// Gets the point displaced from this one by `delta` metres in the local tangent plane.
    pub fn offset(&self, delta: Vector2d) -> GeoPoint {
        let metres_per_degree = EARTH_RADIUS.to_radians();
        let lat = self.lat + delta.y / metres_per_degree;
        let lon = self.lon + delta.x / (metres_per_degree * self.lat.to_radians().cos());
        GeoPoint { lat, lon }
    }
}
