use crate::geo::{GeoPoint, Vector2d};
use crate::snapshot::VehicleSnapshot;
use crate::VehicleId;
use cgmath::prelude::*;

/// A simulated vehicle carrying a radio transceiver.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The vehicle's current position.
    pos: GeoPoint,
    /// The velocity in m/s, in the local tangent plane.
    vel: Vector2d,
    /// The transmission range in m.
    range: f64,
    /// Vehicles reachable from this one, refreshed after each published graph
    /// when transitive closure is enabled.
    neighbours: Vec<VehicleId>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleAttributes {
    /// The initial position.
    pub position: GeoPoint,
    /// The initial velocity in m/s (x = east, y = north).
    pub velocity: Vector2d,
    /// The transmission range in m.
    pub transmission_range: f64,
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes) -> Self {
        Self {
            id,
            pos: attributes.position,
            vel: attributes.velocity,
            range: attributes.transmission_range,
            neighbours: vec![],
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's current position.
    pub fn position(&self) -> GeoPoint {
        self.pos
    }

    /// The vehicle's velocity in m/s.
    pub fn velocity(&self) -> Vector2d {
        self.vel
    }

    /// The vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.vel.magnitude()
    }

    /// The vehicle's transmission range in m.
    pub fn transmission_range(&self) -> f64 {
        self.range
    }

    /// The vehicles this one can reach, as of the last published graph.
    /// Only maintained when transitive closure is enabled.
    pub fn neighbours(&self) -> &[VehicleId] {
        &self.neighbours
    }

    /// The great-circle distance to another vehicle in m.
    pub fn distance_to(&self, other: &Vehicle) -> f64 {
        self.pos.distance(&other.pos)
    }

    /// Takes an immutable copy of the state needed to build an interference graph.
    pub fn snapshot(&self, micro_cell_id: Option<usize>) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id,
            position: self.pos,
            transmission_range: self.range,
            micro_cell_id,
        }
    }

    pub(crate) fn set_position(&mut self, pos: GeoPoint) {
        self.pos = pos;
    }

    pub(crate) fn set_velocity(&mut self, vel: Vector2d) {
        self.vel = vel;
    }

    pub(crate) fn set_transmission_range(&mut self, range: f64) {
        self.range = range;
    }

    pub(crate) fn clear_neighbours(&mut self) {
        self.neighbours.clear();
    }

    pub(crate) fn add_neighbour(&mut self, id: VehicleId) {
        self.neighbours.push(id);
    }

    /// Integrates the vehicle's position.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    pub(crate) fn integrate(&mut self, dt: f64) {
        if self.vel != Vector2d::new(0.0, 0.0) {
            self.pos = self.pos.offset(self.vel * dt);
        }
    }
}
