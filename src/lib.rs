pub use cgmath;
pub use config::InterferenceConfig;
pub use geo::{GeoPoint, Vector2d};
pub use graph::{BuildStrategy, GraphStats, GridState, InterferenceGraph};
pub use grid::{GridStats, MacroCell, MicroCell, SpatialGrid};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use snapshot::{snapshot_vehicles, CellNeighbourhood, VehicleSnapshot};
pub use vehicle::{Vehicle, VehicleAttributes};
pub use worker::{GraphJob, GraphWorker};

mod config;
mod debug;
pub mod geo;
mod graph;
mod grid;
mod simulation;
mod snapshot;
mod vehicle;
mod worker;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

/// The vehicles in a simulation, keyed by ID.
pub type VehicleSet = SlotMap<VehicleId, Vehicle>;
