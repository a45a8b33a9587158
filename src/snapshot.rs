//! Immutable copies of vehicle and spatial index state, for building
//! interference graphs away from the thread that owns the vehicles.

use crate::geo::GeoPoint;
use crate::grid::SpatialGrid;
use crate::{VehicleId, VehicleSet};

/// An immutable copy of a vehicle's state at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleSnapshot {
    /// The vehicle's ID.
    pub id: VehicleId,
    /// The vehicle's position.
    pub position: GeoPoint,
    /// The vehicle's transmission range in m.
    pub transmission_range: f64,
    /// The micro-cell the vehicle was assigned to, if any.
    pub micro_cell_id: Option<usize>,
}

/// An immutable copy of the spatial index's cell membership and neighbourhoods,
/// expressed in terms of indices into a list of [VehicleSnapshot]s.
#[derive(Clone, Debug, Default)]
pub struct CellNeighbourhood {
    /// The snapshot indices of the members of each micro-cell.
    members: Vec<Vec<usize>>,
    /// The neighbouring micro-cells of each micro-cell, in ascending order.
    neighbours: Vec<Vec<usize>>,
    /// The snapshot indices of vehicles not assigned to any micro-cell.
    unassigned: Vec<usize>,
}

/// Takes a snapshot of every vehicle, tagged with its micro-cell.
pub fn snapshot_vehicles(vehicles: &VehicleSet, grid: &SpatialGrid) -> Vec<VehicleSnapshot> {
    vehicles
        .values()
        .map(|vehicle| vehicle.snapshot(grid.micro_cell_id(vehicle.id())))
        .collect()
}

impl CellNeighbourhood {
    /// Copies the neighbourhoods out of the grid, and groups the snapshots by micro-cell.
    pub fn new(grid: &SpatialGrid, snapshots: &[VehicleSnapshot]) -> Self {
        let cells = grid.micro_cells();
        let mut members = vec![vec![]; cells.len()];
        let mut unassigned = vec![];

        for (idx, snapshot) in snapshots.iter().enumerate() {
            match snapshot.micro_cell_id {
                Some(cell) if cell < cells.len() => members[cell].push(idx),
                _ => unassigned.push(idx),
            }
        }

        Self {
            members,
            neighbours: cells
                .iter()
                .map(|cell| cell.neighbours().iter().copied().collect())
                .collect(),
            unassigned,
        }
    }

    /// The number of micro-cells.
    pub fn cell_count(&self) -> usize {
        self.members.len()
    }

    /// The snapshot indices of the members of a micro-cell.
    pub fn members(&self, cell: usize) -> &[usize] {
        self.members.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The neighbouring micro-cells of a micro-cell, in ascending order.
    pub fn neighbours(&self, cell: usize) -> &[usize] {
        self.neighbours.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The snapshot indices of vehicles not assigned to any micro-cell, in ascending order.
    pub fn unassigned(&self) -> &[usize] {
        &self.unassigned
    }
}
