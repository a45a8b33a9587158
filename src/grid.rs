use self::cluster::kmeans;
use self::tiling::sunflower;
use crate::config::DEFAULT_TRANSMISSION_RANGE;
use crate::geo::GeoPoint;
use crate::{Vehicle, VehicleId, VehicleSet};
use itertools::{iproduct, Itertools};
use log::debug;
use slotmap::SparseSecondaryMap;
use std::collections::BTreeSet;

mod cluster;
mod tiling;

/// Relative slack added to the transmission range when deciding whether two
/// cells are neighbours. Covers the gap between the great-circle distance used
/// here and the flat-earth distance used by snapshot-based graph builds.
const NEIGHBOURHOOD_TOLERANCE: f64 = 0.01;

/// A leaf spatial bucket which vehicles are assigned to.
#[derive(Clone, Debug)]
pub struct MicroCell {
    id: usize,
    macro_id: usize,
    centre: GeoPoint,
    radius: f64,
    /// The radius the cell was tiled with. It never shrinks below this.
    base_radius: f64,
    members: Vec<VehicleId>,
    neighbours: BTreeSet<usize>,
}

/// A coarse spatial partition, subdivided into micro-cells.
#[derive(Clone, Debug)]
pub struct MacroCell {
    id: usize,
    centre: GeoPoint,
    radius: f64,
    /// The radius covering the micro-cells at their tiled size.
    base_radius: f64,
    micro_cells: Vec<usize>,
    neighbours: BTreeSet<usize>,
}

/// Where a vehicle was last placed.
#[derive(Clone, Copy, Debug)]
struct Assignment {
    cell: usize,
    position: GeoPoint,
}

/// Summary statistics of a [SpatialGrid].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridStats {
    pub macro_cells: usize,
    pub micro_cells: usize,
    pub vehicles: usize,
    pub occupied_micro_cells: usize,
    pub max_members: usize,
    pub avg_members: f64,
    pub avg_micro_neighbours: f64,
}

/// A two-level hierarchical spatial index over vehicles.
///
/// Macro-cells are placed by clustering the vehicle positions, and each is
/// tiled with a fixed number of micro-cells. Two cells are neighbours if a
/// vehicle at the edge of one could be within transmission range of a vehicle
/// at the edge of the other, so the vehicles that could possibly be in range of
/// a given vehicle are all found in its micro-cell or a neighbouring one.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    /// The macro-cells, indexed by ID.
    macro_cells: Vec<MacroCell>,
    /// The micro-cells, indexed by ID.
    micro_cells: Vec<MicroCell>,
    /// The micro-cell each vehicle is assigned to, and its position when last seen.
    assignments: SparseSecondaryMap<VehicleId, Assignment>,
    /// The configured maximum transmission range in m.
    max_range: f64,
    /// The largest transmission range of any vehicle assigned so far, in m.
    member_range: f64,
    /// Whether the neighbourhoods must be recomputed.
    stale: bool,
}

impl MicroCell {
    pub fn id(&self) -> usize {
        self.id
    }

    /// The ID of the macro-cell containing this cell.
    pub fn macro_cell_id(&self) -> usize {
        self.macro_id
    }

    pub fn centre(&self) -> GeoPoint {
        self.centre
    }

    /// The radius in m. Every member lies within this distance of the centre.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The vehicles assigned to this cell, in order of assignment.
    pub fn members(&self) -> &[VehicleId] {
        &self.members
    }

    /// The IDs of the neighbouring micro-cells.
    pub fn neighbours(&self) -> &BTreeSet<usize> {
        &self.neighbours
    }
}

impl MacroCell {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn centre(&self) -> GeoPoint {
        self.centre
    }

    /// The radius in m, covering all of its micro-cells.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The IDs of the micro-cells inside this cell.
    pub fn micro_cells(&self) -> &[usize] {
        &self.micro_cells
    }

    /// The IDs of the neighbouring macro-cells.
    pub fn neighbours(&self) -> &BTreeSet<usize> {
        &self.neighbours
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSMISSION_RANGE)
    }
}

impl SpatialGrid {
    /// Creates an empty, uninitialized grid.
    pub fn new(max_range: f64) -> Self {
        Self {
            macro_cells: vec![],
            micro_cells: vec![],
            assignments: SparseSecondaryMap::new(),
            max_range,
            member_range: 0.0,
            stale: false,
        }
    }

    /// Whether the cell layout has been placed.
    pub fn is_initialized(&self) -> bool {
        !self.micro_cells.is_empty()
    }

    /// Places the cells based on the given vehicles' positions and assigns
    /// each vehicle to a micro-cell.
    ///
    /// Does nothing if the grid is already initialized; call [Self::clear] first
    /// to force a new layout. Returns `true` if a layout was placed.
    ///
    /// # Parameters
    /// * `vehicles` - The vehicles to cluster
    /// * `num_macro` - The number of macro-cells
    /// * `num_micro` - The number of micro-cells per macro-cell
    /// * `seed` - Seed for choosing the initial cluster centres
    pub fn initialize(
        &mut self,
        vehicles: &VehicleSet,
        num_macro: usize,
        num_micro: usize,
        seed: u64,
    ) -> bool {
        if self.is_initialized() || vehicles.is_empty() || num_macro == 0 || num_micro == 0 {
            return false;
        }

        let points = vehicles.values().map(|v| v.position()).collect::<Vec<_>>();
        self.place_macro_cells(&points, num_macro, seed);
        self.place_micro_cells(num_micro);
        self.compute_neighbourhoods();

        for vehicle in vehicles.values() {
            self.place(vehicle);
        }
        self.refresh_neighbourhoods();
        self.debug_assert_consistent();
        true
    }

    /// Clusters the points to place the macro-cells.
    fn place_macro_cells(&mut self, points: &[GeoPoint], num_macro: usize, seed: u64) {
        self.macro_cells = kmeans(points, num_macro, seed)
            .into_iter()
            .enumerate()
            .map(|(id, cluster)| MacroCell {
                id,
                centre: cluster.centre,
                radius: cluster.radius,
                base_radius: cluster.radius,
                micro_cells: vec![],
                neighbours: BTreeSet::new(),
            })
            .collect();
    }

    /// Tiles each macro-cell with micro-cells, then grows each macro-cell
    /// to cover its micro-cells entirely.
    fn place_micro_cells(&mut self, num_micro: usize) {
        self.micro_cells.clear();
        for macro_cell in &mut self.macro_cells {
            let mut cover = macro_cell.radius;
            for (centre, radius) in sunflower(macro_cell.centre, macro_cell.radius, num_micro) {
                let id = self.micro_cells.len();
                cover = f64::max(cover, macro_cell.centre.distance(&centre) + radius);
                macro_cell.micro_cells.push(id);
                self.micro_cells.push(MicroCell {
                    id,
                    macro_id: macro_cell.id,
                    centre,
                    radius,
                    base_radius: radius,
                    members: vec![],
                    neighbours: BTreeSet::new(),
                });
            }
            macro_cell.radius = cover;
            macro_cell.base_radius = cover;
        }
    }

    /// Clears all cells and assignments. The configured range is kept.
    pub fn clear(&mut self) {
        self.macro_cells.clear();
        self.micro_cells.clear();
        self.assignments.clear();
        self.member_range = 0.0;
        self.stale = false;
    }

    /// Sets the maximum transmission range, recomputing the neighbourhoods.
    pub fn set_max_transmission_range(&mut self, range: f64) {
        self.max_range = range;
        self.update_neighbourhoods();
    }

    /// The configured maximum transmission range in m.
    pub fn max_transmission_range(&self) -> f64 {
        self.max_range
    }

    /// The range the neighbourhoods are computed for: the configured maximum,
    /// or the largest range of an assigned vehicle if that is greater.
    pub fn effective_range(&self) -> f64 {
        f64::max(self.max_range, self.member_range)
    }

    /// Recomputes which cells neighbour each other.
    pub fn update_neighbourhoods(&mut self) {
        if self.is_initialized() {
            self.compute_neighbourhoods();
        }
        self.stale = false;
    }

    /// Recomputes the neighbourhoods if an assignment has made them out of date.
    pub(crate) fn refresh_neighbourhoods(&mut self) {
        if self.stale {
            debug!("Refreshing cell neighbourhoods (range {:.0} m)", self.effective_range());
            self.update_neighbourhoods();
        }
    }

    /// Two cells are neighbours if the gap between their disks is
    /// no larger than the transmission range.
    fn compute_neighbourhoods(&mut self) {
        let reach = self.effective_range() * (1.0 + NEIGHBOURHOOD_TOLERANCE);
        let is_near = |a: (GeoPoint, f64), b: (GeoPoint, f64)| a.0.distance(&b.0) - a.1 - b.1 <= reach;

        for cell in &mut self.macro_cells {
            cell.neighbours.clear();
        }
        for cell in &mut self.micro_cells {
            cell.neighbours.clear();
        }

        let macro_pairs = (0..self.macro_cells.len())
            .tuple_combinations()
            .filter(|&(a, b)| {
                let (a, b) = (&self.macro_cells[a], &self.macro_cells[b]);
                is_near((a.centre, a.radius), (b.centre, b.radius))
            })
            .collect::<Vec<_>>();
        for &(a, b) in &macro_pairs {
            self.macro_cells[a].neighbours.insert(b);
            self.macro_cells[b].neighbours.insert(a);
        }

        // Macro-cells cover their micro-cells, so only micro-cells within the
        // same or neighbouring macro-cells can be neighbours.
        let mut micro_pairs = vec![];
        for cell in &self.macro_cells {
            let same = cell.micro_cells.iter().copied().tuple_combinations::<(usize, usize)>();
            micro_pairs.extend(same);
            for other in cell.neighbours.range(cell.id + 1..) {
                let other = &self.macro_cells[*other].micro_cells;
                micro_pairs.extend(iproduct!(cell.micro_cells.iter().copied(), other.iter().copied()));
            }
        }
        for (a, b) in micro_pairs {
            let (cell_a, cell_b) = (&self.micro_cells[a], &self.micro_cells[b]);
            if is_near((cell_a.centre, cell_a.radius), (cell_b.centre, cell_b.radius)) {
                self.micro_cells[a].neighbours.insert(b);
                self.micro_cells[b].neighbours.insert(a);
            }
        }
        self.debug_assert_consistent();
    }

    /// Assigns a vehicle to its nearest micro-cell, first removing it
    /// from any cell it is already assigned to. Does nothing if the grid
    /// is not initialized.
    pub fn assign_vehicle(&mut self, vehicle: &Vehicle) {
        if self.is_initialized() {
            self.place(vehicle);
            self.refresh_neighbourhoods();
        }
    }

    /// Moves the vehicle to its nearest micro-cell if it has left its current one,
    /// or refits its cell if it had grown. Returns `true` if the vehicle's cell changed.
    ///
    /// The neighbourhoods are not refreshed; see [Self::relocate_vehicles].
    pub(crate) fn relocate_vehicle(&mut self, vehicle: &Vehicle) -> bool {
        if !self.is_initialized() {
            return false;
        }
        self.note_range(vehicle.transmission_range());
        let position = vehicle.position();
        if let Some(assignment) = self.assignments.get_mut(vehicle.id()) {
            let cell = &self.micro_cells[assignment.cell];
            if cell.centre.distance(&position) <= cell.radius {
                assignment.position = position;
                // A grown cell may no longer need to be as large
                let (cell_id, grown) = (assignment.cell, cell.radius > cell.base_radius);
                if grown {
                    self.fit_cell(cell_id);
                }
                return false;
            }
        }
        self.place(vehicle);
        true
    }

    /// Brings the assignment of every given vehicle up to date with its current position.
    /// Returns the number of vehicles which changed cell.
    pub fn relocate_vehicles(&mut self, vehicles: &VehicleSet) -> usize {
        let moved = vehicles
            .values()
            .filter(|vehicle| self.relocate_vehicle(vehicle))
            .count();
        self.refresh_neighbourhoods();
        moved
    }

    /// Removes a vehicle from its micro-cell, shrinking the cell back
    /// if it had grown to cover the vehicle.
    /// Does nothing if the vehicle is not assigned to a cell.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        self.detach(id);
        self.refresh_neighbourhoods();
        self.debug_assert_consistent();
    }

    fn detach(&mut self, id: VehicleId) {
        let Some(assignment) = self.assignments.remove(id) else {
            return;
        };
        let cell = &mut self.micro_cells[assignment.cell];
        if let Some(idx) = cell.members.iter().position(|v| *v == id) {
            cell.members.remove(idx);
        }
        if cell.radius > cell.base_radius {
            self.fit_cell(assignment.cell);
        }
    }

    /// Assigns a vehicle to its nearest micro-cell, growing the cell if it
    /// does not already cover the vehicle.
    fn place(&mut self, vehicle: &Vehicle) {
        self.detach(vehicle.id());
        self.note_range(vehicle.transmission_range());

        let position = vehicle.position();
        let Some((cell_id, dist)) = self.nearest_micro_cell(position) else {
            return;
        };

        let cell = &mut self.micro_cells[cell_id];
        cell.members.push(vehicle.id());
        self.assignments.insert(vehicle.id(), Assignment { cell: cell_id, position });

        if dist > cell.radius {
            self.fit_cell(cell_id);
        }
        self.debug_assert_consistent();
    }

    /// Sets a micro-cell's radius to cover its base disk and every member,
    /// then does the same for its macro-cell. Marks the neighbourhoods stale
    /// if either changed.
    fn fit_cell(&mut self, cell_id: usize) {
        let cell = &self.micro_cells[cell_id];
        let radius = cell
            .members
            .iter()
            .filter_map(|id| self.assignments.get(*id))
            .map(|assignment| cell.centre.distance(&assignment.position))
            .fold(cell.base_radius, f64::max);
        let macro_id = cell.macro_id;
        if radius != cell.radius {
            self.micro_cells[cell_id].radius = radius;
            self.stale = true;
        }

        let macro_cell = &self.macro_cells[macro_id];
        let cover = macro_cell
            .micro_cells
            .iter()
            .map(|id| &self.micro_cells[*id])
            .map(|micro| macro_cell.centre.distance(&micro.centre) + micro.radius)
            .fold(macro_cell.base_radius, f64::max);
        if cover != macro_cell.radius {
            self.macro_cells[macro_id].radius = cover;
            self.stale = true;
        }
    }

    /// Records a vehicle's transmission range, so that the neighbourhoods
    /// are widened if it exceeds every range seen so far.
    fn note_range(&mut self, range: f64) {
        if range > self.member_range {
            let before = self.effective_range();
            self.member_range = range;
            if self.effective_range() > before {
                self.stale = true;
            }
        }
    }

    /// Finds the micro-cell with the nearest centre, and the distance to it.
    fn nearest_micro_cell(&self, pos: GeoPoint) -> Option<(usize, f64)> {
        self.micro_cells
            .iter()
            .map(|cell| (cell.id, cell.centre.distance(&pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Checks that cell IDs refer to existing cells, and that the cell members
    /// and the assignments describe the same vehicles.
    fn debug_assert_consistent(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for cell in &self.macro_cells {
            debug_assert!(
                cell.micro_cells.iter().all(|id| *id < self.micro_cells.len()),
                "macro-cell {} refers to a missing micro-cell",
                cell.id
            );
            debug_assert!(
                cell.neighbours.iter().all(|id| *id < self.macro_cells.len() && *id != cell.id),
                "macro-cell {} has an invalid neighbour",
                cell.id
            );
        }
        for cell in &self.micro_cells {
            debug_assert!(
                cell.macro_id < self.macro_cells.len(),
                "micro-cell {} refers to a missing macro-cell",
                cell.id
            );
            debug_assert!(
                cell.neighbours.iter().all(|id| *id < self.micro_cells.len() && *id != cell.id),
                "micro-cell {} has an invalid neighbour",
                cell.id
            );
            for id in &cell.members {
                debug_assert_eq!(
                    self.assignments.get(*id).map(|assignment| assignment.cell),
                    Some(cell.id),
                    "member of micro-cell {} is assigned elsewhere",
                    cell.id
                );
            }
        }
        let members: usize = self.micro_cells.iter().map(|cell| cell.members.len()).sum();
        debug_assert_eq!(members, self.assignments.len(), "vehicle missing from or repeated in cells");
    }

    /// Gets the vehicles in the given vehicle's micro-cell and all neighbouring micro-cells,
    /// including the vehicle itself. Empty if the vehicle is not assigned to a cell.
    pub fn nearby_vehicles(&self, id: VehicleId) -> Vec<VehicleId> {
        let Some(assignment) = self.assignments.get(id) else {
            return vec![];
        };
        let cell = &self.micro_cells[assignment.cell];
        cell.neighbours
            .iter()
            .flat_map(|other| &self.micro_cells[*other].members)
            .chain(&cell.members)
            .copied()
            .collect()
    }

    /// The ID of the micro-cell the vehicle is assigned to.
    pub fn micro_cell_id(&self, id: VehicleId) -> Option<usize> {
        self.assignments.get(id).map(|assignment| assignment.cell)
    }

    /// The ID of the macro-cell containing the vehicle's micro-cell.
    pub fn macro_cell_id(&self, id: VehicleId) -> Option<usize> {
        self.micro_cell_id(id).map(|cell| self.micro_cells[cell].macro_id)
    }

    /// The macro-cells, indexed by ID.
    pub fn macro_cells(&self) -> &[MacroCell] {
        &self.macro_cells
    }

    /// The micro-cells, indexed by ID.
    pub fn micro_cells(&self) -> &[MicroCell] {
        &self.micro_cells
    }

    /// The number of vehicles assigned to a cell.
    pub fn vehicle_count(&self) -> usize {
        self.assignments.len()
    }

    /// Computes summary statistics.
    pub fn stats(&self) -> GridStats {
        let occupied = self.micro_cells.iter().filter(|c| !c.members.is_empty());
        let occupied_micro_cells = occupied.clone().count();
        let max_members = occupied.map(|c| c.members.len()).max().unwrap_or(0);
        let neighbour_count: usize = self.micro_cells.iter().map(|c| c.neighbours.len()).sum();

        GridStats {
            macro_cells: self.macro_cells.len(),
            micro_cells: self.micro_cells.len(),
            vehicles: self.vehicle_count(),
            occupied_micro_cells,
            max_members,
            avg_members: ratio(self.vehicle_count(), occupied_micro_cells),
            avg_micro_neighbours: ratio(neighbour_count, self.micro_cells.len()),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::Vector2d;
    use crate::VehicleAttributes;
    use assert_approx_eq::assert_approx_eq;
    use slotmap::SlotMap;

    fn origin() -> GeoPoint {
        GeoPoint::new(48.85, 2.35)
    }

    fn add(vehicles: &mut VehicleSet, x: f64, y: f64, range: f64) -> VehicleId {
        vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleAttributes {
                    position: origin().offset(Vector2d::new(x, y)),
                    velocity: Vector2d::new(0.0, 0.0),
                    transmission_range: range,
                },
            )
        })
    }

    /// Two 10 x 10 blocks of vehicles, 3 km apart.
    fn two_blocks() -> VehicleSet {
        let mut vehicles = SlotMap::with_key();
        for (i, j) in iproduct!(0..10, 0..10) {
            add(&mut vehicles, i as f64 * 40.0, j as f64 * 40.0, 150.0);
            add(&mut vehicles, 3000.0 + i as f64 * 40.0, j as f64 * 40.0, 150.0);
        }
        vehicles
    }

    fn initialized_grid(vehicles: &VehicleSet) -> SpatialGrid {
        let mut grid = SpatialGrid::new(150.0);
        assert!(grid.initialize(vehicles, 4, 6, 1));
        grid
    }

    #[test]
    fn initialize_assigns_every_vehicle() {
        let vehicles = two_blocks();
        let grid = initialized_grid(&vehicles);

        assert_eq!(grid.macro_cells().len(), 4);
        assert_eq!(grid.micro_cells().len(), 24);
        assert_eq!(grid.vehicle_count(), vehicles.len());

        let members: usize = grid.micro_cells().iter().map(|c| c.members().len()).sum();
        assert_eq!(members, vehicles.len());

        for vehicle in vehicles.values() {
            let cell = grid.micro_cell_id(vehicle.id()).unwrap();
            let cell = &grid.micro_cells()[cell];
            assert!(cell.centre().distance(&vehicle.position()) <= cell.radius());
            assert_eq!(grid.macro_cell_id(vehicle.id()), Some(cell.macro_cell_id()));
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let centres = grid.micro_cells().iter().map(|c| c.centre()).collect::<Vec<_>>();

        let mut moved = SlotMap::with_key();
        add(&mut moved, 10_000.0, 10_000.0, 150.0);
        assert!(!grid.initialize(&moved, 2, 2, 99));

        let after = grid.micro_cells().iter().map(|c| c.centre()).collect::<Vec<_>>();
        assert_eq!(centres, after);
        assert_eq!(grid.macro_cells().len(), 4);
    }

    #[test]
    fn uninitialized_grid_is_inert() {
        let vehicles = two_blocks();
        let mut grid = SpatialGrid::new(150.0);
        let (id, vehicle) = vehicles.iter().next().unwrap();

        grid.assign_vehicle(vehicle);
        grid.remove_vehicle(id);
        assert_eq!(grid.micro_cell_id(id), None);
        assert_eq!(grid.macro_cell_id(id), None);
        assert!(grid.nearby_vehicles(id).is_empty());
        assert_eq!(grid.stats(), GridStats::default());
    }

    #[test]
    fn remove_then_query_reports_not_found() {
        let vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let (id, _) = vehicles.iter().next().unwrap();

        grid.remove_vehicle(id);
        assert_eq!(grid.micro_cell_id(id), None);
        assert!(grid.nearby_vehicles(id).is_empty());
        for other in vehicles.keys() {
            assert!(!grid.nearby_vehicles(other).contains(&id));
        }

        // Removing twice is harmless
        grid.remove_vehicle(id);
        assert_eq!(grid.vehicle_count(), vehicles.len() - 1);
    }

    #[test]
    fn nearby_vehicles_cover_everything_in_range() {
        let vehicles = two_blocks();
        let grid = initialized_grid(&vehicles);

        let all = vehicles.values().collect::<Vec<_>>();
        for (a, b) in all.into_iter().tuple_combinations() {
            if a.distance_to(b) <= 150.0 {
                assert!(grid.nearby_vehicles(a.id()).contains(&b.id()));
                assert!(grid.nearby_vehicles(b.id()).contains(&a.id()));
            }
        }
    }

    #[test]
    fn distant_blocks_are_not_neighbours() {
        let vehicles = two_blocks();
        let grid = initialized_grid(&vehicles);

        for a in vehicles.values() {
            for b in grid.nearby_vehicles(a.id()) {
                assert!(a.distance_to(&vehicles[b]) < 2000.0);
            }
        }
    }

    #[test]
    fn range_increase_only_adds_neighbours() {
        let vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let micro_before = grid.micro_cells().iter().map(|c| c.neighbours().clone()).collect::<Vec<_>>();
        let macro_before = grid.macro_cells().iter().map(|c| c.neighbours().clone()).collect::<Vec<_>>();

        grid.set_max_transmission_range(5000.0);

        for (before, cell) in micro_before.iter().zip(grid.micro_cells()) {
            assert!(before.is_subset(cell.neighbours()));
        }
        for (before, cell) in macro_before.iter().zip(grid.macro_cells()) {
            assert!(before.is_subset(cell.neighbours()));
        }
        // Everything is within 5 km of everything else
        for cell in grid.micro_cells() {
            assert_eq!(cell.neighbours().len(), grid.micro_cells().len() - 1);
        }
    }

    #[test]
    fn drifting_vehicle_grows_its_cell() {
        let mut vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);

        let id = add(&mut vehicles, 1500.0, 2000.0, 150.0);
        grid.assign_vehicle(&vehicles[id]);

        let cell = &grid.micro_cells()[grid.micro_cell_id(id).unwrap()];
        assert!(cell.centre().distance(&vehicles[id].position()) <= cell.radius());
        let macro_cell = &grid.macro_cells()[cell.macro_cell_id()];
        assert!(macro_cell.centre().distance(&cell.centre()) + cell.radius() <= macro_cell.radius() + 1e-6);
    }

    #[test]
    fn long_range_vehicle_widens_neighbourhoods() {
        let mut vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let a = add(&mut vehicles, 180.0, 180.0, 5000.0);
        let b = add(&mut vehicles, 3180.0, 180.0, 5000.0);
        grid.assign_vehicle(&vehicles[a]);
        grid.assign_vehicle(&vehicles[b]);

        assert_eq!(grid.effective_range(), 5000.0);
        assert!(grid.nearby_vehicles(a).contains(&b));
    }

    #[test]
    fn relocation_follows_moving_vehicles() {
        let mut vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let (id, _) = vehicles.iter().next().unwrap();

        assert_eq!(grid.relocate_vehicles(&vehicles), 0);

        let target = origin().offset(Vector2d::new(3200.0, 200.0));
        vehicles[id].set_position(target);
        assert_eq!(grid.relocate_vehicles(&vehicles), 1);

        let cell = &grid.micro_cells()[grid.micro_cell_id(id).unwrap()];
        assert!(cell.centre().distance(&target) <= cell.radius());
        let members: usize = grid.micro_cells().iter().map(|c| c.members().len()).sum();
        assert_eq!(members, vehicles.len());
    }

    fn radii(grid: &SpatialGrid) -> Vec<f64> {
        let micro = grid.micro_cells().iter().map(|c| c.radius());
        micro.chain(grid.macro_cells().iter().map(|c| c.radius())).collect()
    }

    #[test]
    fn cells_shrink_once_drifter_leaves() {
        let mut vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let before = radii(&grid);
        let largest = before.iter().copied().fold(0.0, f64::max);
        let neighbours = grid.micro_cells().iter().map(|c| c.neighbours().clone()).collect::<Vec<_>>();

        let id = add(&mut vehicles, 1500.0, 9000.0, 150.0);
        grid.assign_vehicle(&vehicles[id]);
        assert!(grid.micro_cells().iter().any(|c| c.radius() > 5000.0));

        // Back on top of a vehicle in the first block
        vehicles[id].set_position(origin().offset(Vector2d::new(80.0, 80.0)));
        assert_eq!(grid.relocate_vehicles(&vehicles), 0);
        assert!(radii(&grid).iter().all(|r| *r < largest + 1000.0));
        let cell = &grid.micro_cells()[grid.micro_cell_id(id).unwrap()];
        assert!(cell.centre().distance(&vehicles[id].position()) <= cell.radius());

        grid.remove_vehicle(id);
        for (after, before) in radii(&grid).iter().zip(&before) {
            assert_approx_eq!(*after, *before, 1e-9);
        }
        let after = grid.micro_cells().iter().map(|c| c.neighbours().clone()).collect::<Vec<_>>();
        assert_eq!(after, neighbours);
    }

    #[test]
    fn removed_drifter_restores_cells() {
        let mut vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let before = radii(&grid);

        let id = add(&mut vehicles, -6000.0, 4000.0, 150.0);
        grid.assign_vehicle(&vehicles[id]);
        assert_ne!(radii(&grid), before);

        vehicles.remove(id);
        grid.remove_vehicle(id);
        for (after, before) in radii(&grid).iter().zip(&before) {
            assert_approx_eq!(*after, *before, 1e-9);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "refers to a missing micro-cell")]
    fn dangling_micro_cell_is_caught() {
        let vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let missing = grid.micro_cells.len();
        grid.macro_cells[0].micro_cells.push(missing);
        grid.debug_assert_consistent();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "vehicle missing from or repeated in cells")]
    fn repeated_member_is_caught() {
        let vehicles = two_blocks();
        let mut grid = initialized_grid(&vehicles);
        let cell = grid.micro_cells.iter().position(|c| !c.members.is_empty()).unwrap();
        let id = grid.micro_cells[cell].members[0];
        grid.micro_cells[cell].members.push(id);
        grid.debug_assert_consistent();
    }
}
