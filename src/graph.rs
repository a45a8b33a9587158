use crate::config::InterferenceConfig;
use crate::grid::SpatialGrid;
use crate::snapshot::{CellNeighbourhood, VehicleSnapshot};
use crate::{Vehicle, VehicleId, VehicleSet};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Builds involving more vehicles than this are logged.
const LOG_POPULATION: usize = 1000;

/// Whether two vehicles a given distance apart can communicate directly.
/// Each must be within the other's transmission range.
#[inline(always)]
fn in_mutual_range(distance: f64, range_a: f64, range_b: f64) -> bool {
    distance <= range_a && distance <= range_b
}

/// The algorithm used to find directly connected vehicles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Every pair of vehicles is compared.
    #[default]
    Classic,
    /// Only vehicles in the same or neighbouring micro-cells are compared.
    Indexed,
}

/// The state of the spatial index inside an [InterferenceGraph].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GridState {
    #[default]
    Uninitialized,
    Initialized,
    /// The layout has been replaced at least once since it was first placed.
    Reinitialized,
}

/// Performance counters from the most recent build.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GraphStats {
    pub strategy: BuildStrategy,
    /// The number of vehicles in the graph.
    pub vehicles: usize,
    /// The number of distance evaluations performed.
    pub comparisons: usize,
    /// The average number of candidates considered per vehicle.
    pub avg_candidates: f64,
    /// The number of directly connected pairs.
    pub direct_links: usize,
    /// The number of pairs connected directly or through relays, if the closure was computed.
    pub transitive_links: usize,
    /// The wall-clock time taken by the build.
    pub build_time: Duration,
}

/// The graph of which vehicles can communicate with which.
///
/// Two vehicles are directly connected if each is within the other's
/// transmission range. When transitive closure is enabled, the graph also
/// records every vehicle reachable from each vehicle through a chain
/// of direct connections.
#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    /// The vehicles each vehicle is directly connected to.
    adjacency: HashMap<VehicleId, HashSet<VehicleId>>,
    /// The vehicles reachable from each vehicle, excluding itself.
    closure: HashMap<VehicleId, HashSet<VehicleId>>,
    /// The spatial index.
    grid: SpatialGrid,
    grid_state: GridState,
    config: InterferenceConfig,
    stats: GraphStats,
}

impl InterferenceGraph {
    /// Creates an empty graph.
    pub fn new(config: InterferenceConfig) -> Self {
        Self {
            adjacency: HashMap::new(),
            closure: HashMap::new(),
            grid: SpatialGrid::new(config.max_transmission_range),
            grid_state: GridState::Uninitialized,
            config,
            stats: GraphStats::default(),
        }
    }

    /// Gets the graph's configuration.
    pub fn config(&self) -> &InterferenceConfig {
        &self.config
    }

    /// Enables or disables the spatial index.
    pub fn enable_spatial_optimization(&mut self, enable: bool) {
        self.config.spatial_optimization = enable;
    }

    /// Enables or disables computation of the transitive closure.
    /// Takes effect from the next build.
    pub fn enable_transitive_closure(&mut self, enable: bool) {
        self.config.transitive_closure = enable;
    }

    pub fn is_spatial_optimization_enabled(&self) -> bool {
        self.config.spatial_optimization
    }

    pub fn is_transitive_closure_enabled(&self) -> bool {
        self.config.transitive_closure
    }

    /// Gets the spatial index.
    pub fn spatial_grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn grid_state(&self) -> GridState {
        self.grid_state
    }

    /// Whether a build over `population` vehicles would use the spatial index.
    pub fn uses_spatial_index(&self, population: usize) -> bool {
        self.config.spatial_optimization
            && self.grid.is_initialized()
            && population >= self.config.spatial_threshold
    }

    /// Places the spatial index's cells based on the current vehicle positions.
    ///
    /// Does nothing if the index is already initialized, if spatial optimization
    /// is disabled or if there are too few vehicles for the index to be useful.
    /// A count of zero derives the number of cells from the population size.
    pub fn initialize_spatial_grid(&mut self, vehicles: &VehicleSet, num_macro: usize, num_micro: usize) {
        if self.grid_state != GridState::Uninitialized {
            debug!("Spatial grid already initialized");
            return;
        }
        if self.place_grid(vehicles, num_macro, num_micro) {
            self.grid_state = GridState::Initialized;
        }
    }

    /// Discards the spatial index's cells and places them again,
    /// such as when the number of cells has changed.
    pub fn reinitialize_spatial_grid(&mut self, vehicles: &VehicleSet, num_macro: usize, num_micro: usize) {
        if !self.can_place_grid(vehicles) {
            return;
        }
        let previous = self.grid_state;
        self.grid.clear();
        if self.place_grid(vehicles, num_macro, num_micro) {
            self.grid_state = match previous {
                GridState::Uninitialized => GridState::Initialized,
                _ => GridState::Reinitialized,
            };
        } else {
            self.grid_state = GridState::Uninitialized;
        }
    }

    fn can_place_grid(&self, vehicles: &VehicleSet) -> bool {
        if !self.config.spatial_optimization || vehicles.len() < self.config.spatial_threshold {
            warn!(
                "Not placing spatial grid: {} vehicles, spatial optimization {}",
                vehicles.len(),
                if self.config.spatial_optimization { "enabled" } else { "disabled" }
            );
            return false;
        }
        true
    }

    fn place_grid(&mut self, vehicles: &VehicleSet, num_macro: usize, num_micro: usize) -> bool {
        if !self.can_place_grid(vehicles) {
            return false;
        }

        let (auto_macro, auto_micro) = self.config.cell_counts(vehicles.len());
        let num_macro = if num_macro == 0 { auto_macro } else { num_macro };
        let num_micro = if num_micro == 0 { auto_micro } else { num_micro };

        let start = Instant::now();
        self.grid.set_max_transmission_range(self.config.max_transmission_range);
        let placed = self.grid.initialize(vehicles, num_macro, num_micro, self.config.kmeans_seed);
        if placed {
            info!(
                "Placed spatial grid in {:?}: {} macro-cells, {} micro-cells each, range {:.0} m",
                start.elapsed(),
                self.grid.macro_cells().len(),
                num_micro,
                self.grid.effective_range()
            );
        }
        placed
    }

    /// Sets the maximum transmission range and recomputes which cells neighbour each other.
    pub fn update_transmission_range(&mut self, range: f64) {
        self.config.max_transmission_range = range;
        self.grid.set_max_transmission_range(range);
    }

    /// Assigns a vehicle to its nearest micro-cell.
    /// Does nothing if the spatial index is not initialized.
    pub fn assign_vehicle(&mut self, vehicle: &Vehicle) {
        self.grid.assign_vehicle(vehicle);
    }

    /// Removes a vehicle from its micro-cell.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        self.grid.remove_vehicle(id);
    }

    /// Brings the spatial index up to date with the vehicles' current positions.
    pub fn refresh_spatial_grid(&mut self, vehicles: &VehicleSet) {
        if self.grid.is_initialized() {
            self.grid.relocate_vehicles(vehicles);
        }
    }

    /// Clears the graph, including the spatial index.
    pub fn clear(&mut self) {
        self.adjacency.clear();
        self.closure.clear();
        self.grid.clear();
        self.grid_state = GridState::Uninitialized;
        self.stats = GraphStats::default();
    }

    /// Rebuilds the graph from the live vehicles.
    ///
    /// Uses the spatial index if it is enabled, initialized and there are enough
    /// vehicles for it to pay off, and compares every pair otherwise.
    pub fn build_graph(&mut self, vehicles: &VehicleSet) {
        let start = Instant::now();
        self.reset_links(vehicles.keys());

        if self.uses_spatial_index(vehicles.len()) {
            self.grid.relocate_vehicles(vehicles);
            self.connect_indexed(vehicles);
        } else {
            self.connect_classic(vehicles);
        }
        self.finish_build(start);
    }

    /// Rebuilds the graph from snapshots of the vehicles.
    ///
    /// This touches no live vehicle state, so may run on any thread.
    /// If `neighbourhood` is given, only vehicles in the same or neighbouring
    /// micro-cells are compared; otherwise every pair is compared.
    ///
    /// Distances are computed with the flat-earth approximation
    /// ([GeoPoint::flat_distance](crate::GeoPoint::flat_distance)) rather than
    /// the great-circle distance used by [Self::build_graph]. The two agree to
    /// within a fraction of a percent at city scale, but may disagree about
    /// pairs right at the edge of their mutual range.
    pub fn build_graph_from_snapshots(
        &mut self,
        snapshots: &[VehicleSnapshot],
        neighbourhood: Option<&CellNeighbourhood>,
    ) {
        let start = Instant::now();
        self.reset_links(snapshots.iter().map(|s| s.id));

        let comparisons = match neighbourhood.filter(|n| n.cell_count() > 0) {
            Some(neighbourhood) => {
                self.stats.strategy = BuildStrategy::Indexed;
                self.connect_snapshots_indexed(snapshots, neighbourhood)
            }
            None => {
                self.stats.strategy = BuildStrategy::Classic;
                let mut comparisons = 0;
                for (a, b) in snapshots.iter().tuple_combinations() {
                    comparisons += 1;
                    self.connect_snapshots(a, b);
                }
                comparisons
            }
        };

        self.stats.comparisons = comparisons;
        self.stats.avg_candidates = per_vehicle(2 * comparisons, snapshots.len());
        self.finish_build(start);
    }

    /// Clears the links, leaving an empty adjacency set for each of the given vehicles.
    fn reset_links(&mut self, ids: impl Iterator<Item = VehicleId>) {
        self.adjacency.clear();
        self.closure.clear();
        self.adjacency.extend(ids.map(|id| (id, HashSet::new())));
    }

    /// Compares every pair of vehicles.
    fn connect_classic(&mut self, vehicles: &VehicleSet) {
        let mut comparisons = 0;
        let all = vehicles.values().collect::<Vec<_>>();
        for (a, b) in all.into_iter().tuple_combinations() {
            comparisons += 1;
            if in_mutual_range(a.distance_to(b), a.transmission_range(), b.transmission_range()) {
                self.link(a.id(), b.id());
            }
        }

        self.stats.strategy = BuildStrategy::Classic;
        self.stats.comparisons = comparisons;
        self.stats.avg_candidates = vehicles.len().saturating_sub(1) as f64;
    }

    /// Compares each vehicle with the vehicles the spatial index places nearby.
    fn connect_indexed(&mut self, vehicles: &VehicleSet) {
        let mut comparisons = 0;
        let mut candidates = 0;

        for a in vehicles.values() {
            let nearby = self.grid.nearby_vehicles(a.id());
            candidates += nearby.len();

            // Each pair is evaluated once, from the vehicle with the lower ID
            for id in nearby.into_iter().filter(|id| *id > a.id()) {
                let Some(b) = vehicles.get(id) else {
                    continue;
                };
                comparisons += 1;
                if in_mutual_range(a.distance_to(b), a.transmission_range(), b.transmission_range()) {
                    self.link(a.id(), b.id());
                }
            }
        }

        self.stats.strategy = BuildStrategy::Indexed;
        self.stats.comparisons = comparisons;
        self.stats.avg_candidates = per_vehicle(candidates, vehicles.len());
    }

    /// Compares the members of each micro-cell with each other and with the
    /// members of each higher numbered neighbouring cell. Vehicles without a cell
    /// are compared against everything. Returns the number of comparisons made.
    fn connect_snapshots_indexed(
        &mut self,
        snapshots: &[VehicleSnapshot],
        neighbourhood: &CellNeighbourhood,
    ) -> usize {
        let mut comparisons = 0;

        for cell in 0..neighbourhood.cell_count() {
            let members = neighbourhood.members(cell);
            for (a, b) in members.iter().tuple_combinations() {
                comparisons += 1;
                self.connect_snapshots(&snapshots[*a], &snapshots[*b]);
            }

            for other in neighbourhood.neighbours(cell).iter().filter(|other| **other > cell) {
                for (a, b) in members.iter().cartesian_product(neighbourhood.members(*other)) {
                    comparisons += 1;
                    self.connect_snapshots(&snapshots[*a], &snapshots[*b]);
                }
            }
        }

        let unassigned = neighbourhood.unassigned();
        for a in unassigned {
            for b in 0..snapshots.len() {
                if b == *a || (b < *a && unassigned.binary_search(&b).is_ok()) {
                    continue;
                }
                comparisons += 1;
                self.connect_snapshots(&snapshots[*a], &snapshots[b]);
            }
        }

        comparisons
    }

    fn connect_snapshots(&mut self, a: &VehicleSnapshot, b: &VehicleSnapshot) {
        let distance = a.position.flat_distance(&b.position);
        if in_mutual_range(distance, a.transmission_range, b.transmission_range) {
            self.link(a.id, b.id);
        }
    }

    fn link(&mut self, a: VehicleId, b: VehicleId) {
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Computes the closure if enabled, and records the statistics.
    fn finish_build(&mut self, start: Instant) {
        debug_assert!(self.is_symmetric(), "adjacency must be symmetric");

        if self.config.transitive_closure {
            self.compute_transitive_closure();
        }

        self.stats.vehicles = self.adjacency.len();
        self.stats.direct_links = self.adjacency.values().map(HashSet::len).sum::<usize>() / 2;
        self.stats.transitive_links = self.closure.values().map(HashSet::len).sum::<usize>() / 2;
        self.stats.build_time = start.elapsed();

        if self.stats.vehicles > LOG_POPULATION {
            debug!(
                "Built interference graph ({:?}): {} vehicles, {} comparisons, {:.1} candidates/vehicle, {:?}",
                self.stats.strategy,
                self.stats.vehicles,
                self.stats.comparisons,
                self.stats.avg_candidates,
                self.stats.build_time
            );
        }
    }

    /// Finds every vehicle reachable from each vehicle.
    ///
    /// A breadth-first search is run once per connected component, and every
    /// member of the component is given the rest of the component as its reachable set.
    fn compute_transitive_closure(&mut self) {
        self.closure.clear();
        let mut queue = VecDeque::new();

        for start in self.adjacency.keys() {
            if self.closure.contains_key(start) {
                continue;
            }

            let mut component = HashSet::from([*start]);
            queue.push_back(*start);
            while let Some(current) = queue.pop_front() {
                for next in self.adjacency.get(&current).into_iter().flatten() {
                    if component.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }

            for member in &component {
                let mut reachable = component.clone();
                reachable.remove(member);
                self.closure.insert(*member, reachable);
            }
        }
    }

    /// Publishes a graph built elsewhere, typically on a background thread, into this one.
    ///
    /// The links and statistics are moved over wholesale. The spatial index
    /// and configuration of this graph are kept.
    pub fn copy_from(&mut self, other: InterferenceGraph) {
        self.adjacency = other.adjacency;
        self.closure = other.closure;
        self.stats = other.stats;
    }

    /// Whether two vehicles can communicate, directly or through relays.
    /// Always `false` unless the transitive closure was computed.
    pub fn can_communicate(&self, a: VehicleId, b: VehicleId) -> bool {
        self.closure.get(&a).map_or(false, |reachable| reachable.contains(&b))
    }

    /// Whether two vehicles are within each other's transmission range.
    pub fn is_directly_connected(&self, a: VehicleId, b: VehicleId) -> bool {
        self.adjacency.get(&a).map_or(false, |neighbours| neighbours.contains(&b))
    }

    /// The vehicles within mutual transmission range of the given vehicle.
    pub fn direct_neighbours(&self, id: VehicleId) -> HashSet<VehicleId> {
        self.adjacency.get(&id).cloned().unwrap_or_default()
    }

    /// The vehicles reachable from the given vehicle, directly or through relays.
    /// Empty unless the transitive closure was computed.
    pub fn reachable_vehicles(&self, id: VehicleId) -> HashSet<VehicleId> {
        self.closure.get(&id).cloned().unwrap_or_default()
    }

    /// The number of vehicles in the graph.
    pub fn vehicle_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Statistics from the most recent build.
    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Returns an iterator over each vehicle and its direct neighbours.
    pub fn iter_adjacency(&self) -> impl Iterator<Item = (VehicleId, &HashSet<VehicleId>)> {
        self.adjacency.iter().map(|(id, set)| (*id, set))
    }

    /// Checks that every link is recorded in both directions.
    pub fn is_symmetric(&self) -> bool {
        self.adjacency.iter().all(|(a, neighbours)| {
            neighbours
                .iter()
                .all(|b| self.adjacency.get(b).map_or(false, |back| back.contains(a)))
        })
    }
}

fn per_vehicle(count: usize, vehicles: usize) -> f64 {
    if vehicles == 0 {
        0.0
    } else {
        count as f64 / vehicles as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::{GeoPoint, Vector2d};
    use crate::snapshot::snapshot_vehicles;
    use crate::VehicleAttributes;
    use slotmap::SlotMap;

    fn add(vehicles: &mut VehicleSet, x: f64, y: f64, range: f64) -> VehicleId {
        let position = GeoPoint::new(48.85, 2.35).offset(Vector2d::new(x, y));
        vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleAttributes {
                    position,
                    velocity: Vector2d::new(0.0, 0.0),
                    transmission_range: range,
                },
            )
        })
    }

    fn transitive() -> InterferenceConfig {
        InterferenceConfig::default().with_transitive_closure(true)
    }

    #[test]
    fn line_of_three_relays() {
        let mut vehicles = SlotMap::with_key();
        let a = add(&mut vehicles, 0.0, 0.0, 150.0);
        let b = add(&mut vehicles, 100.0, 0.0, 150.0);
        let c = add(&mut vehicles, 200.0, 0.0, 150.0);

        let mut graph = InterferenceGraph::new(transitive());
        graph.build_graph(&vehicles);

        assert_eq!(graph.direct_neighbours(a), HashSet::from([b]));
        assert_eq!(graph.direct_neighbours(b), HashSet::from([a, c]));
        assert!(!graph.is_directly_connected(a, c));
        assert!(graph.can_communicate(a, c));
        assert!(graph.can_communicate(c, a));
        assert_eq!(graph.reachable_vehicles(a), HashSet::from([b, c]));
        assert!(!graph.reachable_vehicles(a).contains(&a));
        assert_eq!(graph.stats().direct_links, 2);
        assert_eq!(graph.stats().transitive_links, 3);
    }

    #[test]
    fn range_must_be_mutual() {
        let mut vehicles = SlotMap::with_key();
        let a = add(&mut vehicles, 0.0, 0.0, 150.0);
        let b = add(&mut vehicles, 100.0, 0.0, 50.0);

        let mut graph = InterferenceGraph::new(transitive());
        graph.build_graph(&vehicles);

        assert!(graph.direct_neighbours(a).is_empty());
        assert!(graph.direct_neighbours(b).is_empty());
        assert!(!graph.can_communicate(a, b));
        assert_eq!(graph.vehicle_count(), 2);
    }

    #[test]
    fn closure_disabled_means_no_communication() {
        let mut vehicles = SlotMap::with_key();
        let a = add(&mut vehicles, 0.0, 0.0, 150.0);
        let b = add(&mut vehicles, 100.0, 0.0, 150.0);

        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.build_graph(&vehicles);

        assert!(graph.is_directly_connected(a, b));
        assert!(!graph.can_communicate(a, b));
        assert!(graph.reachable_vehicles(a).is_empty());
    }

    #[test]
    fn small_populations_use_classic_build() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..25 {
            add(&mut vehicles, i as f64 * 30.0, 0.0, 100.0);
        }
        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.initialize_spatial_grid(&vehicles, 2, 3);
        assert_eq!(graph.grid_state(), GridState::Initialized);

        graph.build_graph(&vehicles);
        assert_eq!(graph.stats().strategy, BuildStrategy::Indexed);

        let ids = vehicles.keys().collect::<Vec<_>>();
        for id in &ids[..10] {
            vehicles.remove(*id);
            graph.remove_vehicle(*id);
        }
        graph.build_graph(&vehicles);
        assert_eq!(graph.stats().strategy, BuildStrategy::Classic);
        assert_eq!(graph.stats().comparisons, 15 * 14 / 2);
        assert_eq!(graph.vehicle_count(), 15);
    }

    #[test]
    fn grid_state_transitions() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..40 {
            add(&mut vehicles, (i % 8) as f64 * 50.0, (i / 8) as f64 * 50.0, 100.0);
        }

        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.initialize_spatial_grid(&vehicles, 3, 4);
        assert_eq!(graph.grid_state(), GridState::Initialized);
        assert_eq!(graph.spatial_grid().micro_cells().len(), 12);

        // A second call is a no-op
        graph.initialize_spatial_grid(&vehicles, 2, 2);
        assert_eq!(graph.spatial_grid().micro_cells().len(), 12);

        graph.reinitialize_spatial_grid(&vehicles, 2, 2);
        assert_eq!(graph.grid_state(), GridState::Reinitialized);
        assert_eq!(graph.spatial_grid().micro_cells().len(), 4);

        graph.clear();
        assert_eq!(graph.grid_state(), GridState::Uninitialized);
        assert!(!graph.spatial_grid().is_initialized());
    }

    #[test]
    fn too_few_vehicles_for_grid() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..5 {
            add(&mut vehicles, i as f64 * 50.0, 0.0, 100.0);
        }
        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.initialize_spatial_grid(&vehicles, 0, 0);
        assert_eq!(graph.grid_state(), GridState::Uninitialized);
        assert!(!graph.uses_spatial_index(vehicles.len()));
    }

    #[test]
    fn copy_from_keeps_spatial_grid() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..30 {
            add(&mut vehicles, i as f64 * 40.0, 0.0, 100.0);
        }

        let mut graph = InterferenceGraph::new(transitive());
        graph.initialize_spatial_grid(&vehicles, 2, 4);

        let snapshots = snapshot_vehicles(&vehicles, graph.spatial_grid());
        let neighbourhood = CellNeighbourhood::new(graph.spatial_grid(), &snapshots);
        let mut background = InterferenceGraph::new(transitive());
        background.build_graph_from_snapshots(&snapshots, Some(&neighbourhood));
        let expected = background.stats;

        graph.copy_from(background);
        assert!(graph.spatial_grid().is_initialized());
        assert_eq!(graph.grid_state(), GridState::Initialized);
        assert_eq!(graph.stats(), &expected);
        assert_eq!(graph.vehicle_count(), 30);

        let ids = vehicles.keys().collect::<Vec<_>>();
        assert!(graph.can_communicate(ids[0], ids[29]));
    }

    #[test]
    fn snapshot_without_cells_compares_everything() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..10 {
            add(&mut vehicles, i as f64 * 40.0, 0.0, 100.0);
        }
        let snapshots = vehicles.values().map(|v| v.snapshot(None)).collect::<Vec<_>>();

        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.build_graph_from_snapshots(&snapshots, None);
        assert_eq!(graph.stats().strategy, BuildStrategy::Classic);
        assert_eq!(graph.stats().comparisons, 45);
        assert_eq!(graph.stats().avg_candidates, 9.0);

        let mut other = InterferenceGraph::new(InterferenceConfig::default());
        other.build_graph_from_snapshots(&snapshots, Some(&CellNeighbourhood::default()));
        assert_eq!(other.adjacency, graph.adjacency);
    }

    #[test]
    fn unassigned_snapshots_are_still_linked() {
        let mut vehicles = SlotMap::with_key();
        for i in 0..30 {
            add(&mut vehicles, i as f64 * 40.0, 0.0, 100.0);
        }
        let mut graph = InterferenceGraph::new(InterferenceConfig::default());
        graph.initialize_spatial_grid(&vehicles, 2, 4);

        let late = add(&mut vehicles, 10.0, 0.0, 100.0);
        let snapshots = snapshot_vehicles(&vehicles, graph.spatial_grid());
        let neighbourhood = CellNeighbourhood::new(graph.spatial_grid(), &snapshots);

        let mut indexed = InterferenceGraph::new(InterferenceConfig::default());
        indexed.build_graph_from_snapshots(&snapshots, Some(&neighbourhood));
        let mut classic = InterferenceGraph::new(InterferenceConfig::default());
        classic.build_graph_from_snapshots(&snapshots, None);

        assert_eq!(indexed.direct_neighbours(late).len(), 3);
        assert_eq!(indexed.adjacency, classic.adjacency);
    }
}
