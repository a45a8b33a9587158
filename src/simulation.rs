use crate::config::InterferenceConfig;
#[cfg(feature = "debug")]
use crate::debug::{debug_circle, debug_line, debug_value, take_debug_frame};
use crate::geo::{GeoPoint, Vector2d};
use crate::graph::InterferenceGraph;
use crate::worker::{GraphJob, GraphWorker};
use crate::{Vehicle, VehicleAttributes, VehicleId, VehicleSet};

/// A simulation of vehicles moving about and communicating by radio.
///
/// Each step, the vehicles are moved and a new interference graph is
/// launched on a background thread if the previous one has finished.
/// Finished graphs are published at the start of the following step, so
/// [Self::graph] lags the vehicles' positions by at least one step.
pub struct Simulation {
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The most recently published interference graph, and the spatial index.
    graph: InterferenceGraph,
    /// Builds graphs in the background.
    worker: GraphWorker,
    /// The current frame of simulation.
    frame: usize,
    /// The number of graphs published so far.
    published: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(InterferenceConfig::default())
    }
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new(config: InterferenceConfig) -> Self {
        Self {
            vehicles: VehicleSet::with_key(),
            graph: InterferenceGraph::new(config),
            worker: GraphWorker::spawn(),
            frame: 0,
            published: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Adds a vehicle to the simulation.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        let vehicle_id = self.vehicles.insert_with_key(|id| Vehicle::new(id, attributes));
        self.graph.assign_vehicle(&self.vehicles[vehicle_id]);
        vehicle_id
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        if self.vehicles.remove(id).is_some() {
            self.graph.remove_vehicle(id);
        }
    }

    /// Moves a vehicle.
    pub fn set_vehicle_position(&mut self, id: VehicleId, position: GeoPoint) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_position(position);
            self.graph.assign_vehicle(vehicle);
        }
    }

    /// Sets a vehicle's velocity in m/s (x = east, y = north).
    pub fn set_vehicle_velocity(&mut self, id: VehicleId, velocity: Vector2d) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_velocity(velocity);
        }
    }

    /// Sets a vehicle's transmission range in m.
    pub fn set_vehicle_transmission_range(&mut self, id: VehicleId, range: f64) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_transmission_range(range);
            self.graph.assign_vehicle(vehicle);
        }
    }

    /// Places the spatial index, using the cell counts from the configuration.
    /// Does nothing if it has already been placed.
    pub fn initialize_antennas(&mut self) {
        let config = *self.graph.config();
        self.graph
            .initialize_spatial_grid(&self.vehicles, config.num_macro_cells, config.num_micro_cells_per_macro);
    }

    /// Places the spatial index again with the given cell counts,
    /// replacing any existing layout. A count of zero is chosen automatically.
    pub fn place_antennas(&mut self, num_macro: usize, num_micro: usize) {
        self.graph.reinitialize_spatial_grid(&self.vehicles, num_macro, num_micro);
    }

    /// Sets the maximum transmission range assumed by the spatial index.
    pub fn set_max_transmission_range(&mut self, range: f64) {
        self.graph.update_transmission_range(range);
    }

    /// Enables or disables the spatial index.
    pub fn set_spatial_optimization(&mut self, enable: bool) {
        self.graph.enable_spatial_optimization(enable);
    }

    /// Enables or disables computation of which vehicles can reach each other through relays.
    pub fn set_transitive_closure(&mut self, enable: bool) {
        self.graph.enable_transitive_closure(enable);
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Never waits for the background worker. Returns `true` if a new
    /// interference graph was published during this step.
    pub fn step(&mut self, dt: f64) -> bool {
        self.integrate(dt);
        self.graph.refresh_spatial_grid(&self.vehicles);

        let published = self.poll_graph();
        if !self.worker.is_busy() {
            self.worker.launch(GraphJob::capture(&self.vehicles, &self.graph));
        }
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.record_debug();
            self.debug = take_debug_frame();
        }

        published
    }

    /// Publishes the background graph if it has finished.
    /// Returns `true` if a graph was published.
    pub fn poll_graph(&mut self) -> bool {
        match self.worker.poll() {
            Some(graph) => {
                self.publish(graph);
                true
            }
            None => false,
        }
    }

    /// Waits for the background graph to finish, then publishes it.
    /// Returns `false` if no graph was being built.
    pub fn wait_for_graph(&mut self) -> bool {
        match self.worker.wait() {
            Some(graph) => {
                self.publish(graph);
                true
            }
            None => false,
        }
    }

    /// Builds the interference graph from the vehicles' current state on this thread.
    /// Any graph still being built in the background is discarded.
    pub fn recompute_now(&mut self) {
        self.worker.wait();
        self.graph.build_graph(&self.vehicles);
        self.published += 1;
        self.update_vehicle_neighbours();
    }

    fn publish(&mut self, graph: InterferenceGraph) {
        self.graph.copy_from(graph);
        self.published += 1;
        self.update_vehicle_neighbours();
    }

    /// Copies each vehicle's reachable set out of the graph.
    fn update_vehicle_neighbours(&mut self) {
        if !self.graph.is_transitive_closure_enabled() {
            return;
        }
        for (id, vehicle) in &mut self.vehicles {
            vehicle.clear_neighbours();
            let mut reachable = self.graph.reachable_vehicles(id).into_iter().collect::<Vec<_>>();
            reachable.sort_unstable();
            for other in reachable {
                vehicle.add_neighbour(other);
            }
        }
    }

    /// Integrates the positions of all vehicles.
    fn integrate(&mut self, dt: f64) {
        for (_, vehicle) in &mut self.vehicles {
            vehicle.integrate(dt);
        }
    }

    #[cfg(feature = "debug")]
    fn record_debug(&self) {
        for cell in self.graph.spatial_grid().micro_cells() {
            debug_circle("micro_cell", cell.centre(), cell.radius());
        }
        for cell in self.graph.spatial_grid().macro_cells() {
            debug_circle("macro_cell", cell.centre(), cell.radius());
        }
        for (a, neighbours) in self.graph.iter_adjacency() {
            for b in neighbours.iter().filter(|b| **b > a) {
                if let (Some(a), Some(b)) = (self.vehicles.get(a), self.vehicles.get(*b)) {
                    debug_line("link", a.position(), b.position());
                }
            }
        }
        let stats = self.graph.stats();
        debug_value("comparisons", stats.comparisons as f64);
        debug_value("avg_candidates", stats.avg_candidates);
        debug_value("build_time", stats.build_time.as_secs_f64());
    }

    /// Gets the most recently published interference graph.
    pub fn graph(&self) -> &InterferenceGraph {
        &self.graph
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The number of interference graphs published so far.
    pub fn graphs_published(&self) -> usize {
        self.published
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets the vehicles, keyed by ID.
    pub fn vehicles(&self) -> &VehicleSet {
        &self.vehicles
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}
