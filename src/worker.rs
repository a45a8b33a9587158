//! Background construction of interference graphs.

use crate::config::InterferenceConfig;
use crate::graph::InterferenceGraph;
use crate::snapshot::{snapshot_vehicles, CellNeighbourhood, VehicleSnapshot};
use crate::VehicleSet;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::warn;
use std::thread::{self, JoinHandle};

/// Everything needed to build an interference graph, copied out of the simulation.
#[derive(Clone, Debug)]
pub struct GraphJob {
    pub snapshots: Vec<VehicleSnapshot>,
    /// The spatial index's cells, if the build should use them.
    pub neighbourhood: Option<CellNeighbourhood>,
    pub config: InterferenceConfig,
}

impl GraphJob {
    /// Snapshots the vehicles, along with the graph's spatial index
    /// if a build over this many vehicles would use it.
    pub fn capture(vehicles: &VehicleSet, graph: &InterferenceGraph) -> Self {
        let snapshots = snapshot_vehicles(vehicles, graph.spatial_grid());
        let neighbourhood = graph
            .uses_spatial_index(snapshots.len())
            .then(|| CellNeighbourhood::new(graph.spatial_grid(), &snapshots));
        Self {
            snapshots,
            neighbourhood,
            config: *graph.config(),
        }
    }

    /// Builds the graph.
    pub fn run(self) -> InterferenceGraph {
        let mut graph = InterferenceGraph::new(self.config);
        graph.build_graph_from_snapshots(&self.snapshots, self.neighbourhood.as_ref());
        graph
    }
}

/// Builds interference graphs on a long-lived background thread,
/// one at a time.
///
/// Results are only handed over when the owner asks for them, through
/// [Self::poll] or [Self::wait], so they are always observed on the owner's thread.
pub struct GraphWorker {
    /// Sends jobs to the thread. `None` if the thread could not be started
    /// or has been shut down.
    job_tx: Option<Sender<GraphJob>>,
    result_rx: Receiver<InterferenceGraph>,
    thread: Option<JoinHandle<()>>,
    /// Whether a job has been launched and its result not yet collected.
    in_flight: bool,
    /// The result of a job which was run on the calling thread.
    ready: Option<InterferenceGraph>,
}

impl Default for GraphWorker {
    fn default() -> Self {
        Self::spawn()
    }
}

impl GraphWorker {
    /// Starts the worker thread.
    ///
    /// If the thread cannot be started, jobs are instead run
    /// on the calling thread when they are launched.
    pub fn spawn() -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<GraphJob>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);

        let thread = thread::Builder::new()
            .name("interference-graph".into())
            .spawn(move || {
                for job in job_rx {
                    if result_tx.send(job.run()).is_err() {
                        break;
                    }
                }
            });

        match thread {
            Ok(handle) => Self {
                job_tx: Some(job_tx),
                result_rx,
                thread: Some(handle),
                in_flight: false,
                ready: None,
            },
            Err(err) => {
                warn!("Could not start interference graph worker, building inline: {}", err);
                Self {
                    job_tx: None,
                    result_rx,
                    thread: None,
                    in_flight: false,
                    ready: None,
                }
            }
        }
    }

    /// Whether a job has been launched whose result has not been collected yet.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Launches a job. Returns `false`, dropping the job, if another is still in flight.
    pub fn launch(&mut self, job: GraphJob) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;

        let job = match &self.job_tx {
            Some(tx) => match tx.send(job) {
                Ok(()) => return true,
                Err(err) => {
                    warn!("Interference graph worker has stopped, building inline");
                    err.into_inner()
                }
            },
            None => job,
        };
        self.job_tx = None;
        self.ready = Some(job.run());
        true
    }

    /// Collects the result of the job in flight, if it has finished.
    pub fn poll(&mut self) -> Option<InterferenceGraph> {
        if !self.in_flight {
            return None;
        }
        if let Some(graph) = self.ready.take() {
            self.in_flight = false;
            return Some(graph);
        }
        match self.result_rx.try_recv() {
            Ok(graph) => {
                self.in_flight = false;
                Some(graph)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Interference graph worker stopped before finishing its job");
                self.in_flight = false;
                None
            }
        }
    }

    /// Blocks until the job in flight has finished, and collects its result.
    /// Returns `None` immediately if there is no job in flight.
    pub fn wait(&mut self) -> Option<InterferenceGraph> {
        if !self.in_flight {
            return None;
        }
        self.in_flight = false;
        if let Some(graph) = self.ready.take() {
            return Some(graph);
        }
        match self.result_rx.recv() {
            Ok(graph) => Some(graph),
            Err(_) => {
                warn!("Interference graph worker stopped before finishing its job");
                None
            }
        }
    }

    /// Stops the worker thread, after waiting for the job in flight to finish.
    /// Subsequent jobs are run on the calling thread.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Interference graph worker panicked");
            }
        }
    }
}

impl Drop for GraphWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::{GeoPoint, Vector2d};
    use crate::{Vehicle, VehicleAttributes};
    use slotmap::SlotMap;

    fn line_job(count: usize) -> GraphJob {
        let mut vehicles: VehicleSet = SlotMap::with_key();
        for i in 0..count {
            let position = GeoPoint::new(48.85, 2.35).offset(Vector2d::new(i as f64 * 50.0, 0.0));
            vehicles.insert_with_key(|id| {
                Vehicle::new(
                    id,
                    &VehicleAttributes {
                        position,
                        velocity: Vector2d::new(0.0, 0.0),
                        transmission_range: 80.0,
                    },
                )
            });
        }
        let graph = InterferenceGraph::new(InterferenceConfig::default().with_transitive_closure(true));
        GraphJob::capture(&vehicles, &graph)
    }

    #[test]
    fn one_job_at_a_time() {
        let mut worker = GraphWorker::spawn();
        assert!(!worker.is_busy());
        assert!(worker.launch(line_job(10)));
        assert!(worker.is_busy());
        assert!(!worker.launch(line_job(20)));

        let graph = worker.wait().unwrap();
        assert_eq!(graph.vehicle_count(), 10);
        assert_eq!(graph.stats().direct_links, 9);
        assert!(!worker.is_busy());
        assert!(worker.poll().is_none());

        assert!(worker.launch(line_job(20)));
        assert_eq!(worker.wait().unwrap().vehicle_count(), 20);
    }

    #[test]
    fn poll_eventually_collects_result() {
        let mut worker = GraphWorker::spawn();
        assert!(worker.poll().is_none());
        assert!(worker.launch(line_job(5)));

        let graph = loop {
            if let Some(graph) = worker.poll() {
                break graph;
            }
            thread::yield_now();
        };
        assert_eq!(graph.vehicle_count(), 5);
    }

    #[test]
    fn jobs_run_inline_after_shutdown() {
        let mut worker = GraphWorker::spawn();
        assert!(worker.launch(line_job(5)));
        worker.shutdown();

        // The job in flight finished before the thread stopped
        assert_eq!(worker.wait().unwrap().vehicle_count(), 5);

        assert!(worker.launch(line_job(3)));
        assert_eq!(worker.poll().unwrap().vehicle_count(), 3);
    }

    #[test]
    fn capture_skips_index_for_small_populations() {
        let job = line_job(5);
        assert!(job.neighbourhood.is_none());
        assert_eq!(job.snapshots.len(), 5);
        assert!(job.snapshots.iter().all(|s| s.micro_cell_id.is_none()));
    }
}
