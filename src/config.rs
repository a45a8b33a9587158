#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The transmission range used when none is configured, in m.
pub const DEFAULT_TRANSMISSION_RANGE: f64 = 500.0; // m

/// Below this many vehicles, the spatial index is not worth maintaining.
pub const DEFAULT_SPATIAL_THRESHOLD: usize = 20;

/// Configuration of an [InterferenceGraph](crate::InterferenceGraph) and its spatial index.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InterferenceConfig {
    /// The number of macro-cells, or 0 to derive it from the population size.
    pub num_macro_cells: usize,
    /// The number of micro-cells per macro-cell, or 0 to derive it from the population size.
    pub num_micro_cells_per_macro: usize,
    /// The largest transmission range the spatial index must account for, in m.
    pub max_transmission_range: f64,
    /// Whether to use the spatial index when building the graph.
    pub spatial_optimization: bool,
    /// Whether to compute the transitive closure of the graph.
    pub transitive_closure: bool,
    /// The population size at or above which the spatial index is used.
    pub spatial_threshold: usize,
    /// Seed for choosing the initial k-means centres.
    pub kmeans_seed: u64,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self {
            num_macro_cells: 0,
            num_micro_cells_per_macro: 0,
            max_transmission_range: DEFAULT_TRANSMISSION_RANGE,
            spatial_optimization: true,
            transitive_closure: false,
            spatial_threshold: DEFAULT_SPATIAL_THRESHOLD,
            kmeans_seed: 0,
        }
    }
}

impl InterferenceConfig {
    /// Sets the number of macro-cells and micro-cells per macro-cell.
    pub fn with_cells(mut self, num_macro: usize, num_micro_per_macro: usize) -> Self {
        self.num_macro_cells = num_macro;
        self.num_micro_cells_per_macro = num_micro_per_macro;
        self
    }

    /// Sets the maximum transmission range in m.
    pub fn with_max_transmission_range(mut self, range: f64) -> Self {
        self.max_transmission_range = range;
        self
    }

    /// Enables or disables the spatial index.
    pub fn with_spatial_optimization(mut self, enable: bool) -> Self {
        self.spatial_optimization = enable;
        self
    }

    /// Enables or disables the transitive closure.
    pub fn with_transitive_closure(mut self, enable: bool) -> Self {
        self.transitive_closure = enable;
        self
    }

    /// Sets the population size at or above which the spatial index is used.
    pub fn with_spatial_threshold(mut self, threshold: usize) -> Self {
        self.spatial_threshold = threshold;
        self
    }

    /// Sets the k-means seed.
    pub fn with_kmeans_seed(mut self, seed: u64) -> Self {
        self.kmeans_seed = seed;
        self
    }

    /// Resolves the number of macro-cells and micro-cells per macro-cell
    /// for a population of the given size, substituting automatic values for zeros.
    pub fn cell_counts(&self, population: usize) -> (usize, usize) {
        let num_macro = match self.num_macro_cells {
            0 if population > 2000 => 30,
            0 if population > 500 => 20,
            0 => 10,
            n => n,
        };
        let num_micro = match self.num_micro_cells_per_macro {
            0 if population > 2000 => 20,
            0 if population > 500 => 15,
            0 => 10,
            n => n,
        };
        (num_macro, num_micro)
    }
}
