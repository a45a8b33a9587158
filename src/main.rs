use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde_json::json;
use vanet_sim::{GeoPoint, InterferenceConfig, Simulation, Vector2d, VehicleAttributes};

/// Vehicles are scattered around a handful of hotspots in central Paris.
const CENTRE: GeoPoint = GeoPoint::new(48.8566, 2.3522);
const NUM_HOTSPOTS: usize = 8;
const HOTSPOT_SPREAD: f64 = 400.0; // m
const CITY_SPREAD: f64 = 3000.0; // m

fn populate(sim: &mut Simulation, count: usize, rng: &mut StdRng) {
    let city = Normal::new(0.0, CITY_SPREAD).unwrap();
    let local = Normal::new(0.0, HOTSPOT_SPREAD).unwrap();
    let hotspots = (0..NUM_HOTSPOTS)
        .map(|_| Vector2d::new(city.sample(rng), city.sample(rng)))
        .collect::<Vec<_>>();

    for _ in 0..count {
        let hotspot = hotspots[rng.gen_range(0..hotspots.len())];
        let offset = hotspot + Vector2d::new(local.sample(rng), local.sample(rng));
        let heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let speed = rng.gen_range(0.0..15.0);
        sim.add_vehicle(&VehicleAttributes {
            position: CENTRE.offset(offset),
            velocity: Vector2d::new(speed * heading.cos(), speed * heading.sin()),
            transmission_range: rng.gen_range(150.0..300.0),
        });
    }
}

fn main() {
    let mut rng = StdRng::seed_from_u64(1);
    let config = InterferenceConfig::default()
        .with_max_transmission_range(300.0)
        .with_transitive_closure(true);

    for count in [100, 1000, 5000] {
        let mut sim = Simulation::new(config);
        populate(&mut sim, count, &mut rng);

        sim.set_spatial_optimization(false);
        let start = Instant::now();
        sim.recompute_now();
        let classic = start.elapsed();
        let classic_stats = *sim.graph().stats();

        sim.set_spatial_optimization(true);
        sim.initialize_antennas();
        let start = Instant::now();
        sim.recompute_now();
        let indexed = start.elapsed();
        let indexed_stats = *sim.graph().stats();

        println!(
            "{} vehicles, {} links: classic {:?} ({} comparisons), indexed {:?} ({} comparisons) --> {:.1}x speedup",
            count,
            indexed_stats.direct_links,
            classic,
            classic_stats.comparisons,
            indexed,
            indexed_stats.comparisons,
            classic.as_secs_f64() / indexed.as_secs_f64(),
        );
    }

    println!("Simulating...");
    let mut sim = Simulation::new(config);
    populate(&mut sim, 2000, &mut rng);
    sim.initialize_antennas();

    const NUM_FRAMES: u32 = 200;
    let start = Instant::now();
    for _ in 0..NUM_FRAMES {
        sim.step(0.1);
    }
    sim.wait_for_graph();
    let frame = start.elapsed() / NUM_FRAMES;

    let stats = sim.graph().stats();
    let grid = sim.graph().spatial_grid().stats();
    println!("Avg. frame: {:?}, {} graphs published", frame, sim.graphs_published());
    println!(
        "{:#}",
        json!({
            "vehicles": stats.vehicles,
            "direct_links": stats.direct_links,
            "transitive_links": stats.transitive_links,
            "avg_candidates": stats.avg_candidates,
            "build_time_ms": stats.build_time.as_secs_f64() * 1000.0,
            "macro_cells": grid.macro_cells,
            "micro_cells": grid.micro_cells,
            "occupied_micro_cells": grid.occupied_micro_cells,
            "avg_members": grid.avg_members,
        })
    );
}
