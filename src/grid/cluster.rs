//! Bounded k-means clustering of geographic positions.

use crate::geo::GeoPoint;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// The maximum number of k-means iterations.
const MAX_ROUNDS: usize = 50;

/// Stop iterating once no centre moves further than this, in m.
const CONVERGENCE_EPSILON: f64 = 0.1; // m

/// The smallest radius a cluster may have, in m.
const MIN_CLUSTER_RADIUS: f64 = 50.0; // m

/// A cluster of points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Cluster {
    /// The centroid of the cluster's members.
    pub centre: GeoPoint,
    /// The distance from the centre to the furthest member, in m.
    pub radius: f64,
}

/// Partitions `points` into at most `k` clusters.
///
/// The initial centres are distinct members of `points`, chosen with an RNG
/// seeded by `seed`, so every cluster starts out non-empty
/// and the result is reproducible.
pub(crate) fn kmeans(points: &[GeoPoint], k: usize, seed: u64) -> Vec<Cluster> {
    let k = usize::min(k, points.len());
    if k == 0 {
        return vec![];
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centres = rand::seq::index::sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|idx| points[idx])
        .collect::<Vec<_>>();
    let mut labels = vec![0; points.len()];

    for round in 0..MAX_ROUNDS {
        assign_labels(points, &centres, &mut labels);

        let mut sums = vec![(0.0, 0.0, 0usize); k];
        for (point, label) in points.iter().zip(&labels) {
            let sum = &mut sums[*label];
            sum.0 += point.lat;
            sum.1 += point.lon;
            sum.2 += 1;
        }

        let mut max_shift: f64 = 0.0;
        for (centre, (lat, lon, count)) in centres.iter_mut().zip(sums) {
            // Empty clusters keep their previous centre
            if count > 0 {
                let next = GeoPoint::new(lat / count as f64, lon / count as f64);
                max_shift = max_shift.max(centre.distance(&next));
                *centre = next;
            }
        }

        if max_shift < CONVERGENCE_EPSILON {
            log::trace!("k-means converged after {} rounds", round + 1);
            break;
        }
    }

    assign_labels(points, &centres, &mut labels);
    let mut radii = vec![MIN_CLUSTER_RADIUS; k];
    for (point, label) in points.iter().zip(&labels) {
        radii[*label] = f64::max(radii[*label], centres[*label].distance(point));
    }

    centres
        .into_iter()
        .zip(radii)
        .map(|(centre, radius)| Cluster { centre, radius })
        .collect()
}

/// Labels each point with the index of its nearest centre.
fn assign_labels(points: &[GeoPoint], centres: &[GeoPoint], labels: &mut [usize]) {
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        *label = centres
            .iter()
            .map(|centre| centre.distance(point))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
    }
}
