use std::collections::HashMap;

use serde::Serialize;

use crate::grouping::LocationGroup;
use crate::models::{Coordinate, ScreenPoint};

/// Rendered cluster marker diameter in pixels.
pub const MARKER_DIAMETER_PX: f64 = 38.0;
/// Extra clearance kept between two marker edges.
pub const MARKER_BUFFER_PX: f64 = 12.0;
pub const COLLISION_DISTANCE_PX: f64 = MARKER_DIAMETER_PX + MARKER_BUFFER_PX;

pub type ClusterId = usize;

/// One marker's worth of assets. Lives for a single render cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub coords: Coordinate,
    /// Indices into the cycle's asset list.
    pub members: Vec<usize>,
    /// Spread multiplier of the last fan-out built for this cluster.
    pub last_spread_multiplier: Option<f64>,
}

// never empty: every cluster is built from a non-empty location group
#[allow(clippy::len_without_is_empty)]
impl Cluster {
    fn new(coords: Coordinate, members: Vec<usize>) -> Self {
        Self { id: 0, coords, members, last_spread_multiplier: None }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    fn absorb(&mut self, other: Cluster) {
        self.members.extend(other.members);
        self.coords = self.coords.midpoint(other.coords);
    }
}

/// Output of [`seed_clusters`]: one cluster per coarsened coordinate plus
/// the members whose location never resolved.
#[derive(Debug, Default)]
pub struct Seeded {
    pub clusters: Vec<Cluster>,
    pub dropped: Vec<usize>,
}

/// Builds the first cluster set from resolved location groups.
///
/// `resolved` is aligned with `groups`. Coordinates snap to a
/// `decimals`-place grid and groups landing on the same cell share a cluster.
pub fn seed_clusters(groups: &[LocationGroup], resolved: &[Option<Coordinate>], decimals: u32) -> Seeded {
    let mut seeded = Seeded::default();
    let mut cells: HashMap<String, usize> = HashMap::new();

    for (group, coords) in groups.iter().zip(resolved) {
        let Some(coords) = coords else {
            seeded.dropped.extend(group.members.iter().copied());
            continue;
        };
        let snapped = coords.coarsen(decimals);
        let cell = format!("{:.*},{:.*}", decimals as usize, snapped.lat, decimals as usize, snapped.lon);
        match cells.get(&cell) {
            Some(&slot) => seeded.clusters[slot].members.extend(group.members.iter().copied()),
            None => {
                cells.insert(cell, seeded.clusters.len());
                seeded.clusters.push(Cluster::new(snapped, group.members.clone()));
            }
        }
    }

    seeded
}

/// Folds clusters whose projected markers would overlap.
///
/// Clusters are taken in order; each is compared against the ones already
/// accepted and joins the nearest one closer than `threshold` pixels. The
/// centroid of a merge is the plain mean of the two coordinates. A merge moves
/// the centroid, so the grown cluster keeps absorbing neighbours until it is
/// clear of all of them; the output therefore has no pair under `threshold`.
pub fn merge_nearby<F>(clusters: Vec<Cluster>, project: F, threshold: f64) -> Vec<Cluster>
where
    F: Fn(Coordinate) -> ScreenPoint,
{
    let mut accepted: Vec<Cluster> = Vec::with_capacity(clusters.len());

    for cluster in clusters {
        let at = project(cluster.coords);
        match nearest_within(&accepted, at, None, &project, threshold) {
            Some(slot) => {
                accepted[slot].absorb(cluster);
                settle(&mut accepted, slot, &project, threshold);
            }
            None => accepted.push(cluster),
        }
    }

    for (id, cluster) in accepted.iter_mut().enumerate() {
        cluster.id = id;
    }
    accepted
}

fn settle<F>(accepted: &mut Vec<Cluster>, mut slot: usize, project: &F, threshold: f64)
where
    F: Fn(Coordinate) -> ScreenPoint,
{
    loop {
        let at = project(accepted[slot].coords);
        let Some(other) = nearest_within(accepted, at, Some(slot), project, threshold) else {
            return;
        };
        let (keep, gone) = (slot.min(other), slot.max(other));
        let folded = accepted.remove(gone);
        accepted[keep].absorb(folded);
        slot = keep;
    }
}

fn nearest_within<F>(
    accepted: &[Cluster],
    at: ScreenPoint,
    skip: Option<usize>,
    project: &F,
    threshold: f64,
) -> Option<usize>
where
    F: Fn(Coordinate) -> ScreenPoint,
{
    accepted
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .map(|(i, c)| (i, project(c.coords).distance(at)))
        .filter(|(_, d)| *d < threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_by_location;
    use crate::models::{Asset, Viewport};

    fn cluster(lat: f64, lon: f64, members: Vec<usize>) -> Cluster {
        Cluster::new(Coordinate::new(lat, lon), members)
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport::new(Coordinate::new(39.5, -98.35), zoom, 1280, 800)
    }

    #[test]
    fn near_duplicate_places_collapse_when_seeding() {
        let assets = vec![
            Asset::new("A", "Austin", "TX"),
            Asset::new("B", "Austin City", "TX"),
            Asset::new("C", "Nowhere", "ZZ"),
            Asset::new("D", "Dallas", "TX"),
        ];
        let groups = group_by_location(&assets);
        let resolved = vec![
            Some(Coordinate::new(30.26721, -97.74311)),
            Some(Coordinate::new(30.26749, -97.74339)),
            None,
            Some(Coordinate::new(32.7767, -96.797)),
        ];
        let seeded = seed_clusters(&groups, &resolved, 3);
        assert_eq!(seeded.clusters.len(), 2);
        assert_eq!(seeded.clusters[0].members, vec![0, 1]);
        assert_eq!(seeded.dropped, vec![2]);
    }

    #[test]
    fn overlapping_markers_merge_with_mean_centroid() {
        let vp = viewport(4.0);
        let merged = merge_nearby(
            vec![cluster(30.27, -97.74, vec![0]), cluster(30.51, -97.68, vec![1])],
            |c| vp.project(c),
            COLLISION_DISTANCE_PX,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].members, vec![0, 1]);
        assert!((merged[0].coords.lat - 30.39).abs() < 1e-9);
        assert!((merged[0].coords.lon + 97.71).abs() < 1e-9);
    }

    #[test]
    fn distant_markers_stay_apart() {
        let vp = viewport(4.0);
        let merged = merge_nearby(
            vec![cluster(30.27, -97.74, vec![0]), cluster(47.61, -122.33, vec![1])],
            |c| vp.project(c),
            COLLISION_DISTANCE_PX,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].id, 1);
    }

    #[test]
    fn topology_depends_on_zoom() {
        let input = vec![cluster(30.27, -97.74, vec![0]), cluster(32.78, -96.8, vec![1])];
        let far_out = viewport(3.0);
        let close_in = viewport(8.0);
        assert_eq!(merge_nearby(input.clone(), |c| far_out.project(c), COLLISION_DISTANCE_PX).len(), 1);
        assert_eq!(merge_nearby(input, |c| close_in.project(c), COLLISION_DISTANCE_PX).len(), 2);
    }

    #[test]
    fn merging_is_idempotent_at_fixed_zoom() {
        let vp = viewport(5.0);
        // a chain where an early merge drags a centroid toward an accepted neighbour
        let input: Vec<Cluster> = (0..12)
            .map(|i| cluster(30.0 + (i as f64) * 0.35, -97.0 + (i % 3) as f64 * 0.3, vec![i]))
            .collect();
        let once = merge_nearby(input, |c| vp.project(c), COLLISION_DISTANCE_PX);
        let twice = merge_nearby(once.clone(), |c| vp.project(c), COLLISION_DISTANCE_PX);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.members, b.members);
            assert_eq!(a.coords, b.coords);
        }
        for (i, a) in once.iter().enumerate() {
            for b in &once[i + 1..] {
                assert!(vp.project(a.coords).distance(vp.project(b.coords)) >= COLLISION_DISTANCE_PX);
            }
        }
    }

    #[test]
    fn members_are_conserved() {
        let vp = viewport(4.0);
        let input: Vec<Cluster> = (0..20)
            .map(|i| cluster(25.0 + (i * 7 % 13) as f64, -120.0 + (i * 5 % 17) as f64 * 2.0, vec![2 * i, 2 * i + 1]))
            .collect();
        let merged = merge_nearby(input, |c| vp.project(c), COLLISION_DISTANCE_PX);
        let mut all: Vec<usize> = merged.iter().flat_map(|c| c.members.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..40).collect::<Vec<_>>());
    }
}
