//! Circular fan-out of a cluster's assets plus the connector tree that ties
//! them back to the centroid.
//!
//! Geometry is laid out in world pixels at the requested zoom and converted
//! back to coordinates, so the ring keeps the same on-screen size whatever
//! the zoom.

use std::f64::consts::TAU;

use serde::Serialize;

use crate::models::{Bounds, Coordinate};
use crate::projection::{from_world, to_world};

const BASE_RADIUS_PX: f64 = 30.0;
const RADIUS_PER_ASSET_PX: f64 = 12.0;
const MIN_BASE_RADIUS_PX: f64 = 40.0;
const MAX_BASE_RADIUS_PX: f64 = 90.0;
pub const MIN_RADIUS_PX: f64 = 40.0;
pub const MAX_RADIUS_PX: f64 = 160.0;
/// Branch junction sits this far above the centroid before scaling.
pub const BRANCH_OFFSET_PX: f64 = 18.0;

const REFERENCE_ZOOM: f64 = 10.0;
const ZOOM_IN_BOOST: f64 = 1.25;

/// How far to spread the ring for the current zoom. Activations that also
/// fly the camera in spread wider.
pub fn spread_multiplier(zoom: f64, zoom_requested: bool) -> f64 {
    let base = (1.0 + (zoom - REFERENCE_ZOOM) * 0.05).clamp(0.8, 1.3);
    if zoom_requested { base * ZOOM_IN_BOOST } else { base }
}

pub fn radius_px(count: usize, multiplier: f64) -> f64 {
    let base = (BASE_RADIUS_PX + RADIUS_PER_ASSET_PX * count as f64).clamp(MIN_BASE_RADIUS_PX, MAX_BASE_RADIUS_PX);
    (base * multiplier).clamp(MIN_RADIUS_PX, MAX_RADIUS_PX)
}

/// `count` evenly spaced positions around `center`, starting at angle 0.
pub fn layout(center: Coordinate, count: usize, zoom: f64, multiplier: f64) -> Vec<Coordinate> {
    if count <= 1 {
        return vec![center];
    }
    let origin = to_world(center, zoom);
    let radius = radius_px(count, multiplier);
    let step = TAU / count as f64;
    (0..count)
        .map(|i| {
            let angle = step * i as f64;
            from_world(origin.offset(radius * angle.cos(), radius * angle.sin()), zoom)
        })
        .collect()
}

pub fn branch_point(center: Coordinate, zoom: f64, multiplier: f64) -> Coordinate {
    let origin = to_world(center, zoom);
    from_world(origin.offset(0.0, -BRANCH_OFFSET_PX * multiplier), zoom)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Connector {
    pub from: Coordinate,
    pub to: Coordinate,
}

/// Complete fan-out geometry for one cluster.
#[derive(Debug, Clone, Serialize)]
pub struct FanOut {
    pub center: Coordinate,
    pub zoom: f64,
    pub spread_multiplier: f64,
    pub radius_px: f64,
    pub branch: Coordinate,
    pub positions: Vec<Coordinate>,
    /// centroid -> branch first, then branch -> each position
    pub connectors: Vec<Connector>,
}

impl FanOut {
    pub fn build(center: Coordinate, count: usize, zoom: f64, multiplier: f64) -> Self {
        let positions = layout(center, count, zoom, multiplier);
        let branch = branch_point(center, zoom, multiplier);
        let connectors = std::iter::once(Connector { from: center, to: branch })
            .chain(positions.iter().map(|&to| Connector { from: branch, to }))
            .collect();
        Self {
            center,
            zoom,
            spread_multiplier: multiplier,
            radius_px: radius_px(count, multiplier),
            branch,
            positions,
            connectors,
        }
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds { south_west: self.center, north_east: self.center };
        for p in self.positions.iter().copied().chain([self.branch]) {
            bounds.extend(p);
        }
        bounds
    }
}
