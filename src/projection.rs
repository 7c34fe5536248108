//! Spherical web mercator at 256px tiles, the projection every slippy map
//! host uses for its pixel space.

use crate::models::{Coordinate, ScreenPoint, Viewport};
use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

fn scale(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Absolute world pixel position of `c` at `zoom`.
pub fn to_world(c: Coordinate, zoom: f64) -> ScreenPoint {
    let lat = c.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (c.lon + 180.0) / 360.0 * scale(zoom);
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale(zoom);
    ScreenPoint::new(x, y)
}

pub fn from_world(p: ScreenPoint, zoom: f64) -> Coordinate {
    let lon = p.x / scale(zoom) * 360.0 - 180.0;
    let n = PI - 2.0 * PI * p.y / scale(zoom);
    let lat = n.sinh().atan().to_degrees();
    Coordinate::new(lat, lon)
}

impl Viewport {
    pub fn new(center: Coordinate, zoom: f64, width: u32, height: u32) -> Self {
        Self { center, zoom, width, height }
    }

    pub fn with_zoom(self, zoom: f64) -> Self {
        Self { zoom, ..self }
    }

    fn origin(&self) -> ScreenPoint {
        let c = to_world(self.center, self.zoom);
        c.offset(-(self.width as f64) / 2.0, -(self.height as f64) / 2.0)
    }

    /// Container pixel position of `c`, top-left origin.
    pub fn project(&self, c: Coordinate) -> ScreenPoint {
        let world = to_world(c, self.zoom);
        let origin = self.origin();
        ScreenPoint::new(world.x - origin.x, world.y - origin.y)
    }

    pub fn unproject(&self, p: ScreenPoint) -> Coordinate {
        let origin = self.origin();
        from_world(p.offset(origin.x, origin.y), self.zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_projects_to_middle_of_container() {
        let vp = Viewport::new(Coordinate::new(30.27, -97.74), 10.0, 800, 600);
        let p = vp.project(vp.center);
        assert!((p.x - 400.0).abs() < 1e-6);
        assert!((p.y - 300.0).abs() < 1e-6);
    }

    #[test]
    fn unproject_inverts_project() {
        let vp = Viewport::new(Coordinate::new(39.5, -98.35), 4.0, 1024, 768);
        let c = Coordinate::new(47.61, -122.33);
        let back = vp.unproject(vp.project(c));
        assert!((back.lat - c.lat).abs() < 1e-9);
        assert!((back.lon - c.lon).abs() < 1e-9);
    }

    #[test]
    fn pixel_distance_doubles_per_zoom_level() {
        let a = Coordinate::new(30.0, -97.0);
        let b = Coordinate::new(30.1, -97.1);
        let d4 = to_world(a, 4.0).distance(to_world(b, 4.0));
        let d5 = to_world(a, 5.0).distance(to_world(b, 5.0));
        assert!((d5 / d4 - 2.0).abs() < 1e-9);
    }
}
