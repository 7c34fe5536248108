use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Asset {
    pub name: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Asset {
    pub fn new(name: &str, city: &str, state: &str) -> Self {
        Self {
            name: name.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            ip: None,
            notes: None,
        }
    }

    pub fn location_label(&self) -> String {
        [self.city.trim(), self.state.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AssetDocument {
    pub title: String,
    pub assets: Vec<Asset>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Rounds both axes to `decimals` places.
    pub fn coarsen(self, decimals: u32) -> Self {
        let factor = 10f64.powi(decimals as i32);
        Self {
            lat: (self.lat * factor).round() / factor,
            lon: (self.lon * factor).round() / factor,
        }
    }

    pub fn midpoint(self, other: Coordinate) -> Self {
        Self {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl Bounds {
    pub fn from_points<I: IntoIterator<Item = Coordinate>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds { south_west: first, north_east: first };
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: Coordinate) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lon = self.south_west.lon.min(p.lon);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lon = self.north_east.lon.max(p.lon);
    }

    /// Grows the box by `ratio` of its own span on every side.
    pub fn pad(self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat).abs() * ratio;
        let dlon = (self.north_east.lon - self.south_west.lon).abs() * ratio;
        Bounds {
            south_west: Coordinate::new(self.south_west.lat - dlat, self.south_west.lon - dlon),
            north_east: Coordinate::new(self.north_east.lat + dlat, self.north_east.lon + dlon),
        }
    }
}

/// The hosting map view at the moment a cycle or event is processed.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraRequest {
    FitBounds {
        bounds: Bounds,
        padding: f64,
        max_zoom: Option<f64>,
        animate: bool,
    },
    SetView {
        center: Coordinate,
        zoom: f64,
        animate: bool,
    },
}
