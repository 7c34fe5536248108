//! Single-active detail view: which cluster (if any) is fanned out, and the
//! camera moves that go with expanding and collapsing it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clustering::{Cluster, ClusterId};
use crate::config::MapConfig;
use crate::fanout::{spread_multiplier, FanOut};
use crate::models::{Bounds, CameraRequest, Coordinate, ScreenPoint, Viewport};

/// Padding applied when framing a fan-out.
const FAN_OUT_PADDING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    MarkerClick { cluster: ClusterId },
    MarkerDoubleClick { cluster: ClusterId },
    MapClick { point: ScreenPoint },
    /// Click on one fanned-out pin of the open overlay.
    PinClick { asset: usize },
    /// The host camera settled. `center` is absent when only the zoom is known.
    ViewChanged {
        zoom: f64,
        #[serde(default)]
        center: Option<Coordinate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    OpenPopup { cluster: ClusterId },
    OpenPinPopup { asset: usize },
    MarkExpanded { cluster: ClusterId },
    UnmarkExpanded { cluster: ClusterId },
    Camera { request: CameraRequest },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "cluster", rename_all = "snake_case")]
pub enum DetailState {
    Collapsed,
    Expanded(ClusterId),
}

/// Fanned-out pins and connector lines of the expanded cluster.
#[derive(Debug, Clone, Serialize)]
pub struct DetailOverlay {
    /// Bumped every time an overlay is built.
    pub generation: u64,
    pub cluster: ClusterId,
    /// Aligned with `fan.positions`.
    pub members: Vec<usize>,
    pub fan: FanOut,
    #[serde(skip)]
    camera_moved: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DetailSettings {
    pub max_zoom: f64,
    pub zoom_in_step: f64,
    pub overview_padding: f64,
}

impl From<&MapConfig> for DetailSettings {
    fn from(config: &MapConfig) -> Self {
        Self {
            max_zoom: config.max_zoom,
            zoom_in_step: config.zoom_in_step,
            overview_padding: config.overview_padding,
        }
    }
}

pub struct DetailView {
    settings: DetailSettings,
    overview: Option<Bounds>,
    overlay: Option<DetailOverlay>,
    generation: u64,
}

impl DetailView {
    pub fn new(settings: DetailSettings, overview: Option<Bounds>) -> Self {
        Self { settings, overview, overlay: None, generation: 0 }
    }

    pub fn state(&self) -> DetailState {
        match &self.overlay {
            Some(overlay) => DetailState::Expanded(overlay.cluster),
            None => DetailState::Collapsed,
        }
    }

    pub fn overlay(&self) -> Option<&DetailOverlay> {
        self.overlay.as_ref()
    }

    /// Feeds one event through the transition table. `MapClick` is taken to
    /// have missed every marker; hit-testing happens before dispatch.
    pub fn dispatch(&mut self, event: MapEvent, clusters: &mut [Cluster], viewport: &Viewport) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            MapEvent::MarkerClick { cluster } => self.activate(cluster, false, clusters, viewport, &mut effects),
            MapEvent::MarkerDoubleClick { cluster } => self.activate(cluster, true, clusters, viewport, &mut effects),
            MapEvent::MapClick { .. } => {
                if self.collapse(&mut effects).is_some() {
                    self.return_to_overview(&mut effects);
                }
            }
            MapEvent::PinClick { asset } => match &self.overlay {
                Some(overlay) if overlay.members.contains(&asset) => {
                    effects.push(Effect::OpenPinPopup { asset });
                }
                _ => warn!("pin click for asset {} outside the open overlay", asset),
            },
            MapEvent::ViewChanged { zoom, .. } => self.relayout(zoom, clusters, &mut effects),
        }
        effects
    }

    fn activate(
        &mut self,
        id: ClusterId,
        zoom_requested: bool,
        clusters: &mut [Cluster],
        viewport: &Viewport,
        effects: &mut Vec<Effect>,
    ) {
        let Some(cluster) = clusters.iter_mut().find(|c| c.id == id) else {
            warn!("activation for unknown cluster {}", id);
            return;
        };

        if cluster.len() <= 1 {
            self.collapse(effects);
            effects.push(Effect::OpenPopup { cluster: id });
            if zoom_requested {
                effects.push(Effect::Camera {
                    request: CameraRequest::SetView {
                        center: cluster.coords,
                        zoom: self.target_zoom(viewport.zoom),
                        animate: true,
                    },
                });
            }
            return;
        }

        if self.state() == DetailState::Expanded(id) && !zoom_requested {
            let moved = self.overlay.as_ref().is_some_and(|o| o.camera_moved);
            self.collapse(effects);
            if moved {
                self.return_to_overview(effects);
            }
            return;
        }

        // re-zooming the open cluster rebuilds it in place
        let refresh = self.state() == DetailState::Expanded(id);
        let camera_moved = self.overlay.as_ref().is_some_and(|o| o.camera_moved);
        if refresh {
            self.overlay = None;
        } else {
            self.collapse(effects);
        }

        let zoom = if zoom_requested { self.target_zoom(viewport.zoom) } else { viewport.zoom };
        let multiplier = spread_multiplier(zoom, zoom_requested);
        let fan = FanOut::build(cluster.coords, cluster.len(), zoom, multiplier);
        cluster.last_spread_multiplier = Some(multiplier);

        if zoom_requested {
            effects.push(Effect::Camera {
                request: CameraRequest::FitBounds {
                    bounds: fan.bounds(),
                    padding: FAN_OUT_PADDING,
                    max_zoom: Some(zoom),
                    animate: true,
                },
            });
        }
        if !refresh {
            effects.push(Effect::MarkExpanded { cluster: id });
        }
        let members = cluster.members.clone();
        self.install(id, members, fan, camera_moved || zoom_requested);
    }

    fn target_zoom(&self, current: f64) -> f64 {
        (current + self.settings.zoom_in_step).min(self.settings.max_zoom).max(current)
    }

    fn install(&mut self, cluster: ClusterId, members: Vec<usize>, fan: FanOut, camera_moved: bool) {
        debug_assert!(self.overlay.is_none(), "overlay must be torn down first");
        self.generation += 1;
        debug!("expanding cluster {} ({} pins, overlay {})", cluster, members.len(), self.generation);
        self.overlay = Some(DetailOverlay { generation: self.generation, cluster, members, fan, camera_moved });
    }

    fn collapse(&mut self, effects: &mut Vec<Effect>) -> Option<ClusterId> {
        let overlay = self.overlay.take()?;
        debug!("collapsing cluster {}", overlay.cluster);
        effects.push(Effect::UnmarkExpanded { cluster: overlay.cluster });
        Some(overlay.cluster)
    }

    fn return_to_overview(&self, effects: &mut Vec<Effect>) {
        if let Some(bounds) = self.overview {
            effects.push(Effect::Camera {
                request: CameraRequest::FitBounds {
                    bounds,
                    padding: self.settings.overview_padding,
                    max_zoom: None,
                    animate: true,
                },
            });
        }
    }

    /// Keeps the open fan-out at a constant pixel size across zoom changes.
    fn relayout(&mut self, zoom: f64, clusters: &[Cluster], effects: &mut Vec<Effect>) {
        let Some(open) = self.overlay.as_ref().map(|o| o.cluster) else { return };
        let Some(cluster) = clusters.iter().find(|c| c.id == open) else {
            warn!("open cluster {} is gone, collapsing", open);
            self.collapse(effects);
            return;
        };
        let Some(current) = self.overlay.take() else { return };
        let multiplier = cluster.last_spread_multiplier.unwrap_or(current.fan.spread_multiplier);
        let fan = FanOut::build(cluster.coords, cluster.len(), zoom, multiplier);
        self.install(current.cluster, current.members, fan, current.camera_moved);
    }
}
