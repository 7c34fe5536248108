use serde::Serialize;
use tracing::{info, warn};

use crate::clustering::{merge_nearby, seed_clusters, Cluster, COLLISION_DISTANCE_PX, MARKER_DIAMETER_PX};
use crate::config::MapConfig;
use crate::detail::{DetailOverlay, DetailSettings, DetailState, DetailView, Effect, MapEvent};
use crate::geocoder::Geocoder;
use crate::grouping::group_by_location;
use crate::models::{Asset, Bounds, CameraRequest, Coordinate, ScreenPoint, Viewport};
use crate::renderer::{ClusterRenderer, MarkerSet};
use crate::resolver::Resolver;
use crate::template_engine::TemplateEngine;

pub const NOTHING_PLOTTED_WARNING: &str = "Unable to plot any assets. Check that city/state values are valid.";

/// Runs render cycles: group, resolve, merge, render.
pub struct Engine<G: Geocoder> {
    resolver: Resolver<G>,
    templates: TemplateEngine,
    map: MapConfig,
}

impl<G: Geocoder> Engine<G> {
    pub fn new(resolver: Resolver<G>, templates: TemplateEngine, map: MapConfig) -> Self {
        Self { resolver, templates, map }
    }

    pub fn default_viewport(&self, width: u32, height: u32) -> Viewport {
        let (lat, lon) = self.map.default_center;
        Viewport::new(Coordinate::new(lat, lon), self.map.default_zoom, width, height)
    }

    /// Merge topology is fixed for the life of the returned session; later
    /// pans and zooms do not re-cluster.
    pub async fn render_cycle(&mut self, cycle: u64, assets: Vec<Asset>, viewport: Viewport) -> MapSession {
        let groups = group_by_location(&assets);
        let resolved = self.resolver.resolve_groups(&groups).await;

        let seeded = seed_clusters(&groups, &resolved, self.map.coarsen_decimals);
        let clusters = merge_nearby(seeded.clusters, |c| viewport.project(c), COLLISION_DISTANCE_PX);

        let renderer = ClusterRenderer::new(&self.templates, self.map.large_cluster_threshold);
        let markers = renderer.render(&clusters, &assets);
        let popups = assets.iter().map(|a| renderer.popup(a)).collect();

        let overview = Bounds::from_points(clusters.iter().map(|c| c.coords));
        let camera = match overview {
            Some(bounds) => CameraRequest::FitBounds {
                bounds,
                padding: self.map.overview_padding,
                max_zoom: None,
                animate: false,
            },
            None => {
                let fallback = self.default_viewport(viewport.width, viewport.height);
                CameraRequest::SetView { center: fallback.center, zoom: fallback.zoom, animate: false }
            }
        };

        let warning = if !assets.is_empty() && clusters.is_empty() {
            warn!("cycle {}: none of {} assets could be plotted", cycle, assets.len());
            Some(NOTHING_PLOTTED_WARNING.to_string())
        } else {
            None
        };

        info!(
            "cycle {}: {} assets, {} locations, {} markers, {} dropped",
            cycle,
            assets.len(),
            groups.len(),
            clusters.len(),
            seeded.dropped.len()
        );

        MapSession {
            cycle,
            assets,
            clusters,
            markers,
            dropped: seeded.dropped,
            camera,
            warning,
            viewport,
            popups,
            detail: DetailView::new(DetailSettings::from(&self.map), overview),
        }
    }
}

/// State of one loaded map: its clusters, markers and detail view.
pub struct MapSession {
    pub cycle: u64,
    pub assets: Vec<Asset>,
    pub clusters: Vec<Cluster>,
    pub markers: MarkerSet,
    /// Assets whose location never resolved.
    pub dropped: Vec<usize>,
    pub camera: CameraRequest,
    pub warning: Option<String>,
    viewport: Viewport,
    popups: Vec<String>,
    detail: DetailView,
}

#[derive(Serialize, Debug, Clone)]
pub struct OverlayPin {
    pub asset: usize,
    pub name: String,
    pub position: Coordinate,
    pub popup: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct OverlayView {
    #[serde(flatten)]
    pub overlay: DetailOverlay,
    pub pins: Vec<OverlayPin>,
}

#[derive(Serialize, Debug, Clone)]
pub struct DispatchOutcome {
    pub state: DetailState,
    pub effects: Vec<Effect>,
    pub overlay: Option<OverlayView>,
}

impl MapSession {
    pub fn state(&self) -> DetailState {
        self.detail.state()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn dropped_names(&self) -> Vec<String> {
        self.dropped.iter().map(|&i| self.assets[i].name.clone()).collect()
    }

    /// Routes a host event through the detail view. Map clicks landing on an
    /// open fan-out pin or on a marker count as a click on it; pins sit above
    /// markers.
    pub fn dispatch(&mut self, event: MapEvent, viewport: Option<Viewport>) -> DispatchOutcome {
        if let Some(vp) = viewport {
            self.viewport = vp;
        }
        let event = match event {
            MapEvent::MapClick { point } => {
                if let Some(asset) = self.pin_at(point) {
                    MapEvent::PinClick { asset }
                } else if let Some(cluster) = self.markers.hit_test(&self.viewport, point) {
                    MapEvent::MarkerClick { cluster }
                } else {
                    event
                }
            }
            MapEvent::ViewChanged { zoom, center } => {
                self.viewport = self.viewport.with_zoom(zoom);
                if let Some(center) = center {
                    self.viewport.center = center;
                }
                event
            }
            other => other,
        };

        let effects = self.detail.dispatch(event, &mut self.clusters, &self.viewport);
        for effect in &effects {
            match *effect {
                Effect::MarkExpanded { cluster } => self.markers.set_expanded(cluster, true),
                Effect::UnmarkExpanded { cluster } => self.markers.set_expanded(cluster, false),
                _ => {}
            }
        }

        DispatchOutcome { state: self.detail.state(), effects, overlay: self.overlay_view() }
    }

    fn pin_at(&self, point: ScreenPoint) -> Option<usize> {
        let overlay = self.detail.overlay()?;
        let radius = MARKER_DIAMETER_PX / 2.0;
        overlay
            .members
            .iter()
            .zip(&overlay.fan.positions)
            .map(|(&asset, &position)| (asset, self.viewport.project(position).distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(asset, _)| asset)
    }

    pub fn overlay_view(&self) -> Option<OverlayView> {
        let overlay = self.detail.overlay()?;
        let pins = overlay
            .members
            .iter()
            .zip(&overlay.fan.positions)
            .map(|(&asset, &position)| OverlayPin {
                asset,
                name: self.assets[asset].name.clone(),
                position,
                popup: self.popups[asset].clone(),
            })
            .collect();
        Some(OverlayView { overlay: overlay.clone(), pins })
    }
}
