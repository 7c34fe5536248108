use serde::Serialize;
use tracing::{debug, warn};

use crate::clustering::{Cluster, ClusterId, MARKER_DIAMETER_PX};
use crate::models::{Asset, Coordinate, ScreenPoint, Viewport};
use crate::template_engine::TemplateEngine;

const CLUSTER_CLASS: &str = "asset-cluster";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MarkerIcon {
    pub class_name: String,
    pub size: (f64, f64),
    pub anchor: (f64, f64),
}

#[derive(Serialize, Debug, Clone)]
pub struct Marker {
    pub cluster: ClusterId,
    pub position: Coordinate,
    pub count: usize,
    /// Numeric badge, multi-asset clusters only.
    pub badge: Option<String>,
    /// None means the host's default pin.
    pub icon: Option<MarkerIcon>,
    pub large: bool,
    pub expanded: bool,
    pub popup: Option<String>,
    pub tooltip: Option<String>,
}

impl Marker {
    pub fn is_cluster(&self) -> bool {
        self.count > 1
    }
}

/// All markers for one render cycle.
#[derive(Serialize, Debug, Clone, Default)]
pub struct MarkerSet {
    pub markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn get(&self, id: ClusterId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.cluster == id)
    }

    pub fn set_expanded(&mut self, id: ClusterId, expanded: bool) {
        if let Some(marker) = self.markers.iter_mut().find(|m| m.cluster == id) {
            marker.expanded = expanded;
            if let Some(icon) = marker.icon.as_mut() {
                icon.class_name = icon_class(marker.large, expanded);
            }
        }
    }

    /// Marker under `point`, nearest first.
    pub fn hit_test(&self, viewport: &Viewport, point: ScreenPoint) -> Option<ClusterId> {
        let radius = MARKER_DIAMETER_PX / 2.0;
        self.markers
            .iter()
            .map(|m| (m.cluster, viewport.project(m.position).distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

fn icon_class(large: bool, expanded: bool) -> String {
    let mut class = CLUSTER_CLASS.to_string();
    if large {
        class.push_str(" asset-cluster--large");
    }
    if expanded {
        class.push_str(" asset-cluster--expanded");
    }
    class
}

pub struct ClusterRenderer<'a> {
    templates: &'a TemplateEngine,
    large_threshold: usize,
}

impl<'a> ClusterRenderer<'a> {
    pub fn new(templates: &'a TemplateEngine, large_threshold: usize) -> Self {
        Self { templates, large_threshold }
    }

    /// Builds the full marker set from scratch.
    pub fn render(&self, clusters: &[Cluster], assets: &[Asset]) -> MarkerSet {
        let markers = clusters
            .iter()
            .map(|cluster| self.marker(cluster, assets))
            .collect::<Vec<_>>();
        debug!("rendered {} markers", markers.len());
        MarkerSet { markers }
    }

    fn marker(&self, cluster: &Cluster, assets: &[Asset]) -> Marker {
        let count = cluster.len();
        if count <= 1 {
            let popup = cluster.members.first().map(|&i| self.popup(&assets[i]));
            return Marker {
                cluster: cluster.id,
                position: cluster.coords,
                count,
                badge: None,
                icon: None,
                large: false,
                expanded: false,
                popup,
                tooltip: None,
            };
        }

        let large = count >= self.large_threshold;
        let mut locations: Vec<String> = Vec::new();
        for &i in &cluster.members {
            let label = assets[i].location_label();
            if !locations.contains(&label) {
                locations.push(label);
            }
        }
        let tooltip = self.templates.tooltip(count, &locations).unwrap_or_else(|e| {
            warn!("tooltip render failed: {}", e);
            format!("{count} assets")
        });

        Marker {
            cluster: cluster.id,
            position: cluster.coords,
            count,
            badge: Some(count.to_string()),
            icon: Some(MarkerIcon {
                class_name: icon_class(large, false),
                size: (MARKER_DIAMETER_PX, MARKER_DIAMETER_PX),
                anchor: (MARKER_DIAMETER_PX / 2.0, MARKER_DIAMETER_PX / 2.0),
            }),
            large,
            expanded: false,
            popup: None,
            tooltip: Some(tooltip),
        }
    }

    pub fn popup(&self, asset: &Asset) -> String {
        self.templates.popup(asset).unwrap_or_else(|e| {
            warn!("popup render failed for {}: {}", asset.name, e);
            asset.name.clone()
        })
    }
}
