use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub listen_addr: String,
    pub thread_count: Option<usize>,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub map: MapConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GeocoderConfig {
    pub url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_ms: u64,
    pub min_delay_ms: u64,
    pub batch_size: usize,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: format!("assetmap/{}", env!("CARGO_PKG_VERSION")),
            accept_language: "en".to_string(),
            timeout_ms: 8000,
            min_delay_ms: 250,
            batch_size: 5,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

/// View and clustering knobs shared by the render cycle and the detail view.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MapConfig {
    pub default_center: (f64, f64),
    pub default_zoom: f64,
    pub large_cluster_threshold: usize,
    pub overview_padding: f64,
    pub max_zoom: f64,
    pub zoom_in_step: f64,
    pub coarsen_decimals: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: (39.5, -98.35),
            default_zoom: 4.0,
            large_cluster_threshold: 10,
            overview_padding: 0.2,
            max_zoom: 18.0,
            zoom_in_step: 2.0,
            coarsen_decimals: 3,
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/assets.json")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/cache/geocode.db")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("data/templates")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = if std::path::Path::new("assetmap.toml").exists() {
            "assetmap.toml"
        } else if std::path::Path::new("assetmap.example.toml").exists() {
            "assetmap.example.toml"
        } else {
            return Err(anyhow::anyhow!("Configuration file not found. Please create assetmap.toml or provide assetmap.example.toml."));
        };

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.geocoder.batch_size == 0 {
            return Err(anyhow::anyhow!("geocoder.batch_size must be at least 1"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::parse("listen_addr = \"127.0.0.1:3000\"").unwrap();
        assert_eq!(config.geocoder.batch_size, 5);
        assert_eq!(config.geocoder.min_delay(), Duration::from_millis(250));
        assert_eq!(config.map.large_cluster_threshold, 10);
        assert_eq!(config.map.default_center, (39.5, -98.35));
        assert_eq!(config.data_file, PathBuf::from("data/assets.json"));
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = Config::parse(
            "listen_addr = \"0.0.0.0:1\"\n[geocoder]\nmin_delay_ms = 1000\n[map]\ndefault_zoom = 6.0\n",
        )
        .unwrap();
        assert_eq!(config.geocoder.min_delay_ms, 1000);
        assert_eq!(config.geocoder.batch_size, 5);
        assert_eq!(config.map.default_zoom, 6.0);
        assert_eq!(config.map.max_zoom, 18.0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = Config::parse("listen_addr = \"x\"\n[geocoder]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}
