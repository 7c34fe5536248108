use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;
use url::Url;

use crate::config::GeocoderConfig;
use crate::models::Coordinate;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("lookup timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Single-result place-name search.
pub trait Geocoder: Send + Sync + 'static {
    fn lookup(&self, query: &str) -> impl Future<Output = Result<Option<Coordinate>, LookupError>> + Send;
}

impl<T: Geocoder> Geocoder for std::sync::Arc<T> {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>, LookupError> {
        self.as_ref().lookup(query).await
    }
}

#[derive(Deserialize)]
struct Candidate {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: Url,
    accept_language: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(&config.url)?,
            accept_language: config.accept_language.clone(),
        })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("q", query)
            .append_pair("limit", "1");
        url
    }
}

impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>, LookupError> {
        let resp = self
            .client
            .get(self.search_url(query))
            .header("Accept-Language", &self.accept_language)
            .send()
            .await
            .map_err(classify)?;

        if !resp.status().is_success() {
            return Err(LookupError::Status(resp.status().as_u16()));
        }

        let body = resp.text().await.map_err(classify)?;
        parse_candidates(&body)
    }
}

fn classify(e: reqwest::Error) -> LookupError {
    if e.is_timeout() { LookupError::Timeout } else { LookupError::Http(e) }
}

/// Only the first candidate counts.
fn parse_candidates(body: &str) -> Result<Option<Coordinate>, LookupError> {
    let candidates: Vec<Candidate> =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;
    let Some(first) = candidates.into_iter().next() else {
        return Ok(None);
    };
    let lat = first.lat.trim().parse::<f64>().map_err(|e| LookupError::Malformed(format!("lat: {e}")))?;
    let lon = first.lon.trim().parse::<f64>().map_err(|e| LookupError::Malformed(format!("lon: {e}")))?;
    if !lat.is_finite() || !lon.is_finite() {
        return Err(LookupError::Malformed("non-finite coordinate".to_string()));
    }
    Ok(Some(Coordinate::new(lat, lon)))
}
