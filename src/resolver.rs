use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::coord_cache::CoordinateCache;
use crate::geocoder::{Geocoder, LookupError};
use crate::grouping::{LocationGroup, LocationKey};
use crate::models::Coordinate;

/// Minimum gap between external lookups, shared by every call that goes
/// through the owning resolver.
#[derive(Debug)]
pub struct LookupPacer {
    min_delay: Duration,
    last: Option<Instant>,
}

impl LookupPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self { min_delay, last: None }
    }

    /// Suspends until the next lookup slot, then claims it.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.min_delay).await;
        }
        self.last = Some(Instant::now());
    }
}

/// Cache-first `(city, state) -> Coordinate` resolution.
pub struct Resolver<G: Geocoder> {
    geocoder: Arc<G>,
    cache: CoordinateCache,
    pacer: LookupPacer,
    batch_size: usize,
    timeout: Duration,
}

impl<G: Geocoder> Resolver<G> {
    pub fn new(geocoder: G, cache: CoordinateCache, config: &GeocoderConfig) -> Self {
        Self {
            geocoder: Arc::new(geocoder),
            cache,
            pacer: LookupPacer::new(config.min_delay()),
            batch_size: config.batch_size.max(1),
            timeout: config.timeout(),
        }
    }

    pub fn cache(&self) -> &CoordinateCache {
        &self.cache
    }

    pub async fn resolve(&mut self, city: &str, state: &str) -> Option<Coordinate> {
        let (city, state) = (city.trim(), state.trim());
        if city.is_empty() || state.is_empty() {
            return None;
        }
        let key = LocationKey::new(city, state);
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }

        self.pacer.wait().await;
        let query = format!("{city}, {state}");
        let outcome = lookup_with_timeout(self.geocoder.as_ref(), &query, self.timeout).await;
        self.record(&key, &query, outcome).await
    }

    /// Resolves every group, one lookup per unique key. The result is aligned
    /// with `groups`.
    ///
    /// Cache hits are answered before anything suspends. Misses go out in
    /// parallel batches of `batch_size`, with the pacing delay between batches.
    pub async fn resolve_groups(&mut self, groups: &[LocationGroup]) -> Vec<Option<Coordinate>> {
        let mut resolved: Vec<Option<Coordinate>> = vec![None; groups.len()];
        let mut misses = Vec::new();

        for (slot, group) in groups.iter().enumerate() {
            if !group.is_resolvable() {
                debug!("skipping lookup for incomplete location '{}'", group.query());
                continue;
            }
            match self.cache.get(&group.key) {
                Some(hit) => resolved[slot] = Some(hit),
                None => misses.push(slot),
            }
        }

        for batch in misses.chunks(self.batch_size) {
            self.pacer.wait().await;

            let mut set = JoinSet::new();
            for &slot in batch {
                let geocoder = Arc::clone(&self.geocoder);
                let query = groups[slot].query();
                let timeout = self.timeout;
                set.spawn(async move {
                    let outcome = lookup_with_timeout(geocoder.as_ref(), &query, timeout).await;
                    (slot, outcome)
                });
            }

            let mut outcomes = Vec::with_capacity(batch.len());
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(done) => outcomes.push(done),
                    Err(e) => warn!("lookup task failed: {}", e),
                }
            }
            // completion order is arbitrary; cache writes follow resolution order
            outcomes.sort_by_key(|(slot, _)| *slot);
            for (slot, outcome) in outcomes {
                let group = &groups[slot];
                resolved[slot] = self.record(&group.key, &group.query(), outcome).await;
            }
        }

        resolved
    }

    async fn record(
        &mut self,
        key: &LocationKey,
        query: &str,
        outcome: Result<Option<Coordinate>, LookupError>,
    ) -> Option<Coordinate> {
        match outcome {
            Ok(Some(coords)) => {
                debug!("resolved '{}' to {},{}", query, coords.lat, coords.lon);
                self.cache.insert(key, coords).await;
                Some(coords)
            }
            Ok(None) => {
                warn!("no coordinates found for '{}'", query);
                None
            }
            Err(e) => {
                warn!("lookup failed for '{}': {}", query, e);
                None
            }
        }
    }
}

async fn lookup_with_timeout<G: Geocoder>(
    geocoder: &G,
    query: &str,
    timeout: Duration,
) -> Result<Option<Coordinate>, LookupError> {
    match tokio::time::timeout(timeout, geocoder.lookup(query)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LookupError::Timeout),
    }
}
