use sqlx::{SqlitePool, sqlite::{SqliteConnectOptions, SqlitePoolOptions}};
use std::collections::HashMap;
use std::path::Path;
use std::fs;
use std::str::FromStr;
use anyhow::Result;
use chrono::Utc;
use tracing::{info, debug, warn};

use crate::grouping::LocationKey;
use crate::models::Coordinate;

/// Append-only `LocationKey -> Coordinate` store.
///
/// Every row is mirrored in memory when the cache opens, so lookups never
/// touch the database. Writes go to memory first and are then persisted;
/// a failed persist only costs a repeat lookup next session.
pub struct CoordinateCache {
    pool: Option<SqlitePool>,
    entries: HashMap<String, Coordinate>,
}

impl CoordinateCache {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;
        let cache = Self::with_pool(pool).await?;
        info!("coordinate cache loaded {} entries from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Sqlite in-memory database; contents vanish with the process.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::with_pool(pool).await
    }

    /// No backing store at all.
    pub fn detached() -> Self {
        Self { pool: None, entries: HashMap::new() }
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS geocodes (
                key TEXT PRIMARY KEY,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                created_at INTEGER NOT NULL
            )"
        ).execute(&pool).await?;

        let rows: Vec<(String, f64, f64)> = sqlx::query_as("SELECT key, lat, lon FROM geocodes")
            .fetch_all(&pool)
            .await?;

        let entries = rows
            .into_iter()
            .map(|(key, lat, lon)| (key, Coordinate::new(lat, lon)))
            .collect();

        Ok(Self { pool: Some(pool), entries })
    }

    pub fn get(&self, key: &LocationKey) -> Option<Coordinate> {
        let hit = self.entries.get(key.as_str()).copied();
        if hit.is_some() {
            debug!("cache hit: {}", key);
        } else {
            debug!("cache miss: {}", key);
        }
        hit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existing entries are never replaced.
    pub async fn insert(&mut self, key: &LocationKey, coords: Coordinate) {
        if self.entries.contains_key(key.as_str()) {
            return;
        }
        self.entries.insert(key.as_str().to_string(), coords);

        let Some(pool) = &self.pool else { return };
        let result = sqlx::query(
            "INSERT OR IGNORE INTO geocodes (key, lat, lon, created_at) VALUES (?, ?, ?, ?)"
        )
        .bind(key.as_str())
        .bind(coords.lat)
        .bind(coords.lon)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await;

        if let Err(e) = result {
            warn!("unable to persist cache entry {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get() {
        let mut cache = CoordinateCache::in_memory().await.unwrap();
        let key = LocationKey::new("Austin", "TX");
        assert!(cache.get(&key).is_none());
        cache.insert(&key, Coordinate::new(30.27, -97.74)).await;
        assert_eq!(cache.get(&key), Some(Coordinate::new(30.27, -97.74)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn entries_are_never_replaced() {
        let mut cache = CoordinateCache::in_memory().await.unwrap();
        let key = LocationKey::new("Austin", "TX");
        cache.insert(&key, Coordinate::new(30.27, -97.74)).await;
        cache.insert(&key, Coordinate::new(0.0, 0.0)).await;
        assert_eq!(cache.get(&key), Some(Coordinate::new(30.27, -97.74)));
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("geocode.db");
        let key = LocationKey::new("Seattle", "WA");
        {
            let mut cache = CoordinateCache::open(&path).await.unwrap();
            cache.insert(&key, Coordinate::new(47.61, -122.33)).await;
        }
        let cache = CoordinateCache::open(&path).await.unwrap();
        assert_eq!(cache.get(&key), Some(Coordinate::new(47.61, -122.33)));
    }

    #[tokio::test]
    async fn detached_cache_still_serves_this_session() {
        let mut cache = CoordinateCache::detached();
        let key = LocationKey::new("Dallas", "TX");
        cache.insert(&key, Coordinate::new(32.78, -96.8)).await;
        assert_eq!(cache.get(&key), Some(Coordinate::new(32.78, -96.8)));
    }
}
