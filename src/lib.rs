//! Asset map engine: resolves asset locations through a paced, cached
//! geocoder, folds them into non-overlapping clusters for the current view,
//! and drives the fan-out detail view of a single expanded cluster.

pub mod clustering;
pub mod config;
pub mod coord_cache;
pub mod detail;
pub mod engine;
pub mod fanout;
pub mod geocoder;
pub mod grouping;
pub mod models;
pub mod projection;
pub mod renderer;
pub mod resolver;
pub mod store;
pub mod template_engine;
