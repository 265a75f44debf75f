//! geodex: filesystem geospatial asset indexer with a STAC-like catalog API
//!
//! Crawls directory trees for rasters and vector files, extracts their
//! spatial footprints, normalizes everything to EPSG:4326, and persists the
//! results to PostGIS. A read-only HTTP API exposes the catalog for
//! browsing and spatial search.

pub mod api;
pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod geom;
pub mod ident;
pub mod model;
pub mod store;
