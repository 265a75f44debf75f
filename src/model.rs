//! Typed catalog records
//!
//! Explicit record types for the entities the store persists and the API
//! renders: collections, items, asset references, links, and extents.
//! Absence is an explicit `Option`, never a missing map key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema version stamped on every record
pub const STAC_VERSION: &str = "1.0.0";

/// Extension schema URI for items carrying `proj:epsg`
pub const PROJ_EXTENSION: &str = "https://stac-extensions.github.io/projection/v1.0.0/schema.json";

/// Extension schema URI for items carrying `file:size`
pub const FILE_EXTENSION: &str = "https://stac-extensions.github.io/file/v2.1.0/schema.json";

/// A navigational link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>, media_type: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.into(),
            media_type: Some(media_type.to_string()),
        }
    }
}

/// A non-owning asset reference embedded in an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Asset {
    /// The primary "data" asset pointing at the source file
    pub fn data(href: impl Into<String>, media_type: &str) -> Self {
        Self {
            href: href.into(),
            media_type: Some(media_type.to_string()),
            roles: vec!["data".to_string()],
        }
    }
}

/// Spatial + temporal extent of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub bbox: Vec<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub interval: Vec<[Option<String>; 2]>,
}

impl Extent {
    /// Assemble an extent from an aggregate result, applying the whole-world
    /// fallback when the collection has no items.
    pub fn from_aggregate(
        bbox: Option<[f64; 4]>,
        min_dt: Option<DateTime<Utc>>,
        max_dt: Option<DateTime<Utc>>,
    ) -> Self {
        let bbox = bbox.unwrap_or([-180.0, -90.0, 180.0, 90.0]);
        let fmt = |dt: DateTime<Utc>| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        Self {
            spatial: SpatialExtent { bbox: vec![bbox] },
            temporal: TemporalExtent {
                interval: vec![[min_dt.map(fmt), max_dt.map(fmt)]],
            },
        }
    }
}

/// A named grouping of items sharing provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stac_version: String,
    pub stac_extensions: Vec<String>,
    pub license: Option<String>,
    /// Cached extent; recomputed at read time when absent
    pub extent: Option<Extent>,
    pub links: Vec<Link>,
    /// Root location this collection was indexed from
    pub root_path: Option<String>,
}

impl Collection {
    pub fn new(id: &str, title: &str, description: &str, root_path: &str) -> Self {
        Self {
            id: id.to_string(),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            stac_version: STAC_VERSION.to_string(),
            stac_extensions: Vec::new(),
            license: Some("proprietary".to_string()),
            extent: None,
            links: Vec::new(),
            root_path: Some(root_path.to_string()),
        }
    }
}

/// One cataloged asset record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub collection_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stac_version: String,
    pub stac_extensions: Vec<String>,
    /// Capture/modification timestamp
    pub datetime: DateTime<Utc>,
    /// Footprint geometry as GeoJSON, always EPSG:4326
    pub geometry: Value,
    /// Envelope [minX, minY, maxX, maxY], EPSG:4326
    pub bbox: [f64; 4],
    /// Free-form properties, including provenance fields
    pub properties: Value,
    pub assets: BTreeMap<String, Asset>,
    pub links: Vec<Link>,
    /// Original source path, the natural key for deduplication
    pub source_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_whole_world_fallback() {
        let extent = Extent::from_aggregate(None, None, None);
        assert_eq!(extent.spatial.bbox, vec![[-180.0, -90.0, 180.0, 90.0]]);
        assert_eq!(extent.temporal.interval, vec![[None, None]]);
    }

    #[test]
    fn test_extent_from_aggregate() {
        let min = "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let max = "2021-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let extent = Extent::from_aggregate(Some([1.0, 2.0, 3.0, 4.0]), Some(min), Some(max));
        assert_eq!(extent.spatial.bbox, vec![[1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(
            extent.temporal.interval[0][0].as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_link_serializes_type_field() {
        let link = Link::new("self", "http://example.com/catalog", "application/json");
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["type"], "application/json");
        assert_eq!(json["rel"], "self");
    }
}
