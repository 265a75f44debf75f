//! Search filter translation
//!
//! Validated filter sets translated to parameterized SQL predicates. Every
//! value reaches the database as a bind parameter, never as spliced text.

use crate::error::{Error, Result};
use sqlx::{Postgres, QueryBuilder};

/// Default page size when a query names none
pub const DEFAULT_LIMIT: u32 = 100;
/// Upper bound a query may request
pub const MAX_LIMIT: u32 = 1000;

/// A validated item search filter
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Restrict to these collection ids; empty means all
    pub collections: Vec<String>,
    /// Exact match on the `year` property
    pub year: Option<String>,
    /// ILIKE pattern against the `region` property. The value is bound
    /// verbatim: a bare value is case-insensitive equality, and wildcards
    /// are the caller's to supply.
    pub region: Option<String>,
    /// Exact match on the `zone` property
    pub zone: Option<String>,
    /// Spatial intersection envelope [minX, minY, maxX, maxY], EPSG:4326
    pub bbox: Option<[f64; 4]>,
    pub limit: u32,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    /// Reject out-of-range limits and malformed envelopes. Out-of-range
    /// values are errors, not silently clamped.
    pub fn validate(&self) -> Result<()> {
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidQuery(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        if let Some(b) = self.bbox {
            if b.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidQuery("bbox values must be finite".into()));
            }
            if b[0] >= b[2] || b[1] >= b[3] {
                return Err(Error::InvalidQuery(format!(
                    "bbox must satisfy minX < maxX and minY < maxY, got {b:?}"
                )));
            }
        }
        Ok(())
    }

    /// Append WHERE predicates for this filter. The caller has already
    /// emitted the SELECT and a leading `WHERE TRUE`.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if !self.collections.is_empty() {
            qb.push(" AND collection_id = ANY(");
            qb.push_bind(self.collections.clone());
            qb.push(")");
        }
        if let Some(ref year) = self.year {
            qb.push(" AND properties->>'year' = ");
            qb.push_bind(year.clone());
        }
        if let Some(ref region) = self.region {
            qb.push(" AND properties->>'region' ILIKE ");
            qb.push_bind(region.clone());
        }
        if let Some(ref zone) = self.zone {
            qb.push(" AND properties->>'zone' = ");
            qb.push_bind(zone.clone());
        }
        if let Some(b) = self.bbox {
            qb.push(" AND ST_Intersects(geom, ST_MakeEnvelope(");
            qb.push_bind(b[0]);
            qb.push(", ");
            qb.push_bind(b[1]);
            qb.push(", ");
            qb.push_bind(b[2]);
            qb.push(", ");
            qb.push_bind(b[3]);
            qb.push(", 4326))");
        }
    }

    /// Build the full item query for this filter.
    pub fn build_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(
            "SELECT id, collection_id, title, description, datetime, \
             ST_AsGeoJSON(geom) AS geometry, bbox, properties, assets, \
             stac_extensions, source_path \
             FROM items WHERE TRUE",
        );
        self.push_predicates(&mut qb);
        qb.push(" ORDER BY id LIMIT ");
        qb.push_bind(i64::from(self.limit));
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        let f = ItemFilter::new();
        assert_eq!(f.limit, 100);
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_limit_bounds_rejected() {
        let mut f = ItemFilter::new();
        f.limit = 0;
        assert!(f.validate().is_err());
        f.limit = 1001;
        assert!(f.validate().is_err());
        f.limit = 1000;
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_bbox_validation() {
        let mut f = ItemFilter::new();
        f.bbox = Some([0.0, 0.0, 1.0, 1.0]);
        assert!(f.validate().is_ok());
        f.bbox = Some([1.0, 0.0, 0.0, 1.0]); // minX > maxX
        assert!(f.validate().is_err());
        f.bbox = Some([0.0, 0.0, 1.0, f64::NAN]);
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_unfiltered_query_shape() {
        let f = ItemFilter::new();
        let qb = f.build_query();
        let sql = qb.sql();
        assert!(sql.contains("FROM items WHERE TRUE"));
        assert!(sql.contains("ORDER BY id LIMIT"));
        assert!(!sql.contains("ILIKE"));
    }

    #[test]
    fn test_all_predicates_present() {
        let f = ItemFilter {
            collections: vec!["dem".to_string()],
            year: Some("2021".to_string()),
            region: Some("alps%".to_string()),
            zone: Some("33".to_string()),
            bbox: Some([5.0, 44.0, 15.0, 48.0]),
            limit: 50,
        };
        assert!(f.validate().is_ok());
        let qb = f.build_query();
        let sql = qb.sql();
        assert!(sql.contains("collection_id = ANY("));
        assert!(sql.contains("properties->>'year' ="));
        assert!(sql.contains("properties->>'region' ILIKE"));
        assert!(sql.contains("properties->>'zone' ="));
        assert!(sql.contains("ST_Intersects(geom, ST_MakeEnvelope("));
        // values travel as binds, not inline; the caller's region pattern
        // (wildcards included) is never rewritten or spliced
        assert!(!sql.contains("2021"));
        assert!(!sql.contains("alps"));
        assert!(!sql.contains('%'));
    }
}
