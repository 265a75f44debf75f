//! PostGIS catalog storage
//!
//! This module wraps the PostGIS connection pool and provides:
//! - Schema initialization
//! - Collection upsert and lookup
//! - Batched, deduplicated item inserts
//! - Filtered item queries and extent aggregation

mod schema;
pub mod query;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Asset, Collection, Extent, Item, STAC_VERSION};
use chrono::{DateTime, Utc};
use query::ItemFilter;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Catalog store handle
#[derive(Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

/// Per-collection item count for status reporting
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub collection_id: String,
    pub item_count: i64,
}

impl CatalogStore {
    /// Connect using config, initializing the schema on first contact.
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.database.url, config.database.max_connections).await
    }

    /// Connect directly with a URL.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        debug!("Connecting to catalog database");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self { pool };
        if !store.is_initialized().await? {
            store.init_schema().await?;
        }
        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing catalog schema");
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if the schema is present
    pub async fn is_initialized(&self) -> Result<bool> {
        let row: (Option<String>,) = sqlx::query_as("SELECT to_regclass('items')::text")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.is_some())
    }

    // ===== Collection Operations =====

    /// Create a collection if absent. An existing collection's metadata is
    /// never overwritten.
    pub async fn ensure_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, title, description, license, root_path)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&collection.id)
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.license)
        .bind(&collection.root_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, title, description, license, root_path FROM collections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_collection(&r)).transpose()
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT id, title, description, license, root_path FROM collections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_collection).collect()
    }

    pub async fn collection_exists(&self, id: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM collections WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Aggregate the spatial and temporal extent of a collection's items.
    ///
    /// Computed at read time from the live rows; an empty collection gets
    /// the whole-world envelope and an open interval.
    pub async fn collection_extent(&self, id: &str) -> Result<Extent> {
        let row = sqlx::query(
            r#"
            SELECT ST_Extent(geom)::text AS extent_box,
                   min(datetime) AS min_dt, max(datetime) AS max_dt
            FROM items WHERE collection_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let box_text: Option<String> = row.try_get("extent_box")?;
        let min_dt: Option<DateTime<Utc>> = row.try_get("min_dt")?;
        let max_dt: Option<DateTime<Utc>> = row.try_get("max_dt")?;
        let bbox = box_text.as_deref().and_then(parse_extent_box);
        Ok(Extent::from_aggregate(bbox, min_dt, max_dt))
    }

    // ===== Item Operations =====

    /// Which of these source paths are already cataloged.
    pub async fn existing_source_paths(&self, paths: &[String]) -> Result<HashSet<String>> {
        if paths.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT source_path FROM items WHERE source_path = ANY($1)")
                .bind(paths)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// Insert a batch of items in one transaction.
    ///
    /// Conflicting source paths are left untouched, so a concurrent run
    /// racing past the existence check cannot duplicate rows. The whole
    /// batch commits or none of it does.
    pub async fn insert_items(&self, items: &[Item]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for item in items {
            let assets = serde_json::to_value(&item.assets)?;
            let extensions = serde_json::to_value(&item.stac_extensions)?;
            let result = sqlx::query(
                r#"
                INSERT INTO items
                    (id, collection_id, title, description, datetime,
                     geom, bbox, properties, assets, stac_extensions, source_path)
                VALUES ($1, $2, $3, $4, $5,
                        ST_GeomFromText($6, 4326), $7, $8, $9, $10, $11)
                ON CONFLICT (source_path) DO NOTHING
                "#,
            )
            .bind(&item.id)
            .bind(&item.collection_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.datetime)
            .bind(item.geometry_wkt()?)
            .bind(&item.bbox[..])
            .bind(&item.properties)
            .bind(assets)
            .bind(extensions)
            .bind(&item.source_path)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        debug!("Committed batch of {} items ({} new)", items.len(), inserted);
        Ok(inserted)
    }

    /// Run a validated filter and return matching items, ordered by id.
    pub async fn query_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        filter.validate()?;
        let mut qb = filter.build_query();
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_item).collect()
    }

    pub async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<Option<Item>> {
        let row = sqlx::query(
            r#"
            SELECT id, collection_id, title, description, datetime,
                   ST_AsGeoJSON(geom) AS geometry, bbox, properties, assets,
                   stac_extensions, source_path
            FROM items WHERE collection_id = $1 AND id = $2
            "#,
        )
        .bind(collection_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_item(&r)).transpose()
    }

    /// Item counts per collection, for status output.
    pub async fn collection_stats(&self) -> Result<Vec<CollectionStats>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, count(i.id)
            FROM collections c LEFT JOIN items i ON i.collection_id = c.id
            GROUP BY c.id ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(collection_id, item_count)| CollectionStats {
                collection_id,
                item_count,
            })
            .collect())
    }
}

impl Item {
    /// The item's footprint as WKT, for ST_GeomFromText.
    fn geometry_wkt(&self) -> Result<String> {
        let coords = self.geometry["coordinates"][0]
            .as_array()
            .ok_or_else(|| Error::Other("item geometry is not a polygon".into()))?;
        let ring: Vec<String> = coords
            .iter()
            .filter_map(|p| {
                let x = p[0].as_f64()?;
                let y = p[1].as_f64()?;
                Some(format!("{x} {y}"))
            })
            .collect();
        if ring.len() != coords.len() || ring.len() < 4 {
            return Err(Error::Other("item geometry has a malformed ring".into()));
        }
        Ok(format!("POLYGON(({}))", ring.join(",")))
    }
}

/// Parse the `BOX(minx miny,maxx maxy)` text form of ST_Extent.
fn parse_extent_box(text: &str) -> Option<[f64; 4]> {
    static BOX_RE: OnceLock<Regex> = OnceLock::new();
    let re = BOX_RE.get_or_init(|| {
        Regex::new(r"BOX\(([^ ]+) ([^,]+),([^ ]+) ([^)]+)\)")
            .unwrap_or_else(|e| panic!("extent box regex: {e}"))
    });
    let caps = re.captures(text)?;
    let mut vals = [0.0f64; 4];
    for (i, v) in vals.iter_mut().enumerate() {
        *v = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    Some(vals)
}

fn row_to_collection(row: &PgRow) -> Result<Collection> {
    Ok(Collection {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        stac_version: STAC_VERSION.to_string(),
        stac_extensions: Vec::new(),
        license: row.try_get("license")?,
        extent: None,
        links: Vec::new(),
        root_path: row.try_get("root_path")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<Item> {
    let geometry_text: String = row.try_get("geometry")?;
    let geometry: serde_json::Value = serde_json::from_str(&geometry_text)?;
    let bbox_vec: Vec<f64> = row.try_get("bbox")?;
    let bbox: [f64; 4] = bbox_vec
        .try_into()
        .map_err(|v: Vec<f64>| Error::Other(format!("item bbox has {} elements", v.len())))?;
    let assets_json: serde_json::Value = row.try_get("assets")?;
    let assets: BTreeMap<String, Asset> = serde_json::from_value(assets_json)?;
    let extensions_json: serde_json::Value = row.try_get("stac_extensions")?;
    let stac_extensions: Vec<String> = serde_json::from_value(extensions_json)?;

    Ok(Item {
        id: row.try_get("id")?,
        collection_id: row.try_get("collection_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        stac_version: STAC_VERSION.to_string(),
        stac_extensions,
        datetime: row.try_get("datetime")?,
        geometry,
        bbox,
        properties: row.try_get("properties")?,
        assets,
        links: Vec::new(),
        source_path: row.try_get("source_path")?,
    })
}
