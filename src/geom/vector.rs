//! Vector footprint extraction: GeoJSON, Shapefile, GeoPackage
//!
//! Each extractor reads only enough of the source to recover an envelope
//! and a CRS. GeoJSON is EPSG:4326 by definition (RFC 7946); shapefiles
//! declare their CRS in a sibling `.prj`; GeoPackages carry theirs in
//! `gpkg_spatial_ref_sys`.

use super::extract::{finalize_meta, ExtractOutcome, FootprintExtractor, SkipReason, SpatialMeta};
use super::{Bbox, TARGET_EPSG};
use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::trace;

// ===== GeoJSON =====

pub struct GeoJsonExtractor;

#[async_trait]
impl FootprintExtractor for GeoJsonExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractOutcome> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return Ok(ExtractOutcome::skip_unreadable(e)),
        };
        let parsed: geojson::GeoJson = match content.parse() {
            Ok(g) => g,
            Err(e) => return Ok(ExtractOutcome::skip_unreadable(e)),
        };
        let Some(bbox) = geojson_bbox(&parsed) else {
            return Ok(ExtractOutcome::Skipped(SkipReason::EmptySource));
        };
        Ok(finalize_meta(bbox, TARGET_EPSG))
    }
}

/// Envelope of every position in a GeoJSON document.
fn geojson_bbox(gj: &geojson::GeoJson) -> Option<Bbox> {
    let mut acc: Option<Bbox> = None;
    match gj {
        geojson::GeoJson::Geometry(g) => fold_geometry(g, &mut acc),
        geojson::GeoJson::Feature(f) => {
            if let Some(g) = &f.geometry {
                fold_geometry(g, &mut acc);
            }
        }
        geojson::GeoJson::FeatureCollection(fc) => {
            for f in &fc.features {
                if let Some(g) = &f.geometry {
                    fold_geometry(g, &mut acc);
                }
            }
        }
    }
    acc
}

fn fold_geometry(g: &geojson::Geometry, acc: &mut Option<Bbox>) {
    use geojson::Value;
    match &g.value {
        Value::Point(p) => fold_position(p, acc),
        Value::MultiPoint(ps) | Value::LineString(ps) => {
            ps.iter().for_each(|p| fold_position(p, acc))
        }
        Value::MultiLineString(ls) | Value::Polygon(ls) => ls
            .iter()
            .flatten()
            .for_each(|p| fold_position(p, acc)),
        Value::MultiPolygon(polys) => polys
            .iter()
            .flatten()
            .flatten()
            .for_each(|p| fold_position(p, acc)),
        Value::GeometryCollection(gs) => gs.iter().for_each(|g| fold_geometry(g, acc)),
    }
}

fn fold_position(pos: &[f64], acc: &mut Option<Bbox>) {
    if pos.len() < 2 {
        return;
    }
    let (x, y) = (pos[0], pos[1]);
    let point = Bbox::new(x, y, x, y);
    *acc = Some(match acc {
        Some(b) => b.union(&point),
        None => point,
    });
}

// ===== Shapefile =====

/// Big-endian magic at offset 0 of every `.shp`
const SHP_FILE_CODE: i32 = 9994;
/// Offset of the LE bbox doubles in the 100-byte header
const SHP_BBOX_OFFSET: usize = 36;
/// Shape type 0 means a null-shape file
const SHP_NULL_TYPE: i32 = 0;

pub struct ShapefileExtractor;

#[async_trait]
impl FootprintExtractor for ShapefileExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractOutcome> {
        // Only the fixed 100-byte header is needed
        let mut header = [0u8; 100];
        let read_result = std::fs::File::open(path)
            .and_then(|mut f| std::io::Read::read_exact(&mut f, &mut header));
        if let Err(e) = read_result {
            return Ok(ExtractOutcome::skip_unreadable(e));
        }
        let (shape_type, bbox) = match parse_shp_header(&header) {
            Ok(parsed) => parsed,
            Err(msg) => return Ok(ExtractOutcome::skip_unreadable(msg)),
        };
        if shape_type == SHP_NULL_TYPE {
            return Ok(ExtractOutcome::Skipped(SkipReason::EmptySource));
        }
        let Some(epsg) = read_prj_epsg(path) else {
            return Ok(ExtractOutcome::Skipped(SkipReason::UnknownCrs));
        };
        trace!(epsg, ?bbox, path = %path.display(), "shapefile header");
        Ok(finalize_meta(bbox, epsg))
    }
}

/// Parse the fixed 100-byte shapefile header: shape type and bbox.
fn parse_shp_header(bytes: &[u8]) -> std::result::Result<(i32, Bbox), String> {
    if bytes.len() < 100 {
        return Err(format!("truncated header ({} bytes)", bytes.len()));
    }
    let file_code = i32::from_be_bytes(bytes[0..4].try_into().map_err(|_| "short read")?);
    if file_code != SHP_FILE_CODE {
        return Err(format!("bad file code {file_code}"));
    }
    let shape_type = i32::from_le_bytes(bytes[32..36].try_into().map_err(|_| "short read")?);
    let mut coords = [0.0f64; 4];
    for (i, c) in coords.iter_mut().enumerate() {
        let start = SHP_BBOX_OFFSET + i * 8;
        *c = f64::from_le_bytes(bytes[start..start + 8].try_into().map_err(|_| "short read")?);
    }
    Ok((
        shape_type,
        Bbox::new(coords[0], coords[1], coords[2], coords[3]),
    ))
}

/// EPSG code from the sibling `.prj` WKT.
///
/// WKT nests AUTHORITY clauses for datum and units; the last one names the
/// coordinate system itself.
fn read_prj_epsg(shp_path: &Path) -> Option<u32> {
    static AUTHORITY: OnceLock<Regex> = OnceLock::new();
    let re = AUTHORITY.get_or_init(|| {
        Regex::new(r#"AUTHORITY\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#)
            .unwrap_or_else(|e| panic!("authority regex: {e}"))
    });

    let prj_path = shp_path.with_extension("prj");
    let wkt = std::fs::read_to_string(prj_path).ok()?;
    re.captures_iter(&wkt)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ===== GeoPackage =====

pub struct GeoPackageExtractor;

#[async_trait]
impl FootprintExtractor for GeoPackageExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractOutcome> {
        match read_gpkg(path).await {
            Ok(outcome) => Ok(outcome),
            // A broken or non-gpkg sqlite file is a per-file problem
            Err(e) => Ok(ExtractOutcome::skip_unreadable(e)),
        }
    }
}

/// Union the declared extents of every feature/tile table, reprojecting
/// each to EPSG:4326 before merging since tables may differ in CRS.
async fn read_gpkg(path: &Path) -> sqlx::Result<ExtractOutcome> {
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Row};

    let opts = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .immutable(true);
    let mut conn = opts.connect().await?;

    let rows = sqlx::query(
        r#"
        SELECT c.min_x, c.min_y, c.max_x, c.max_y,
               s.organization, s.organization_coordsys_id
        FROM gpkg_contents c
        JOIN gpkg_spatial_ref_sys s ON s.srs_id = c.srs_id
        WHERE c.data_type IN ('features', 'tiles')
        "#,
    )
    .fetch_all(&mut conn)
    .await?;

    if rows.is_empty() {
        return Ok(ExtractOutcome::Skipped(SkipReason::EmptySource));
    }

    let mut merged: Option<Bbox> = None;
    let mut native_epsg = None;
    let mut saw_unknown_crs = false;
    for row in &rows {
        let min_x: Option<f64> = row.try_get("min_x")?;
        let min_y: Option<f64> = row.try_get("min_y")?;
        let max_x: Option<f64> = row.try_get("max_x")?;
        let max_y: Option<f64> = row.try_get("max_y")?;
        let (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) = (min_x, min_y, max_x, max_y)
        else {
            continue;
        };
        let org: String = row.try_get("organization")?;
        let code: i64 = row.try_get("organization_coordsys_id")?;
        if !org.eq_ignore_ascii_case("EPSG") || code <= 0 {
            saw_unknown_crs = true;
            continue;
        }
        let epsg = code as u32;

        let native = Bbox::new(min_x, min_y, max_x, max_y);
        if !native.is_valid() {
            continue;
        }
        let geo = if epsg == TARGET_EPSG {
            native
        } else {
            match super::transform_bounds(epsg, TARGET_EPSG, native) {
                Ok(b) => b,
                Err(_) => continue,
            }
        };
        merged = Some(match merged {
            Some(b) => b.union(&geo),
            None => geo,
        });
        native_epsg.get_or_insert(epsg);
    }

    match (merged, native_epsg) {
        (Some(bbox), Some(epsg)) if bbox.is_valid() => {
            // bbox is already in 4326; keep the first native CRS seen
            Ok(ExtractOutcome::Extracted(SpatialMeta {
                bbox,
                native_epsg: Some(epsg),
            }))
        }
        (Some(_), Some(_)) => Ok(ExtractOutcome::Skipped(SkipReason::InvalidBounds)),
        _ if saw_unknown_crs => Ok(ExtractOutcome::Skipped(SkipReason::UnknownCrs)),
        _ => Ok(ExtractOutcome::Skipped(SkipReason::EmptySource)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shp_header(file_code: i32, shape_type: i32, bbox: [f64; 4]) -> Vec<u8> {
        let mut bytes = vec![0u8; 100];
        bytes[0..4].copy_from_slice(&file_code.to_be_bytes());
        bytes[32..36].copy_from_slice(&shape_type.to_le_bytes());
        for (i, c) in bbox.iter().enumerate() {
            let start = SHP_BBOX_OFFSET + i * 8;
            bytes[start..start + 8].copy_from_slice(&c.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_shp_header_parses() {
        let bytes = shp_header(SHP_FILE_CODE, 5, [1.0, 2.0, 3.0, 4.0]);
        let (shape_type, bbox) = parse_shp_header(&bytes).unwrap();
        assert_eq!(shape_type, 5);
        assert_eq!(bbox.to_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_shp_header_rejects_bad_magic() {
        let bytes = shp_header(1234, 5, [0.0; 4]);
        assert!(parse_shp_header(&bytes).is_err());
    }

    #[test]
    fn test_shp_header_rejects_truncated() {
        assert!(parse_shp_header(&[0u8; 50]).is_err());
    }

    #[test]
    fn test_prj_epsg_last_authority_wins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let shp = tmp.path().join("roads.shp");
        let wkt = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],AUTHORITY["EPSG","4326"]],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","32633"]]"#;
        std::fs::write(tmp.path().join("roads.prj"), wkt).unwrap();
        assert_eq!(read_prj_epsg(&shp), Some(32633));
    }

    #[test]
    fn test_prj_missing_means_unknown() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(read_prj_epsg(&tmp.path().join("lonely.shp")), None);
    }

    #[test]
    fn test_geojson_bbox_feature_collection() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [10.0, 50.0]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString",
                              "coordinates": [[-5.0, 40.0], [12.0, 55.0]]}}
            ]
        }"#;
        let gj: geojson::GeoJson = doc.parse().unwrap();
        let bbox = geojson_bbox(&gj).unwrap();
        assert_eq!(bbox.to_array(), [-5.0, 40.0, 12.0, 55.0]);
    }

    #[test]
    fn test_geojson_bbox_multipolygon() {
        let doc = r#"{
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [7.0, 5.0], [7.0, 8.0], [5.0, 5.0]]]
            ]
        }"#;
        let gj: geojson::GeoJson = doc.parse().unwrap();
        let bbox = geojson_bbox(&gj).unwrap();
        assert_eq!(bbox.to_array(), [0.0, 0.0, 7.0, 8.0]);
    }

    #[test]
    fn test_geojson_empty_collection_has_no_bbox() {
        let gj: geojson::GeoJson = r#"{"type": "FeatureCollection", "features": []}"#
            .parse()
            .unwrap();
        assert!(geojson_bbox(&gj).is_none());
    }
}
