//! GeoTIFF footprint extraction
//!
//! Reads georeferencing straight from TIFF tags, no GDAL involved:
//! ModelPixelScale + ModelTiepoint (or ModelTransformation) give the
//! native bounds, the GeoKey directory gives the EPSG code.

use super::extract::{ExtractOutcome, FootprintExtractor, SkipReason};
use super::Bbox;
use crate::error::Result;
use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::trace;

// GeoTIFF tag ids
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey ids
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_CS_TYPE: u32 = 3072;

/// "user-defined" sentinel in GeoKey values
const USER_DEFINED: u32 = 32767;

pub struct GeoTiffExtractor;

#[async_trait]
impl FootprintExtractor for GeoTiffExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractOutcome> {
        // Header-only reads on local files; no pixel data is touched.
        Ok(read_geotiff(path))
    }
}

fn read_geotiff(path: &Path) -> ExtractOutcome {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return ExtractOutcome::skip_unreadable(e),
    };
    let mut decoder = match Decoder::new(BufReader::new(file)) {
        Ok(d) => d,
        Err(e) => return ExtractOutcome::skip_unreadable(e),
    };
    let (width, height) = match decoder.dimensions() {
        Ok(dims) => dims,
        Err(e) => return ExtractOutcome::skip_unreadable(e),
    };

    let Some(epsg) = read_epsg(&mut decoder) else {
        return ExtractOutcome::Skipped(SkipReason::UnknownCrs);
    };
    let Some(native) = read_native_bounds(&mut decoder, width, height) else {
        return ExtractOutcome::Skipped(SkipReason::EmptySource);
    };
    trace!(?native, epsg, "geotiff georeferencing");

    super::extract::finalize_meta(native, epsg)
}

/// Native-CRS bounds from the georeferencing tags.
///
/// ModelTransformation wins when present; otherwise tiepoint + pixel scale.
/// Returns None when neither tag is usable.
fn read_native_bounds<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Option<Bbox> {
    let (w, h) = (f64::from(width), f64::from(height));

    if let Ok(Some(value)) = decoder.find_tag(Tag::Unknown(MODEL_TRANSFORMATION)) {
        if let Ok(t) = value.into_f64_vec() {
            if t.len() >= 16 {
                return bounds_from_transform(&t, w, h);
            }
        }
    }

    let scale = decoder
        .find_tag(Tag::Unknown(MODEL_PIXEL_SCALE))
        .ok()??
        .into_f64_vec()
        .ok()?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(MODEL_TIEPOINT))
        .ok()??
        .into_f64_vec()
        .ok()?;
    bounds_from_tiepoint(&scale, &tiepoint, w, h)
}

/// Bounds from a ModelTiepoint + ModelPixelScale pair.
///
/// The tiepoint maps raster (i, j) to model (x, y); the anchor may sit
/// anywhere in the raster, not just at the origin.
fn bounds_from_tiepoint(scale: &[f64], tiepoint: &[f64], w: f64, h: f64) -> Option<Bbox> {
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let (sx, sy) = (scale[0], scale[1]);
    let origin_x = tiepoint[3] - tiepoint[0] * sx;
    let origin_y = tiepoint[4] + tiepoint[1] * sy;

    Some(Bbox::new(
        origin_x,
        origin_y - h * sy,
        origin_x + w * sx,
        origin_y,
    ))
}

/// Bounds from a full 4x4 ModelTransformation matrix, mapping the four
/// raster corners and taking their envelope.
fn bounds_from_transform(t: &[f64], w: f64, h: f64) -> Option<Bbox> {
    let map = |col: f64, row: f64| {
        let x = t[0] * col + t[1] * row + t[3];
        let y = t[4] * col + t[5] * row + t[7];
        (x, y)
    };
    let corners = [map(0.0, 0.0), map(w, 0.0), map(0.0, h), map(w, h)];
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    Some(Bbox::new(min_x, min_y, max_x, max_y))
}

/// EPSG code from the GeoKey directory.
///
/// A projected CS key takes precedence over a geographic one. User-defined
/// (32767) and unset (0) codes are treated as absent.
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let raw = decoder
        .find_tag(Tag::Unknown(GEO_KEY_DIRECTORY))
        .ok()??
        .into_u32_vec()
        .ok()?;
    epsg_from_geokeys(&raw)
}

fn epsg_from_geokeys(dir: &[u32]) -> Option<u32> {
    // Directory header is 4 shorts, then 4 shorts per key entry:
    // key id, tag location, count, value/offset.
    if dir.len() < 4 {
        return None;
    }
    let num_keys = dir[3] as usize;
    let mut geographic = None;
    let mut projected = None;
    for i in 0..num_keys {
        let base = 4 + i * 4;
        if base + 3 >= dir.len() {
            break;
        }
        let (key_id, location, value) = (dir[base], dir[base + 1], dir[base + 3]);
        // Only inline SHORT values carry the code directly
        if location != 0 {
            continue;
        }
        match key_id {
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
            KEY_PROJECTED_CS_TYPE => projected = Some(value),
            _ => {}
        }
    }
    let code = projected.or(geographic)?;
    if code == 0 || code == USER_DEFINED {
        return None;
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokeys_projected_wins() {
        // header + two keys: GeographicType=4326, ProjectedCSType=32633
        let dir = [
            1, 1, 0, 2, //
            KEY_GEOGRAPHIC_TYPE, 0, 1, 4326, //
            KEY_PROJECTED_CS_TYPE, 0, 1, 32633,
        ];
        assert_eq!(epsg_from_geokeys(&dir), Some(32633));
    }

    #[test]
    fn test_geokeys_geographic_fallback() {
        let dir = [1, 1, 0, 1, KEY_GEOGRAPHIC_TYPE, 0, 1, 4326];
        assert_eq!(epsg_from_geokeys(&dir), Some(4326));
    }

    #[test]
    fn test_geokeys_user_defined_rejected() {
        let dir = [1, 1, 0, 1, KEY_PROJECTED_CS_TYPE, 0, 1, USER_DEFINED];
        assert_eq!(epsg_from_geokeys(&dir), None);
    }

    #[test]
    fn test_geokeys_empty_or_truncated() {
        assert_eq!(epsg_from_geokeys(&[]), None);
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 5, KEY_PROJECTED_CS_TYPE]), None);
    }

    #[test]
    fn test_bounds_from_tiepoint_and_scale() {
        // 100x50 raster, 10m pixels, top-left model corner (500000, 5760000)
        let scale = [10.0, 10.0, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, 500000.0, 5760000.0, 0.0];
        let b = bounds_from_tiepoint(&scale, &tiepoint, 100.0, 50.0).unwrap();
        assert_eq!(b.to_array(), [500000.0, 5759500.0, 501000.0, 5760000.0]);
    }

    #[test]
    fn test_bounds_from_off_origin_tiepoint() {
        // Anchor at raster (10, 20) instead of the corner
        let scale = [10.0, 10.0, 0.0];
        let tiepoint = [10.0, 20.0, 0.0, 500100.0, 5759800.0, 0.0];
        let b = bounds_from_tiepoint(&scale, &tiepoint, 100.0, 50.0).unwrap();
        assert_eq!(b.to_array(), [500000.0, 5759500.0, 501000.0, 5760000.0]);
    }

    #[test]
    fn test_bounds_rejects_short_tags() {
        assert!(bounds_from_tiepoint(&[10.0], &[0.0; 6], 10.0, 10.0).is_none());
        assert!(bounds_from_tiepoint(&[10.0, 10.0], &[0.0; 3], 10.0, 10.0).is_none());
    }

    #[test]
    fn test_bounds_from_transform_matrix() {
        // North-up affine: x = 10*col + 500000, y = -10*row + 5760000
        let mut t = [0.0; 16];
        t[0] = 10.0;
        t[3] = 500000.0;
        t[5] = -10.0;
        t[7] = 5760000.0;
        let b = bounds_from_transform(&t, 100.0, 50.0).unwrap();
        assert_eq!(b.to_array(), [500000.0, 5759500.0, 501000.0, 5760000.0]);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a tiff at all").unwrap();
        let outcome = read_geotiff(tmp.path());
        assert!(matches!(
            outcome,
            ExtractOutcome::Skipped(SkipReason::UnreadableSource(_))
        ));
    }
}
