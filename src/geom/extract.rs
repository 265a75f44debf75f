//! Footprint extraction dispatch
//!
//! Maps a source file to its spatial metadata. Extraction failures on a
//! single file never abort a run: everything that cannot yield a footprint
//! becomes a [`SkipReason`] the caller can report.

use super::raster::GeoTiffExtractor;
use super::vector::{GeoJsonExtractor, GeoPackageExtractor, ShapefileExtractor};
use super::Bbox;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Recognized source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    GeoTiff,
    GeoJson,
    Shapefile,
    GeoPackage,
}

impl FileKind {
    /// Classify a path by extension, case-insensitively.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tif" | "tiff" => Some(Self::GeoTiff),
            "geojson" => Some(Self::GeoJson),
            "shp" => Some(Self::Shapefile),
            "gpkg" => Some(Self::GeoPackage),
            _ => None,
        }
    }

    /// Media type recorded on the item's data asset.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::GeoTiff => "image/tiff; application=geotiff",
            Self::GeoJson => "application/geo+json",
            Self::Shapefile => "application/vnd.shp",
            Self::GeoPackage => "application/geopackage+sqlite3",
        }
    }
}

/// Spatial metadata extracted from one source file
#[derive(Debug, Clone)]
pub struct SpatialMeta {
    /// Envelope in EPSG:4326
    pub bbox: Bbox,
    /// Native CRS the source declared, when it declared one
    pub native_epsg: Option<u32>,
}

/// Why a file produced no catalog record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No CRS declaration, or a user-defined one we cannot resolve
    UnknownCrs,
    /// The source declares no features / no georeferencing
    EmptySource,
    /// The file could not be parsed as its format
    UnreadableSource(String),
    /// Georeferencing present but degenerate or non-finite
    InvalidBounds,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCrs => write!(f, "unknown or user-defined CRS"),
            Self::EmptySource => write!(f, "no spatial content"),
            Self::UnreadableSource(msg) => write!(f, "unreadable: {msg}"),
            Self::InvalidBounds => write!(f, "degenerate bounds"),
        }
    }
}

/// Result of attempting extraction on one file
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    Extracted(SpatialMeta),
    Skipped(SkipReason),
}

impl ExtractOutcome {
    pub fn skip_unreadable(err: impl std::fmt::Display) -> Self {
        Self::Skipped(SkipReason::UnreadableSource(err.to_string()))
    }
}

/// A format-specific footprint reader.
///
/// Implementations fold their own parse failures into
/// [`SkipReason::UnreadableSource`]; the `Result` layer is reserved for
/// environment failures (I/O on the database, not on the file itself).
#[async_trait]
pub trait FootprintExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractOutcome>;
}

/// Extract the footprint of a file, dispatching on its detected kind.
///
/// Returns `None` for files whose extension is not a recognized format.
pub async fn extract_footprint(path: &Path) -> Result<Option<(FileKind, ExtractOutcome)>> {
    let Some(kind) = FileKind::detect(path) else {
        return Ok(None);
    };
    let outcome = match kind {
        FileKind::GeoTiff => GeoTiffExtractor.extract(path).await?,
        FileKind::GeoJson => GeoJsonExtractor.extract(path).await?,
        FileKind::Shapefile => ShapefileExtractor.extract(path).await?,
        FileKind::GeoPackage => GeoPackageExtractor.extract(path).await?,
    };
    Ok(Some((kind, outcome)))
}

/// Normalize native bounds into catalog metadata.
///
/// Reprojects to EPSG:4326 when needed and validates the result. Shared by
/// every extractor once it has native bounds and a CRS in hand.
pub fn finalize_meta(native: Bbox, native_epsg: u32) -> ExtractOutcome {
    if !native.is_valid() {
        return ExtractOutcome::Skipped(SkipReason::InvalidBounds);
    }
    let geo = if native_epsg == super::TARGET_EPSG {
        native
    } else {
        match super::transform_bounds(native_epsg, super::TARGET_EPSG, native) {
            Ok(b) => b,
            Err(_) => return ExtractOutcome::Skipped(SkipReason::InvalidBounds),
        }
    };
    if !geo.is_valid() {
        return ExtractOutcome::Skipped(SkipReason::InvalidBounds);
    }
    ExtractOutcome::Extracted(SpatialMeta {
        bbox: geo,
        native_epsg: Some(native_epsg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_detection() {
        assert_eq!(
            FileKind::detect(&PathBuf::from("/x/a.TIF")),
            Some(FileKind::GeoTiff)
        );
        assert_eq!(
            FileKind::detect(&PathBuf::from("/x/b.geojson")),
            Some(FileKind::GeoJson)
        );
        assert_eq!(
            FileKind::detect(&PathBuf::from("/x/c.shp")),
            Some(FileKind::Shapefile)
        );
        assert_eq!(
            FileKind::detect(&PathBuf::from("/x/d.gpkg")),
            Some(FileKind::GeoPackage)
        );
        assert_eq!(FileKind::detect(&PathBuf::from("/x/notes.txt")), None);
        assert_eq!(FileKind::detect(&PathBuf::from("/x/noext")), None);
        // plain .json is not a spatial format, whatever it contains
        assert_eq!(FileKind::detect(&PathBuf::from("/x/config.json")), None);
        assert_eq!(FileKind::detect(&PathBuf::from("/x/tiles.JSON")), None);
    }

    #[test]
    fn test_media_types() {
        assert_eq!(FileKind::GeoTiff.media_type(), "image/tiff; application=geotiff");
        assert_eq!(FileKind::GeoPackage.media_type(), "application/geopackage+sqlite3");
    }

    #[test]
    fn test_finalize_rejects_degenerate() {
        let out = finalize_meta(Bbox::new(5.0, 5.0, 5.0, 5.0), 4326);
        assert!(matches!(
            out,
            ExtractOutcome::Skipped(SkipReason::InvalidBounds)
        ));
    }

    #[test]
    fn test_finalize_passthrough_4326() {
        let out = finalize_meta(Bbox::new(-1.0, -1.0, 1.0, 1.0), 4326);
        let ExtractOutcome::Extracted(meta) = out else {
            panic!("expected extraction");
        };
        assert_eq!(meta.bbox.to_array(), [-1.0, -1.0, 1.0, 1.0]);
        assert_eq!(meta.native_epsg, Some(4326));
    }

    #[test]
    fn test_finalize_reprojects_utm() {
        let native = Bbox::new(495000.0, 5755000.0, 505000.0, 5765000.0);
        let ExtractOutcome::Extracted(meta) = finalize_meta(native, 32633) else {
            panic!("expected extraction");
        };
        assert!(meta.bbox.min_x > 14.0 && meta.bbox.max_x < 16.0);
        assert_eq!(meta.native_epsg, Some(32633));
    }
}
