//! Geometry and coordinate reference handling
//!
//! Footprint extraction, bounding boxes, and pure-Rust coordinate
//! transformation (proj4rs + crs-definitions). Everything the catalog
//! persists is normalized to EPSG:4326.

pub mod extract;
pub mod raster;
pub mod vector;

use crate::error::{Error, Result};

/// Sample points per rectangle edge when reprojecting bounds. Projected
/// edges curve in geographic space, so corners alone underestimate the
/// envelope.
const DENSIFY_PTS: usize = 21;

/// EPSG code everything is normalized to
pub const TARGET_EPSG: u32 = 4326;

/// An axis-aligned bounding box: [min_x, min_y, max_x, max_y]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bbox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// A degenerate or non-finite box carries no spatial information.
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// GeoJSON Polygon geometry for the box.
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[
                [self.min_x, self.min_y],
                [self.max_x, self.min_y],
                [self.max_x, self.max_y],
                [self.min_x, self.max_y],
                [self.min_x, self.min_y],
            ]]
        })
    }

    /// Grow to cover another box.
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Look up the PROJ4 string for an EPSG code.
pub fn proj_string(epsg: u32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Whether an EPSG code names a geographic (lon/lat) CRS.
pub fn is_geographic_crs(epsg: u32) -> bool {
    match proj_string(epsg) {
        Some(s) => s.contains("+proj=longlat"),
        None => epsg == 4326 || (4000..5000).contains(&epsg),
    }
}

/// Project a single point between two EPSG codes.
///
/// proj4rs works in radians for geographic coordinates; degrees are
/// converted on the way in and out.
pub fn project_point(source_epsg: u32, target_epsg: u32, x: f64, y: f64) -> Result<(f64, f64)> {
    use proj4rs::proj::Proj;
    use proj4rs::transform::transform;

    if source_epsg == target_epsg {
        return Ok((x, y));
    }

    let source_str = proj_string(source_epsg).ok_or_else(|| {
        Error::Projection(format!("EPSG:{source_epsg} is not a known CRS definition"))
    })?;
    let target_str = proj_string(target_epsg).ok_or_else(|| {
        Error::Projection(format!("EPSG:{target_epsg} is not a known CRS definition"))
    })?;

    let source_proj = Proj::from_proj_string(source_str)
        .map_err(|e| Error::Projection(format!("invalid source EPSG:{source_epsg}: {e:?}")))?;
    let target_proj = Proj::from_proj_string(target_str)
        .map_err(|e| Error::Projection(format!("invalid target EPSG:{target_epsg}: {e:?}")))?;

    let (x_in, y_in) = if is_geographic_crs(source_epsg) {
        (x.to_radians(), y.to_radians())
    } else {
        (x, y)
    };

    let mut point = (x_in, y_in, 0.0);
    transform(&source_proj, &target_proj, &mut point).map_err(|e| {
        Error::Projection(format!(
            "transform EPSG:{source_epsg} -> EPSG:{target_epsg} failed: {e:?}"
        ))
    })?;

    if is_geographic_crs(target_epsg) {
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    } else {
        Ok((point.0, point.1))
    }
}

/// Reproject a bounding box, densifying each edge before transforming.
///
/// Walks [`DENSIFY_PTS`] samples along every edge of the rectangle,
/// projects each sample, and takes the envelope of the results. Samples
/// that fall outside the projection's valid area are dropped; the box is
/// rejected only if no sample survives or the envelope degenerates.
pub fn transform_bounds(source_epsg: u32, target_epsg: u32, bounds: Bbox) -> Result<Bbox> {
    if source_epsg == target_epsg {
        return Ok(bounds);
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut projected_any = false;

    for (sx, sy) in edge_samples(&bounds) {
        let Ok((px, py)) = project_point(source_epsg, target_epsg, sx, sy) else {
            continue;
        };
        if !px.is_finite() || !py.is_finite() {
            continue;
        }
        min_x = min_x.min(px);
        min_y = min_y.min(py);
        max_x = max_x.max(px);
        max_y = max_y.max(py);
        projected_any = true;
    }

    if !projected_any {
        return Err(Error::Projection(format!(
            "no point of bounds {bounds:?} is transformable from EPSG:{source_epsg} to EPSG:{target_epsg}"
        )));
    }

    let out = Bbox::new(min_x, min_y, max_x, max_y);
    if !out.is_valid() {
        return Err(Error::Projection(format!(
            "bounds {bounds:?} collapse under transform from EPSG:{source_epsg}"
        )));
    }
    Ok(out)
}

/// Sample points along the four edges of a rectangle.
fn edge_samples(b: &Bbox) -> Vec<(f64, f64)> {
    let n = DENSIFY_PTS;
    let mut pts = Vec::with_capacity(4 * n);
    for i in 0..n {
        let t = i as f64 / (n - 1) as f64;
        let x = b.min_x + t * (b.max_x - b.min_x);
        let y = b.min_y + t * (b.max_y - b.min_y);
        pts.push((x, b.min_y)); // bottom
        pts.push((x, b.max_y)); // top
        pts.push((b.min_x, y)); // left
        pts.push((b.max_x, y)); // right
    }
    pts
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_bbox_validity() {
        assert!(Bbox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bbox::new(1.0, 0.0, 1.0, 1.0).is_valid()); // zero width
        assert!(!Bbox::new(2.0, 0.0, 1.0, 1.0).is_valid()); // inverted
        assert!(!Bbox::new(f64::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_bbox_geojson_ring() {
        let gj = Bbox::new(0.0, 0.0, 1.0, 1.0).to_geojson();
        assert_eq!(gj["type"], "Polygon");
        let ring = gj["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_bbox_union() {
        let a = Bbox::new(0.0, 0.0, 2.0, 2.0);
        let b = Bbox::new(1.0, -1.0, 3.0, 1.0);
        let u = a.union(&b);
        assert_eq!(u.to_array(), [0.0, -1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_project_point_same_crs() {
        let (x, y) = project_point(4326, 4326, 10.0, 51.5).unwrap();
        assert!(approx_eq(x, 10.0));
        assert!(approx_eq(y, 51.5));
    }

    #[test]
    fn test_project_point_utm_to_wgs84() {
        // EPSG:32633 is UTM zone 33N; zone center is 15E
        let (lon, lat) = project_point(32633, 4326, 500000.0, 5760000.0).unwrap();
        assert!((lon - 15.0).abs() < 0.01, "lon: {lon}");
        assert!(lat > 51.0 && lat < 53.0, "lat: {lat}");
    }

    #[test]
    fn test_project_point_roundtrip_utm() {
        let (x, y) = project_point(4326, 32633, 15.0, 52.0).unwrap();
        let (lon, lat) = project_point(32633, 4326, x, y).unwrap();
        assert!((lon - 15.0).abs() < 1e-5);
        assert!((lat - 52.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_epsg_rejected() {
        assert!(project_point(4326, 999_999, 0.0, 0.0).is_err());
        assert!(proj_string(999_999).is_none());
    }

    #[test]
    fn test_is_geographic_crs() {
        assert!(is_geographic_crs(4326));
        assert!(!is_geographic_crs(3857));
        assert!(!is_geographic_crs(32633));
    }

    #[test]
    fn test_transform_bounds_utm_tile() {
        // A 10km UTM tile near the zone 33N center
        let native = Bbox::new(495000.0, 5755000.0, 505000.0, 5765000.0);
        let geo = transform_bounds(32633, 4326, native).unwrap();
        assert!(geo.is_valid());
        assert!(geo.min_x > 14.8 && geo.max_x < 15.2, "{geo:?}");
        assert!(geo.min_y > 51.8 && geo.max_y < 52.2, "{geo:?}");
    }

    #[test]
    fn test_transform_bounds_densifies_edges() {
        // Web Mercator edges bow in geographic space; the densified
        // envelope must cover the projected corner points.
        let native = Bbox::new(-10_000_000.0, 2_000_000.0, 10_000_000.0, 8_000_000.0);
        let geo = transform_bounds(3857, 4326, native).unwrap();
        let (corner_lon, _) = project_point(3857, 4326, -10_000_000.0, 2_000_000.0).unwrap();
        assert!(geo.min_x <= corner_lon + EPS);
        assert!(geo.is_valid());
    }

    #[test]
    fn test_transform_bounds_same_crs_is_identity() {
        let b = Bbox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(transform_bounds(4326, 4326, b).unwrap(), b);
    }
}
