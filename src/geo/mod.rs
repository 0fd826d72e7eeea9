//! Geospatial helpers: extents, shapefiles, projections, containment
//!
//! - [`Extent`]: four-number bounding boxes as passed in plugin parameters
//! - [`Layer`]: a shapefile read into memory with attribute lookup
//! - [`Crs`]: the coordinate system from a `.prj`, and reprojection to WGS 84
//! - [`polygon::contains`]: even-odd point-in-polygon

mod extent;
pub mod polygon;
mod projection;
mod shapes;

pub use extent::{Extent, ExtentError, parse_four};
pub use projection::Crs;
pub use shapes::{BBox, Feature, Geometry, Layer};

use crate::error::Result;
use std::path::Path;

/// Extent of a shapefile layer in WGS 84 lat/lon
///
/// The header bounding box is reprojected corner by corner (bottom-left and
/// top-right), which is exact for geographic data and a close approximation
/// for the small projected outlines these plugins receive.
///
/// `epsg` replaces whatever the `.prj` sibling says.
pub async fn layer_extent(shp: &Path, epsg: Option<u16>) -> Result<Extent> {
    let layer = Layer::load(shp).await?;
    let crs = match epsg {
        Some(code) => Crs::Epsg(code),
        None => Crs::for_shapefile(shp)?,
    };
    let (lon_min, lat_min) = crs.to_wgs84(layer.bbox.x_min, layer.bbox.y_min)?;
    let (lon_max, lat_max) = crs.to_wgs84(layer.bbox.x_max, layer.bbox.y_max)?;
    Ok(Extent {
        lat_min,
        lat_max,
        lon_min,
        lon_max,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/data")
            .join(name)
    }

    #[tokio::test]
    async fn test_layer_extent_geographic() {
        let extent = layer_extent(&data("watershed_geo.shp"), None).await.unwrap();
        assert_eq!(extent.to_string(), "40.000000,41.000000,-87.500000,-86.500000");
    }

    #[tokio::test]
    async fn test_layer_extent_without_prj() {
        let extent = layer_extent(&data("watershed_noprj.shp"), None).await.unwrap();
        assert_eq!(extent.to_string(), "40.250000,40.750000,-87.250000,-86.750000");
    }

    #[tokio::test]
    async fn test_layer_extent_projected() {
        let extent = layer_extent(&data("watershed_utm.shp"), None).await.unwrap();
        assert!((extent.lat_min - 40.0).abs() < 1e-4);
        assert!((extent.lat_max - 41.0).abs() < 1e-4);
        assert!((extent.lon_min - -87.5).abs() < 1e-4);
        assert!((extent.lon_max - -86.5).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_layer_extent_epsg_override() {
        // the unprojected outline read as UTM 16N metres lands near the equator
        let extent = layer_extent(&data("watershed_noprj.shp"), Some(32616)).await.unwrap();
        assert!(extent.lat_min.abs() < 0.01, "{}", extent);
        assert!(extent.lon_min > -92.0 && extent.lon_min < -91.0, "{}", extent);

        // and the projected one read as lat/lon is left untouched
        let extent = layer_extent(&data("watershed_utm.shp"), Some(4326)).await.unwrap();
        assert!(extent.lat_min > 1000.0, "{}", extent);
    }
}
