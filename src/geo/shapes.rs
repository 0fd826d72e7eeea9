//! ESRI shapefile reading
//!
//! Layers are small reference datasets (state boundaries, gage points, HUC
//! regions) or user supplied outlines, so they are read fully into memory.

use crate::error::{Error, Result};
use crate::geo::polygon;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Point, PolygonRing, Shape};
use std::path::{Path, PathBuf};

/// Geometry of one feature, reduced to plain x/y coordinates
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Single point
    Point {
        /// Longitude or easting
        x: f64,
        /// Latitude or northing
        y: f64,
    },
    /// Polygon as a list of rings (outer and holes, any order)
    Polygon(Vec<Vec<(f64, f64)>>),
    /// Geometry types the plugins never look at
    Other,
}

/// One shape plus its attribute record
#[derive(Clone, Debug)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Geometry,
    record: Record,
}

impl Feature {
    /// Point coordinates as `(x, y)`, if this is a point feature
    pub fn point(&self) -> Option<(f64, f64)> {
        match self.geometry {
            Geometry::Point { x, y } => Some((x, y)),
            _ => None,
        }
    }

    /// True if `(x, y)` falls inside this polygon feature
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match &self.geometry {
            Geometry::Polygon(rings) => polygon::contains(rings, x, y),
            _ => false,
        }
    }

    /// Attribute rendered as trimmed text
    ///
    /// Whole numbers are rendered without a fractional part so numeric ID
    /// columns (e.g. `FLComID`) compare equal to their CSV counterparts.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.record.get(field)? {
            FieldValue::Character(Some(s)) | FieldValue::Memo(s) => Some(s.trim().to_string()),
            FieldValue::Numeric(Some(n)) => Some(format_number(*n)),
            FieldValue::Float(Some(n)) => Some(format_number(f64::from(*n))),
            FieldValue::Double(n) | FieldValue::Currency(n) => Some(format_number(*n)),
            FieldValue::Integer(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Attribute parsed as a number; character fields are parsed too
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.record.get(field)? {
            FieldValue::Character(Some(s)) => s.trim().parse().ok(),
            FieldValue::Numeric(Some(n)) => Some(*n),
            FieldValue::Float(Some(n)) => Some(f64::from(*n)),
            FieldValue::Double(n) | FieldValue::Currency(n) => Some(*n),
            FieldValue::Integer(n) => Some(f64::from(*n)),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Layer bounding box in the layer's own coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    /// Minimum x
    pub x_min: f64,
    /// Minimum y
    pub y_min: f64,
    /// Maximum x
    pub x_max: f64,
    /// Maximum y
    pub y_max: f64,
}

/// All features of a shapefile plus its header extent
#[derive(Clone, Debug)]
pub struct Layer {
    /// Path of the `.shp` file
    pub path: PathBuf,
    /// Extent recorded in the file header
    pub bbox: BBox,
    /// Features in file order
    pub features: Vec<Feature>,
}

impl Layer {
    /// Read the shapefile at `path` (and its `.shx`/`.dbf` siblings)
    pub fn open(path: &Path) -> Result<Self> {
        let shapefile_error = |e: shapefile::Error| Error::Shapefile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut reader = shapefile::Reader::from_path(path).map_err(shapefile_error)?;
        let header = reader.header();
        let bbox = BBox {
            x_min: header.bbox.min.x,
            y_min: header.bbox.min.y,
            x_max: header.bbox.max.x,
            y_max: header.bbox.max.y,
        };

        let mut features = Vec::new();
        for item in reader.iter_shapes_and_records() {
            let (shape, record) = item.map_err(shapefile_error)?;
            features.push(Feature {
                geometry: geometry(shape),
                record,
            });
        }

        tracing::debug!(path = ?path, features = features.len(), "loaded shapefile");
        Ok(Self {
            path: path.to_path_buf(),
            bbox,
            features,
        })
    }

    /// [`Layer::open`] on the blocking thread pool
    pub async fn load(path: &Path) -> Result<Self> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(&owned))
            .await
            .map_err(|e| Error::Shapefile {
                path: path.to_path_buf(),
                reason: format!("reader task panicked: {}", e),
            })?
    }
}

fn geometry(shape: Shape) -> Geometry {
    match shape {
        Shape::Point(p) => Geometry::Point { x: p.x, y: p.y },
        Shape::PointM(p) => Geometry::Point { x: p.x, y: p.y },
        Shape::PointZ(p) => Geometry::Point { x: p.x, y: p.y },
        Shape::Polygon(p) => Geometry::Polygon(p.rings().iter().map(ring_coords).collect()),
        Shape::PolygonM(p) => Geometry::Polygon(
            p.rings()
                .iter()
                .map(|r| r.points().iter().map(|pt| (pt.x, pt.y)).collect())
                .collect(),
        ),
        Shape::PolygonZ(p) => Geometry::Polygon(
            p.rings()
                .iter()
                .map(|r| r.points().iter().map(|pt| (pt.x, pt.y)).collect())
                .collect(),
        ),
        _ => Geometry::Other,
    }
}

fn ring_coords(ring: &PolygonRing<Point>) -> Vec<(f64, f64)> {
    ring.points().iter().map(|pt| (pt.x, pt.y)).collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/data")
            .join(name)
    }

    #[test]
    fn test_open_point_layer() {
        let layer = Layer::open(&data("gageloc.shp")).unwrap();
        assert_eq!(layer.features.len(), 5);

        let first = &layer.features[0];
        assert_eq!(first.text("SOURCE_FEA").as_deref(), Some("03335500"));
        assert_eq!(first.text("FLComID").as_deref(), Some("18485220"));
        let (x, y) = first.point().unwrap();
        assert!((x - -86.8967).abs() < 1e-9);
        assert!((y - 40.4209).abs() < 1e-9);
    }

    #[test]
    fn test_open_polygon_layer() {
        let layer = Layer::open(&data("states.shp")).unwrap();
        let codes: Vec<String> = layer
            .features
            .iter()
            .filter_map(|f| f.text("STUSPS"))
            .collect();
        assert_eq!(codes, vec!["IN", "HI", "AK", "CO", "PR", "ME"]);
        assert_eq!(layer.features[0].number("INTPTLAT"), Some(39.9013));
        assert_eq!(layer.features[0].number("INTPTLON"), Some(-86.2919));
    }

    #[test]
    fn test_polygon_containment() {
        let layer = Layer::open(&data("huc2.shp")).unwrap();
        let ohio = layer
            .features
            .iter()
            .find(|f| f.text("huc2").as_deref() == Some("05"))
            .unwrap();
        assert!(ohio.contains(-86.8967, 40.4209));
        assert!(!ohio.contains(-91.1915, 30.4455));
        assert!(ohio.point().is_none());
    }

    #[test]
    fn test_header_bbox() {
        let layer = Layer::open(&data("watershed_geo.shp")).unwrap();
        assert_eq!(
            layer.bbox,
            BBox {
                x_min: -87.5,
                y_min: 40.0,
                x_max: -86.5,
                y_max: 41.0
            }
        );
    }

    #[test]
    fn test_missing_file_is_shapefile_error() {
        let err = Layer::open(&data("nope.shp")).unwrap_err();
        assert!(matches!(err, Error::Shapefile { .. }));
    }

    #[tokio::test]
    async fn test_load_async() {
        let layer = Layer::load(&data("gageloc.shp")).await.unwrap();
        assert_eq!(layer.features.len(), 5);
    }
}
