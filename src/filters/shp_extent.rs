//! Lat/lon extent of a shapefile

use crate::error::{OperationContext, Result};
use crate::geo::layer_extent;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Emits the WGS 84 extent of a shapefile as `latmin,latmax,lonmin,lonmax`
#[derive(Debug)]
pub struct ShpExtentFilter {
    shapefile: PathBuf,
    epsg: Option<u16>,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl ShpExtentFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "ShpExtentFilter",
        required: &["shapefile"],
        optional: &["epsg"],
    };

    /// Construct from parameters
    pub fn new(params: &Params) -> Result<Self> {
        Self::SCHEMA.validate(params)?;
        Ok(Self {
            shapefile: PathBuf::from(Self::SCHEMA.string(params, "shapefile")?),
            epsg: Self::SCHEMA.opt_epsg(params, "epsg")?,
            values: Vec::new(),
            target_path: None,
        })
    }
}

impl_plugin!(ShpExtentFilter);

#[async_trait]
impl Filter for ShpExtentFilter {
    async fn filter(&mut self) -> Result<()> {
        let extent = layer_extent(&self.shapefile, self.epsg).await.op_context(
            Self::SCHEMA.plugin,
            format!("Error determining extent of {}", self.shapefile.display()),
        )?;
        info!(plugin = Self::SCHEMA.plugin, %extent, "computed shapefile extent");
        self.values.push(extent.to_string());
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::Path;

    fn params(name: &str) -> Params {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name);
        Params::new().with("shapefile", path.to_string_lossy().as_ref())
    }

    #[tokio::test]
    async fn test_projected_shapefile() {
        let mut filter = ShpExtentFilter::new(&params("watershed_utm.shp")).unwrap();
        filter.filter().await.unwrap();
        assert_eq!(filter.values().len(), 1);

        let parts: Vec<f64> = filter.values()[0]
            .split(',')
            .map(|v| v.parse().unwrap())
            .collect();
        let expected = [40.0, 41.0, -87.5, -86.5];
        for (got, want) in parts.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{} vs {}", got, want);
        }
    }

    #[tokio::test]
    async fn test_geographic_shapefile() {
        let mut filter = ShpExtentFilter::new(&params("watershed_geo.shp")).unwrap();
        filter.filter().await.unwrap();
        assert_eq!(filter.values(), ["40.000000,41.000000,-87.500000,-86.500000"]);
    }

    #[tokio::test]
    async fn test_epsg_overrides_prj() {
        let params = params("watershed_utm.shp").with("epsg", "4326");
        let mut filter = ShpExtentFilter::new(&params).unwrap();
        filter.filter().await.unwrap();
        let lat_min: f64 = filter.values()[0].split(',').next().unwrap().parse().unwrap();
        assert!(lat_min > 1000.0, "{}", filter.values()[0]);

        let err = ShpExtentFilter::new(&params.with("epsg", "UTM16")).unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let mut filter = ShpExtentFilter::new(&params("nope.shp")).unwrap();
        let err = filter.filter().await.unwrap_err();
        assert!(matches!(err, Error::Operation { .. }));
    }
}
