//! USGS gages inside an extent, from the NHDPlus GageLoc layer

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::geo::{Extent, ExtentError, Layer};
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Emits the `SOURCE_FEA` gage IDs of GageLoc points inside an extent
///
/// By default the IDs are joined into a single comma separated value. With
/// `parallelize` supplied (any non-null value, even `false`), each ID becomes
/// its own value so downstream steps can fan out per gage.
#[derive(Debug)]
pub struct GageLocFilter {
    extent: String,
    parallelize: bool,
    gage_loc_shapefile: PathBuf,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl GageLocFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "GageLocFilter",
        required: &["extent"],
        optional: &["parallelize"],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            extent: schema.string(params, "extent")?,
            parallelize: params.get("parallelize").is_some_and(|v| !v.is_null()),
            gage_loc_shapefile: config.data.gage_loc_shapefile.clone(),
            values: Vec::new(),
            target_path: None,
        })
    }
}

impl_plugin!(GageLocFilter);

#[async_trait]
impl Filter for GageLocFilter {
    async fn filter(&mut self) -> Result<()> {
        let extent = Extent::parse(&self.extent).map_err(|e| match e {
            ExtentError::Count(_) | ExtentError::NotANumber(_) => Self::SCHEMA.error(
                "GageLocFilter requires a string of four floating point numbers as the extent",
            ),
            order => Self::SCHEMA.error(order.to_string()),
        })?;

        let layer = Layer::load(&self.gage_loc_shapefile)
            .await
            .op_context(Self::SCHEMA.plugin, "Error opening GageLoc shapefile")?;

        let gages: Vec<String> = layer
            .features
            .iter()
            .filter(|f| f.point().is_some_and(|(lon, lat)| extent.contains(lat, lon)))
            .filter_map(|f| f.text("SOURCE_FEA"))
            .collect();

        info!(
            plugin = Self::SCHEMA.plugin,
            gages = gages.len(),
            parallelize = self.parallelize,
            "found gages in extent"
        );

        if self.parallelize {
            self.values.extend(gages);
        } else if !gages.is_empty() {
            self.values.push(gages.join(","));
        }
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
    use crate::config::test_config;
    use serde_json::json;

    async fn run(params: Params) -> Result<Vec<String>> {
        let mut filter = GageLocFilter::new(&params, &test_config("http://unused"))?;
        filter.filter().await?;
        Ok(filter.values().to_vec())
    }

    #[tokio::test]
    async fn test_joined_by_default() {
        let values = run(Params::new().with("extent", "40,41,-87.5,-86.5"))
            .await
            .unwrap();
        assert_eq!(values, vec!["03335500,03333050,05525500"]);
    }

    #[tokio::test]
    async fn test_parallelize() {
        let params = Params::new()
            .with("extent", "40,41,-87.5,-86.5")
            .with("parallelize", true);
        let values = run(params).await.unwrap();
        assert_eq!(values, vec!["03335500", "03333050", "05525500"]);

        // any supplied value turns it on, the way a present key does
        for value in [json!(false), json!("no"), json!(0)] {
            let params = Params::new()
                .with("extent", "40,41,-87.5,-86.5")
                .with("parallelize", value.clone());
            assert_eq!(run(params).await.unwrap().len(), 3, "{}", value);
        }

        let params = Params::new()
            .with("extent", "40,41,-87.5,-86.5")
            .with("parallelize", serde_json::Value::Null);
        assert_eq!(run(params).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_gages_yields_no_value() {
        let values = run(Params::new().with("extent", "10,11,10,11")).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_extent_errors() {
        let err = run(Params::new().with("extent", "41,40,-87.5,-86.5")).await.unwrap_err();
        assert!(err.to_string().contains("latmin and latmax"));
        let err = run(Params::new().with("extent", "40,41,-86.5,-87.5")).await.unwrap_err();
        assert!(err.to_string().contains("lonmin and lonmax"));
        let err = run(Params::new().with("extent", "40,41")).await.unwrap_err();
        assert!(err.is_config());
    }
}
