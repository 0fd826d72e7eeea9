//! Postal codes of the contiguous US states

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::geo::Layer;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

const LAT_RANGE: (f64, f64) = (24.0, 50.0);
const LON_RANGE: (f64, f64) = (-125.0, -65.0);

/// Emits the `STUSPS` code of every state whose interior point lies in the
/// contiguous US, read from the TIGER/Line state boundaries
#[derive(Debug)]
pub struct ConusStateFilter {
    states_shapefile: PathBuf,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl ConusStateFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "CONUSStateFilter",
        required: &[],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        Self::SCHEMA.validate(params)?;
        Ok(Self {
            states_shapefile: config.data.states_shapefile.clone(),
            values: Vec::new(),
            target_path: None,
        })
    }
}

impl_plugin!(ConusStateFilter);

fn in_conus(lat: f64, lon: f64) -> bool {
    lat > LAT_RANGE.0 && lat < LAT_RANGE.1 && lon > LON_RANGE.0 && lon < LON_RANGE.1
}

#[async_trait]
impl Filter for ConusStateFilter {
    async fn filter(&mut self) -> Result<()> {
        let layer = Layer::load(&self.states_shapefile)
            .await
            .op_context(Self::SCHEMA.plugin, "Error opening US states shapefile")?;

        for feature in &layer.features {
            let (Some(code), Some(lat), Some(lon)) = (
                feature.text("STUSPS"),
                feature.number("INTPTLAT"),
                feature.number("INTPTLON"),
            ) else {
                debug!("skipping state record without code or interior point");
                continue;
            };
            if in_conus(lat, lon) {
                self.values.push(code);
            }
        }

        info!(
            plugin = Self::SCHEMA.plugin,
            states = self.values.len(),
            "CONUS state filter complete"
        );
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}
