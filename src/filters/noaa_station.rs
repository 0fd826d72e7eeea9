//! GHCND stations inside an extent with data for a whole date range

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::geo::{Extent, ExtentError};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use crate::services::CdoClient;
use crate::services::cdo::GHCND;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Emits the IDs of NOAA GHCND stations covering an extent and date range
///
/// The extent uses NOAA's `N,S,E,W` ordering. A station is kept only if its
/// record starts on or before `start_date` and ends on or after `end_date`.
#[derive(Debug)]
pub struct NoaaStationFilter {
    extent: String,
    token: String,
    start_date: String,
    end_date: String,
    http: HttpClient,
    cdo_url: String,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl NoaaStationFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "NOAAStationFilter",
        required: &["extent", "token", "start_date", "end_date"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            extent: schema.string(params, "extent")?,
            token: schema.string(params, "token")?,
            start_date: schema.string(params, "start_date")?,
            end_date: schema.string(params, "end_date")?,
            http: HttpClient::new(config)?,
            cdo_url: config.endpoints.cdo.clone(),
            values: Vec::new(),
            target_path: None,
        })
    }

    fn extent(&self) -> Result<Extent> {
        Extent::parse_nsew(&self.extent).map_err(|e| {
            Self::SCHEMA.error(match e {
                ExtentError::Count(_) | ExtentError::NotANumber(_) => {
                    "NOAAStationFilter requires a N,S,E,W string of floating point numbers as the extent".to_string()
                }
                ExtentError::LatOrder => {
                    "please check the ordering of the south and north extents".to_string()
                }
                ExtentError::LonOrder => {
                    "please check the ordering of the east and west extents".to_string()
                }
            })
        })
    }
}

impl_plugin!(NoaaStationFilter);

#[async_trait]
impl Filter for NoaaStationFilter {
    async fn filter(&mut self) -> Result<()> {
        let extent = self.extent()?;
        let (start, end) = Self::SCHEMA.date_range(&self.start_date, &self.end_date)?;

        let cdo = CdoClient::new(self.http.clone(), &self.cdo_url, &self.token, None);
        let stations = cdo
            .stations(GHCND, &extent, start, end)
            .await
            .op_context(
                Self::SCHEMA.plugin,
                "Error occurred when querying NCDC API for stations",
            )?;

        let found = stations.len();
        self.values.extend(
            stations
                .into_iter()
                .filter(|s| s.covers(start, end))
                .map(|s| s.id),
        );
        debug!(found, kept = self.values.len(), "filtered stations by date coverage");
        info!(
            plugin = Self::SCHEMA.plugin,
            stations = self.values.len(),
            "NOAA station filter complete"
        );
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}
