//! Daily GHCND observations for one NOAA station
//!
//! Observations are pivoted to one row per day. Each meteorological
//! parameter is written to its own `{station_id}_{PARAM}.csv` when enough of
//! those days carry a value: temperature and precipitation may miss fewer
//! than a year of days, snow fewer than 3500.

use super::{cell, write_csv};
use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use crate::services::cdo::GHCND;
use crate::services::{CdoClient, Observation};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{info, warn};

/// Parameters written out, with the number of missing days tolerated
const MET_PARAMS: [(&str, usize); 5] = [
    ("PRCP", 365),
    ("TMAX", 365),
    ("TMIN", 365),
    ("SNOW", 3500),
    ("SNWD", 3500),
];

/// Fetches GHCND daily data for a station into per-parameter CSV files
///
/// A failure to fetch the station data is logged and the connector still
/// reports success with no files, so one bad station does not stop a
/// workflow iterating over many.
#[derive(Debug)]
pub struct GhcndInput {
    token: String,
    backup_token: Option<String>,
    station_id: String,
    start_date: String,
    end_date: String,
    http: HttpClient,
    cdo_url: String,
    target_path: Option<PathBuf>,
}

impl GhcndInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "GHCNDInput",
        required: &["token", "start_date", "end_date", "station_id"],
        optional: &["backup_token"],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            token: schema.string(params, "token")?,
            backup_token: schema.opt_string(params, "backup_token")?,
            station_id: schema.string(params, "station_id")?,
            start_date: schema.string(params, "start_date")?,
            end_date: schema.string(params, "end_date")?,
            http: HttpClient::new(config)?,
            cdo_url: config.endpoints.cdo.clone(),
            target_path: None,
        })
    }
}

impl_plugin!(GhcndInput);

/// Observations keyed by day, then by data type
type DailyTable = BTreeMap<String, HashMap<String, f64>>;

fn pivot(observations: &[Observation]) -> DailyTable {
    let mut table = DailyTable::new();
    for obs in observations {
        table
            .entry(obs.day().to_string())
            .or_default()
            .insert(obs.datatype.clone(), obs.value);
    }
    table
}

#[async_trait]
impl InputConnector for GhcndInput {
    async fn get(&mut self) -> Result<bool> {
        let (start, end) = Self::SCHEMA.date_range(&self.start_date, &self.end_date)?;
        let target = prepare_target(self).await?;

        let cdo = CdoClient::new(
            self.http.clone(),
            &self.cdo_url,
            &self.token,
            self.backup_token.clone(),
        );
        let observations = match cdo.station_data(GHCND, &self.station_id, start, end).await {
            Ok(observations) => observations,
            Err(e) => {
                warn!(
                    plugin = Self::SCHEMA.plugin,
                    station = %self.station_id,
                    error = %e,
                    "Error fetching GHCND data for station"
                );
                return Ok(true);
            }
        };

        let table = pivot(&observations);
        for (param, max_missing) in MET_PARAMS {
            let present = table.values().filter(|day| day.contains_key(param)).count();
            if present == 0 {
                continue;
            }
            let missing = table.len() - present;
            if missing >= max_missing {
                info!(station = %self.station_id, param, missing, "too many missing days, skipping");
                continue;
            }

            let path = target.join(format!("{}_{}.csv", self.station_id, param));
            let rows = table
                .iter()
                .map(|(day, values)| vec![day.clone(), cell(values.get(param).copied())]);
            write_csv(&path, &["date", param], rows).await.op_context(
                Self::SCHEMA.plugin,
                format!(
                    "Error occurred while writing out {} data to CSV for station {}",
                    param, self.station_id
                ),
            )?;
            info!(station = %self.station_id, param, days = table.len(), "wrote GHCND parameter");
        }
        Ok(true)
    }
}
