//! Yearly station means of an NWIS variable across a state

use super::{cell, write_csv};
use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use crate::services::nwis::DAILY_MEAN;
use crate::services::{DailySeries, NwisClient, Sites};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const HEADER: [&str; 5] = ["lat", "lon", "year", "stn", "value"];

/// Writes `{state}_{variable}.csv` with the mean of every daily-mean series
/// in the state, one row per station and year
#[derive(Debug)]
pub struct NwisStatInput {
    start_yr: Option<i64>,
    end_yr: Option<i64>,
    state: String,
    variable: String,
    nwis: NwisClient,
    target_path: Option<PathBuf>,
}

impl NwisStatInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "NWISStatInput",
        required: &["start_yr", "end_yr", "state", "variable"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            start_yr: schema.integer(params, "start_yr").ok(),
            end_yr: schema.integer(params, "end_yr").ok(),
            state: schema.string(params, "state")?,
            variable: schema.string(params, "variable")?,
            nwis: NwisClient::new(HttpClient::new(config)?, &config.endpoints.nwis),
            target_path: None,
        })
    }

    fn years(&self) -> Result<(i32, i32)> {
        let (Some(start), Some(end)) = (
            self.start_yr.and_then(|y| i32::try_from(y).ok()),
            self.end_yr.and_then(|y| i32::try_from(y).ok()),
        ) else {
            return Err(Self::SCHEMA.error("Start and end year parameters need to be integers"));
        };
        if start > end {
            return Err(Self::SCHEMA.error("Start year cannot be later than end year in NWISStatInput"));
        }
        Ok((start, end))
    }

    async fn year_rows(&self, year: i32) -> Result<Vec<Vec<String>>> {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Err(Self::SCHEMA.error(format!("year {} is out of range", year)));
        };
        let series = self
            .nwis
            .daily_values(Sites::State(&self.state), start, end, &self.variable)
            .await?;
        Ok(series
            .iter()
            .filter(|s| s.statistic() == DAILY_MEAN)
            .map(|s| row(s, year))
            .collect())
    }
}

fn row(series: &DailySeries, year: i32) -> Vec<String> {
    let site = series.name.split(':').nth(1).unwrap_or(&series.site);
    vec![
        cell(series.latitude),
        cell(series.longitude),
        year.to_string(),
        format!("USGS:{}", site),
        cell(series.mean()),
    ]
}

impl_plugin!(NwisStatInput);

#[async_trait]
impl InputConnector for NwisStatInput {
    async fn get(&mut self) -> Result<bool> {
        let (start, end) = self.years()?;
        let target = prepare_target(self).await?;

        let mut rows = Vec::new();
        for year in start..=end {
            match self.year_rows(year).await {
                Ok(mut year_rows) => {
                    debug!(year, stations = year_rows.len(), "collected yearly means");
                    rows.append(&mut year_rows);
                }
                Err(e) => warn!(
                    plugin = Self::SCHEMA.plugin,
                    variable = %self.variable,
                    state = %self.state,
                    year,
                    error = %e,
                    "Error retrieving data for year, skipping"
                ),
            }
        }

        let path = target.join(format!("{}_{}.csv", self.state, self.variable));
        let count = rows.len();
        write_csv(&path, &HEADER, rows).await.op_context(
            Self::SCHEMA.plugin,
            format!(
                "Error writing out data for variable {} for state {}",
                self.variable, self.state
            ),
        )?;
        info!(plugin = Self::SCHEMA.plugin, path = ?path, rows = count, "wrote station statistics");
        Ok(true)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::plugin::Plugin;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn series(site: &str, stat: &str, values: &[&str]) -> serde_json::Value {
        json!({
            "name": format!("USGS:{}:00060:{}", site, stat),
            "sourceInfo": {
                "siteCode": [{"value": site}],
                "geoLocation": {"geogLocation": {"latitude": 40.42, "longitude": -86.89}}
            },
            "variable": {"variableCode": [{"value": "00060"}], "noDataValue": -999999.0},
            "values": [{"value": values.iter().enumerate().map(|(i, v)| json!({
                "value": v,
                "dateTime": format!("2015-01-{:02}T00:00:00.000", i + 1)
            })).collect::<Vec<_>>()}]
        })
    }

    fn params(start: serde_json::Value, end: serde_json::Value) -> Params {
        Params::new()
            .with("start_yr", start)
            .with("end_yr", end)
            .with("state", "IN")
            .with("variable", "00060")
    }

    #[tokio::test]
    async fn test_yearly_means_and_skipped_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dv/"))
            .and(query_param("stateCd", "in"))
            .and(query_param("startDT", "2015-01-01"))
            .and(query_param("endDT", "2015-12-31"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": {"timeSeries": [
                    series("03335500", "00003", &["10", "20", "-999999"]),
                    series("03335500", "00001", &["99"])
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dv/"))
            .and(query_param("startDT", "2016-01-01"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut input = NwisStatInput::new(&params(json!(2015), json!(2016)), &test_config(&server.uri())).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        assert!(input.get().await.unwrap());

        let csv = std::fs::read_to_string(dir.path().join("IN_00060.csv")).unwrap();
        assert_eq!(csv, "lat,lon,year,stn,value\n40.42,-86.89,2015,USGS:03335500,15\n");
    }

    #[tokio::test]
    async fn test_year_validation() {
        let config = test_config("http://127.0.0.1:9");
        for (start, end, needle) in [
            (json!("2015.5"), json!(2016), "need to be integers"),
            (json!(2015), json!(true), "need to be integers"),
            (json!(2017), json!(2016), "cannot be later"),
        ] {
            let mut input = NwisStatInput::new(&params(start, end), &config).unwrap();
            input.set_target_path(PathBuf::from("/nonexistent"));
            let err = input.get().await.unwrap_err();
            assert!(err.is_config(), "{}", err);
            assert!(err.to_string().contains(needle), "{} missing {}", err, needle);
        }
    }
}
