//! USGS National Water Information System client
//!
//! Two services are used:
//!
//! - daily values (`/dv/`) in WaterML-JSON, for discharge and state-wide
//!   statistics
//! - the site file (`/site/`) in RDB (tab separated), for gage metadata

use crate::error::{Error, Result};
use crate::http::HttpClient;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

/// Parameter code for discharge, cubic feet per second
pub const DISCHARGE: &str = "00060";

/// Statistic code for daily mean
pub const DAILY_MEAN: &str = "00003";

/// Which sites a daily-values request covers
#[derive(Clone, Copy, Debug)]
pub enum Sites<'a> {
    /// Explicit list of site numbers
    List(&'a [String]),
    /// Every site in a state (two letter postal code)
    State(&'a str),
}

/// One time series from a daily-values response
#[derive(Clone, Debug, PartialEq)]
pub struct DailySeries {
    /// `USGS:{site}:{parameter}:{statistic}`
    pub name: String,
    /// Site number
    pub site: String,
    /// Site latitude, if reported
    pub latitude: Option<f64>,
    /// Site longitude, if reported
    pub longitude: Option<f64>,
    /// Observations in date order; `None` is a missing value
    pub values: Vec<(String, Option<f64>)>,
}

impl DailySeries {
    /// Number of non-missing observations
    pub fn count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }

    /// Mean of the non-missing observations
    pub fn mean(&self) -> Option<f64> {
        let observed: Vec<f64> = self.values.iter().filter_map(|(_, v)| *v).collect();
        if observed.is_empty() {
            None
        } else {
            Some(observed.iter().sum::<f64>() / observed.len() as f64)
        }
    }

    /// Statistic code, the last component of the series name
    pub fn statistic(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or_default()
    }
}

/// Gage metadata from the site file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteInfo {
    /// Decimal latitude (`dec_lat_va`)
    pub latitude: Option<f64>,
    /// Decimal longitude (`dec_long_va`)
    pub longitude: Option<f64>,
    /// Gage datum altitude (`alt_va`)
    pub altitude: Option<f64>,
    /// Drainage area in square miles (`drain_area_va`)
    pub drainage_area: Option<f64>,
}

/// Client for the NWIS web services
#[derive(Clone, Debug)]
pub struct NwisClient {
    http: HttpClient,
    base: String,
}

impl NwisClient {
    /// Client against `base` (e.g. `https://waterservices.usgs.gov/nwis`)
    pub fn new(http: HttpClient, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Daily values of `parameter` for `sites` between `start` and `end` inclusive
    pub async fn daily_values(
        &self,
        sites: Sites<'_>,
        start: NaiveDate,
        end: NaiveDate,
        parameter: &str,
    ) -> Result<Vec<DailySeries>> {
        let url = format!("{}/dv/", self.base);
        let mut query = vec![
            ("format", "json".to_string()),
            ("startDT", start.format("%Y-%m-%d").to_string()),
            ("endDT", end.format("%Y-%m-%d").to_string()),
            ("parameterCd", parameter.to_string()),
        ];
        match sites {
            Sites::List(list) => query.push(("sites", list.join(","))),
            Sites::State(state) => query.push(("stateCd", state.to_ascii_lowercase())),
        }

        let body = self
            .http
            .send(|client| client.get(&url).query(&query))
            .await?
            .text()
            .await?;
        let series = parse_daily_values(&body)?;
        debug!(series = series.len(), parameter, "fetched NWIS daily values");
        Ok(series)
    }

    /// Site file entry for one gage
    pub async fn site_info(&self, site: &str) -> Result<SiteInfo> {
        let url = format!("{}/site/", self.base);
        let query = [
            ("format", "rdb"),
            ("sites", site),
            ("siteOutput", "expanded"),
            ("siteStatus", "all"),
        ];
        let body = self
            .http
            .send(|client| client.get(&url).query(&query))
            .await?
            .text()
            .await?;
        parse_site_rdb(&body)
    }
}

#[derive(Deserialize)]
struct WaterMl {
    value: WaterMlValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaterMlValue {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeries {
    #[serde(default)]
    name: String,
    source_info: SourceInfo,
    variable: Variable,
    #[serde(default)]
    values: Vec<ValueBlock>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceInfo {
    #[serde(default)]
    site_code: Vec<Code>,
    geo_location: Option<GeoLocation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoLocation {
    geog_location: Option<GeogLocation>,
}

#[derive(Deserialize)]
struct GeogLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Variable {
    #[serde(default)]
    variable_code: Vec<Code>,
    no_data_value: Option<f64>,
    options: Option<Options>,
}

#[derive(Deserialize)]
struct Options {
    #[serde(default)]
    option: Vec<VariableOption>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableOption {
    name: Option<String>,
    option_code: Option<String>,
}

#[derive(Deserialize)]
struct Code {
    value: String,
}

#[derive(Deserialize)]
struct ValueBlock {
    #[serde(default)]
    value: Vec<Observation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    value: String,
    date_time: String,
}

/// Parse a WaterML-JSON daily-values document
pub fn parse_daily_values(body: &str) -> Result<Vec<DailySeries>> {
    let doc: WaterMl = serde_json::from_str(body)?;

    let mut out = Vec::with_capacity(doc.value.time_series.len());
    for ts in doc.value.time_series {
        let site = ts
            .source_info
            .site_code
            .first()
            .map(|c| c.value.clone())
            .ok_or_else(|| Error::InvalidResponse("time series without site code".into()))?;
        let parameter = ts
            .variable
            .variable_code
            .first()
            .map(|c| c.value.clone())
            .unwrap_or_default();
        let statistic = ts
            .variable
            .options
            .iter()
            .flat_map(|o| o.option.iter())
            .find(|o| o.name.as_deref() == Some("Statistic"))
            .and_then(|o| o.option_code.clone())
            .unwrap_or_default();

        let name = if ts.name.is_empty() {
            format!("USGS:{}:{}:{}", site, parameter, statistic)
        } else {
            ts.name
        };

        let no_data = ts.variable.no_data_value;
        let values = ts
            .values
            .into_iter()
            .next()
            .map(|block| {
                block
                    .value
                    .into_iter()
                    .map(|obs| {
                        let date = obs.date_time.get(..10).unwrap_or(&obs.date_time).to_string();
                        let value = obs
                            .value
                            .trim()
                            .parse::<f64>()
                            .ok()
                            .filter(|v| no_data != Some(*v) && v.is_finite());
                        (date, value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let geog = ts.source_info.geo_location.and_then(|g| g.geog_location);
        out.push(DailySeries {
            name,
            site,
            latitude: geog.as_ref().and_then(|g| g.latitude),
            longitude: geog.as_ref().and_then(|g| g.longitude),
            values,
        });
    }
    Ok(out)
}

/// Parse a site file in RDB format
///
/// Comment lines start with `#`; the first remaining line holds column
/// names and the second column formats. When several rows are returned the
/// largest value of each column wins.
pub fn parse_site_rdb(body: &str) -> Result<SiteInfo> {
    let mut lines = body
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| Error::InvalidResponse("empty site file".into()))?
        .split('\t')
        .collect();
    // column format row
    lines.next();

    let column = |name: &str| header.iter().position(|h| h.trim() == name);
    let (lat, lon, alt, area) = (
        column("dec_lat_va"),
        column("dec_long_va"),
        column("alt_va"),
        column("drain_area_va"),
    );

    let mut info = SiteInfo::default();
    let mut rows = 0;
    for line in lines {
        rows += 1;
        let fields: Vec<&str> = line.split('\t').collect();
        let get = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        info.latitude = max_opt(info.latitude, get(lat));
        info.longitude = max_opt(info.longitude, get(lon));
        info.altitude = max_opt(info.altitude, get(alt));
        info.drainage_area = max_opt(info.drainage_area, get(area));
    }

    if rows == 0 {
        return Err(Error::InvalidResponse("site file has no rows".into()));
    }
    Ok(info)
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}
