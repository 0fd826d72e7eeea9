//! NOAA Climate Data Online (CDO) v2 client
//!
//! Requests carry the API token in a `token` header. The service caps every
//! response at 1000 records, so results are fetched page by page using the
//! 1-based `offset` until `metadata.resultset.count` records have been read.
//! Data requests may not span more than a year and are split accordingly.
//! When the primary token is throttled (HTTP 429) and a backup token was
//! given, the client switches to the backup for the rest of its lifetime.

use crate::error::{Error, Result};
use crate::geo::Extent;
use crate::http::HttpClient;
use chrono::{Months, NaiveDate};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Largest page the API returns
pub const PAGE_LIMIT: usize = 1000;

/// Dataset of daily summaries
pub const GHCND: &str = "GHCND";

/// Station metadata from the `stations` endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Station {
    /// Station identifier (e.g. `GHCND:USC00124244`)
    pub id: String,
    /// Station name
    #[serde(default)]
    pub name: String,
    /// First date with data (`YYYY-MM-DD`)
    pub mindate: String,
    /// Last date with data (`YYYY-MM-DD`)
    pub maxdate: String,
    /// Latitude
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Station {
    /// True if the station has data for the whole of `start..=end`
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        match (parse_day(&self.mindate), parse_day(&self.maxdate)) {
            (Some(min), Some(max)) => min <= start && max >= end,
            _ => false,
        }
    }
}

/// One observation from the `data` endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Observation {
    /// Observation timestamp (`YYYY-MM-DDT00:00:00`)
    pub date: String,
    /// Data type code (e.g. `PRCP`)
    pub datatype: String,
    /// Station identifier
    #[serde(default)]
    pub station: String,
    /// Observed value
    pub value: f64,
}

impl Observation {
    /// Calendar day of the observation
    pub fn day(&self) -> &str {
        self.date.get(..10).unwrap_or(&self.date)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct Metadata {
    resultset: ResultSet,
}

#[derive(Deserialize)]
struct ResultSet {
    count: usize,
}

/// Client for the CDO web API
#[derive(Debug)]
pub struct CdoClient {
    http: HttpClient,
    base: String,
    token: String,
    backup_token: Option<String>,
    using_backup: AtomicBool,
}

impl CdoClient {
    /// Client against `base` authenticating with `token`
    pub fn new(http: HttpClient, base: &str, token: &str, backup_token: Option<String>) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            backup_token: backup_token.filter(|t| !t.is_empty()),
            using_backup: AtomicBool::new(false),
        }
    }

    /// Stations of `dataset` inside `extent` with data between `start` and `end`
    pub async fn stations(
        &self,
        dataset: &str,
        extent: &Extent,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Station>> {
        let query = vec![
            ("datasetid", dataset.to_string()),
            ("extent", extent.to_cdo()),
            ("startdate", start.format("%Y-%m-%d").to_string()),
            ("enddate", end.format("%Y-%m-%d").to_string()),
        ];
        self.paged("stations", &query).await
    }

    /// All observations of `dataset` for `station` between `start` and `end`
    pub async fn station_data(
        &self,
        dataset: &str,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>> {
        let mut all = Vec::new();
        for (from, to) in year_windows(start, end) {
            let query = vec![
                ("datasetid", dataset.to_string()),
                ("stationid", station.to_string()),
                ("startdate", from.format("%Y-%m-%d").to_string()),
                ("enddate", to.format("%Y-%m-%d").to_string()),
            ];
            let mut window: Vec<Observation> = self.paged("data", &query).await?;
            debug!(station, %from, %to, records = window.len(), "fetched CDO window");
            all.append(&mut window);
        }
        Ok(all)
    }

    async fn paged<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut offset = 1;
        loop {
            let page: Page<T> = self.page(endpoint, query, offset).await?;
            let total = page.metadata.map(|m| m.resultset.count).unwrap_or(0);
            let fetched = page.results.len();
            results.extend(page.results);

            if fetched == 0 || results.len() >= total {
                break;
            }
            offset += PAGE_LIMIT;
        }
        Ok(results)
    }

    async fn page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        offset: usize,
    ) -> Result<Page<T>> {
        let url = format!("{}/{}", self.base, endpoint);
        let paging = [
            ("limit", PAGE_LIMIT.to_string()),
            ("offset", offset.to_string()),
        ];

        let response = match self.fetch(&url, self.current_token(), query, &paging).await {
            Err(Error::HttpStatus { status: 429, .. })
                if !self.using_backup.load(Ordering::Relaxed) && self.backup_token.is_some() =>
            {
                warn!(endpoint, "CDO token throttled, switching to backup token");
                self.using_backup.store(true, Ordering::Relaxed);
                self.fetch(&url, self.current_token(), query, &paging).await?
            }
            other => other?,
        };

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
        paging: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        self.http
            .send(|client| client.get(url).header("token", token).query(query).query(paging))
            .await
    }

    fn current_token(&self) -> &str {
        match &self.backup_token {
            Some(backup) if self.using_backup.load(Ordering::Relaxed) => backup,
            _ => &self.token,
        }
    }
}

/// Split `start..=end` into consecutive windows no longer than a year
pub fn year_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from
            .checked_add_months(Months::new(12))
            .and_then(|d| d.pred_opt())
            .map_or(end, |d| d.min(end));
        windows.push((from, to));
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }
    windows
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RetryConfig};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client(base: &str, backup: Option<&str>) -> CdoClient {
        let mut config = Config::default();
        config.retry = RetryConfig::none();
        let http = HttpClient::new(&config).unwrap();
        CdoClient::new(http, base, "primary", backup.map(str::to_string))
    }

    #[test]
    fn test_year_windows() {
        let windows = year_windows(day(2010, 3, 15), day(2012, 1, 10));
        assert_eq!(
            windows,
            vec![
                (day(2010, 3, 15), day(2011, 3, 14)),
                (day(2011, 3, 15), day(2012, 1, 10)),
            ]
        );
        assert_eq!(
            year_windows(day(2020, 1, 1), day(2020, 1, 1)),
            vec![(day(2020, 1, 1), day(2020, 1, 1))]
        );
        assert!(year_windows(day(2020, 1, 2), day(2020, 1, 1)).is_empty());
    }

    #[test]
    fn test_station_covers() {
        let station = Station {
            id: "GHCND:USC00124244".into(),
            name: String::new(),
            mindate: "1893-01-01".into(),
            maxdate: "2020-06-30".into(),
            latitude: None,
            longitude: None,
        };
        assert!(station.covers(day(2000, 1, 1), day(2020, 6, 30)));
        assert!(!station.covers(day(2000, 1, 1), day(2020, 7, 1)));
        assert!(!station.covers(day(1890, 1, 1), day(2000, 1, 1)));
    }

    #[tokio::test]
    async fn test_paging_follows_offset() {
        let server = MockServer::start().await;
        let first: Vec<serde_json::Value> = (0..PAGE_LIMIT)
            .map(|i| serde_json::json!({"id": format!("S{}", i), "mindate": "2000-01-01", "maxdate": "2020-01-01"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/stations"))
            .and(query_param("offset", "1"))
            .and(header("token", "primary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {"resultset": {"offset": 1, "count": 1001, "limit": 1000}},
                "results": first
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stations"))
            .and(query_param("offset", "1001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {"resultset": {"offset": 1001, "count": 1001, "limit": 1000}},
                "results": [{"id": "LAST", "mindate": "2000-01-01", "maxdate": "2020-01-01"}]
            })))
            .mount(&server)
            .await;

        let extent = Extent::parse_nsew("41,40,-86,-87").unwrap();
        let stations = client(&server.uri(), None)
            .stations(GHCND, &extent, day(2010, 1, 1), day(2010, 12, 31))
            .await
            .unwrap();
        assert_eq!(stations.len(), 1001);
        assert_eq!(stations[1000].id, "LAST");
    }

    #[tokio::test]
    async fn test_empty_result_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let data = client(&server.uri(), None)
            .station_data(GHCND, "GHCND:X", day(2010, 1, 1), day(2010, 1, 31))
            .await
            .unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_backup_token_on_throttle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("token", "primary"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("token", "backup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {"resultset": {"offset": 1, "count": 1, "limit": 1000}},
                "results": [{"date": "2010-01-01T00:00:00", "datatype": "PRCP", "station": "GHCND:X", "value": 3.0}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cdo = client(&server.uri(), Some("backup"));
        // two windows: the second request goes straight to the backup token
        let data = cdo
            .station_data(GHCND, "GHCND:X", day(2010, 1, 1), day(2011, 6, 30))
            .await
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].day(), "2010-01-01");
    }

    #[tokio::test]
    async fn test_throttle_without_backup_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server.uri(), None)
            .station_data(GHCND, "GHCND:X", day(2010, 1, 1), day(2010, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 429, .. }));
    }
}
