//! Water Quality Portal results for one monitoring site

use crate::config::Config;
use crate::error::{Error, OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_START: &str = "";
const DEFAULT_END: &str = "05-01-2020";

/// Saves the WQP result search for `site_id` as `{site_id}.csv`
///
/// Dates are passed through to the portal unchanged (`mm-dd-yyyy`).
#[derive(Debug)]
pub struct WqpInput {
    site_id: String,
    start_date: Option<String>,
    end_date: Option<String>,
    http: HttpClient,
    wqp_url: String,
    target_path: Option<PathBuf>,
}

impl WqpInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "WQPInput",
        required: &["site_id"],
        optional: &["start_date", "end_date"],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            site_id: schema.string(params, "site_id")?,
            start_date: schema.opt_string(params, "start_date")?,
            end_date: schema.opt_string(params, "end_date")?,
            http: HttpClient::new(config)?,
            wqp_url: config.endpoints.wqp.clone(),
            target_path: None,
        })
    }
}

impl_plugin!(WqpInput);

#[async_trait]
impl InputConnector for WqpInput {
    async fn get(&mut self) -> Result<bool> {
        let target = prepare_target(self).await?;
        let url = format!("{}/Result/search", self.wqp_url);
        let query = [
            ("siteid", self.site_id.as_str()),
            ("StartDateLo", self.start_date.as_deref().unwrap_or(DEFAULT_START)),
            ("StartDateHi", self.end_date.as_deref().unwrap_or(DEFAULT_END)),
            ("mimeType", "csv"),
        ];
        let dest = target.join(format!("{}.csv", self.site_id));

        let response = self
            .http
            .send(|client| client.get(&url).query(&query))
            .await
            .op_context(Self::SCHEMA.plugin, "Error querying the Water Quality Portal")?;
        let bytes = response
            .bytes()
            .await
            .map_err(Error::from)
            .op_context(Self::SCHEMA.plugin, "Error reading Water Quality Portal results")?;
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(Error::from)
            .op_context(Self::SCHEMA.plugin, format!("Error writing {}", dest.display()))?;

        info!(plugin = Self::SCHEMA.plugin, site = %self.site_id, bytes = bytes.len(), "saved WQP results");
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
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CSV: &str = "OrganizationIdentifier,MonitoringLocationIdentifier,ResultMeasureValue\nUSGS-IN,USGS-03335500,7.2\n";

    #[tokio::test]
    async fn test_default_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Result/search"))
            .and(query_param("siteid", "USGS-03335500"))
            .and(query_param("StartDateLo", ""))
            .and(query_param("StartDateHi", "05-01-2020"))
            .and(query_param("mimeType", "csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut input = WqpInput::new(
            &Params::new().with("site_id", "USGS-03335500"),
            &test_config(&server.uri()),
        )
        .unwrap();
        input.set_target_path(dir.path().to_path_buf());
        assert!(input.get().await.unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("USGS-03335500.csv")).unwrap(),
            CSV
        );
    }

    #[tokio::test]
    async fn test_explicit_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Result/search"))
            .and(query_param("StartDateLo", "01-01-2010"))
            .and(query_param("StartDateHi", "12-31-2012"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let params = Params::new()
            .with("site_id", "USGS-03335500")
            .with("start_date", "01-01-2010")
            .with("end_date", "12-31-2012");
        let mut input = WqpInput::new(&params, &test_config(&server.uri())).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        assert!(input.get().await.unwrap());
    }

    #[tokio::test]
    async fn test_portal_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut input = WqpInput::new(
            &Params::new().with("site_id", "bogus"),
            &test_config(&server.uri()),
        )
        .unwrap();
        input.set_target_path(dir.path().to_path_buf());
        let err = input.get().await.unwrap_err();
        assert!(err.to_string().contains("Water Quality Portal"));
        assert!(!dir.path().join("bogus.csv").exists());
    }
}
