//! Downloads from NASA Earthdata protected archives

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Like [`HttpInput`](super::HttpInput), authenticating with an Earthdata
/// login across the URS redirect chain
#[derive(Debug)]
pub struct NasaInput {
    url: String,
    http: HttpClient,
    target_path: Option<PathBuf>,
}

impl NasaInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "NASAInput",
        required: &["url", "username", "password"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        let username = schema.string(params, "username")?;
        let password = schema.string(params, "password")?;
        Ok(Self {
            url: schema.string(params, "url")?,
            http: HttpClient::with_basic_auth(config, &username, &password)?,
            target_path: None,
        })
    }
}

impl_plugin!(NasaInput);

#[async_trait]
impl InputConnector for NasaInput {
    async fn get(&mut self) -> Result<bool> {
        let target = prepare_target(self).await?;
        let files = self
            .http
            .get_file(&self.url, &target)
            .await
            .op_context(Self::SCHEMA.plugin, format!("Error downloading {}", self.url))?;
        info!(plugin = Self::SCHEMA.plugin, url = %self.url, files = files.len(), "download complete");
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
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(url: &str) -> Params {
        Params::new()
            .with("url", url)
            .with("username", "earthling")
            .with("password", "hunter2")
    }

    #[tokio::test]
    async fn test_follows_login_redirect_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/GLDAS.nc4"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/oauth/authorize", server.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth/authorize"))
            .and(basic_auth("earthling", "hunter2"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/data/granted/GLDAS.nc4")
                    .insert_header("Set-Cookie", "session=abc; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/granted/GLDAS.nc4"))
            .and(basic_auth("earthling", "hunter2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"netcdf".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/data/GLDAS.nc4", server.uri());
        let mut input = NasaInput::new(&params(&url), &test_config(&server.uri())).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        assert!(input.get().await.unwrap());
        assert_eq!(std::fs::read(dir.path().join("GLDAS.nc4")).unwrap(), b"netcdf");
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/data/GLDAS.nc4", server.uri());
        let mut input = NasaInput::new(&params(&url), &test_config(&server.uri())).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        let err = input.get().await.unwrap_err();
        assert!(err.to_string().contains("HTTP 401"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_password() {
        let p = Params::new().with("url", "x").with("username", "u");
        let err = NasaInput::new(&p, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Required parameter password for NASAInput not provided"));
    }
}
