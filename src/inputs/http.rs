//! Plain HTTP(S) downloads

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Downloads the file at `url`, or every file matching a `*` pattern in the
/// last path segment, into the target path
#[derive(Debug)]
pub struct HttpInput {
    url: String,
    http: HttpClient,
    target_path: Option<PathBuf>,
}

impl HttpInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "HTTPInput",
        required: &["url"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        Self::SCHEMA.validate(params)?;
        Ok(Self {
            url: Self::SCHEMA.string(params, "url")?,
            http: HttpClient::new(config)?,
            target_path: None,
        })
    }
}

impl_plugin!(HttpInput);

#[async_trait]
impl InputConnector for HttpInput {
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
