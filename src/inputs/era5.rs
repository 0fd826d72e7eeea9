//! Gridded observations from the Copernicus Climate Data Store
//!
//! A retrieval is a queued CDS task: the request is posted to
//! `resources/{dataset}`, `tasks/{request_id}` is polled until the task is
//! `completed`, and the file at the task's `location` is downloaded. ZIP
//! results are unpacked into the target path.

use crate::archive::unzip_and_remove;
use crate::config::{Config, PollConfig};
use crate::error::{Error, OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use crate::retry::{PollStatus, poll_until};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

const DEFAULT_START_YEAR: i64 = 1950;
const DEFAULT_END_YEAR: i64 = 2021;

/// Optional request fields and their defaults
const REQUEST_DEFAULTS: [(&str, &str); 8] = [
    ("dataset", "insitu-gridded-observations-global-and-regional"),
    ("format", "zip"),
    ("region", "conus"),
    ("origin", "cpc_conus"),
    ("variable", "precipitation"),
    ("time_aggregation", "daily"),
    ("horizontal_aggregation", "0_25_x_0_25"),
    ("version", "v1.0"),
];

/// Downloads a CDS dataset for a range of years
#[derive(Debug)]
pub struct Era5Input {
    dataset: String,
    request: CdsRequest,
    start_year: Option<i64>,
    end_year: Option<i64>,
    uid: String,
    api_key: String,
    http: HttpClient,
    cds_url: String,
    poll: PollConfig,
    target_path: Option<PathBuf>,
}

/// Body of a CDS retrieval request
#[derive(Debug, Clone, Serialize)]
struct CdsRequest {
    format: String,
    region: String,
    origin: String,
    variable: String,
    time_aggregation: String,
    horizontal_aggregation: String,
    year: Vec<String>,
    version: String,
}

#[derive(Debug, Deserialize)]
struct CdsTask {
    state: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

impl Era5Input {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "ERA5Input",
        required: &["uid", "api_key"],
        optional: &[
            "dataset",
            "format",
            "region",
            "origin",
            "variable",
            "time_aggregation",
            "horizontal_aggregation",
            "start_year",
            "end_year",
            "version",
        ],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;

        let mut fields = std::collections::HashMap::new();
        for (name, default) in REQUEST_DEFAULTS {
            let value = schema
                .opt_string(params, name)?
                .unwrap_or_else(|| default.to_string());
            fields.insert(name, value);
        }
        let mut take = |name: &str| fields.remove(name).unwrap_or_default();

        let year = |name: &str, default: i64| {
            schema
                .opt_integer(params, name)
                .ok()
                .map(|year| year.unwrap_or(default))
        };

        let uid = schema.string(params, "uid")?;
        let api_key = schema.string(params, "api_key")?;
        Ok(Self {
            dataset: take("dataset"),
            request: CdsRequest {
                format: take("format"),
                region: take("region"),
                origin: take("origin"),
                variable: take("variable"),
                time_aggregation: take("time_aggregation"),
                horizontal_aggregation: take("horizontal_aggregation"),
                year: Vec::new(),
                version: take("version"),
            },
            start_year: year("start_year", DEFAULT_START_YEAR),
            end_year: year("end_year", DEFAULT_END_YEAR),
            http: HttpClient::with_basic_auth(config, &uid, &api_key)?,
            uid,
            api_key,
            cds_url: config.endpoints.cds.clone(),
            poll: config.poll.clone(),
            target_path: None,
        })
    }

    fn years(&self) -> Result<Vec<String>> {
        let (Some(start), Some(end)) = (self.start_year, self.end_year) else {
            return Err(Self::SCHEMA.error("Start and end year parameters need to be integers"));
        };
        if start > end {
            return Err(Self::SCHEMA.error("Start year needs to be earlier than end year in ERA5Input"));
        }
        Ok((start..=end).map(|y| y.to_string()).collect())
    }

    /// Submit the request and wait for the result URL
    async fn retrieve(&self, request: &CdsRequest) -> Result<String> {
        let url = format!("{}/resources/{}", self.cds_url, self.dataset);
        let task: CdsTask = self
            .http
            .send(|client| {
                client
                    .post(&url)
                    .basic_auth(&self.uid, Some(&self.api_key))
                    .json(request)
            })
            .await?
            .json()
            .await?;
        debug!(state = %task.state, request_id = ?task.request_id, "CDS request submitted");

        if let Some(location) = completed(&task)? {
            return Ok(location);
        }
        let request_id = task
            .request_id
            .ok_or_else(|| Error::InvalidResponse("CDS response has no request_id".into()))?;

        let task_url = format!("{}/tasks/{}", self.cds_url, request_id);
        let what = format!("CDS request {}", request_id);
        poll_until(&self.poll, &what, |_| {
            let (http, task_url) = (&self.http, &task_url);
            async move {
                let task: CdsTask = http.get_json(task_url).await?;
                debug!(state = %task.state, "CDS task status");
                Ok(match completed(&task)? {
                    Some(location) => PollStatus::Ready(location),
                    None => PollStatus::Pending,
                })
            }
        })
        .await
    }
}

/// The download location of a finished task, `None` while it is queued or running
fn completed(task: &CdsTask) -> Result<Option<String>> {
    match task.state.as_str() {
        "completed" => task
            .location
            .clone()
            .map(Some)
            .ok_or_else(|| Error::InvalidResponse("completed CDS task has no location".into())),
        "failed" => Err(Error::InvalidResponse(format!(
            "CDS task {} failed",
            task.request_id.as_deref().unwrap_or("(unknown)")
        ))),
        _ => Ok(None),
    }
}

impl_plugin!(Era5Input);

#[async_trait]
impl InputConnector for Era5Input {
    async fn get(&mut self) -> Result<bool> {
        let plugin = Self::SCHEMA.plugin;
        let request = CdsRequest {
            year: self.years()?,
            ..self.request.clone()
        };
        let target = prepare_target(self).await?;

        let location = self
            .retrieve(&request)
            .await
            .op_context(plugin, "The UID/API Key Pair was incorrect or the CDS servers are down")?;
        let location = match url::Url::parse(&location) {
            Ok(_) => location,
            Err(_) => format!("{}/{}", self.cds_url, location.trim_start_matches('/')),
        };
        info!(plugin, dataset = %self.dataset, url = %location, "downloading CDS result");

        let archive = target.join(format!("download.{}", request.format));
        self.http
            .download(&location, &archive)
            .await
            .op_context(plugin, "Error downloading CDS result")?;

        if request.format == "zip" {
            let files = unzip_and_remove(&archive, &target)
                .await
                .op_context(plugin, "Could not unzip downloaded files")?;
            info!(plugin, files = files.len(), "CDS result extracted");
        }
        Ok(true)
    }
}
