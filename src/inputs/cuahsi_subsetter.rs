//! National Water Model domain files for HUC12 watersheds
//!
//! The CUAHSI subsetter works as an asynchronous job:
//!
//! 1. `wbd/gethucbbox/lcc?hucID=..` gives the bounding box of the watersheds
//! 2. `nwm/v2_0/subset?llat&llon&ulat&ulon&hucs` submits the job; the job ID
//!    is the `jobid` query parameter of the URL the request ends up at
//! 3. `jobs/{id}` is polled until the status is `finished`
//! 4. `download-zip/{id}` is saved, unpacked into the target path and removed

use crate::archive::unzip_and_remove;
use crate::config::{Config, PollConfig};
use crate::error::{Error, OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use crate::retry::{PollStatus, poll_until};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Runs the CUAHSI NWM subsetter for one or more HUC12 watersheds and
/// unpacks the resulting domain files
#[derive(Debug)]
pub struct CuahsiSubsetterInput {
    huc12_ids: Vec<String>,
    http: HttpClient,
    cuahsi_url: String,
    poll: PollConfig,
    target_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct HucBbox {
    bbox: [f64; 4],
}

#[derive(Deserialize)]
struct JobStatus {
    status: String,
}

impl CuahsiSubsetterInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "CUAHSISubsetterInput",
        required: &["huc12_id"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        let huc12_ids = schema.string_list(params, "huc12_id")?;
        if huc12_ids.is_empty() {
            return Err(schema.error("No HUC12 IDs provided to CUAHSISubsetterInput"));
        }
        Ok(Self {
            huc12_ids,
            http: HttpClient::new(config)?,
            cuahsi_url: config.endpoints.cuahsi.clone(),
            poll: config.poll.clone(),
            target_path: None,
        })
    }

    /// `[west, south, east, north]` of the watersheds
    async fn bbox(&self, hucs: &str) -> Result<[f64; 4]> {
        let url = format!("{}/wbd/gethucbbox/lcc", self.cuahsi_url);
        let response: HucBbox = self
            .http
            .send(|client| client.get(&url).query(&[("hucID", hucs)]))
            .await?
            .json()
            .await?;
        Ok(response.bbox)
    }

    async fn submit(&self, hucs: &str, [west, south, east, north]: [f64; 4]) -> Result<String> {
        let url = format!("{}/nwm/v2_0/subset", self.cuahsi_url);
        let query = [
            ("llat", south.to_string()),
            ("llon", west.to_string()),
            ("ulat", north.to_string()),
            ("ulon", east.to_string()),
            ("hucs", hucs.to_string()),
        ];
        let response = self
            .http
            .send(|client| client.get(&url).query(&query))
            .await?;
        job_id(response.url())
    }

    async fn wait(&self, uid: &str) -> Result<()> {
        let status_url = format!("{}/jobs/{}", self.cuahsi_url, uid);
        let what = format!("CUAHSI subsetter job {}", uid);
        poll_until(&self.poll, &what, |_| {
            let (http, status_url) = (&self.http, &status_url);
            async move {
                let job: JobStatus = http.get_json(status_url).await?;
                debug!(uid, status = %job.status, "subsetter job status");
                match job.status.as_str() {
                    "finished" => Ok(PollStatus::Ready(())),
                    "failed" => Err(Error::InvalidResponse(format!(
                        "subsetter job {} failed",
                        uid
                    ))),
                    _ => Ok(PollStatus::Pending),
                }
            }
        })
        .await
    }
}

/// The `jobid` query parameter of the URL a submission landed on
fn job_id(url: &url::Url) -> Result<String> {
    url.query_pairs()
        .find(|(key, _)| key == "jobid")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::InvalidResponse(format!("no job ID in subsetter response URL {}", url)))
}

impl_plugin!(CuahsiSubsetterInput);

#[async_trait]
impl InputConnector for CuahsiSubsetterInput {
    async fn get(&mut self) -> Result<bool> {
        let target = prepare_target(self).await?;
        let plugin = Self::SCHEMA.plugin;
        let hucs = self.huc12_ids.join(",");

        let bbox = self.bbox(&hucs).await.op_context(
            plugin,
            format!("Error occurred in retrieving bounds for given HUC12 ID: {}", hucs),
        )?;

        let uid = async {
            let uid = self.submit(&hucs, bbox).await?;
            info!(plugin, uid = %uid, hucs = %hucs, "subsetter job submitted");
            self.wait(&uid).await?;
            Ok::<_, Error>(uid)
        }
        .await
        .op_context(
            plugin,
            format!("Error occurred running the CUAHSI subsetter for the HUC12 watershed: {}", hucs),
        )?;

        let archive = target.join(format!("{}.zip", uid));
        let download_url = format!("{}/download-zip/{}", self.cuahsi_url, uid);
        self.http
            .download(&download_url, &archive)
            .await
            .op_context(plugin, "Error occurred downloading CUAHSI subsetter result")?;

        let files = unzip_and_remove(&archive, &target)
            .await
            .op_context(plugin, "Error occurred when unzipping domain data")?;
        info!(plugin, uid = %uid, files = files.len(), "subsetter domain extracted");
        Ok(true)
    }
}
