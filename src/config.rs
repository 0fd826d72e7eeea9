//! Configuration types for geoedf-connectors
//!
//! Plugins receive their per-invocation parameters from the orchestrator
//! (see [`crate::params`]). Everything that is fixed per deployment lives
//! here instead: service endpoints, bundled data files, HTTP behaviour, and
//! retry/poll policy. All fields default to the production values so a
//! `Config::default()` works out of the box.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Main configuration shared by all plugins
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service base URLs
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Locally installed reference datasets
    #[serde(default)]
    pub data: DataConfig,

    /// HTTP client behaviour
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry policy for transient request failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Policy for polling long-running remote jobs
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "Config",
                format!("failed to read config file {}: {}", path.display(), e),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::config(
                "Config",
                format!("invalid config file {}: {}", path.display(), e),
            )
        })
    }
}

/// Base URLs of the remote services the plugins talk to
///
/// No trailing slashes; plugins append their own paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// USGS NWIS water services (default: "https://waterservices.usgs.gov/nwis")
    #[serde(default = "default_nwis_url")]
    pub nwis: String,

    /// NOAA Climate Data Online v2 API
    #[serde(default = "default_cdo_url")]
    pub cdo: String,

    /// Water Quality Portal data service
    #[serde(default = "default_wqp_url")]
    pub wqp: String,

    /// CUAHSI domain subsetter
    #[serde(default = "default_cuahsi_url")]
    pub cuahsi: String,

    /// USACE dam flood inundation mapping service
    #[serde(default = "default_fim_url")]
    pub fim: String,

    /// EPA StreamCat hydro-region downloads
    #[serde(default = "default_streamcat_url")]
    pub streamcat: String,

    /// Copernicus Climate Data Store API
    #[serde(default = "default_cds_url")]
    pub cds: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            nwis: default_nwis_url(),
            cdo: default_cdo_url(),
            wqp: default_wqp_url(),
            cuahsi: default_cuahsi_url(),
            fim: default_fim_url(),
            streamcat: default_streamcat_url(),
            cds: default_cds_url(),
        }
    }
}

impl EndpointConfig {
    /// Point every endpoint at the same base URL (used against mock servers)
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            nwis: base.clone(),
            cdo: base.clone(),
            wqp: base.clone(),
            cuahsi: base.clone(),
            fim: base.clone(),
            streamcat: base.clone(),
            cds: base,
        }
    }
}

/// Reference datasets installed alongside the plugins
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    /// NHDPlus gage location points (default: "/usr/local/data/GageLoc.shp")
    #[serde(default = "default_gage_loc_shapefile")]
    pub gage_loc_shapefile: PathBuf,

    /// HUC2 region polygons (default: "/usr/local/data/HUC2.shp")
    #[serde(default = "default_huc2_shapefile")]
    pub huc2_shapefile: PathBuf,

    /// TIGER/Line state boundaries (default: "/usr/local/data/tl_2021_us_state.shp")
    #[serde(default = "default_states_shapefile")]
    pub states_shapefile: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            gage_loc_shapefile: default_gage_loc_shapefile(),
            huc2_shapefile: default_huc2_shapefile(),
            states_shapefile: default_states_shapefile(),
        }
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout, including body download (default: 600 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Connection establishment timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept invalid TLS certificates (default: false)
    ///
    /// Some government mirrors serve broken certificate chains; only enable
    /// this for endpoints that are known to need it.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            accept_invalid_certs: false,
        }
    }
}

/// Retry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }
}

/// Fixed-interval polling of remote jobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between status checks (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Number of status checks before giving up (default: 100)
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_poll_attempts(),
        }
    }
}

fn default_nwis_url() -> String {
    "https://waterservices.usgs.gov/nwis".to_string()
}

fn default_cdo_url() -> String {
    "https://www.ncdc.noaa.gov/cdo-web/api/v2".to_string()
}

fn default_wqp_url() -> String {
    "https://www.waterqualitydata.us/data".to_string()
}

fn default_cuahsi_url() -> String {
    "https://subset.cuahsi.org".to_string()
}

fn default_fim_url() -> String {
    "https://fim.sec.usace.army.mil/ci/fim".to_string()
}

fn default_streamcat_url() -> String {
    "https://gaftp.epa.gov/epadatacommons/ORD/NHDPlusLandscapeAttributes/StreamCat/HydroRegions"
        .to_string()
}

fn default_cds_url() -> String {
    "https://cds.climate.copernicus.eu/api/v2".to_string()
}

fn default_gage_loc_shapefile() -> PathBuf {
    PathBuf::from("/usr/local/data/GageLoc.shp")
}

fn default_huc2_shapefile() -> PathBuf {
    PathBuf::from("/usr/local/data/HUC2.shp")
}

fn default_states_shapefile() -> PathBuf {
    PathBuf::from("/usr/local/data/tl_2021_us_state.shp")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("geoedf-connectors/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_attempts() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Configuration for unit tests: every endpoint on `base`, no retries, fast
/// polling and the fixture shapefiles under `tests/data`
#[cfg(test)]
pub(crate) fn test_config(base: &str) -> Config {
    let data = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data");
    Config {
        endpoints: EndpointConfig::all(base),
        data: DataConfig {
            gage_loc_shapefile: data.join("gageloc.shp"),
            huc2_shapefile: data.join("huc2.shp"),
            states_shapefile: data.join("states.shp"),
        },
        http: HttpConfig::default(),
        retry: RetryConfig::none(),
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 5,
        },
    }
}
