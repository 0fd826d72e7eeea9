//! # geoedf-connectors
//!
//! Filter and input connector plugins for geospatial and hydrological data
//! workflows.
//!
//! ## Plugins
//!
//! - **Filters** compute a list of string values (tile labels, station IDs,
//!   state codes, OPeNDAP URLs, dam IDs, gage numbers, bounding boxes) that an
//!   orchestrator feeds into later workflow steps.
//! - **Input connectors** fetch data from a remote service (USGS NWIS, NOAA
//!   CDO, the Water Quality Portal, the CUAHSI subsetter, StreamCat, the
//!   Copernicus CDS, or plain HTTP) and write files into a target directory.
//!
//! Plugins are constructed from named parameters and a shared [`Config`]
//! holding service endpoints, reference shapefiles, HTTP timeouts, retry and
//! polling policy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use geoedf_connectors::{Config, Params, build_filter, build_input};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let mut tiles = build_filter(
//!         "GeoRangeFilter",
//!         &Params::new().with("extent", "38,40,-87,-85"),
//!         &config,
//!     )?;
//!     tiles.filter().await?;
//!     println!("tiles: {:?}", tiles.values());
//!
//!     let mut input = build_input(
//!         "WQPInput",
//!         &Params::new().with("site_id", "USGS-03335500"),
//!         &config,
//!     )?;
//!     input.set_target_path("/tmp/wqp".into());
//!     input.get().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// ZIP extraction
pub mod archive;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Filter plugins
pub mod filters;
/// Extents, shapefile layers and coordinate reference systems
pub mod geo;
/// HTTP client and download helpers
pub mod http;
/// Input connector plugins
pub mod inputs;
/// Plugin parameters and their validation
pub mod params;
/// Plugin traits and registry
pub mod plugin;
/// Retry logic with exponential backoff and job polling
pub mod retry;
/// Shared remote service clients
pub mod services;

// Re-export commonly used types
pub use config::{Config, DataConfig, EndpointConfig, HttpConfig, PollConfig, RetryConfig};
pub use error::{Error, Result};
pub use geo::Extent;
pub use params::{ParamSchema, Params};
pub use plugin::{
    Filter, InputConnector, Plugin, available_filters, available_inputs, build_filter,
    build_input,
};
