//! Plugin contract shared by every filter and input connector
//!
//! The orchestrator only sees three things about a plugin: the parameter
//! names it accepts, the directory it should write to, and either a list of
//! output values (filters) or a success signal (input connectors). Plugins are
//! constructed by type name through [`build_filter`] / [`build_input`] so the
//! orchestrator can work from a workflow description.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::{filters, inputs};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Behaviour common to filters and input connectors
pub trait Plugin: Send + Sync {
    /// Plugin type name (e.g., "GeoRangeFilter")
    fn name(&self) -> &'static str;

    /// Required parameter names followed by optional ones
    fn provided_params(&self) -> Vec<&'static str>;

    /// Output directory assigned by the orchestrator
    fn target_path(&self) -> Option<&Path>;

    /// Assign the output directory
    fn set_target_path(&mut self, path: PathBuf);
}

/// A plugin that computes a list of string values
#[async_trait]
pub trait Filter: Plugin {
    /// Compute the filter values, appending them to [`Filter::values`]
    async fn filter(&mut self) -> Result<()>;

    /// Values computed so far
    fn values(&self) -> &[String];
}

/// A plugin that fetches external data into its target path
#[async_trait]
pub trait InputConnector: Plugin {
    /// Fetch the data; `Ok(true)` signals success
    async fn get(&mut self) -> Result<bool>;
}

/// Implements [`Plugin`] for a struct with a `target_path: Option<PathBuf>`
/// field and an associated `SCHEMA` constant.
macro_rules! impl_plugin {
    ($ty:ty) => {
        impl $crate::plugin::Plugin for $ty {
            fn name(&self) -> &'static str {
                Self::SCHEMA.plugin
            }

            fn provided_params(&self) -> Vec<&'static str> {
                Self::SCHEMA.provided_params()
            }

            fn target_path(&self) -> Option<&std::path::Path> {
                self.target_path.as_deref()
            }

            fn set_target_path(&mut self, path: std::path::PathBuf) {
                self.target_path = Some(path);
            }
        }
    };
}
pub(crate) use impl_plugin;

/// Resolve the output directory of an input connector, creating it if needed
pub(crate) async fn prepare_target(plugin: &dyn Plugin) -> Result<PathBuf> {
    let target = plugin.target_path().ok_or_else(|| {
        Error::config(
            plugin.name(),
            format!("no target path assigned to {}", plugin.name()),
        )
    })?;
    tokio::fs::create_dir_all(target).await?;
    Ok(target.to_path_buf())
}

/// Names of all filter plugins
pub fn available_filters() -> &'static [&'static str] {
    &[
        "GeoRangeFilter",
        "NOAAStationFilter",
        "CONUSStateFilter",
        "OpenDAPFilter",
        "DamFilter",
        "GageLocFilter",
        "ShpExtentFilter",
        "DischargeDataFilter",
    ]
}

/// Names of all input connector plugins
pub fn available_inputs() -> &'static [&'static str] {
    &[
        "HTTPInput",
        "NASAInput",
        "WQPInput",
        "CUAHSISubsetterInput",
        "GHCNDInput",
        "NWISStatInput",
        "GageFeatureInput",
        "ERA5Input",
    ]
}

/// Construct a filter by plugin type name
pub fn build_filter(name: &str, params: &Params, config: &Config) -> Result<Box<dyn Filter>> {
    let filter: Box<dyn Filter> = match name {
        "GeoRangeFilter" => Box::new(filters::GeoRangeFilter::new(params)?),
        "NOAAStationFilter" => Box::new(filters::NoaaStationFilter::new(params, config)?),
        "CONUSStateFilter" => Box::new(filters::ConusStateFilter::new(params, config)?),
        "OpenDAPFilter" => Box::new(filters::OpenDapFilter::new(params, config)?),
        "DamFilter" => Box::new(filters::DamFilter::new(params, config)?),
        "GageLocFilter" => Box::new(filters::GageLocFilter::new(params, config)?),
        "ShpExtentFilter" => Box::new(filters::ShpExtentFilter::new(params)?),
        "DischargeDataFilter" => Box::new(filters::DischargeDataFilter::new(params, config)?),
        other => {
            return Err(Error::config(
                "Registry",
                format!("unknown filter plugin {}", other),
            ));
        }
    };
    Ok(filter)
}

/// Construct an input connector by plugin type name
pub fn build_input(
    name: &str,
    params: &Params,
    config: &Config,
) -> Result<Box<dyn InputConnector>> {
    let input: Box<dyn InputConnector> = match name {
        "HTTPInput" => Box::new(inputs::HttpInput::new(params, config)?),
        "NASAInput" => Box::new(inputs::NasaInput::new(params, config)?),
        "WQPInput" => Box::new(inputs::WqpInput::new(params, config)?),
        "CUAHSISubsetterInput" => Box::new(inputs::CuahsiSubsetterInput::new(params, config)?),
        "GHCNDInput" => Box::new(inputs::GhcndInput::new(params, config)?),
        "NWISStatInput" => Box::new(inputs::NwisStatInput::new(params, config)?),
        "GageFeatureInput" => Box::new(inputs::GageFeatureInput::new(params, config)?),
        "ERA5Input" => Box::new(inputs::Era5Input::new(params, config)?),
        other => {
            return Err(Error::config(
                "Registry",
                format!("unknown input plugin {}", other),
            ));
        }
    };
    Ok(input)
}
