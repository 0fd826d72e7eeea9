//! Direct NetCDF4 links for the datasets of a THREDDS/OpenDAP catalog
//!
//! The catalog is expected in the usual two-level layout:
//!
//! ```text
//! <catalog>
//!   <dataset>                 collection
//!     <dataset>               one per file
//!       <access serviceName="dap" urlPath="path/to/file.nc"/>
//! ```
//!
//! Every `dap` access entry at that depth yields `{opendap_url}/{file}.nc4`,
//! where `file` is the last component of `urlPath`.

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::path::PathBuf;
use tracing::info;

/// Emits direct access URLs for every dataset listed in an OpenDAP catalog
#[derive(Debug)]
pub struct OpenDapFilter {
    opendap_url: String,
    http: HttpClient,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl OpenDapFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "OpenDAPFilter",
        required: &["opendap_url"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        Self::SCHEMA.validate(params)?;
        Ok(Self {
            opendap_url: Self::SCHEMA
                .string(params, "opendap_url")?
                .trim_end_matches('/')
                .to_string(),
            http: HttpClient::new(config)?,
            values: Vec::new(),
            target_path: None,
        })
    }
}

impl_plugin!(OpenDapFilter);

#[async_trait]
impl Filter for OpenDapFilter {
    async fn filter(&mut self) -> Result<()> {
        let catalog_url = format!("{}/catalog.xml", self.opendap_url);
        let catalog = self
            .http
            .get_text(&catalog_url)
            .await
            .op_context(Self::SCHEMA.plugin, "Error fetching OpenDAP catalog")?;

        let paths = dap_url_paths(&catalog)
            .op_context(Self::SCHEMA.plugin, "Error parsing OpenDAP catalog")?;

        for path in paths {
            let file = path.rsplit('/').next().unwrap_or(&path);
            self.values.push(format!("{}/{}.nc4", self.opendap_url, file));
        }

        info!(
            plugin = Self::SCHEMA.plugin,
            url = %catalog_url,
            datasets = self.values.len(),
            "parsed OpenDAP catalog"
        );
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

/// `urlPath` of every `dap` access element under `root > dataset > dataset`
pub fn dap_url_paths(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parents: Vec<Vec<u8>> = Vec::new();
    let mut paths = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(path) = dap_access(&parents, &e)? {
                    paths.push(path);
                }
                parents.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if let Some(path) = dap_access(&parents, &e)? {
                    paths.push(path);
                }
            }
            Event::End(_) => {
                parents.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paths)
}

fn dap_access(parents: &[Vec<u8>], element: &BytesStart<'_>) -> Result<Option<String>> {
    let nested_dataset = parents.len() == 3
        && parents[1].as_slice() == b"dataset"
        && parents[2].as_slice() == b"dataset";
    if !nested_dataset || element.local_name().as_ref() != b"access" {
        return Ok(None);
    }

    let service = element.try_get_attribute("serviceName")?;
    let is_dap = match service {
        Some(attr) => attr.unescape_value()? == "dap",
        None => false,
    };
    if !is_dap {
        return Ok(None);
    }

    match element.try_get_attribute("urlPath")? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}
