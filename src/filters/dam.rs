//! National dams inside a shapefile outline or lat/lon extent

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::geo::{Extent, layer_extent};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

/// Emits the IDs of USACE EAP dams that fall within an area
///
/// The area is either the extent of a shapefile (reprojected to lat/lon) or
/// a `latmin,latmax,lonmin,lonmax` string. The shapefile takes precedence
/// when both are given. `epsg` overrides the shapefile's `.prj`.
#[derive(Debug)]
pub struct DamFilter {
    shapefile: Option<PathBuf>,
    epsg: Option<u16>,
    extent: Option<String>,
    http: HttpClient,
    fim_url: String,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl DamFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "DamFilter",
        required: &[],
        optional: &["shapefile", "extent", "epsg"],
    };

    /// Construct from parameters; one of `shapefile` or `extent` is needed
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        let shapefile = schema.opt_string(params, "shapefile")?.map(PathBuf::from);
        let extent = schema.opt_string(params, "extent")?;
        if shapefile.is_none() && extent.is_none() {
            return Err(schema.error(
                "Either a shapefile path or extent needs to be provided for DamFilter",
            ));
        }
        Ok(Self {
            shapefile,
            epsg: schema.opt_epsg(params, "epsg")?,
            extent,
            http: HttpClient::new(config)?,
            fim_url: config.endpoints.fim.clone(),
            values: Vec::new(),
            target_path: None,
        })
    }

    async fn area(&self) -> Result<Extent> {
        if let Some(shp) = &self.shapefile {
            return layer_extent(shp, self.epsg).await.op_context(
                Self::SCHEMA.plugin,
                format!("Error determining lat-lon extent of shapefile {}", shp.display()),
            );
        }
        let extent = self.extent.as_deref().unwrap_or_default();
        Extent::parse_unchecked(extent).map_err(|e| {
            Self::SCHEMA.error(format!(
                "Error determining lat-lon min and max from extents in DamFilter: {}",
                e
            ))
        })
    }
}

impl_plugin!(DamFilter);

#[async_trait]
impl Filter for DamFilter {
    async fn filter(&mut self) -> Result<()> {
        let area = self.area().await?;
        debug!(extent = %area, "searching dams");

        let url = format!("{}/getAllEAPStructure", self.fim_url);
        let dams: Vec<Value> = self
            .http
            .get_json(&url)
            .await
            .op_context(Self::SCHEMA.plugin, "Error retrieving national dam list")?;

        let total = dams.len();
        self.values.extend(
            dams.iter()
                .filter_map(dam_location)
                .filter(|(_, lat, lon)| area.contains(*lat, *lon))
                .map(|(id, _, _)| id),
        );

        info!(
            plugin = Self::SCHEMA.plugin,
            total,
            matched = self.values.len(),
            "dam filter complete"
        );
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

/// `(ID, LAT, LON)` of a dam record; `None` for malformed records
fn dam_location(dam: &Value) -> Option<(String, f64, f64)> {
    let id = match dam.get("ID")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some((id, coordinate(dam.get("LAT")?)?, coordinate(dam.get("LON")?)?))
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
