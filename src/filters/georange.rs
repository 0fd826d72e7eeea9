//! Tile labels covering a lat/lon extent
//!
//! Gridded products such as SRTM are split into one degree tiles named by
//! their corner, e.g. `n40w087`. The extent is truncated toward zero to whole
//! degrees and every tile between the truncated bounds (plus one on the far
//! side) is emitted, latitude-major.

use crate::error::Result;
use crate::geo::{ExtentError, parse_four};
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Emits tile labels (`n40w087`, `s1e036`, ...) for an extent
#[derive(Debug)]
pub struct GeoRangeFilter {
    extent: String,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl GeoRangeFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "GeoRangeFilter",
        required: &["extent"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params) -> Result<Self> {
        Self::SCHEMA.validate(params)?;
        Ok(Self {
            extent: Self::SCHEMA.string(params, "extent")?,
            values: Vec::new(),
            target_path: None,
        })
    }
}

impl_plugin!(GeoRangeFilter);

#[async_trait]
impl Filter for GeoRangeFilter {
    async fn filter(&mut self) -> Result<()> {
        let schema = &Self::SCHEMA;
        let [lat_min, lat_max, lon_min, lon_max] =
            parse_four(&self.extent).map_err(|e| match e {
                ExtentError::Count(_) => schema.error(
                    "GeoRangeFilter requires a latmin,latmax,lonmin,lonmax string as the extent",
                ),
                other => schema.error(other.to_string()),
            })?;

        for (value, limit) in [(lat_min, 90.0), (lat_max, 90.0), (lon_min, 180.0), (lon_max, 180.0)] {
            if !value.is_finite() || value.abs() > limit {
                return Err(schema.error(format!(
                    "extent value {} is outside the valid latitude/longitude range",
                    value
                )));
            }
        }

        // truncation toward zero, like a cast
        let (lat_min, lat_max) = (lat_min.trunc() as i64, lat_max.trunc() as i64);
        let (lon_min, lon_max) = (lon_min.trunc() as i64, lon_max.trunc() as i64);

        if lat_min > lat_max {
            return Err(schema.error(
                "extent[0] and extent[1] need to be the latmin and latmax; please check the ordering",
            ));
        }
        if lon_min > lon_max {
            return Err(schema.error(
                "extent[2] and extent[3] need to be the lonmin and lonmax; please check the ordering",
            ));
        }

        let tiles = tiles(lat_min, lat_max, lon_min, lon_max);
        debug!(tiles = tiles.len(), extent = %self.extent, "computed tile labels");
        self.values.extend(tiles);
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

/// Every `lat × lon` label for whole-degree bounds, latitude-major
pub fn tiles(lat_min: i64, lat_max: i64, lon_min: i64, lon_max: i64) -> Vec<String> {
    let lats = labels(lat_min, lat_max, 's', 'n', 0);
    let lons = labels(lon_min, lon_max, 'w', 'e', 3);
    lats.iter()
        .flat_map(|lat| lons.iter().map(move |lon| format!("{}{}", lat, lon)))
        .collect()
}

fn labels(min: i64, max: i64, negative: char, positive: char, width: usize) -> Vec<String> {
    let label = |prefix: char| move |k: i64| format!("{}{:0width$}", prefix, k, width = width);
    if max <= 0 {
        (max.abs()..=min.abs() + 1).map(label(negative)).collect()
    } else if min < 0 {
        (0..=min.abs() + 1)
            .map(label(negative))
            .chain((0..=max + 1).map(label(positive)))
            .collect()
    } else {
        (min..=max + 1).map(label(positive)).collect()
    }
}
