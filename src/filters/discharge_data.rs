//! Gages with enough discharge observations over a date range
//!
//! Daily mean discharge is requested from NWIS for every gage, at most 100
//! gages per request. The gage with the most observations sets the bar: a
//! gage is kept if it has at least `cutoff` percent as many observations.

use crate::config::Config;
use crate::error::{OperationContext, Result};
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{Filter, impl_plugin};
use crate::services::nwis::DISCHARGE;
use crate::services::{DailySeries, NwisClient, Sites};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Most gages per NWIS request
pub const CHUNK_SIZE: usize = 100;

/// Keeps the gages whose discharge record is at least `cutoff` percent complete
/// relative to the best covered gage
#[derive(Debug)]
pub struct DischargeDataFilter {
    start: String,
    end: String,
    gages: Vec<String>,
    cutoff: String,
    nwis: NwisClient,
    values: Vec<String>,
    target_path: Option<PathBuf>,
}

impl DischargeDataFilter {
    /// Parameters understood by this filter
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "DischargeDataFilter",
        required: &["start", "end", "gages", "cutoff"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        Ok(Self {
            start: schema.string(params, "start")?,
            end: schema.string(params, "end")?,
            gages: schema.string_list(params, "gages")?,
            cutoff: schema.string(params, "cutoff")?,
            nwis: NwisClient::new(HttpClient::new(config)?, &config.endpoints.nwis),
            values: Vec::new(),
            target_path: None,
        })
    }

    /// Whole-number percentage; a fractional part is dropped, so `"50.0"` is 50
    fn cutoff(&self) -> Result<u8> {
        self.cutoff
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite())
            .map(f64::trunc)
            .filter(|c| (1.0..=100.0).contains(c))
            .map(|c| c as u8)
            .ok_or_else(|| {
                Self::SCHEMA.error(
                    "Cutoff parameter in DischargeDataFilter must be an integer between 1 and 100",
                )
            })
    }
}

impl_plugin!(DischargeDataFilter);

#[async_trait]
impl Filter for DischargeDataFilter {
    async fn filter(&mut self) -> Result<()> {
        let (start, end) = Self::SCHEMA.date_range(&self.start, &self.end)?;
        let cutoff = self.cutoff()?;
        if self.gages.is_empty() {
            return Err(Self::SCHEMA.error("No gage IDs provided to DischargeDataFilter"));
        }

        let mut series = Vec::new();
        for chunk in array_split(&self.gages, CHUNK_SIZE) {
            let mut fetched = self
                .nwis
                .daily_values(Sites::List(chunk), start, end, DISCHARGE)
                .await
                .op_context(
                    Self::SCHEMA.plugin,
                    "Error retrieving discharge data for gages",
                )?;
            debug!(gages = chunk.len(), series = fetched.len(), "fetched discharge chunk");
            series.append(&mut fetched);
        }

        let kept = well_covered(&series, cutoff);
        info!(
            plugin = Self::SCHEMA.plugin,
            requested = self.gages.len(),
            kept = kept.len(),
            cutoff,
            "discharge coverage filter complete"
        );
        if !kept.is_empty() {
            self.values.push(kept.join(","));
        }
        Ok(())
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

/// Split `items` into `ceil(len / max)` nearly equal chunks, the first
/// `len % chunks` of them one longer than the rest
pub fn array_split<T>(items: &[T], max: usize) -> Vec<&[T]> {
    if items.is_empty() || max == 0 {
        return Vec::new();
    }
    let chunks = items.len().div_ceil(max);
    let (base, extra) = (items.len() / chunks, items.len() % chunks);

    let mut out = Vec::with_capacity(chunks);
    let mut rest = items;
    for i in 0..chunks {
        let (head, tail) = rest.split_at(base + usize::from(i < extra));
        out.push(head);
        rest = tail;
    }
    out
}

/// Site numbers of the series with at least `cutoff` percent of the largest
/// observation count, first occurrence order, without duplicates
fn well_covered(series: &[DailySeries], cutoff: u8) -> Vec<String> {
    let Some(max_count) = series.iter().map(DailySeries::count).max() else {
        return Vec::new();
    };
    let threshold = max_count as f64 * f64::from(cutoff) / 100.0;

    let mut kept: Vec<String> = Vec::new();
    for s in series {
        if s.count() as f64 >= threshold {
            let site = s.name.split(':').nth(1).unwrap_or(&s.site).to_string();
            if !kept.contains(&site) {
                kept.push(site);
            }
        }
    }
    kept
}
