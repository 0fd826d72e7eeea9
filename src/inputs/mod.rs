//! Input connector plugins
//!
//! Each connector fetches data from one remote service and writes files into
//! the target path assigned by the orchestrator.

mod cuahsi_subsetter;
pub mod era5;
pub mod gage_feature;
mod ghcnd;
mod http;
mod nasa;
mod nwis_stat;
mod wqp;

pub use cuahsi_subsetter::CuahsiSubsetterInput;
pub use era5::Era5Input;
pub use gage_feature::GageFeatureInput;
pub use ghcnd::GhcndInput;
pub use http::HttpInput;
pub use nasa::NasaInput;
pub use nwis_stat::NwisStatInput;
pub use wqp::WqpInput;

use crate::error::{Error, Result};
use std::path::Path;

/// Write `header` and `rows` as CSV to `path`
async fn write_csv<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Format an optional number for CSV output, empty when missing
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
