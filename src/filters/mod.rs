//! Filter plugins
//!
//! Each filter turns its parameters into a list of string values (tile
//! labels, station IDs, state codes, extents, URLs) that the orchestrator
//! feeds into later steps.

mod conus_state;
mod dam;
pub mod discharge_data;
mod gage_loc;
pub mod georange;
mod noaa_station;
pub mod opendap;
mod shp_extent;

pub use conus_state::ConusStateFilter;
pub use dam::DamFilter;
pub use discharge_data::DischargeDataFilter;
pub use gage_loc::GageLocFilter;
pub use georange::GeoRangeFilter;
pub use noaa_station::NoaaStationFilter;
pub use opendap::OpenDapFilter;
pub use shp_extent::ShpExtentFilter;
