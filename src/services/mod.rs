//! Clients for the remote data services shared by several plugins

pub mod cdo;
pub mod nwis;

pub use cdo::{CdoClient, Observation, Station};
pub use nwis::{DailySeries, NwisClient, SiteInfo, Sites};
