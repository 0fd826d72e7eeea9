//! Coordinate reference systems of shapefiles and reprojection to WGS 84
//!
//! The CRS comes from the `.prj` file next to the `.shp`. Geographic systems
//! (`GEOGCS` at the top level) are treated as plain lat/lon. Projected systems
//! are resolved to an EPSG code from their outermost `AUTHORITY` entry, or
//! from an ESRI style `UTM_Zone_NN[N|S]` name when no authority is present.
//! Anything else is rebuilt as a proj string from its `PROJECTION`,
//! `PARAMETER`, `SPHEROID` and linear `UNIT` entries. Albers, Lambert
//! conformal conic and transverse Mercator are understood.

use crate::error::{Error, Result};
use proj4rs::proj::Proj;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// EPSG code of WGS 84 geographic coordinates
const WGS84: u16 = 4326;

/// Coordinate reference system of a layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Crs {
    /// Longitude/latitude in degrees
    Geographic,
    /// Projected system identified by EPSG code
    Epsg(u16),
    /// Projected system described by a proj string
    Proj4(String),
}

impl Crs {
    /// Resolve a CRS from ESRI/OGC WKT
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();
        if !wkt.starts_with("PROJCS") {
            if wkt.starts_with("GEOGCS") {
                return Ok(Crs::Geographic);
            }
            return Err(Error::Projection(format!(
                "unsupported coordinate system definition: {}",
                truncate(wkt)
            )));
        }

        let authority = Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#)
            .map_err(|e| Error::Projection(e.to_string()))?;
        if let Some(code) = authority
            .captures_iter(wkt)
            .last()
            .and_then(|cap| cap[1].parse::<u16>().ok())
        {
            return Ok(Crs::Epsg(code));
        }

        let utm = Regex::new(r"(?i)UTM_Zone_(\d{1,2})([NS])")
            .map_err(|e| Error::Projection(e.to_string()))?;
        if let Some(cap) = utm.captures(wkt) {
            let zone: u16 = cap[1]
                .parse()
                .map_err(|_| Error::Projection(format!("bad UTM zone {}", &cap[1])))?;
            let south = cap[2].eq_ignore_ascii_case("S");
            let name = wkt.split('"').nth(1).unwrap_or_default().to_ascii_uppercase();
            let nad83 = name.contains("NAD") && name.contains("83");
            let code = match (nad83, south) {
                (true, false) => 26900 + zone,
                (_, false) => 32600 + zone,
                (_, true) => 32700 + zone,
            };
            return Ok(Crs::Epsg(code));
        }

        proj_string(wkt).map(Crs::Proj4)
    }

    /// CRS of the shapefile at `shp`, read from its `.prj` sibling
    ///
    /// A missing `.prj` means the data is assumed to be lat/lon already.
    pub fn for_shapefile(shp: &Path) -> Result<Self> {
        let prj = shp.with_extension("prj");
        match std::fs::read_to_string(&prj) {
            Ok(wkt) => Self::from_wkt(&wkt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(shapefile = ?shp, "no .prj file, assuming geographic coordinates");
                Ok(Crs::Geographic)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Convert `(x, y)` in this CRS to `(lon, lat)` in WGS 84 degrees
    pub fn to_wgs84(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Crs::Geographic => Ok((x, y)),
            Crs::Epsg(WGS84) => Ok((x, y)),
            Crs::Epsg(code) => {
                let src = Proj::from_epsg_code(*code).map_err(|e| {
                    Error::Projection(format!("unknown EPSG code {}: {}", code, e))
                })?;
                reproject(&src, x, y, &format!("EPSG:{}", code))
            }
            Crs::Proj4(defn) => {
                let src = Proj::from_proj_string(defn).map_err(|e| {
                    Error::Projection(format!("invalid projection {}: {}", defn, e))
                })?;
                reproject(&src, x, y, defn)
            }
        }
    }
}

fn reproject(src: &Proj, x: f64, y: f64, name: &str) -> Result<(f64, f64)> {
    let dst = Proj::from_epsg_code(WGS84)
        .map_err(|e| Error::Projection(format!("cannot build WGS 84: {}", e)))?;
    let mut point = (x, y, 0.0);
    proj4rs::transform::transform(src, &dst, &mut point).map_err(|e| {
        Error::Projection(format!("failed to reproject ({}, {}) from {}: {}", x, y, name, e))
    })?;
    // proj4rs yields geographic coordinates in radians
    Ok((point.0.to_degrees(), point.1.to_degrees()))
}

/// Proj string equivalent of a projected WKT definition
fn proj_string(wkt: &str) -> Result<String> {
    let unresolved = |why: &str| {
        Error::Projection(format!(
            "cannot determine projection of {} ({})",
            truncate(wkt),
            why
        ))
    };
    let regex = |pattern: &str| Regex::new(pattern).map_err(|e| Error::Projection(e.to_string()));
    const NUMBER: &str = r"([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)";

    let projection = regex(r#"PROJECTION\[\s*"([^"]+)""#)?
        .captures(wkt)
        .map(|cap| cap[1].to_ascii_lowercase())
        .ok_or_else(|| unresolved("no PROJECTION"))?;

    let mut params = HashMap::new();
    for cap in regex(&format!(r#"PARAMETER\[\s*"([^"]+)"\s*,\s*{}\s*\]"#, NUMBER))?.captures_iter(wkt) {
        if let Ok(value) = cap[2].parse::<f64>() {
            params.insert(cap[1].to_ascii_lowercase(), value);
        }
    }
    let param = |names: &[&str]| names.iter().find_map(|n| params.get(*n).copied());

    // the linear unit is the last UNIT, after the GEOGCS angular one
    let to_meter = regex(&format!(r#"UNIT\[\s*"[^"]*"\s*,\s*{}"#, NUMBER))?
        .captures_iter(wkt)
        .last()
        .and_then(|cap| cap[1].parse::<f64>().ok())
        .unwrap_or(1.0);

    let central_meridian = param(&["central_meridian", "longitude_of_center", "longitude_of_origin"])
        .ok_or_else(|| unresolved("no central meridian"))?;
    let origin = param(&["latitude_of_origin", "latitude_of_center"]).unwrap_or(0.0);

    let mut defn = match projection.as_str() {
        "albers" | "albers_conic_equal_area" | "albers_equal_area_conic" => {
            let lat_1 = param(&["standard_parallel_1"]).ok_or_else(|| unresolved("no standard parallel"))?;
            let lat_2 = param(&["standard_parallel_2"]).unwrap_or(lat_1);
            format!("+proj=aea +lat_1={} +lat_2={} +lat_0={} +lon_0={}", lat_1, lat_2, origin, central_meridian)
        }
        "lambert_conformal_conic" | "lambert_conformal_conic_2sp" | "lambert_conformal_conic_1sp" => {
            let lat_1 = param(&["standard_parallel_1"]).unwrap_or(origin);
            let lat_2 = param(&["standard_parallel_2"]).unwrap_or(lat_1);
            format!("+proj=lcc +lat_1={} +lat_2={} +lat_0={} +lon_0={}", lat_1, lat_2, origin, central_meridian)
        }
        "transverse_mercator" => {
            format!("+proj=tmerc +lat_0={} +lon_0={}", origin, central_meridian)
        }
        other => return Err(unresolved(&format!("unsupported projection {}", other))),
    };

    if let Some(k) = param(&["scale_factor"]) {
        defn.push_str(&format!(" +k={}", k));
    }
    // false origins are given in the linear unit, proj wants metres
    let x_0 = param(&["false_easting"]).unwrap_or(0.0) * to_meter;
    let y_0 = param(&["false_northing"]).unwrap_or(0.0) * to_meter;
    defn.push_str(&format!(" +x_0={} +y_0={}", x_0, y_0));

    if let Some(cap) = regex(&format!(r#"SPHEROID\[\s*"[^"]*"\s*,\s*{}\s*,\s*{}"#, NUMBER, NUMBER))?.captures(wkt) {
        let (a, rf) = (cap[1].parse::<f64>().ok(), cap[2].parse::<f64>().ok());
        match (a, rf) {
            (Some(a), Some(rf)) if rf > 0.0 => defn.push_str(&format!(" +a={} +rf={}", a, rf)),
            (Some(a), _) => defn.push_str(&format!(" +a={} +b={}", a, a)),
            _ => {}
        }
    }
    let datum = wkt.to_ascii_uppercase();
    if datum.contains("1983") || datum.contains("WGS_1984") || datum.contains("WGS 84") || datum.contains("WGS84") {
        defn.push_str(" +towgs84=0,0,0");
    }
    if to_meter == 1.0 {
        defn.push_str(" +units=m");
    } else {
        defn.push_str(&format!(" +to_meter={}", to_meter));
    }
    defn.push_str(" +no_defs");
    Ok(defn)
}

fn truncate(wkt: &str) -> &str {
    match wkt.char_indices().nth(60) {
        Some((idx, _)) => &wkt[..idx],
        None => wkt,
    }
}
