//! Geographic bounding boxes given as four comma separated numbers

use std::fmt;

/// Latitude/longitude bounding box in decimal degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    /// Southern edge
    pub lat_min: f64,
    /// Northern edge
    pub lat_max: f64,
    /// Western edge
    pub lon_min: f64,
    /// Eastern edge
    pub lon_max: f64,
}

/// Why an extent string was rejected
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtentError {
    /// Not exactly four values
    Count(usize),
    /// A value is not a number
    NotANumber(String),
    /// Minimum latitude greater than maximum
    LatOrder,
    /// Minimum longitude greater than maximum
    LonOrder,
}

impl fmt::Display for ExtentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtentError::Count(n) => write!(f, "expected four comma separated values, got {}", n),
            ExtentError::NotANumber(v) => write!(f, "extent value {:?} is not a number", v),
            ExtentError::LatOrder => {
                write!(f, "please check the ordering of the latmin and latmax extents")
            }
            ExtentError::LonOrder => {
                write!(f, "please check the ordering of the lonmin and lonmax extents")
            }
        }
    }
}

impl std::error::Error for ExtentError {}

/// Split `"a,b,c,d"` into exactly four numbers
pub fn parse_four(s: &str) -> Result<[f64; 4], ExtentError> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(ExtentError::Count(parts.len()));
    }
    let mut out = [0.0; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|_| ExtentError::NotANumber(part.to_string()))?;
    }
    Ok(out)
}

impl Extent {
    /// Parse `latmin,latmax,lonmin,lonmax`, rejecting inverted ranges
    pub fn parse(s: &str) -> Result<Self, ExtentError> {
        let [lat_min, lat_max, lon_min, lon_max] = parse_four(s)?;
        Self::new(lat_min, lat_max, lon_min, lon_max)
    }

    /// Parse `latmin,latmax,lonmin,lonmax` without checking the ordering
    pub fn parse_unchecked(s: &str) -> Result<Self, ExtentError> {
        let [lat_min, lat_max, lon_min, lon_max] = parse_four(s)?;
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// Parse the NOAA ordering `north,south,east,west`
    pub fn parse_nsew(s: &str) -> Result<Self, ExtentError> {
        let [north, south, east, west] = parse_four(s)?;
        Self::new(south, north, west, east)
    }

    /// Build an extent, rejecting inverted ranges
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, ExtentError> {
        if lat_min > lat_max {
            return Err(ExtentError::LatOrder);
        }
        if lon_min > lon_max {
            return Err(ExtentError::LonOrder);
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// Inclusive containment test
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }

    /// CDO `extent` query value: `south,west,north,east`
    pub fn to_cdo(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lat_min, self.lon_min, self.lat_max, self.lon_max
        )
    }
}

impl fmt::Display for Extent {
    /// `latmin,latmax,lonmin,lonmax` with six decimals
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6},{:.6},{:.6},{:.6}",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let e = Extent::parse("40.1, 41.5,-87.25,-86").unwrap();
        assert_eq!(e.lat_min, 40.1);
        assert_eq!(e.lat_max, 41.5);
        assert_eq!(e.lon_min, -87.25);
        assert_eq!(e.lon_max, -86.0);
    }

    #[test]
    fn test_parse_wrong_count() {
        assert_eq!(Extent::parse("1,2,3"), Err(ExtentError::Count(3)));
        assert_eq!(Extent::parse("1,2,3,4,5"), Err(ExtentError::Count(5)));
    }

    #[test]
    fn test_parse_not_a_number() {
        assert!(matches!(
            Extent::parse("1,2,x,4"),
            Err(ExtentError::NotANumber(v)) if v == "x"
        ));
    }

    #[test]
    fn test_parse_order_checks() {
        assert_eq!(Extent::parse("41,40,-87,-86"), Err(ExtentError::LatOrder));
        assert_eq!(Extent::parse("40,41,-86,-87"), Err(ExtentError::LonOrder));
        assert!(Extent::parse_unchecked("41,40,-86,-87").is_ok());
    }

    #[test]
    fn test_parse_nsew() {
        let e = Extent::parse_nsew("41,40,-86,-87").unwrap();
        assert_eq!(e, Extent::new(40.0, 41.0, -87.0, -86.0).unwrap());
        assert_eq!(e.to_cdo(), "40,-87,41,-86");
        assert_eq!(Extent::parse_nsew("40,41,-86,-87"), Err(ExtentError::LatOrder));
    }

    #[test]
    fn test_contains_inclusive() {
        let e = Extent::new(40.0, 41.0, -87.0, -86.0).unwrap();
        assert!(e.contains(40.0, -87.0));
        assert!(e.contains(41.0, -86.0));
        assert!(e.contains(40.5, -86.5));
        assert!(!e.contains(39.999, -86.5));
        assert!(!e.contains(40.5, -85.9));
    }

    #[test]
    fn test_display() {
        let e = Extent::new(40.0, 41.25, -87.5, -86.0).unwrap();
        assert_eq!(e.to_string(), "40.000000,41.250000,-87.500000,-86.000000");
    }
}
