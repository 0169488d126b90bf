//! Request parameter parsing.
//!
//! A lookup is driven by two query parameters:
//!
//! - `pos`: the clicked map position as `x,y` in map units
//! - `crs`: the coordinate reference system of that position as `EPSG:<code>`

use std::fmt;

use crate::error::{MapInfoError, Result};

/// A clicked map position in the units of its CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Spatial reference identifier of a CRS in the EPSG namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Srid(i32);

impl Srid {
    /// Wrap a raw SRID. Returns `None` for zero or negative codes.
    pub fn new(code: i32) -> Option<Self> {
        (code > 0).then_some(Self(code))
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Parse a `pos` parameter of the form `x,y`.
///
/// Exactly two components are accepted, each trimmed and required to be a
/// finite floating-point number.
///
/// # Examples
///
/// ```
/// use mapinfo::params::{parse_position, Position};
///
/// assert_eq!(parse_position("950820,6003926").unwrap(), Position::new(950820.0, 6003926.0));
/// assert_eq!(parse_position(" 7.5 , 46.9 ").unwrap(), Position::new(7.5, 46.9));
/// assert!(parse_position("950820").is_err());
/// assert!(parse_position("a,b").is_err());
/// ```
pub fn parse_position(value: &str) -> Result<Position> {
    let mut parts = value.split(',');
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(MapInfoError::InvalidPosition);
    };

    let x = parse_coordinate(x)?;
    let y = parse_coordinate(y)?;
    Ok(Position { x, y })
}

fn parse_coordinate(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(MapInfoError::InvalidPosition)
}

/// Parse a `crs` parameter of the form `EPSG:<code>`.
///
/// The `EPSG:` prefix is matched case-insensitively.
///
/// # Examples
///
/// ```
/// use mapinfo::params::parse_crs;
///
/// assert_eq!(parse_crs("EPSG:3857").unwrap().code(), 3857);
/// assert_eq!(parse_crs("epsg:2056").unwrap().code(), 2056);
/// assert!(parse_crs("3857").is_err());
/// assert!(parse_crs("EPSG:web").is_err());
/// ```
pub fn parse_crs(value: &str) -> Result<Srid> {
    const PREFIX: &str = "epsg:";

    let code = value
        .get(..PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(PREFIX))
        .map(|_| &value[PREFIX.len()..])
        .ok_or(MapInfoError::InvalidCrs)?;

    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MapInfoError::InvalidCrs);
    }

    code.parse::<i32>()
        .ok()
        .and_then(Srid::new)
        .ok_or(MapInfoError::InvalidCrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        let pos = parse_position("1157945,6630316").unwrap();
        assert_eq!(pos.x, 1157945.0);
        assert_eq!(pos.y, 6630316.0);

        let pos = parse_position("-12.5,0.25").unwrap();
        assert_eq!(pos, Position::new(-12.5, 0.25));
    }

    #[test]
    fn test_parse_position_rejects_malformed() {
        for value in ["", ",", "1,", ",2", "1;2", "1,2,3", "x,2", "1,y", "inf,2", "1,NaN"] {
            assert!(
                matches!(parse_position(value), Err(MapInfoError::InvalidPosition)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_crs() {
        assert_eq!(parse_crs("EPSG:4326").unwrap().code(), 4326);
        assert_eq!(parse_crs("Epsg:21781").unwrap().code(), 21781);
        assert_eq!(parse_crs("EPSG:3857").unwrap().to_string(), "EPSG:3857");
    }

    #[test]
    fn test_parse_crs_rejects_malformed() {
        for value in [
            "",
            "EPSG",
            "EPSG:",
            "EPSG:-1",
            "EPSG:0",
            "EPSG: 3857",
            "EPSG:3857x",
            "CRS:84",
            "EPSG:99999999999",
            "é",
        ] {
            assert!(
                matches!(parse_crs(value), Err(MapInfoError::InvalidCrs)),
                "{value:?} should be rejected"
            );
        }
    }
}
