//! Value Objects for orders

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius used by the spherical distance approximation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Latitude/longitude pair in degrees, parsed from an order's `"lat,lng"` string.
///
/// No range validation is applied: any two floats are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate { pub latitude: f64, pub longitude: f64 }

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self { Self { latitude, longitude } }

    /// Parses `"<float>,<float>"`, trimming whitespace around each part.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        if raw.is_empty() { return Err(ParseError::Empty); }
        let (lat, lng) = raw.split_once(',').ok_or(ParseError::MissingComma)?;
        if lng.contains(',') { return Err(ParseError::TooManyParts); }
        let latitude = lat.trim().parse::<f64>().map_err(|_| ParseError::NotANumber(lat.trim().to_string()))?;
        let longitude = lng.trim().parse::<f64>().map_err(|_| ParseError::NotANumber(lng.trim().to_string()))?;
        Ok(Self { latitude, longitude })
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlng = (other.longitude - self.longitude).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
    }

    pub fn maps_url(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{},{}", self.latitude, self.longitude) }
}

/// Distance between two coordinates in meters.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 { a.distance_to(b) }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError { Empty, MissingComma, TooManyParts, NotANumber(String) }
impl std::error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "geolocation empty"),
            Self::MissingComma => write!(f, "geolocation missing comma"),
            Self::TooManyParts => write!(f, "geolocation has more than two parts"),
            Self::NotANumber(part) => write!(f, "geolocation part {part:?} is not a number"),
        }
    }
}
