pub mod regions;

use regions::CandidateRegion;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.long.is_finite()
    }
}

/// Resolved location of an IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub country: String,
    pub city: String,
    pub region: String,
}

/// Inferred location of a hop. Either every field resolved or none of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum GeoPoint {
    Resolved(Location),
    #[default]
    Unknown,
}

impl GeoPoint {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Resolved(loc) => Some(loc.coordinates),
            Self::Unknown => None,
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            Self::Resolved(loc) => Some(loc.country.as_str()),
            Self::Unknown => None,
        }
    }

    pub fn city(&self) -> Option<&str> {
        match self {
            Self::Resolved(loc) => Some(loc.city.as_str()),
            Self::Unknown => None,
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Self::Resolved(loc) => Some(loc.region.as_str()),
            Self::Unknown => None,
        }
    }
}

/// Closest candidate region to a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestRegion<'a> {
    pub region: &'a CandidateRegion,
    pub distance_km: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unrounded great-circle distance in kilometers
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.long - a.long).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance rounded to 2 decimals, `None` when either side is unresolved
pub fn distance_km(a: Option<Coordinates>, b: Option<Coordinates>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some(round2(haversine_km(a, b))),
        _ => None,
    }
}

/// Linear scan over `catalog`; the first candidate with the minimum distance wins.
pub fn nearest_region(
    point: Option<Coordinates>,
    catalog: &[CandidateRegion],
) -> Option<NearestRegion<'_>> {
    let point = point?;
    let mut best: Option<NearestRegion<'_>> = None;

    for region in catalog {
        let Some(distance_km) = distance_km(Some(point), Some(region.coordinates)) else {
            continue;
        };
        match best {
            Some(current) if distance_km >= current.distance_km => {}
            _ => {
                best = Some(NearestRegion {
                    region,
                    distance_km,
                })
            }
        }
    }

    best
}
