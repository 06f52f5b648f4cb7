use crate::{
    error::ApiError,
    geo::{Coordinates, GeoPoint, Location, round2},
};
use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a geolocation lookup
#[derive(Debug, Clone, PartialEq)]
pub enum GeoLookup {
    Located(GeoPoint),
    /// Anycast addresses have no single location and are skipped by callers
    Anycast,
}

#[automock]
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Never fails: lookup errors degrade to `GeoLookup::Located(GeoPoint::Unknown)`
    async fn locate(&self, ip: &str) -> GeoLookup;
}

/// Subset of the ipinfo-style response
#[derive(Debug, Default, Deserialize)]
pub struct IpInfoResponse {
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub anycast: bool,
}

fn parse_loc(loc: &str) -> Option<Coordinates> {
    let (lat, long) = loc.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let long: f64 = long.trim().parse().ok()?;
    (lat.is_finite() && long.is_finite()).then(|| Coordinates::new(round2(lat), round2(long)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl IpInfoResponse {
    pub fn into_lookup(self) -> GeoLookup {
        if self.anycast {
            return GeoLookup::Anycast;
        }

        let coordinates = self.loc.as_deref().and_then(parse_loc);
        let country = non_empty(self.country);
        let (Some(coordinates), Some(country)) = (coordinates, country) else {
            return GeoLookup::Located(GeoPoint::Unknown);
        };

        let city = non_empty(self.city);
        let region = non_empty(self.region);
        let label = [city.as_deref(), region.as_deref(), Some(country.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");

        GeoLookup::Located(GeoPoint::Resolved(Location {
            coordinates,
            region: region.unwrap_or_else(|| country.clone()),
            city: label,
            country,
        }))
    }
}

pub struct HttpGeoLocator {
    client: reqwest::Client,
    base_uri: String,
}

impl HttpGeoLocator {
    pub fn new(base_uri: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, ip: &str) -> Result<IpInfoResponse, ApiError> {
        let url = format!("{}/{ip}/json", self.base_uri);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn locate(&self, ip: &str) -> GeoLookup {
        match self.fetch(ip).await {
            Ok(info) => {
                let lookup = info.into_lookup();
                debug!(ip, ?lookup, "GeoIP lookup");
                lookup
            }
            Err(e) => {
                warn!(ip, error = %e, "GeoIP lookup failed, using unknown location");
                GeoLookup::Located(GeoPoint::Unknown)
            }
        }
    }
}
