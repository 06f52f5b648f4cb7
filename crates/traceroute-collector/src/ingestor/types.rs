use crate::{
    error::FetchFailure,
    geo::{
        Coordinates,
        regions::{UNKNOWN_BUSINESS_REGION, business_region_code},
    },
    serializer::UNKNOWN,
};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Sentinel name the traceroute API gives to hops that never answered
pub const NO_RESPONSE: &str = "NO RESPONSE";

/// Document returned by the traceroute API for one (colo, target) request.
///
/// NOTE: unknown keys are kept in `extra` so artifacts round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTraceroute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ApiMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<TargetResult>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colos: Option<Vec<ColoBlock>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result for one physical sub-colo behind the requested colo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColoBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colo: Option<ColoMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceroute_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_summary: Option<TargetSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hops: Option<Vec<Hop>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_lost: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev_rtt_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawTraceroute {
    /// Parse an API body, converting every malformed shape into a typed failure
    pub fn parse(body: &str) -> Result<Self, FetchFailure> {
        if body.trim().is_empty() {
            return Err(FetchFailure::NoTracerouteResponse(
                "empty response body".to_string(),
            ));
        }
        let traceroute: RawTraceroute = serde_json::from_str(body).map_err(|e| {
            FetchFailure::NoTracerouteResponse(format!("unparseable response: {e}"))
        })?;
        traceroute.validate()
    }

    /// Check the top-level container and the API success flag
    pub fn validate(self) -> Result<Self, FetchFailure> {
        if self.result.is_none() {
            return Err(FetchFailure::NoTracerouteResponse(
                "missing result container".to_string(),
            ));
        }
        if self.success == Some(false) {
            return Err(FetchFailure::FailedTracerouteExecution(self.api_error()));
        }
        Ok(self)
    }

    /// Error reported by the API, or "unknown"
    pub fn api_error(&self) -> String {
        self.error
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.errors
                    .iter()
                    .flatten()
                    .find_map(|m| m.message.clone().filter(|msg| !msg.is_empty()))
            })
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// All per-sub-colo blocks across every result, in document order
    pub fn blocks(&self) -> impl Iterator<Item = &ColoBlock> {
        self.result
            .iter()
            .flatten()
            .flat_map(|r| r.colos.iter().flatten())
    }
}

impl ColoBlock {
    pub fn hops(&self) -> &[Hop] {
        self.hops.as_deref().unwrap_or_default()
    }

    pub fn subcolo(&self) -> &str {
        self.colo
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN)
    }

    pub fn city(&self) -> Option<&str> {
        self.colo
            .as_ref()
            .and_then(|c| c.city.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Explicit error carried by the block, if any
    pub fn block_error(&self) -> Option<&str> {
        self.error.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

impl Hop {
    pub fn nodes(&self) -> &[Node] {
        self.nodes.as_deref().unwrap_or_default()
    }

    /// Lost/sent as a percentage rounded to 2 decimals, 0 when nothing was sent
    pub fn packet_loss_pct(&self) -> f64 {
        let sent = self.packets_sent.unwrap_or(0);
        if sent == 0 {
            return 0.0;
        }
        let lost = self.packets_lost.unwrap_or(0);
        crate::geo::round2(lost as f64 / sent as f64 * 100.0)
    }
}

impl Node {
    /// A node without an IP or marked as non-responding carries no usable data
    pub fn is_valid(&self) -> bool {
        let has_ip = self.ip.as_deref().is_some_and(|ip| !ip.trim().is_empty());
        has_ip && self.name.as_deref() != Some(NO_RESPONSE)
    }
}

/// Edge location metadata, keyed by lower-case colo code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColoSite {
    pub code: String,
    pub name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

pub type ColoCatalog = BTreeMap<String, ColoSite>;

impl ColoSite {
    /// Short business region code, "unknown" for unmapped region names
    pub fn business_region(&self) -> &'static str {
        self.region
            .as_deref()
            .and_then(business_region_code)
            .unwrap_or(UNKNOWN_BUSINESS_REGION)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Fixed traceroute destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub ip: String,
    pub name: String,
    pub domain: String,
}

impl FromStr for Target {
    type Err = anyhow::Error;

    /// Parses `ip:name:domain`; missing name or domain become "unknown"
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let ip = parts.next().unwrap_or_default().trim();
        if ip.is_empty() {
            bail!("Target entry '{s}' has no IP address");
        }
        let mut next_or_unknown = || {
            parts
                .next()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };
        let name = next_or_unknown();
        let domain = next_or_unknown();
        Ok(Self {
            ip: ip.to_string(),
            name,
            domain,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.ip, self.name, self.domain)
    }
}
