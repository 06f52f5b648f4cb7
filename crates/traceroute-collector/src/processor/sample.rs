use crate::{
    error::SkipReason,
    ingestor::types::{ColoSite, Target},
    processor::hops::{CongestedHop, SlowHop},
    serializer::{
        UNKNOWN, deserialize_json_string, deserialize_not_applicable, deserialize_unknown,
        serialize_json_string, serialize_not_applicable, serialize_unknown,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header of the summary and suspicious files, in field order
pub const SAMPLE_COLUMNS: &[&str] = &[
    "start_region",
    "start_colo",
    "start_subcolo",
    "trace_target",
    "target_ip",
    "target_domain",
    "rtt_ms",
    "min_rtt_ms",
    "max_rtt_ms",
    "std_dev_rtt_ms",
    "packet_count",
    "hop_ip",
    "hops_count",
    "traceroute_time_ms",
    "start_city",
    "colo_lat",
    "colo_long",
    "colo_country",
    "approx_final_hop",
    "target_lat",
    "target_long",
    "target_country",
    "target_region",
    "approx_nearest_region",
    "approx_region_city",
    "target_distance_km",
    "cross_country",
    "suspicious",
    "congested_hops",
    "slowest_hops",
    "request_uri",
];

pub const SKIPPED_COLUMNS: &[&str] = &[
    "start_region",
    "start_colo",
    "start_subcolo",
    "trace_target",
    "target_ip",
    "target_domain",
    "skipped_at",
    "skipped_reason",
    "skipped_detail",
];

/// One row of the traceroute summary, identified by (colo, sub-colo, target)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub start_region: String,
    pub start_colo: String,
    pub start_subcolo: String,
    pub trace_target: String,
    pub target_ip: String,
    pub target_domain: String,
    pub rtt_ms: Option<i64>,
    pub min_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub std_dev_rtt_ms: Option<f64>,
    pub packet_count: Option<u64>,
    pub hop_ip: Option<String>,
    pub hops_count: usize,
    pub traceroute_time_ms: Option<f64>,
    pub start_city: String,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub colo_lat: Option<f64>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub colo_long: Option<f64>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub colo_country: Option<String>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub approx_final_hop: Option<String>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub target_lat: Option<f64>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub target_long: Option<f64>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub target_country: Option<String>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub target_region: Option<String>,
    #[serde(
        serialize_with = "serialize_not_applicable",
        deserialize_with = "deserialize_not_applicable"
    )]
    pub approx_nearest_region: Option<String>,
    #[serde(
        serialize_with = "serialize_not_applicable",
        deserialize_with = "deserialize_not_applicable"
    )]
    pub approx_region_city: Option<String>,
    #[serde(
        serialize_with = "serialize_unknown",
        deserialize_with = "deserialize_unknown"
    )]
    pub target_distance_km: Option<f64>,
    pub cross_country: bool,
    pub suspicious: bool,
    #[serde(
        serialize_with = "serialize_json_string",
        deserialize_with = "deserialize_json_string"
    )]
    pub congested_hops: Vec<CongestedHop>,
    #[serde(
        serialize_with = "serialize_json_string",
        deserialize_with = "deserialize_json_string"
    )]
    pub slowest_hops: Vec<SlowHop>,
    pub request_uri: String,
}

impl Sample {
    /// Sub-colo when the API named one, otherwise the logical colo
    pub fn location_label(&self) -> &str {
        if self.start_subcolo.is_empty() || self.start_subcolo == UNKNOWN {
            &self.start_colo
        } else {
            &self.start_subcolo
        }
    }

    /// RTT usable for aggregation: present and non-zero
    pub fn usable_rtt_ms(&self) -> Option<i64> {
        self.rtt_ms.filter(|rtt| *rtt != 0)
    }
}

/// A (colo, target[, sub-colo]) that produced no sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSample {
    pub start_region: String,
    pub start_colo: String,
    pub start_subcolo: String,
    pub trace_target: String,
    pub target_ip: String,
    pub target_domain: String,
    pub skipped_at: DateTime<Utc>,
    pub skipped_reason: SkipReason,
    pub skipped_detail: String,
}

impl SkippedSample {
    pub fn new(colo: &ColoSite, target: &Target, reason: SkipReason, detail: &str) -> Self {
        Self {
            start_region: colo.business_region().to_string(),
            start_colo: colo.code.clone(),
            start_subcolo: UNKNOWN.to_string(),
            trace_target: target.name.clone(),
            target_ip: target.ip.clone(),
            target_domain: target.domain.clone(),
            skipped_at: Utc::now(),
            skipped_reason: reason,
            skipped_detail: detail.to_string(),
        }
    }

    pub fn with_subcolo(mut self, subcolo: &str) -> Self {
        self.start_subcolo = subcolo.to_string();
        self
    }
}

/// Rows produced by one or more (colo, target) pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub samples: Vec<Sample>,
    pub suspicious: Vec<Sample>,
    pub skipped: Vec<SkippedSample>,
}

impl Collected {
    pub fn skipped(row: SkippedSample) -> Self {
        Self {
            skipped: vec![row],
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: Collected) {
        self.samples.extend(other.samples);
        self.suspicious.extend(other.suspicious);
        self.skipped.extend(other.skipped);
    }
}
