#![allow(dead_code)]

use serde_json::{Value, json};
use std::{path::Path, sync::Arc, time::Duration};
use traceroute_collector::{
    exporter::artifacts::ArtifactStore,
    geo::{Coordinates, GeoPoint, Location},
    ingestor::{
        fetcher::{Fetcher, LinearBackoff},
        geoip::{GeoLookup, MockGeoLocator},
        traceroute::MockTracerouteApi,
        types::{ColoSite, Target},
    },
    orchestrator::Pipeline,
    processor::process::{ProcessorOptions, SampleProcessor},
    settings::{self, Settings},
};

pub const TRACE_URI: &str = "https://trace.test/trace";

/// Settings pointing every output at `dir`, with no backoff delay
pub fn create_test_settings(dir: &Path) -> Settings {
    Settings {
        output: settings::OutputSettings {
            dir: dir.to_path_buf(),
            colo_file: dir.join("colos.json"),
        },
        traceroute: settings::TracerouteSettings {
            uri: TRACE_URI.to_string(),
            request_timeout_secs: 5,
        },
        retry: settings::RetrySettings {
            retries: 1,
            backoff_step_secs: 0,
        },
        ..Default::default()
    }
}

pub fn target() -> Target {
    "1.1.1.1:cf-global-dns:one.one.one.one".parse().unwrap()
}

/// San Jose, US
pub fn sjc() -> ColoSite {
    ColoSite {
        code: "sjc".to_string(),
        name: Some("San Jose".to_string()),
        region: Some("North America".to_string()),
        city: Some("San Jose".to_string()),
        country: Some("US".to_string()),
        lat: Some(37.36),
        lon: Some(-121.93),
    }
}

/// Amsterdam, NL
pub fn ams() -> ColoSite {
    ColoSite {
        code: "ams".to_string(),
        name: Some("Amsterdam".to_string()),
        region: Some("Europe".to_string()),
        city: Some("Amsterdam".to_string()),
        country: Some("NL".to_string()),
        lat: Some(52.31),
        lon: Some(4.76),
    }
}

pub fn node(ip: &str, name: &str, mean_rtt_ms: f64) -> Value {
    json!({
        "ip": ip,
        "name": name,
        "mean_rtt_ms": mean_rtt_ms,
        "min_rtt_ms": mean_rtt_ms,
        "max_rtt_ms": mean_rtt_ms,
        "std_dev_rtt_ms": 0.2,
        "packet_count": 3
    })
}

pub fn hop(nodes: Vec<Value>) -> Value {
    json!({"packets_sent": 3, "packets_lost": 0, "nodes": nodes})
}

pub fn block(subcolo: &str, city: &str, hops: Vec<Value>) -> Value {
    json!({
        "colo": {"name": subcolo, "city": city},
        "traceroute_time_ms": 1200.0,
        "hops": hops
    })
}

pub fn traceroute_body(blocks: Vec<Value>) -> String {
    json!({
        "success": true,
        "result": [{"target": "1.1.1.1", "colos": blocks}]
    })
    .to_string()
}

pub fn located(lat: f64, long: f64, country: &str, city: &str) -> GeoLookup {
    GeoLookup::Located(GeoPoint::Resolved(Location {
        coordinates: Coordinates::new(lat, long),
        country: country.to_string(),
        city: city.to_string(),
        region: country.to_string(),
    }))
}

pub fn fetcher(api: MockTracerouteApi, retries: u32) -> Fetcher {
    Fetcher::new(
        Arc::new(api),
        TRACE_URI,
        LinearBackoff::new(Duration::ZERO, retries),
    )
}

pub fn pipeline(
    api: MockTracerouteApi,
    geo: MockGeoLocator,
    dir: &Path,
    retries: u32,
    verbose: bool,
) -> Pipeline {
    Pipeline::new(
        fetcher(api, retries),
        SampleProcessor::new(
            Arc::new(geo),
            ArtifactStore::new(dir),
            ProcessorOptions {
                verbose,
                ..Default::default()
            },
        ),
        2,
        Duration::from_secs(30),
    )
}
