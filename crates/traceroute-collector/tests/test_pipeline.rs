mod common;

use common::{ams, block, hop, located, node, pipeline, sjc, target, traceroute_body};
use std::fs;
use tempfile::TempDir;
use traceroute_collector::{
    error::SkipReason,
    exporter::csv::read_rows,
    ingestor::{
        geoip::{GeoLookup, MockGeoLocator},
        traceroute::MockTracerouteApi,
        types::Target,
    },
    orchestrator::OutputPaths,
    processor::sample::{Sample, SkippedSample},
};

#[tokio::test]
async fn test_implausible_sample_is_quarantined() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = OutputPaths::new(temp_dir.path().join("results"));
    outputs.ensure_row_logs().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace().times(1).returning(|_, _| {
        Ok(traceroute_body(vec![block(
            "sjc01",
            "San Jose, US",
            vec![hop(vec![node("203.0.113.7", "edge-1", 2.0)])],
        )]))
    });

    // Calgary, roughly 1700 km from San Jose and across a border
    let mut geo = MockGeoLocator::new();
    geo.expect_locate()
        .withf(|ip: &str| ip == "203.0.113.7")
        .times(1)
        .returning(|_| located(51.05, -114.07, "CA", "Calgary, Alberta, CA"));

    let collected = pipeline(api, geo, outputs.dir(), 0, false)
        .run(&[sjc()], &[target()], false, |rows| outputs.append(rows))
        .await
        .unwrap();

    assert_eq!(collected.suspicious.len(), 1);
    let row = &collected.suspicious[0];
    assert!(row.cross_country);
    assert!(row.suspicious);
    assert_eq!(row.rtt_ms, Some(2));
    assert!(row.target_distance_km.unwrap() > 1000.0);

    let summary: Vec<Sample> = read_rows(&outputs.summary()).unwrap();
    let suspicious: Vec<Sample> = read_rows(&outputs.suspicious()).unwrap();
    assert!(summary.is_empty());
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].start_subcolo, "sjc01");
    assert_eq!(suspicious[0].target_country.as_deref(), Some("CA"));

    let quarantined = temp_dir
        .path()
        .join("suspicious/results/na/sjc/cf-global-dns_sjc01.json");
    assert!(quarantined.exists());
    assert!(
        !outputs
            .dir()
            .join("na/sjc/cf-global-dns_sjc01.json")
            .exists()
    );
}

#[tokio::test]
async fn test_verbose_run_dedups_and_records_block_errors() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = OutputPaths::new(temp_dir.path());
    outputs.ensure_row_logs().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace().times(1).returning(|_, _| {
        let path = vec![
            hop(vec![node("", "x", 0.0)]),
            hop(vec![node("10.1.0.1", "NO RESPONSE", 9.0), node("10.1.0.2", "core", 6.4)]),
            hop(vec![node("1.1.1.1", "one.one.one.one", 7.1)]),
        ];
        let failed = serde_json::json!({"colo": {"name": "ams09"}, "error": "no route to host"});
        Ok(traceroute_body(vec![
            block("ams08", "Amsterdam, NL", path.clone()),
            failed,
            block("ams08", "Amsterdam, NL", path.clone()),
            block("ams10", "Amsterdam, NL", path),
        ]))
    });

    let mut geo = MockGeoLocator::new();
    geo.expect_locate()
        .withf(|ip: &str| ip == "10.1.0.2")
        .returning(|_| located(52.37, 4.90, "NL", "Amsterdam, North Holland, NL"));

    let collected = pipeline(api, geo, outputs.dir(), 0, true)
        .run(&[ams()], &[target()], false, |rows| outputs.append(rows))
        .await
        .unwrap();

    let subcolos: Vec<&str> = collected
        .samples
        .iter()
        .map(|s| s.start_subcolo.as_str())
        .collect();
    assert_eq!(subcolos, vec!["ams08", "ams10"]);

    let sample = &collected.samples[0];
    // The target's own node carries the summary, the hop before it the location
    assert_eq!(sample.hop_ip.as_deref(), Some("1.1.1.1"));
    assert_eq!(sample.rtt_ms, Some(7));
    assert_eq!(sample.approx_nearest_region.as_deref(), Some("europe-west2"));
    assert_eq!(sample.hops_count, 3);
    assert!(!sample.cross_country);

    let skipped: Vec<SkippedSample> = read_rows(&outputs.skipped()).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].skipped_reason, SkipReason::TracerouteError);
    assert_eq!(skipped[0].start_subcolo, "ams09");

    let summary: Vec<Sample> = read_rows(&outputs.summary()).unwrap();
    assert_eq!(summary, collected.samples);
}

#[tokio::test]
async fn test_verbose_subcolo_recorded_once_across_targets() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = OutputPaths::new(temp_dir.path());
    outputs.ensure_row_logs().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace().times(2).returning(|_, _| {
        Ok(traceroute_body(vec![block(
            "ams08",
            "Amsterdam, NL",
            vec![hop(vec![node("10.1.0.2", "core", 6.4)])],
        )]))
    });

    let mut geo = MockGeoLocator::new();
    geo.expect_locate()
        .returning(|_| located(52.37, 4.90, "NL", "Amsterdam, North Holland, NL"));

    let google: Target = "8.8.8.8:google:dns.google".parse().unwrap();
    let collected = pipeline(api, geo, outputs.dir(), 0, true)
        .run(&[ams()], &[target(), google], false, |rows| outputs.append(rows))
        .await
        .unwrap();

    let rows = collected
        .samples
        .iter()
        .filter(|s| s.start_colo == "ams" && s.start_subcolo == "ams08")
        .count();
    assert_eq!(rows, 1);
    assert!(collected.skipped.is_empty());

    let summary: Vec<Sample> = read_rows(&outputs.summary()).unwrap();
    assert_eq!(summary.len(), 1);
}

#[tokio::test]
async fn test_empty_result_recorded_as_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = OutputPaths::new(temp_dir.path());
    outputs.ensure_row_logs().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace()
        .times(1)
        .returning(|_, _| Ok(serde_json::json!({"success": true, "result": []}).to_string()));
    let mut geo = MockGeoLocator::new();
    geo.expect_locate().never();

    let collected = pipeline(api, geo, outputs.dir(), 0, false)
        .run(&[sjc()], &[target()], false, |rows| outputs.append(rows))
        .await
        .unwrap();

    assert!(collected.samples.is_empty());
    assert!(collected.suspicious.is_empty());
    let skipped: Vec<SkippedSample> = read_rows(&outputs.skipped()).unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].skipped_reason, SkipReason::NoTracerouteResponse);
    assert_eq!(skipped[0].start_colo, "sjc");
}

#[tokio::test]
async fn test_local_snapshot_reused() {
    let temp_dir = TempDir::new().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace().times(1).returning(|_, _| {
        Ok(traceroute_body(vec![block(
            "sjc01",
            "San Jose, US",
            vec![hop(vec![node("198.51.100.1", "edge", 11.0)])],
        )]))
    });
    let mut geo = MockGeoLocator::new();
    geo.expect_locate()
        .returning(|_| GeoLookup::Located(Default::default()));

    let first = pipeline(api, geo, temp_dir.path(), 0, false)
        .run(&[sjc()], &[target()], false, |_| Ok(()))
        .await
        .unwrap();
    assert!(
        temp_dir
            .path()
            .join("na/sjc/cf-global-dns_1.1.1.1.json")
            .exists()
    );

    let mut offline = MockTracerouteApi::new();
    offline.expect_trace().never();
    let mut geo = MockGeoLocator::new();
    geo.expect_locate()
        .returning(|_| GeoLookup::Located(Default::default()));

    let second = pipeline(offline, geo, temp_dir.path(), 0, false)
        .run(&[sjc()], &[target()], true, |_| Ok(()))
        .await
        .unwrap();

    assert_eq!(first.samples, second.samples);
}

#[tokio::test]
async fn test_row_logs_exist_when_everything_fails() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = OutputPaths::new(temp_dir.path());
    outputs.ensure_row_logs().unwrap();

    let mut api = MockTracerouteApi::new();
    api.expect_trace().returning(|_, _| Ok(String::new()));

    pipeline(api, MockGeoLocator::new(), outputs.dir(), 0, false)
        .run(&[sjc(), ams()], &[target()], false, |rows| outputs.append(rows))
        .await
        .unwrap();

    for path in [outputs.summary(), outputs.suspicious(), outputs.skipped()] {
        assert!(path.exists(), "{} missing", path.display());
    }
    assert!(read_rows::<Sample>(&outputs.summary()).unwrap().is_empty());
    let skipped: Vec<SkippedSample> = read_rows(&outputs.skipped()).unwrap();
    assert_eq!(skipped.len(), 2);
    assert_eq!(
        fs::read_to_string(outputs.summary())
            .unwrap()
            .lines()
            .count(),
        1
    );
}
