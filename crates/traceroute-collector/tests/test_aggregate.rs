mod common;

use common::create_test_settings;
use std::fs;
use tempfile::TempDir;
use traceroute_collector::{
    aggregator::{
        matrix::{MatrixAxis, RttMatrix},
        ordering::sort_by_region,
        stats::{Metric, OVERALL, aggregate},
    },
    exporter::csv::{append_rows, sort_file_by_region},
    orchestrator::{Orchestrator, REGION_COLUMN, RunOptions},
    processor::sample::Sample,
};

fn sample(region: &str, colo: &str, subcolo: &str, nearest: &str, rtt_ms: i64) -> Sample {
    Sample {
        start_region: region.to_string(),
        start_colo: colo.to_string(),
        start_subcolo: subcolo.to_string(),
        trace_target: "cf-global-dns".to_string(),
        target_ip: "1.1.1.1".to_string(),
        target_domain: "one.one.one.one".to_string(),
        rtt_ms: Some(rtt_ms),
        hops_count: 8,
        traceroute_time_ms: Some(900.0),
        target_distance_km: Some(rtt_ms as f64 * 50.0),
        approx_nearest_region: Some(nearest.to_string()),
        start_city: "unknown".to_string(),
        ..Default::default()
    }
}

fn samples() -> Vec<Sample> {
    vec![
        sample("eu", "ams", "ams08", "europe-west4", 10),
        sample("na", "sjc", "sjc01", "us-west2", 20),
        sample("eu", "fra", "fra02", "europe-west3", 30),
        sample("apac", "nrt", "nrt01", "asia-northeast1", 40),
        sample("na", "iad", "iad03", "us-east4", 0),
    ]
}

#[test]
fn test_overall_percentiles_use_nearest_rank() {
    let rows = aggregate(&samples());
    let overall = &rows[0];
    assert_eq!(overall.region, OVERALL);
    // The zero RTT row is excluded
    assert_eq!(overall.sample_size, 4);

    let rtt = &overall.metrics[&Metric::Rtt];
    assert_eq!(rtt.p50, Some(20.0));
    assert_eq!(rtt.p90, Some(40.0));
    assert_eq!(rtt.min_tuple.as_deref(), Some("(ams08, europe-west4, 500)"));
    assert_eq!(rtt.max_tuple.as_deref(), Some("(nrt01, asia-northeast1, 2000)"));
}

#[test]
fn test_sorting_sorted_rows_is_noop() {
    let mut rows = samples();
    sort_by_region(&mut rows, |s| s.start_region.as_str());
    let sorted = rows.clone();
    sort_by_region(&mut rows, |s| s.start_region.as_str());
    assert_eq!(rows, sorted);

    let regions: Vec<&str> = rows.iter().map(|s| s.start_region.as_str()).collect();
    assert_eq!(regions, vec!["na", "na", "eu", "eu", "apac"]);
}

#[test]
fn test_sort_file_in_place_twice() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("traceroute_summary.csv");
    append_rows(&path, &samples()).unwrap();

    sort_file_by_region(&path, REGION_COLUMN).unwrap();
    let once = fs::read_to_string(&path).unwrap();
    sort_file_by_region(&path, REGION_COLUMN).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), once);
}

#[test]
fn test_matrix_marks_missing_cells() {
    let matrix = RttMatrix::build(&samples(), MatrixAxis::Colo);
    assert_eq!(matrix.colos, vec!["sjc", "ams", "fra", "nrt"]);
    assert_eq!(matrix.regions[0], "us-west2");
    assert_eq!(matrix.cell("us-west2", "ams"), None);

    let records = matrix.records();
    assert!(records.iter().all(|r| r.len() == matrix.colos.len() + 1));
    assert!(records[0].contains(&"N/A".to_string()));
}

#[tokio::test]
async fn test_report_from_existing_summary() {
    let temp_dir = TempDir::new().unwrap();
    let settings = create_test_settings(temp_dir.path());
    let orchestrator = Orchestrator::new(&settings);
    let outputs = orchestrator.outputs();
    append_rows(&outputs.summary(), &samples()).unwrap();

    let options = RunOptions {
        region: Some("eu".to_string()),
        verbose: true,
        matrix: true,
        aggregate: true,
        post_process_only: true,
        ..Default::default()
    };
    let summary = orchestrator.collect(&options).await.unwrap();
    assert_eq!(summary.samples, 0);

    for path in [
        outputs.matrix(),
        outputs.subcolo_matrix(),
        outputs.aggregate(),
        outputs.region_aggregate("eu"),
        outputs.skipped(),
        outputs.suspicious(),
    ] {
        assert!(path.exists(), "{} missing", path.display());
    }

    let regional = fs::read_to_string(outputs.region_aggregate("eu")).unwrap();
    let regions: Vec<&str> = regional
        .lines()
        .skip(1)
        .filter_map(|l| l.split(',').next())
        .collect();
    assert_eq!(regions, vec!["overall", "eu"]);

    let matrix = fs::read_to_string(outputs.matrix()).unwrap();
    assert!(matrix.starts_with("region,sjc,ams,fra,nrt"));
}
