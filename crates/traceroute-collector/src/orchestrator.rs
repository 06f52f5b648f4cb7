use crate::{
    aggregator::{
        matrix::{MatrixAxis, RttMatrix},
        stats::{self, AggregateRow},
    },
    error::SkipReason,
    exporter::{artifacts::ArtifactStore, csv},
    ingestor::{
        colos::{colos_for_region, load_colo_catalog, resolve_colos},
        fetcher::Fetcher,
        geoip::{GeoLocator, HttpGeoLocator},
        traceroute::{HttpTracerouteApi, TracerouteApi},
        types::{ColoSite, Target},
    },
    processor::{
        process::{ProcessorOptions, SampleProcessor},
        sample::{Collected, SAMPLE_COLUMNS, SKIPPED_COLUMNS, Sample, SkippedSample},
    },
    settings::{Settings, validation::validate_run_options},
};
use anyhow::Result;
use futures::{StreamExt, stream};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};

/// Column the row logs are sorted on
pub const REGION_COLUMN: &str = "start_region";

/// Per-invocation toggles and colo selection
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub colos: Vec<String>,
    /// Short business region code
    pub region: Option<String>,
    pub region_mapping: bool,
    pub verbose: bool,
    pub matrix: bool,
    pub aggregate: bool,
    pub post_process_only: bool,
    pub keep_sorted: bool,
    pub use_local_snapshot: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            colos: vec![],
            region: None,
            region_mapping: true,
            verbose: false,
            matrix: false,
            aggregate: false,
            post_process_only: false,
            keep_sorted: false,
            use_local_snapshot: false,
        }
    }
}

/// Tabular outputs under the output directory
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn summary(&self) -> PathBuf {
        self.dir.join("traceroute_summary.csv")
    }

    pub fn skipped(&self) -> PathBuf {
        self.dir.join("skipped_colos.csv")
    }

    pub fn suspicious(&self) -> PathBuf {
        self.dir.join("suspicious_traceroutes.csv")
    }

    pub fn matrix(&self) -> PathBuf {
        self.dir.join("rtt_matrix.csv")
    }

    pub fn subcolo_matrix(&self) -> PathBuf {
        self.dir.join("rtt_matrix_subcolo.csv")
    }

    pub fn aggregate(&self) -> PathBuf {
        self.dir.join("aggregate_stats.csv")
    }

    pub fn region_aggregate(&self, region: &str) -> PathBuf {
        self.dir.join(format!("aggregate_stats_{region}.csv"))
    }

    /// Row logs exist after every run, even with no rows
    pub fn ensure_row_logs(&self) -> Result<()> {
        csv::ensure_exists(&self.summary(), SAMPLE_COLUMNS)?;
        csv::ensure_exists(&self.skipped(), SKIPPED_COLUMNS)?;
        csv::ensure_exists(&self.suspicious(), SAMPLE_COLUMNS)?;
        Ok(())
    }

    /// Append one pair's rows. Called from a single consumer only.
    pub fn append(&self, collected: &Collected) -> Result<()> {
        csv::append_rows(&self.summary(), &collected.samples)?;
        csv::append_rows(&self.suspicious(), &collected.suspicious)?;
        csv::append_rows(&self.skipped(), &collected.skipped)?;
        Ok(())
    }

    pub fn sort_row_logs(&self) -> Result<()> {
        for path in [self.summary(), self.skipped(), self.suspicious()] {
            csv::sort_file_by_region(&path, REGION_COLUMN)?;
        }
        Ok(())
    }
}

/// Fans (colo, target) pairs out to tokio tasks and funnels their rows to one writer
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Fetcher,
    processor: SampleProcessor,
    concurrency: usize,
    pair_deadline: Duration,
}

impl Pipeline {
    pub fn new(
        fetcher: Fetcher,
        processor: SampleProcessor,
        concurrency: usize,
        pair_deadline: Duration,
    ) -> Self {
        Self {
            fetcher,
            processor,
            concurrency: concurrency.max(1),
            pair_deadline,
        }
    }

    pub fn from_settings(settings: &Settings, options: &RunOptions) -> Result<Self> {
        let api: Arc<dyn TracerouteApi> = Arc::new(HttpTracerouteApi::new(
            &settings.traceroute.uri,
            Duration::from_secs(settings.traceroute.request_timeout_secs),
        )?);
        let geo: Arc<dyn GeoLocator> = Arc::new(HttpGeoLocator::new(
            &settings.geoip.uri,
            Duration::from_secs(settings.geoip.request_timeout_secs),
        )?);

        let fetcher = Fetcher::new(api, &settings.traceroute.uri, settings.backoff());
        let processor = SampleProcessor::new(
            geo,
            ArtifactStore::new(&settings.output.dir),
            ProcessorOptions {
                verbose: options.verbose,
                region_mapping: options.region_mapping,
                thresholds: settings.anomaly_thresholds(),
                congestion_loss_pct: settings.thresholds.congestion_loss_pct,
            },
        );

        Ok(Self::new(
            fetcher,
            processor,
            settings.pipeline.concurrency,
            settings.pair_deadline(),
        ))
    }

    /// Process every pair. Rows are handed to `sink` in pair order as pairs finish.
    pub async fn run<F>(
        &self,
        colos: &[ColoSite],
        targets: &[Target],
        use_local_snapshot: bool,
        mut sink: F,
    ) -> Result<Collected>
    where
        F: FnMut(&Collected) -> Result<()>,
    {
        let pairs: Vec<(ColoSite, Target)> = colos
            .iter()
            .flat_map(|colo| targets.iter().map(move |t| (colo.clone(), t.clone())))
            .collect();
        self.processor.begin_run();
        info!(
            "Processing {} pairs ({} colos x {} targets)",
            pairs.len(),
            colos.len(),
            targets.len()
        );

        let mut results = stream::iter(pairs)
            .map(|(colo, target)| self.spawn_pair(colo, target, use_local_snapshot))
            .buffered(self.concurrency);

        let mut total = Collected::default();
        while let Some(collected) = results.next().await {
            sink(&collected)?;
            total.merge(collected);
        }

        Ok(total)
    }

    /// Failures are isolated per (colo, target) pair. An error, panic or elapsed deadline becomes one
    /// skipped row for that pair while the colo's other targets still run.
    async fn spawn_pair(&self, colo: ColoSite, target: Target, use_local_snapshot: bool) -> Collected {
        let pipeline = self.clone();
        let deadline = self.pair_deadline;
        let (task_colo, task_target) = (colo.clone(), target.clone());

        let handle = tokio::spawn(async move {
            tokio::time::timeout(
                deadline,
                pipeline.process_pair(&task_colo, &task_target, use_local_snapshot),
            )
            .await
        });

        let (reason, detail) = match handle.await {
            Ok(Ok(Ok(collected))) => return collected,
            Ok(Ok(Err(e))) => (SkipReason::ProcessingError, format!("{e:#}")),
            Ok(Err(_)) => (
                SkipReason::DeadlineExceeded,
                format!("pair exceeded {}s deadline", deadline.as_secs()),
            ),
            Err(e) => (SkipReason::ProcessingError, format!("task failed: {e}")),
        };

        error!(colo = %colo.code, target = %target.ip, %reason, "Error processing pair: {detail}");
        Collected::skipped(SkippedSample::new(&colo, &target, reason, &detail))
    }

    async fn process_pair(
        &self,
        colo: &ColoSite,
        target: &Target,
        use_local_snapshot: bool,
    ) -> Result<Collected> {
        let snapshot = if use_local_snapshot {
            self.processor
                .artifacts()
                .load_snapshot(colo.business_region(), &colo.code, target)
        } else {
            None
        };

        match self.fetcher.fetch(&colo.code, target, snapshot).await {
            Ok(fetched) => self.processor.process(colo, target, &fetched).await,
            Err(failure) => {
                warn!(
                    colo = %colo.code,
                    target = %target.ip,
                    reason = %failure.reason(),
                    "Skipping pair: {}",
                    failure.detail()
                );
                Ok(Collected::skipped(SkippedSample::new(
                    colo,
                    target,
                    failure.reason(),
                    failure.detail(),
                )))
            }
        }
    }
}

/// Counts reported at the end of a collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: usize,
    pub suspicious: usize,
    pub skipped: usize,
}

/// Ties settings, run options and the pipeline together for the CLI
pub struct Orchestrator {
    settings: Settings,
}

impl Orchestrator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    pub fn outputs(&self) -> OutputPaths {
        OutputPaths::new(&self.settings.output.dir)
    }

    fn select_colos(&self, options: &RunOptions) -> Vec<ColoSite> {
        let catalog = load_colo_catalog(&self.settings.output.colo_file);
        let codes = match &options.region {
            Some(region) => colos_for_region(&catalog, region),
            None => options.colos.clone(),
        };
        let colos = resolve_colos(&catalog, &codes);
        if colos.is_empty() {
            warn!("No colos selected, nothing to collect");
        }
        colos
    }

    /// Acquire and process, then post-process when requested
    pub async fn collect(&self, options: &RunOptions) -> Result<RunSummary> {
        validate_run_options(options)?;
        let outputs = self.outputs();
        outputs.ensure_row_logs()?;

        let mut summary = RunSummary::default();
        if !options.post_process_only {
            let targets = self.settings.parsed_targets()?;
            let colos = self.select_colos(options);
            let pipeline = Pipeline::from_settings(&self.settings, options)?;

            let collected = pipeline
                .run(&colos, &targets, options.use_local_snapshot, |rows| {
                    outputs.append(rows)
                })
                .await?;
            summary = RunSummary {
                samples: collected.samples.len(),
                suspicious: collected.suspicious.len(),
                skipped: collected.skipped.len(),
            };
            info!(
                samples = summary.samples,
                suspicious = summary.suspicious,
                skipped = summary.skipped,
                "Collection finished"
            );
        }

        if options.keep_sorted {
            outputs.sort_row_logs()?;
        }

        self.post_process(options)?;
        Ok(summary)
    }

    /// Matrix and aggregate reports from the persisted summary file
    pub fn post_process(&self, options: &RunOptions) -> Result<()> {
        if !options.matrix && !options.aggregate {
            return Ok(());
        }

        let outputs = self.outputs();
        let samples: Vec<Sample> = if outputs.summary().exists() {
            csv::read_rows(&outputs.summary())?
        } else {
            warn!(
                "Summary file {} not found, reporting on no samples",
                outputs.summary().display()
            );
            vec![]
        };
        info!("Post-processing {} samples", samples.len());

        if options.matrix {
            write_matrix(&outputs.matrix(), &samples, MatrixAxis::Colo)?;
            if options.verbose {
                write_matrix(&outputs.subcolo_matrix(), &samples, MatrixAxis::Subcolo)?;
            }
        }

        if options.aggregate {
            write_aggregates(&outputs.aggregate(), &stats::aggregate(&samples))?;

            if let Some(region) = &options.region {
                let regional: Vec<Sample> = samples
                    .iter()
                    .filter(|s| &s.start_region == region)
                    .cloned()
                    .collect();
                write_aggregates(
                    &outputs.region_aggregate(region),
                    &stats::aggregate(&regional),
                )?;
            }
        }

        Ok(())
    }
}

fn write_matrix(path: &Path, samples: &[Sample], axis: MatrixAxis) -> Result<()> {
    let matrix = RttMatrix::build(samples, axis);
    csv::write_table(path, &matrix.header(), &matrix.records())?;
    if !matrix.is_empty() {
        info!("RTT matrix ({axis:?}):\n{}", matrix.render());
    }
    Ok(())
}

fn write_aggregates(path: &Path, rows: &[AggregateRow]) -> Result<()> {
    let records: Vec<Vec<String>> = rows.iter().map(AggregateRow::record).collect();
    csv::write_table(path, &stats::header(), &records)?;
    info!("Aggregate statistics:\n{}", stats::render(rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::GeoPoint,
        ingestor::{
            fetcher::LinearBackoff,
            geoip::{GeoLookup, MockGeoLocator},
            traceroute::MockTracerouteApi,
        },
    };
    use tempfile::TempDir;

    fn colo(code: &str) -> ColoSite {
        ColoSite {
            code: code.to_string(),
            name: None,
            region: Some("Europe".to_string()),
            city: None,
            country: Some("NL".to_string()),
            lat: Some(52.31),
            lon: Some(4.76),
        }
    }

    fn pipeline(api: MockTracerouteApi, dir: &TempDir, deadline: Duration) -> Pipeline {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .returning(|_| GeoLookup::Located(GeoPoint::Unknown));
        Pipeline::new(
            Fetcher::new(
                Arc::new(api),
                "https://trace.example/trace",
                LinearBackoff::new(Duration::ZERO, 0),
            ),
            SampleProcessor::new(
                Arc::new(geo),
                ArtifactStore::new(dir.path()),
                ProcessorOptions::default(),
            ),
            2,
            deadline,
        )
    }

    #[tokio::test]
    async fn test_failed_pair_does_not_abort_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut api = MockTracerouteApi::new();
        api.expect_trace().returning(|colo, _| {
            if colo == "ams" {
                Ok(r#"{"success": false, "error": "colo offline", "result": []}"#.to_string())
            } else {
                Ok(r#"{"success": true, "result": [{"colos": [{"colo": {"name": "fra01"}, "hops": []}]}]}"#.to_string())
            }
        });

        let targets: Vec<Target> = vec!["1.1.1.1:cf:one.one.one.one".parse().unwrap()];
        let mut sunk = 0;
        let collected = pipeline(api, &temp_dir, Duration::from_secs(30))
            .run(&[colo("ams"), colo("fra")], &targets, false, |_| {
                sunk += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(sunk, 2);
        assert_eq!(collected.samples.len(), 1);
        assert_eq!(collected.samples[0].start_subcolo, "fra01");
        assert_eq!(collected.skipped.len(), 1);
        assert_eq!(
            collected.skipped[0].skipped_reason,
            SkipReason::FailedTracerouteExecution
        );
        assert_eq!(collected.skipped[0].skipped_detail, "colo offline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_deadline_becomes_skip() {
        struct SlowApi;

        #[async_trait::async_trait]
        impl TracerouteApi for SlowApi {
            async fn trace(&self, _colo: &str, _target_ip: &str) -> Result<String, crate::error::ApiError> {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(String::new())
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .returning(|_| GeoLookup::Located(GeoPoint::Unknown));
        let pipeline = Pipeline::new(
            Fetcher::new(
                Arc::new(SlowApi),
                "https://trace.example/trace",
                LinearBackoff::new(Duration::ZERO, 0),
            ),
            SampleProcessor::new(
                Arc::new(geo),
                ArtifactStore::new(temp_dir.path()),
                ProcessorOptions::default(),
            ),
            1,
            Duration::from_secs(5),
        );

        let targets: Vec<Target> = vec!["1.1.1.1".parse().unwrap()];
        let collected = pipeline
            .run(&[colo("ams")], &targets, false, |_| Ok(()))
            .await
            .unwrap();

        assert_eq!(collected.skipped.len(), 1);
        assert_eq!(collected.skipped[0].skipped_reason, SkipReason::DeadlineExceeded);
    }

    #[test]
    fn test_output_paths() {
        let outputs = OutputPaths::new("results");
        assert_eq!(outputs.summary(), PathBuf::from("results/traceroute_summary.csv"));
        assert_eq!(
            outputs.region_aggregate("eu"),
            PathBuf::from("results/aggregate_stats_eu.csv")
        );
    }
}
