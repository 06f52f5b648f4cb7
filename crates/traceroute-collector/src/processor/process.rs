use crate::{
    error::SkipReason,
    exporter::artifacts::ArtifactStore,
    geo::{distance_km, nearest_region, regions::GCP_REGIONS},
    ingestor::{
        fetcher::Fetched,
        geoip::GeoLocator,
        types::{ColoBlock, ColoSite, Target},
    },
    processor::{
        anomaly::{AnomalyThresholds, ClassifierInput, classify},
        constants::CONGESTION_LOSS_PCT,
        hops::{analyze_last_valid_hop, extract_outliers},
        sample::{Collected, Sample, SkippedSample},
    },
    serializer::UNKNOWN,
};
use anyhow::Result;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ProcessorOptions {
    /// Process every sub-colo block instead of only the first
    pub verbose: bool,
    /// Map the inferred location to the nearest candidate region
    pub region_mapping: bool,
    pub thresholds: AnomalyThresholds,
    pub congestion_loss_pct: f64,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            region_mapping: true,
            thresholds: AnomalyThresholds::default(),
            congestion_loss_pct: CONGESTION_LOSS_PCT,
        }
    }
}

/// Sub-colos already recorded per logical colo, shared by every clone of a processor
type SeenSubcolos = Arc<Mutex<HashMap<String, HashSet<String>>>>;

/// Turns a fetched traceroute into sample rows, one per retained sub-colo
#[derive(Clone)]
pub struct SampleProcessor {
    geo: Arc<dyn GeoLocator>,
    artifacts: ArtifactStore,
    options: ProcessorOptions,
    seen: SeenSubcolos,
}

/// Country of a sub-colo taken from its "City, Country" label when it has one
fn colo_country(block: &ColoBlock, colo: &ColoSite) -> Option<String> {
    let from_city = block.city().and_then(|city| {
        let parts: Vec<&str> = city.split(',').map(str::trim).collect();
        (parts.len() > 1)
            .then(|| parts.last().copied())
            .flatten()
            .filter(|c| !c.is_empty())
    });

    from_city
        .map(str::to_string)
        .or_else(|| colo.country.clone())
        .filter(|c| !c.is_empty() && c != UNKNOWN)
}

impl SampleProcessor {
    pub fn new(geo: Arc<dyn GeoLocator>, artifacts: ArtifactStore, options: ProcessorOptions) -> Self {
        Self {
            geo,
            artifacts,
            options,
            seen: SeenSubcolos::default(),
        }
    }

    /// Forget the sub-colos recorded by a previous run
    pub fn begin_run(&self) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// First claim of (colo, sub-colo) in this run wins
    fn claim_subcolo(&self, colo: &str, subcolo: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(colo.to_string())
            .or_default()
            .insert(subcolo.to_string())
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub async fn process(
        &self,
        colo: &ColoSite,
        target: &Target,
        fetched: &Fetched,
    ) -> Result<Collected> {
        let region = colo.business_region();
        let target_artifact = self.artifacts.target_path(region, &colo.code, target);
        self.artifacts
            .write_json(&target_artifact, &fetched.traceroute)?;

        let blocks: Vec<&ColoBlock> = if self.options.verbose {
            fetched.traceroute.blocks().collect()
        } else {
            fetched.traceroute.blocks().take(1).collect()
        };
        if blocks.is_empty() {
            warn!(
                colo = %colo.code,
                target = %target.ip,
                reason = %SkipReason::NoTracerouteResponse,
                "Traceroute result has no colo blocks"
            );
            return Ok(Collected::skipped(SkippedSample::new(
                colo,
                target,
                SkipReason::NoTracerouteResponse,
                "result carried no colo blocks",
            )));
        }

        let mut collected = Collected::default();

        for block in blocks {
            let subcolo = block.subcolo();
            if self.options.verbose && !self.claim_subcolo(&colo.code, subcolo) {
                debug!(colo = %colo.code, subcolo, "Sub-colo already processed, skipping");
                continue;
            }

            if let Some(error) = block.block_error() {
                warn!(
                    colo = %colo.code,
                    subcolo,
                    target = %target.ip,
                    reason = %SkipReason::TracerouteError,
                    "Traceroute error: {error}"
                );
                collected.skipped.push(
                    SkippedSample::new(colo, target, SkipReason::TracerouteError, error)
                        .with_subcolo(subcolo),
                );
                continue;
            }

            let subcolo_artifact = self
                .artifacts
                .subcolo_path(region, &colo.code, target, subcolo);
            self.artifacts.write_json(&subcolo_artifact, block)?;

            let sample = self.build_sample(colo, target, block, fetched).await;
            if sample.suspicious {
                warn!(
                    colo = %colo.code,
                    subcolo,
                    target = %target.ip,
                    rtt_ms = ?sample.rtt_ms,
                    distance_km = ?sample.target_distance_km,
                    "Suspicious traceroute, quarantining"
                );
                self.quarantine(&subcolo_artifact, &target_artifact)?;
                collected.suspicious.push(sample);
            } else {
                info!(
                    colo = %colo.code,
                    subcolo,
                    target = %target.ip,
                    rtt_ms = ?sample.rtt_ms,
                    nearest_region = ?sample.approx_nearest_region,
                    "Processed traceroute"
                );
                collected.samples.push(sample);
            }
        }

        Ok(collected)
    }

    // The per-target artifact is shared with other sub-colos of the same result, so it is copied
    fn quarantine(&self, subcolo_artifact: &Path, target_artifact: &Path) -> Result<()> {
        self.artifacts.quarantine(subcolo_artifact, false)?;
        self.artifacts.quarantine(target_artifact, true)?;
        Ok(())
    }

    async fn build_sample(
        &self,
        colo: &ColoSite,
        target: &Target,
        block: &ColoBlock,
        fetched: &Fetched,
    ) -> Sample {
        let hops = block.hops();
        let (summary, point) = analyze_last_valid_hop(hops, &target.ip, self.geo.as_ref()).await;

        let colo_coordinates = colo.coordinates();
        let target_coordinates = point.coordinates();
        let distance = distance_km(colo_coordinates, target_coordinates);
        let nearest = if self.options.region_mapping {
            nearest_region(target_coordinates, GCP_REGIONS)
        } else {
            None
        };

        let colo_country = colo_country(block, colo);
        let verdict = classify(
            &ClassifierInput {
                colo_country: colo_country.as_deref(),
                target_country: point.country(),
                rtt_ms: summary.as_ref().map(|s| s.mean_rtt_ms),
                distance_km: distance,
            },
            &self.options.thresholds,
        );
        let outliers = extract_outliers(hops, self.options.congestion_loss_pct);

        Sample {
            start_region: colo.business_region().to_string(),
            start_colo: colo.code.clone(),
            start_subcolo: block.subcolo().to_string(),
            trace_target: target.name.clone(),
            target_ip: target.ip.clone(),
            target_domain: target.domain.clone(),
            rtt_ms: summary.as_ref().map(|s| s.rtt_ms()),
            min_rtt_ms: summary.as_ref().and_then(|s| s.min_rtt_ms),
            max_rtt_ms: summary.as_ref().and_then(|s| s.max_rtt_ms),
            std_dev_rtt_ms: summary.as_ref().and_then(|s| s.std_dev_rtt_ms),
            packet_count: summary.as_ref().and_then(|s| s.packet_count),
            hop_ip: summary.as_ref().map(|s| s.ip.clone()),
            hops_count: hops.len(),
            traceroute_time_ms: block.traceroute_time_ms,
            start_city: block
                .city()
                .or(colo.city.as_deref())
                .unwrap_or(UNKNOWN)
                .to_string(),
            colo_lat: colo_coordinates.map(|c| c.lat),
            colo_long: colo_coordinates.map(|c| c.long),
            colo_country,
            approx_final_hop: point.city().map(str::to_string),
            target_lat: target_coordinates.map(|c| c.lat),
            target_long: target_coordinates.map(|c| c.long),
            target_country: point.country().map(str::to_string),
            target_region: point.region().map(str::to_string),
            approx_nearest_region: nearest.map(|n| n.region.id.to_string()),
            approx_region_city: nearest.map(|n| n.region.city.to_string()),
            target_distance_km: distance,
            cross_country: verdict.cross_country,
            suspicious: verdict.suspicious,
            congested_hops: outliers.congested,
            slowest_hops: outliers.slow,
            request_uri: fetched.request_uri.clone(),
        }
    }
}
