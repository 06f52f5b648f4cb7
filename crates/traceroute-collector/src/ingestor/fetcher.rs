use crate::{
    error::FetchFailure,
    ingestor::{
        traceroute::{TracerouteApi, request_uri},
        types::{RawTraceroute, Target},
    },
};
use backon::{BackoffBuilder, Retryable};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// Linear backoff: the n-th retry waits `step * n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    step: Duration,
    retries: u32,
}

impl LinearBackoff {
    pub fn new(step: Duration, retries: u32) -> Self {
        Self { step, retries }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn delays(&self) -> Vec<Duration> {
        (1..=self.retries).map(|n| self.step * n).collect()
    }
}

impl BackoffBuilder for LinearBackoff {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        self.delays().into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Snapshot,
    Network,
}

/// A traceroute ready for processing
#[derive(Debug, Clone)]
pub struct Fetched {
    pub traceroute: RawTraceroute,
    pub source: FetchSource,
    pub request_uri: String,
    /// Retries spent before the successful attempt
    pub retries: u32,
}

/// Acquires one traceroute per (colo, target), retrying failed attempts
#[derive(Clone)]
pub struct Fetcher {
    api: Arc<dyn TracerouteApi>,
    base_uri: String,
    backoff: LinearBackoff,
}

impl Fetcher {
    pub fn new(api: Arc<dyn TracerouteApi>, base_uri: &str, backoff: LinearBackoff) -> Self {
        Self {
            api,
            base_uri: base_uri.to_string(),
            backoff,
        }
    }

    pub fn request_uri(&self, colo: &str, target_ip: &str) -> String {
        request_uri(&self.base_uri, colo, target_ip)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}?colos={colo}&targets={target_ip}", self.base_uri))
    }

    /// Use `snapshot` when present, otherwise request with retries.
    /// The returned error is terminal: the retry budget is exhausted.
    pub async fn fetch(
        &self,
        colo: &str,
        target: &Target,
        snapshot: Option<RawTraceroute>,
    ) -> Result<Fetched, FetchFailure> {
        let request_uri = self.request_uri(colo, &target.ip);

        if let Some(traceroute) = snapshot {
            info!(colo, target = %target.ip, "Using local snapshot, skipping acquisition");
            return Ok(Fetched {
                traceroute,
                source: FetchSource::Snapshot,
                request_uri,
                retries: 0,
            });
        }

        info!(colo, target = %target.ip, "Fetching traceroute");
        debug!("URI: {request_uri}");

        let retries = AtomicU32::new(0);
        let traceroute = (|| self.fetch_once(colo, &target.ip))
            .retry(self.backoff)
            .notify(|err: &FetchFailure, delay: Duration| {
                let attempt = retries.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    colo,
                    target = %target.ip,
                    attempt,
                    retry_in = ?delay,
                    error = %err,
                    "traceroute fetch failed, retrying"
                );
            })
            .await?;

        Ok(Fetched {
            traceroute,
            source: FetchSource::Network,
            request_uri,
            retries: retries.into_inner(),
        })
    }

    async fn fetch_once(&self, colo: &str, target_ip: &str) -> Result<RawTraceroute, FetchFailure> {
        let body = self
            .api
            .trace(colo, target_ip)
            .await
            .map_err(|e| FetchFailure::NoTracerouteResponse(e.to_string()))?;
        RawTraceroute::parse(&body)
    }
}
