use crate::{
    aggregator::{
        ordering::sort_by_region,
        util::{format_number, percentile, render_table, sort_values},
    },
    processor::sample::Sample,
    serializer::{NOT_APPLICABLE, UNKNOWN},
};
use indexmap::IndexMap;
use itertools::Itertools;
use statrs::statistics::Statistics;

/// Pseudo-region spanning every sample
pub const OVERALL: &str = "overall";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Avg,
    Min,
    Max,
    P50,
    P90,
}

impl Stat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::P50 => "p50",
            Self::P90 => "p90",
        }
    }
}

const FULL_STATS: &[Stat] = &[Stat::Avg, Stat::Min, Stat::Max, Stat::P50, Stat::P90];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Rtt,
    MinRtt,
    MaxRtt,
    StdDevRtt,
    HopCount,
    Distance,
    TracerouteTime,
}

impl Metric {
    /// Output column order
    pub const ALL: [Metric; 7] = [
        Self::Rtt,
        Self::MinRtt,
        Self::MaxRtt,
        Self::StdDevRtt,
        Self::HopCount,
        Self::Distance,
        Self::TracerouteTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rtt => "rtt_ms",
            Self::MinRtt => "min_rtt_ms",
            Self::MaxRtt => "max_rtt_ms",
            Self::StdDevRtt => "std_dev_rtt_ms",
            Self::HopCount => "hops_count",
            Self::Distance => "distance_km",
            Self::TracerouteTime => "traceroute_time_ms",
        }
    }

    pub fn stats(&self) -> &'static [Stat] {
        match self {
            Self::MinRtt => &[Stat::Min],
            Self::MaxRtt => &[Stat::Max],
            Self::StdDevRtt => &[Stat::Avg],
            Self::Rtt | Self::HopCount | Self::Distance | Self::TracerouteTime => FULL_STATS,
        }
    }

    /// Whether the min/max identifying tuples are reported
    pub fn has_tuples(&self) -> bool {
        self.stats().contains(&Stat::Avg) && self.stats().len() > 1
    }

    fn value(&self, sample: &Sample) -> Option<f64> {
        let value = match self {
            Self::Rtt => sample.rtt_ms.map(|v| v as f64),
            Self::MinRtt => sample.min_rtt_ms,
            Self::MaxRtt => sample.max_rtt_ms,
            Self::StdDevRtt => sample.std_dev_rtt_ms,
            Self::HopCount => Some(sample.hops_count as f64),
            Self::Distance => sample.target_distance_km,
            Self::TracerouteTime => sample.traceroute_time_ms,
        };
        value.filter(|v| *v != 0.0 && v.is_finite())
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .stats()
            .iter()
            .map(|stat| format!("{}_{}", self.name(), stat.name()))
            .collect();
        if self.has_tuples() {
            columns.push(format!("{}_min_tuple", self.name()));
            columns.push(format!("{}_max_tuple", self.name()));
        }
        columns
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSummary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub min_tuple: Option<String>,
    pub max_tuple: Option<String>,
}

impl MetricSummary {
    pub fn get(&self, stat: Stat) -> Option<f64> {
        match stat {
            Stat::Avg => self.avg,
            Stat::Min => self.min,
            Stat::Max => self.max,
            Stat::P50 => self.p50,
            Stat::P90 => self.p90,
        }
    }
}

/// Statistics for one region, or for every sample under "overall"
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub region: String,
    pub sample_size: usize,
    /// Metrics with no qualifying samples are absent
    pub metrics: IndexMap<Metric, MetricSummary>,
}

/// "(sub-colo or colo, nearest region, rounded km)"
fn identifying_tuple(sample: &Sample) -> String {
    let region = sample
        .approx_nearest_region
        .as_deref()
        .unwrap_or(NOT_APPLICABLE);
    let distance = sample
        .target_distance_km
        .map(|km| format!("{}", km.round() as i64))
        .unwrap_or_else(|| UNKNOWN.to_string());
    format!("({}, {region}, {distance})", sample.location_label())
}

fn summarize(metric: Metric, samples: &[&Sample]) -> Option<MetricSummary> {
    let values: Vec<(f64, &Sample)> = samples
        .iter()
        .filter_map(|s| metric.value(s).map(|v| (v, *s)))
        .collect();
    if values.is_empty() {
        return None;
    }

    let mut sorted: Vec<f64> = values.iter().map(|(v, _)| *v).collect();
    sort_values(&mut sorted);

    // First sample wins ties
    let min_sample = values
        .iter()
        .fold(None::<&(f64, &Sample)>, |best, entry| match best {
            Some(b) if b.0 <= entry.0 => Some(b),
            _ => Some(entry),
        });
    let max_sample = values
        .iter()
        .fold(None::<&(f64, &Sample)>, |best, entry| match best {
            Some(b) if b.0 >= entry.0 => Some(b),
            _ => Some(entry),
        });

    let stats = metric.stats();
    let wants = |stat: Stat| stats.contains(&stat);
    let tuple = |entry: Option<&(f64, &Sample)>| {
        entry
            .filter(|_| metric.has_tuples())
            .map(|(_, s)| identifying_tuple(s))
    };

    Some(MetricSummary {
        avg: wants(Stat::Avg).then(|| sorted.iter().mean()),
        min: wants(Stat::Min).then(|| sorted[0]),
        max: wants(Stat::Max).then(|| sorted[sorted.len() - 1]),
        p50: wants(Stat::P50).then(|| percentile(&sorted, 0.5)).flatten(),
        p90: wants(Stat::P90).then(|| percentile(&sorted, 0.9)).flatten(),
        min_tuple: tuple(min_sample),
        max_tuple: tuple(max_sample),
    })
}

pub fn aggregate_group(region: &str, samples: &[&Sample]) -> AggregateRow {
    let usable: Vec<&Sample> = samples
        .iter()
        .copied()
        .filter(|s| s.usable_rtt_ms().is_some())
        .collect();

    let metrics = Metric::ALL
        .iter()
        .filter_map(|metric| summarize(*metric, &usable).map(|summary| (*metric, summary)))
        .collect();

    AggregateRow {
        region: region.to_string(),
        sample_size: usable.len(),
        metrics,
    }
}

/// "overall" followed by one row per region, in region precedence order
pub fn aggregate(samples: &[Sample]) -> Vec<AggregateRow> {
    let all: Vec<&Sample> = samples.iter().collect();
    let mut rows = vec![aggregate_group(OVERALL, &all)];

    let by_region = samples.iter().into_group_map_by(|s| s.start_region.as_str());
    let mut regions: Vec<AggregateRow> = by_region
        .into_iter()
        .map(|(region, group)| aggregate_group(region, &group))
        .collect();
    sort_by_region(&mut regions, |row| row.region.as_str());

    rows.extend(regions);
    rows
}

pub fn header() -> Vec<String> {
    ["region".to_string(), "sample_size".to_string()]
        .into_iter()
        .chain(Metric::ALL.iter().flat_map(|m| m.columns()))
        .collect()
}

impl AggregateRow {
    pub fn record(&self) -> Vec<String> {
        let mut record = vec![self.region.clone(), self.sample_size.to_string()];
        for metric in Metric::ALL {
            let summary = self.metrics.get(&metric);
            for stat in metric.stats() {
                record.push(
                    summary
                        .and_then(|s| s.get(*stat))
                        .map(format_number)
                        .unwrap_or_default(),
                );
            }
            if metric.has_tuples() {
                record.push(summary.and_then(|s| s.min_tuple.clone()).unwrap_or_default());
                record.push(summary.and_then(|s| s.max_tuple.clone()).unwrap_or_default());
            }
        }
        record
    }
}

/// Console view: region, sample size and the RTT columns
pub fn render(rows: &[AggregateRow]) -> String {
    let columns = Metric::Rtt.stats();
    let header: Vec<String> = ["region", "sample_size"]
        .into_iter()
        .map(str::to_string)
        .chain(Metric::Rtt.columns().into_iter().take(columns.len()))
        .collect();
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let summary = row.metrics.get(&Metric::Rtt);
            [row.region.clone(), row.sample_size.to_string()]
                .into_iter()
                .chain(columns.iter().map(|stat| {
                    summary
                        .and_then(|s| s.get(*stat))
                        .map(format_number)
                        .unwrap_or_default()
                }))
                .collect()
        })
        .collect();
    render_table(header, records)
}
