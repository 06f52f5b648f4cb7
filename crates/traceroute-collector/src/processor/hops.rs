use crate::{
    geo::{GeoPoint, round2},
    ingestor::{
        geoip::{GeoLocator, GeoLookup},
        types::{Hop, Node},
    },
};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// RTT statistics of the node chosen as the last valid hop
#[derive(Debug, Clone, PartialEq)]
pub struct HopSummary {
    pub ip: String,
    pub mean_rtt_ms: f64,
    pub min_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub std_dev_rtt_ms: Option<f64>,
    pub packet_count: Option<u64>,
}

impl HopSummary {
    fn from_node(ip: &str, node: &Node, mean_rtt_ms: f64) -> Self {
        Self {
            ip: ip.to_string(),
            mean_rtt_ms,
            min_rtt_ms: node.min_rtt_ms,
            max_rtt_ms: node.max_rtt_ms,
            std_dev_rtt_ms: node.std_dev_rtt_ms,
            packet_count: node.packet_count,
        }
    }

    /// Mean RTT truncated to whole milliseconds
    pub fn rtt_ms(&self) -> i64 {
        self.mean_rtt_ms.trunc() as i64
    }
}

/// Walk the path from the target back toward the colo and pick the first node
/// with usable RTT statistics and the first non-target node with a location.
pub async fn analyze_last_valid_hop(
    hops: &[Hop],
    target_ip: &str,
    geo: &dyn GeoLocator,
) -> (Option<HopSummary>, GeoPoint) {
    let mut summary: Option<HopSummary> = None;
    let mut point: Option<GeoPoint> = None;

    'hops: for hop in hops.iter().rev() {
        for node in hop.nodes().iter().filter(|n| n.is_valid()) {
            let Some(ip) = node.ip.as_deref().map(str::trim) else {
                continue;
            };

            if summary.is_none() {
                if let Some(mean) = node.mean_rtt_ms.filter(|m| *m != 0.0 && m.is_finite()) {
                    debug!(ip, mean_rtt_ms = mean, "Captured hop summary");
                    summary = Some(HopSummary::from_node(ip, node, mean));
                }
            }

            if point.is_none() && ip != target_ip {
                debug!("Checking IP {ip} for unique location...");
                match geo.locate(ip).await {
                    GeoLookup::Located(located) => point = Some(located),
                    GeoLookup::Anycast => debug!(ip, "Anycast address, trying previous hop"),
                }
            }

            if summary.is_some() && point.is_some() {
                break 'hops;
            }
        }
    }

    if point.is_none() && !hops.is_empty() {
        debug!("Unable to infer final hop geo, using unknown location");
    }

    (summary, point.unwrap_or_default())
}

/// Node on a hop whose packet loss crossed the congestion threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestedHop {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub packet_loss_percent: f64,
    pub mean_rtt_ms: f64,
    pub std_dev_rtt_ms: f64,
    pub min_rtt_ms: f64,
    pub max_rtt_ms: f64,
}

/// Node whose mean RTT exceeds the path mean by more than one standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowHop {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub mean_rtt_ms: f64,
    pub std_dev_rtt_ms: f64,
    pub min_rtt_ms: f64,
    pub max_rtt_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopOutliers {
    pub congested: Vec<CongestedHop>,
    pub slow: Vec<SlowHop>,
}

pub fn extract_outliers(hops: &[Hop], congestion_loss_pct: f64) -> HopOutliers {
    if hops.is_empty() {
        return HopOutliers::default();
    }

    let first_node_rtts: Vec<f64> = hops
        .iter()
        .map(|hop| {
            hop.nodes()
                .first()
                .and_then(|n| n.mean_rtt_ms)
                .unwrap_or(0.0)
        })
        .collect();
    let mean_rtt = first_node_rtts.iter().mean();
    let std_dev_rtt = first_node_rtts.iter().population_std_dev();
    let slow_threshold = mean_rtt + std_dev_rtt;

    let mut outliers = HopOutliers::default();
    for hop in hops {
        let loss_pct = hop.packet_loss_pct();

        for node in hop.nodes() {
            let mean_rtt_ms = node.mean_rtt_ms.unwrap_or(0.0);
            let std_dev_rtt_ms = round2(node.std_dev_rtt_ms.unwrap_or(0.0));
            let min_rtt_ms = round2(node.min_rtt_ms.unwrap_or(0.0));
            let max_rtt_ms = round2(node.max_rtt_ms.unwrap_or(0.0));

            if loss_pct > congestion_loss_pct {
                outliers.congested.push(CongestedHop {
                    ip: node.ip.clone(),
                    name: node.name.clone(),
                    packet_loss_percent: loss_pct,
                    mean_rtt_ms: round2(mean_rtt_ms),
                    std_dev_rtt_ms,
                    min_rtt_ms,
                    max_rtt_ms,
                });
            }

            if mean_rtt_ms > slow_threshold {
                outliers.slow.push(SlowHop {
                    ip: node.ip.clone(),
                    name: node.name.clone(),
                    mean_rtt_ms: round2(mean_rtt_ms),
                    std_dev_rtt_ms,
                    min_rtt_ms,
                    max_rtt_ms,
                });
            }
        }
    }

    outliers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::{Coordinates, Location},
        ingestor::{geoip::MockGeoLocator, types::NO_RESPONSE},
    };

    fn node(ip: &str, name: &str, mean: Option<f64>) -> Node {
        Node {
            ip: Some(ip.to_string()),
            name: Some(name.to_string()),
            mean_rtt_ms: mean,
            ..Default::default()
        }
    }

    fn hop(nodes: Vec<Node>) -> Hop {
        Hop {
            packets_sent: Some(3),
            packets_lost: Some(0),
            nodes: Some(nodes),
            ..Default::default()
        }
    }

    fn located(country: &str) -> GeoLookup {
        GeoLookup::Located(GeoPoint::Resolved(Location {
            coordinates: Coordinates::new(1.0, 2.0),
            country: country.to_string(),
            city: format!("Somewhere, {country}"),
            region: "Somewhere".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_empty_hops_skip_lookups() {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate().times(0);

        let (summary, point) = analyze_last_valid_hop(&[], "9.9.9.9", &geo).await;
        assert!(summary.is_none());
        assert_eq!(point, GeoPoint::Unknown);
    }

    #[tokio::test]
    async fn test_skips_invalid_nodes() {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .withf(|ip: &str| ip == "1.2.3.4")
            .times(1)
            .returning(|_| located("US"));

        let hops = vec![
            hop(vec![node("", "x", Some(40.0))]),
            hop(vec![node("1.2.3.4", "ok", Some(12.3))]),
            hop(vec![node("5.6.7.8", NO_RESPONSE, Some(50.0))]),
        ];
        let (summary, point) = analyze_last_valid_hop(&hops, "9.9.9.9", &geo).await;
        let summary = summary.unwrap();
        assert_eq!(summary.ip, "1.2.3.4");
        assert_eq!(summary.rtt_ms(), 12);
        assert_eq!(point.country(), Some("US"));
    }

    #[tokio::test]
    async fn test_target_node_gives_summary_but_not_location() {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .withf(|ip: &str| ip == "10.0.0.2")
            .times(1)
            .returning(|_| located("DE"));

        let hops = vec![
            hop(vec![node("10.0.0.1", "edge", Some(1.0))]),
            hop(vec![node("10.0.0.2", "core", Some(8.0))]),
            hop(vec![node("9.9.9.9", "target", Some(9.5))]),
        ];
        let (summary, point) = analyze_last_valid_hop(&hops, "9.9.9.9", &geo).await;
        assert_eq!(summary.unwrap().ip, "9.9.9.9");
        assert_eq!(point.country(), Some("DE"));
    }

    #[tokio::test]
    async fn test_anycast_moves_to_previous_hop() {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .withf(|ip: &str| ip == "2.2.2.2")
            .times(1)
            .returning(|_| GeoLookup::Anycast);
        geo.expect_locate()
            .withf(|ip: &str| ip == "1.1.1.2")
            .times(1)
            .returning(|_| located("FR"));

        let hops = vec![
            hop(vec![node("1.1.1.2", "a", Some(3.0))]),
            hop(vec![node("2.2.2.2", "b", Some(4.0))]),
        ];
        let (summary, point) = analyze_last_valid_hop(&hops, "9.9.9.9", &geo).await;
        assert_eq!(summary.unwrap().ip, "2.2.2.2");
        assert_eq!(point.country(), Some("FR"));
    }

    #[tokio::test]
    async fn test_zero_rtt_nodes_never_summarize() {
        let mut geo = MockGeoLocator::new();
        geo.expect_locate()
            .returning(|_| GeoLookup::Located(GeoPoint::Unknown));

        let hops = vec![hop(vec![node("1.2.3.4", "a", Some(0.0)), node("1.2.3.5", "b", None)])];
        let (summary, point) = analyze_last_valid_hop(&hops, "9.9.9.9", &geo).await;
        assert!(summary.is_none());
        assert_eq!(point, GeoPoint::Unknown);
    }

    #[test]
    fn test_extract_outliers() {
        let mut lossy = hop(vec![node("10.0.0.3", "lossy", Some(2.0))]);
        lossy.packets_lost = Some(2);
        let hops = vec![
            hop(vec![node("10.0.0.1", "a", Some(1.0))]),
            hop(vec![node("10.0.0.2", "b", Some(1.0))]),
            lossy,
            hop(vec![node("10.0.0.4", "slow", Some(40.0))]),
            Hop::default(),
        ];

        let outliers = extract_outliers(&hops, 50.0);
        assert_eq!(outliers.congested.len(), 1);
        assert_eq!(outliers.congested[0].name.as_deref(), Some("lossy"));
        assert_eq!(outliers.congested[0].packet_loss_percent, 66.67);
        assert_eq!(outliers.slow.len(), 1);
        assert_eq!(outliers.slow[0].ip.as_deref(), Some("10.0.0.4"));
    }

    #[test]
    fn test_extract_outliers_empty_path() {
        assert_eq!(extract_outliers(&[], 50.0), HopOutliers::default());
    }
}
