use crate::processor::constants::{SUSPICIOUS_MAX_RTT_MS, SUSPICIOUS_MIN_DISTANCE_KM};
use serde::{Deserialize, Serialize};

/// Limits beyond which a cross-country sample is considered implausible
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub min_distance_km: f64,
    pub max_rtt_ms: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            min_distance_km: SUSPICIOUS_MIN_DISTANCE_KM,
            max_rtt_ms: SUSPICIOUS_MAX_RTT_MS,
        }
    }
}

/// Facts about a processed sample the classifier looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifierInput<'a> {
    pub colo_country: Option<&'a str>,
    pub target_country: Option<&'a str>,
    pub rtt_ms: Option<f64>,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub cross_country: bool,
    pub suspicious: bool,
}

fn resolved(country: Option<&str>) -> Option<&str> {
    country
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(crate::serializer::UNKNOWN))
}

pub fn classify(input: &ClassifierInput<'_>, thresholds: &AnomalyThresholds) -> Verdict {
    let cross_country = match (resolved(input.colo_country), resolved(input.target_country)) {
        (Some(colo), Some(target)) => !colo.eq_ignore_ascii_case(target),
        _ => false,
    };

    let suspicious = cross_country
        && match (input.rtt_ms, input.distance_km) {
            (Some(rtt), Some(distance)) => {
                distance > thresholds.min_distance_km && rtt < thresholds.max_rtt_ms
            }
            _ => false,
        };

    Verdict {
        cross_country,
        suspicious,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rtt_ms: f64, distance_km: f64) -> ClassifierInput<'static> {
        ClassifierInput {
            colo_country: Some("US"),
            target_country: Some("DE"),
            rtt_ms: Some(rtt_ms),
            distance_km: Some(distance_km),
        }
    }

    #[test]
    fn test_low_rtt_across_countries_is_suspicious() {
        let verdict = classify(&input(3.0, 1500.0), &AnomalyThresholds::default());
        assert!(verdict.cross_country);
        assert!(verdict.suspicious);
    }

    #[test]
    fn test_plausible_rtt_is_not_suspicious() {
        let verdict = classify(&input(20.0, 1500.0), &AnomalyThresholds::default());
        assert!(verdict.cross_country);
        assert!(!verdict.suspicious);
    }

    #[test]
    fn test_short_distance_is_not_suspicious() {
        let verdict = classify(&input(1.0, 1000.0), &AnomalyThresholds::default());
        assert!(!verdict.suspicious);
    }

    #[test]
    fn test_same_country_never_suspicious() {
        let mut same = input(1.0, 4000.0);
        same.target_country = Some("us");
        let verdict = classify(&same, &AnomalyThresholds::default());
        assert_eq!(verdict, Verdict::default());
    }

    #[test]
    fn test_unresolved_inputs() {
        let thresholds = AnomalyThresholds::default();

        let mut unknown_country = input(1.0, 4000.0);
        unknown_country.target_country = Some("unknown");
        assert_eq!(classify(&unknown_country, &thresholds), Verdict::default());

        let mut no_rtt = input(1.0, 4000.0);
        no_rtt.rtt_ms = None;
        let verdict = classify(&no_rtt, &thresholds);
        assert!(verdict.cross_country && !verdict.suspicious);

        let mut no_distance = input(1.0, 4000.0);
        no_distance.distance_km = None;
        assert!(!classify(&no_distance, &thresholds).suspicious);
    }

    #[test]
    fn test_thresholds_are_overridable() {
        let strict = AnomalyThresholds {
            min_distance_km: 100.0,
            max_rtt_ms: 25.0,
        };
        assert!(classify(&input(20.0, 150.0), &strict).suspicious);
    }
}
