use std::cmp::Ordering;

/// Business regions in report order; anything else sorts after these
pub const REGION_PRECEDENCE: &[&str] = &["overall", "na", "latam", "eu", "me", "afr", "apac"];

type RegionClass = (&'static str, fn(&str) -> bool);

/// Candidate region classes in matrix order, first match wins
const CLOUD_REGION_CLASSES: &[RegionClass] = &[
    ("us", |r| r.starts_with("us-")),
    ("northamerica", |r| r.starts_with("northamerica-")),
    ("asia", |r| r.starts_with("asia-")),
    ("australia", |r| r.starts_with("australia-")),
    ("europe", |r| r.starts_with("europe-")),
    ("southamerica", |r| r.starts_with("southamerica-")),
    ("me", |r| r.starts_with("me-")),
    ("africa", |r| r.starts_with("africa-")),
];

pub fn region_rank(region: &str) -> usize {
    REGION_PRECEDENCE
        .iter()
        .position(|r| *r == region)
        .unwrap_or(REGION_PRECEDENCE.len())
}

pub fn compare_regions(a: &str, b: &str) -> Ordering {
    region_rank(a).cmp(&region_rank(b)).then_with(|| a.cmp(b))
}

/// Stable sort by business region precedence; sorting sorted input is a no-op
pub fn sort_by_region<T>(rows: &mut [T], region: impl Fn(&T) -> &str) {
    rows.sort_by(|a, b| compare_regions(region(a), region(b)));
}

pub fn cloud_region_rank(region: &str) -> usize {
    CLOUD_REGION_CLASSES
        .iter()
        .position(|(_, matches)| matches(region))
        .unwrap_or(CLOUD_REGION_CLASSES.len())
}

pub fn compare_cloud_regions(a: &str, b: &str) -> Ordering {
    cloud_region_rank(a)
        .cmp(&cloud_region_rank(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_precedence() {
        let mut regions = vec!["zz", "apac", "eu", "aa", "overall", "na", "latam"];
        sort_by_region(&mut regions, |r| r);
        assert_eq!(
            regions,
            vec!["overall", "na", "latam", "eu", "apac", "aa", "zz"]
        );
    }

    #[test]
    fn test_region_sort_is_stable_and_idempotent() {
        let mut rows = vec![("eu", 1), ("na", 2), ("eu", 3), ("test", 4), ("na", 5)];
        sort_by_region(&mut rows, |r| r.0);
        let once = rows.clone();
        assert_eq!(once, vec![("na", 2), ("na", 5), ("eu", 1), ("eu", 3), ("test", 4)]);

        sort_by_region(&mut rows, |r| r.0);
        assert_eq!(rows, once);
    }

    #[test]
    fn test_cloud_region_order() {
        let mut regions = vec![
            "africa-south1",
            "europe-west2",
            "us-west2",
            "asia-east1",
            "northamerica-northeast1",
            "me-west1",
            "australia-southeast1",
            "southamerica-east1",
            "custom-region",
            "us-east4",
        ];
        regions.sort_by(|a, b| compare_cloud_regions(a, b));
        assert_eq!(
            regions,
            vec![
                "us-east4",
                "us-west2",
                "northamerica-northeast1",
                "asia-east1",
                "australia-southeast1",
                "europe-west2",
                "southamerica-east1",
                "me-west1",
                "africa-south1",
                "custom-region",
            ]
        );
    }
}
