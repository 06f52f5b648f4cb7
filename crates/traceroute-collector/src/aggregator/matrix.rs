use crate::{
    aggregator::{
        ordering::{compare_cloud_regions, compare_regions},
        util::{format_number, render_table},
    },
    processor::sample::Sample,
};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Marker for a (region, colo) pair with no samples
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixAxis {
    /// One column per logical colo
    Colo,
    /// One column per sub-colo, falling back to the colo when unnamed
    Subcolo,
}

impl MatrixAxis {
    fn label<'a>(&self, sample: &'a Sample) -> &'a str {
        match self {
            Self::Colo => &sample.start_colo,
            Self::Subcolo => sample.location_label(),
        }
    }
}

/// Average RTT keyed by (nearest region, colo or sub-colo)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttMatrix {
    pub regions: Vec<String>,
    pub colos: Vec<String>,
    cells: HashMap<(String, String), f64>,
}

impl RttMatrix {
    /// Samples without a nearest region or a usable RTT are left out
    pub fn build(samples: &[Sample], axis: MatrixAxis) -> Self {
        let mut sums: HashMap<(String, String), (f64, usize)> = HashMap::new();
        // First business region seen for each column label
        let mut colo_regions: IndexMap<String, String> = IndexMap::new();

        for sample in samples {
            let (Some(region), Some(rtt)) = (
                sample.approx_nearest_region.as_deref(),
                sample.usable_rtt_ms(),
            ) else {
                continue;
            };
            let label = axis.label(sample);
            colo_regions
                .entry(label.to_string())
                .or_insert_with(|| sample.start_region.clone());

            let entry = sums
                .entry((region.to_string(), label.to_string()))
                .or_insert((0.0, 0));
            entry.0 += rtt as f64;
            entry.1 += 1;
        }

        let mut colos: Vec<(String, String)> = colo_regions.into_iter().collect();
        colos.sort_by(|(a, a_region), (b, b_region)| {
            compare_regions(a_region, b_region).then_with(|| a.cmp(b))
        });

        let mut regions: Vec<String> = sums.keys().map(|(r, _)| r.clone()).collect();
        regions.sort_by(|a, b| compare_cloud_regions(a, b));
        regions.dedup();

        let cells = sums
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect();

        Self {
            regions,
            colos: colos.into_iter().map(|(label, _)| label).collect(),
            cells,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, region: &str, colo: &str) -> Option<f64> {
        self.cells
            .get(&(region.to_string(), colo.to_string()))
            .copied()
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once("region".to_string())
            .chain(self.colos.iter().cloned())
            .collect()
    }

    pub fn records(&self) -> Vec<Vec<String>> {
        self.regions
            .iter()
            .map(|region| {
                std::iter::once(region.clone())
                    .chain(self.colos.iter().map(|colo| {
                        self.cell(region, colo)
                            .map(format_number)
                            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
                    }))
                    .collect()
            })
            .collect()
    }

    pub fn render(&self) -> String {
        render_table(self.header(), self.records())
    }
}
