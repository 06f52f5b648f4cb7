use crate::geo::round2;
use std::cmp::Ordering;
use tabled::{builder::Builder as TableBuilder, settings::Style};

/// Nearest-rank percentile: the value at index `ceil(p * n) - 1` of the sorted input
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted.get(index).copied()
}

pub fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Render a number without trailing zeros, rounded to 2 decimals
pub fn format_number(value: f64) -> String {
    format!("{}", round2(value))
}

pub fn render_table(header: Vec<String>, rows: Vec<Vec<String>>) -> String {
    let mut printable = vec![header];
    printable.extend(rows);

    TableBuilder::from(printable)
        .build()
        .with(Style::psql().remove_horizontals())
        .to_string()
}
