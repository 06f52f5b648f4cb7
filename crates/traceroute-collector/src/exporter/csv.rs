use crate::aggregator::ordering::compare_regions;
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::{self, OpenOptions},
    path::Path,
};
use tracing::{debug, info};

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn is_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Create `path` with only a header row unless it already has content
pub fn ensure_exists(path: &Path, columns: &[&str]) -> Result<()> {
    if !is_empty_file(path) {
        return Ok(());
    }
    create_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(columns)?;
    writer.flush()?;
    debug!("Created {}", path.display());
    Ok(())
}

/// Append rows, writing the header only when the file is new or empty
pub fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    create_parent(path)?;
    let write_header = is_empty_file(path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer.flush()?;
    info!("Appended {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("Invalid row {} in {}", i + 1, path.display())))
        .collect()
}

/// Replace `path` with a header and string rows
pub fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    create_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Re-sort a CSV file in place by region precedence of `column`
pub fn sort_file_by_region(path: &Path, column: &str) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let header = reader.headers()?.clone();
    let index = header
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("Column '{column}' not found in {}", path.display()))?;

    let mut records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, _>>()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    records.sort_by(|a, b| compare_regions(a.get(index).unwrap_or(""), b.get(index).unwrap_or("")));

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to rewrite {}", path.display()))?;
    writer.write_record(&header)?;
    for record in &records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    debug!("Sorted {} by {column}", path.display());
    Ok(())
}
