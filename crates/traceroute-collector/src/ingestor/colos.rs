use crate::{
    geo::round2,
    ingestor::types::{ColoCatalog, ColoSite},
};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{info, warn};

/// Colo metadata entry as found in either the JSON or the CSV source
#[derive(Debug, Deserialize)]
struct ColoRecord {
    #[serde(default)]
    colo: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl ColoRecord {
    fn into_site(self, code: String) -> ColoSite {
        ColoSite {
            code,
            name: self.name,
            region: self.region,
            city: self.city,
            country: self.country,
            lat: self.lat.map(round2),
            lon: self.lon.map(round2),
        }
    }
}

/// Load colo metadata; IO/parse errors and unsupported extensions yield an empty catalog
pub fn load_colo_catalog(path: &Path) -> ColoCatalog {
    match try_load_colo_catalog(path) {
        Ok(catalog) => {
            info!("Loaded {} colos from {}", catalog.len(), path.display());
            catalog
        }
        Err(e) => {
            warn!("Error loading colo data from {}: {e:#}", path.display());
            ColoCatalog::new()
        }
    }
}

pub fn try_load_colo_catalog(path: &Path) -> Result<ColoCatalog> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        Some("csv") => load_csv(path),
        other => bail!("Unsupported colo file format: {:?}", other.unwrap_or("")),
    }
}

fn load_json(path: &Path) -> Result<ColoCatalog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read colo file: {path:?}"))?;
    let records: BTreeMap<String, ColoRecord> =
        serde_json::from_str(&contents).context("Failed to parse colo JSON")?;

    Ok(records
        .into_iter()
        .map(|(code, record)| {
            let code = code.to_lowercase();
            (code.clone(), record.into_site(code))
        })
        .collect())
}

fn load_csv(path: &Path) -> Result<ColoCatalog> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open colo file: {path:?}"))?;

    let mut catalog = ColoCatalog::new();
    for record in reader.deserialize::<ColoRecord>() {
        let mut record = record.context("Failed to parse colo CSV row")?;
        let Some(code) = record.colo.take().filter(|c| !c.trim().is_empty()) else {
            warn!("Skipping colo CSV row without a colo code");
            continue;
        };
        let code = code.trim().to_lowercase();
        catalog.insert(code.clone(), record.into_site(code));
    }
    Ok(catalog)
}

/// Colo codes whose metadata region maps to `short_region`
pub fn colos_for_region(catalog: &ColoCatalog, short_region: &str) -> Vec<String> {
    catalog
        .values()
        .filter(|site| site.business_region() == short_region)
        .map(|site| site.code.clone())
        .collect()
}

/// Resolve requested codes against the catalog, dropping unknown ones
pub fn resolve_colos(catalog: &ColoCatalog, codes: &[String]) -> Vec<ColoSite> {
    codes
        .iter()
        .filter_map(|code| {
            let code = code.trim().to_lowercase();
            let site = catalog.get(&code).cloned();
            if site.is_none() {
                warn!(colo = %code, "Colo not found in metadata, skipping");
            }
            site
        })
        .collect()
}
