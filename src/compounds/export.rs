use std::collections::HashSet;
use std::path::Path;

use csv::ReaderBuilder;
use log::info;
use thiserror::Error;

use crate::results::table::COMPOUNDS_ID;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not read Compounds export: {0}")]
    Csv(#[from] csv::Error),

    #[error("Compounds export has no '{0}' column")]
    MissingColumn(String),

    #[error("Invalid compound id '{value}' on line {line}")]
    InvalidId { value: String, line: u64 },
}

/// Compound ids listed in the tab-separated Compounds table exported by Compound Discoverer.
pub fn read_compound_ids(path: &Path) -> Result<HashSet<i64>, ExportError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let index = reader
        .headers()?
        .iter()
        .position(|header| header.trim() == COMPOUNDS_ID)
        .ok_or_else(|| ExportError::MissingColumn(COMPOUNDS_ID.to_string()))?;

    let mut ids = HashSet::new();
    for record in reader.records() {
        let record = record?;
        let value = record.get(index).unwrap_or("").trim();
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let id = value.parse::<i64>().map_err(|_| ExportError::InvalidId {
            value: value.to_string(),
            line,
        })?;
        ids.insert(id);
    }

    info!("Compounds export lists {} compounds", ids.len());
    Ok(ids)
}
