//! The staged-row model: a header-keyed column map plus an importer's
//! derived columns (SPEC_FULL.md §4.4 "post-copy hooks").

use std::collections::BTreeMap;

/// One row as streamed from a validated CSV batch, before or after
/// importer-specific derivation. `BTreeMap` keeps iteration (and thus
/// any hashing/debug output) order-stable across rows with the same
/// column set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportRow {
    pub columns: BTreeMap<String, String>,
}

impl ImportRow {
    #[must_use]
    pub fn from_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let columns = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        Self { columns }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn set(&mut self, column: &str, value: String) {
        self.columns.insert(column.to_string(), value);
    }

    /// The declared `change_type` column, if present (delta mode only).
    #[must_use]
    pub fn change_type(&self) -> Option<ChangeType> {
        match self.get("change_type") {
            Some("add") => Some(ChangeType::Add),
            Some("remove") => Some(ChangeType::Remove),
            Some("update") => Some(ChangeType::Update),
            _ => None,
        }
    }

    /// The row's payload excluding primary-key columns and `change_type`,
    /// used to detect whether an `UPDATE` candidate actually changed.
    #[must_use]
    pub fn payload_excluding(&self, pk_columns: &[&str]) -> BTreeMap<&str, &str> {
        self.columns
            .iter()
            .filter(|(k, _)| k.as_str() != "change_type" && !pk_columns.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Add,
    Remove,
    Update,
}

/// Reads every data row from `batches` (each a CSV file with its own
/// header row, per [`dirbs_infra_validation::split_into_batches`]) into
/// [`ImportRow`]s, applying `normalize` to each (the importer-specific
/// derivation hook, e.g. `imei_norm`/`virt_imei_shard`/`rat_bitmask`).
pub fn load_staging_rows(
    batches: &[std::path::PathBuf],
    mut normalize: impl FnMut(&mut ImportRow),
) -> Result<Vec<ImportRow>, crate::errors::ThresholdError> {
    let mut rows = Vec::new();
    for batch_path in batches {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(batch_path)?;
        let headers = reader.headers()?.clone();
        for record in reader.records() {
            let record = record?;
            let mut row = ImportRow::from_record(&headers, &record);
            normalize(&mut row);
            rows.push(row);
        }
    }
    Ok(rows)
}
