//! `data_catalog` row (SPEC_FULL.md §3 entity 8, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed input file, recorded regardless of whether it ultimately
/// passed pre-validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataCatalogEntry {
    /// Original filename as submitted (zip stem).
    pub filename: String,
    /// MD5 of the file contents.
    pub md5: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Whether the file passed pre-validation.
    pub is_valid: bool,
    /// First time this exact file (by md5) was observed.
    pub first_seen: DateTime<Utc>,
    /// Most recent time this exact file was observed.
    pub last_seen: DateTime<Utc>,
}
