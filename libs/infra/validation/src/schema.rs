//! CSV schema DSL (SPEC_FULL.md §4.3 step 3): column presence, per-column
//! regexes, and the `change_type` column for delta-capable schemas.

use crate::errors::PreValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use tracing::instrument;

/// One column's presence and shape requirement.
pub struct ColumnSpec {
    pub name: &'static str,
    pub required: bool,
    /// `None` means any value is accepted once the column is present.
    pub pattern: Option<&'static Lazy<Regex>>,
}

/// A named CSV schema: registration list, stolen list, operator data v1/v2, GSMA, etc.
pub struct CsvSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Whether this schema accepts the delta form (adds a `change_type` column).
    pub delta_capable: bool,
}

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static RAW_IMEI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f*#]{1,16}$").unwrap());
static DATE_YMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static CHANGE_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(add|remove|update)$").unwrap());

pub static REGISTRATION_LIST_SCHEMA: CsvSchema = CsvSchema {
    name: "registration_list",
    columns: &[
        ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) },
        ColumnSpec { name: "make", required: false, pattern: None },
        ColumnSpec { name: "model", required: false, pattern: None },
        ColumnSpec { name: "status", required: false, pattern: None },
    ],
    delta_capable: true,
};

pub static STOLEN_LIST_SCHEMA: CsvSchema = CsvSchema {
    name: "stolen_list",
    columns: &[
        ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) },
        ColumnSpec { name: "reporting_date", required: false, pattern: Some(&DATE_YMD) },
    ],
    delta_capable: true,
};

pub static OPERATOR_DATA_V1_SCHEMA: CsvSchema = CsvSchema {
    name: "operator_data_v1",
    columns: &[
        ColumnSpec { name: "date", required: true, pattern: Some(&DATE_YMD) },
        ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) },
        ColumnSpec { name: "imsi", required: true, pattern: Some(&DIGITS) },
        ColumnSpec { name: "msisdn", required: true, pattern: Some(&DIGITS) },
    ],
    delta_capable: false,
};

pub static OPERATOR_DATA_V2_SCHEMA: CsvSchema = CsvSchema {
    name: "operator_data_v2",
    columns: &[
        ColumnSpec { name: "date", required: true, pattern: Some(&DATE_YMD) },
        ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) },
        ColumnSpec { name: "imsi", required: true, pattern: Some(&DIGITS) },
        ColumnSpec { name: "msisdn", required: true, pattern: Some(&DIGITS) },
        ColumnSpec { name: "rat", required: true, pattern: None },
    ],
    delta_capable: false,
};

pub static GSMA_SCHEMA: CsvSchema = CsvSchema {
    name: "gsma_data",
    columns: &[
        ColumnSpec { name: "tac", required: true, pattern: Some(&DIGITS) },
        ColumnSpec { name: "manufacturer", required: true, pattern: None },
        ColumnSpec { name: "model_name", required: true, pattern: None },
        ColumnSpec { name: "bands", required: true, pattern: None },
        ColumnSpec { name: "allocation_date", required: false, pattern: Some(&DATE_YMD) },
        ColumnSpec { name: "device_type", required: true, pattern: None },
    ],
    delta_capable: false,
};

/// A per-operator subscriber-pairing submission: which IMSI an operator
/// has paired with a given IMEI on its own subscriber registry.
pub static PAIRING_LIST_SCHEMA: CsvSchema = CsvSchema {
    name: "pairing_list",
    columns: &[
        ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) },
        ColumnSpec { name: "imsi", required: true, pattern: Some(&DIGITS) },
    ],
    delta_capable: true,
};

/// A per-operator barred-device submission: IMEIs the operator itself
/// has already barred from its network for reasons outside this system.
pub static BARRED_LIST_SCHEMA: CsvSchema = CsvSchema {
    name: "barred_list",
    columns: &[ColumnSpec { name: "imei", required: true, pattern: Some(&RAW_IMEI) }],
    delta_capable: true,
};

/// Validates every row of `reader` against `schema`. A single failing row
/// aborts validation immediately (SPEC_FULL.md §4.3: "a single failed
/// check aborts the import"); returns the total row count on success.
#[instrument(skip(schema, reader), fields(schema = schema.name, delta_mode))]
pub fn validate_csv<R: Read>(
    schema: &CsvSchema,
    mut reader: csv::Reader<R>,
    delta_mode: bool,
) -> Result<u64, PreValidationError> {
    if delta_mode && !schema.delta_capable {
        return Err(PreValidationError::MissingHeaderColumns(vec!["change_type"]));
    }

    let headers = reader.headers()?.clone();
    let missing: Vec<&'static str> = schema
        .columns
        .iter()
        .filter(|c| c.required && !headers.iter().any(|h| h == c.name))
        .map(|c| c.name)
        .collect();
    if !missing.is_empty() {
        return Err(PreValidationError::MissingHeaderColumns(missing));
    }
    if delta_mode && !headers.iter().any(|h| h == "change_type") {
        return Err(PreValidationError::MissingHeaderColumns(vec!["change_type"]));
    }

    let mut row_count: u64 = 0;
    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let row = row_index as u64 + 1;

        for column in schema.columns {
            let Some(idx) = headers.iter().position(|h| h == column.name) else {
                continue;
            };
            let Some(value) = record.get(idx) else {
                if column.required {
                    return Err(PreValidationError::MissingColumn { row, column: column.name });
                }
                continue;
            };
            if value.is_empty() {
                if column.required {
                    return Err(PreValidationError::MissingColumn { row, column: column.name });
                }
                continue;
            }
            if let Some(pattern) = column.pattern {
                if !pattern.is_match(value) {
                    return Err(PreValidationError::PatternMismatch {
                        row,
                        column: column.name,
                        value: value.to_string(),
                    });
                }
            }
        }

        if delta_mode {
            if let Some(idx) = headers.iter().position(|h| h == "change_type") {
                let value = record.get(idx).unwrap_or_default();
                if !CHANGE_TYPE.is_match(value) {
                    return Err(PreValidationError::InvalidChangeType {
                        row,
                        value: value.to_string(),
                    });
                }
            }
        }

        row_count += 1;
    }

    Ok(row_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_for(csv_text: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new().from_reader(csv_text.as_bytes())
    }

    #[test]
    fn accepts_well_formed_stolen_list() {
        let count = validate_csv(&STOLEN_LIST_SCHEMA, reader_for("imei,reporting_date\n64220297727231,2020-01-01\n"), false).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rejects_missing_required_column() {
        let err = validate_csv(&STOLEN_LIST_SCHEMA, reader_for("reporting_date\n2020-01-01\n"), false).unwrap_err();
        assert!(matches!(err, PreValidationError::MissingHeaderColumns(_)));
    }

    #[test]
    fn rejects_pattern_mismatch() {
        let err = validate_csv(&STOLEN_LIST_SCHEMA, reader_for("imei,reporting_date\nnot-an-imei!,2020-01-01\n"), false).unwrap_err();
        assert!(matches!(err, PreValidationError::PatternMismatch { .. }));
    }

    #[test]
    fn delta_mode_requires_valid_change_type() {
        let csv_text = "imei,reporting_date,change_type\n64220297727231,2020-01-01,add\n";
        let count = validate_csv(&STOLEN_LIST_SCHEMA, reader_for(csv_text), true).unwrap();
        assert_eq!(count, 1);

        let bad = "imei,reporting_date,change_type\n64220297727231,2020-01-01,delete\n";
        let err = validate_csv(&STOLEN_LIST_SCHEMA, reader_for(bad), true).unwrap_err();
        assert!(matches!(err, PreValidationError::InvalidChangeType { .. }));
    }

    #[test]
    fn delta_mode_without_change_type_column_is_rejected() {
        let err = validate_csv(&STOLEN_LIST_SCHEMA, reader_for("imei,reporting_date\n64220297727231,2020-01-01\n"), true).unwrap_err();
        assert!(matches!(err, PreValidationError::MissingHeaderColumns(_)));
    }
}
