//! Threshold guard (C5, SPEC_FULL.md §4.5): row-level invariants,
//! historic size-variation, and delta-sanity checks, each configured
//! with a tolerance ratio rather than a hard zero-tolerance rule.

use crate::delta::DeltaViolations;
use crate::errors::ThresholdError;
use crate::row::ImportRow;
use dirbs_core_normalize::{normalize_imei_unchecked, MccMncPrefix};

/// Row-invariant tolerances (SPEC_FULL.md §4.5.1).
#[derive(Debug, Clone)]
pub struct RowInvariantConfig {
    /// Column name -> max tolerated fraction of empty/null values.
    pub max_null_ratio: Vec<(&'static str, f64)>,
    /// Max tolerated fraction of IMEIs with a leading zero.
    pub max_leading_zero_imei_ratio: f64,
    /// Max tolerated fraction of IMEIs whose TAC falls outside every
    /// configured operator's MCC+MNC-derived allowed prefix set.
    pub max_out_of_prefix_ratio: f64,
}

impl Default for RowInvariantConfig {
    fn default() -> Self {
        Self {
            max_null_ratio: Vec::new(),
            max_leading_zero_imei_ratio: 1.0,
            max_out_of_prefix_ratio: 1.0,
        }
    }
}

/// Checks null-column, leading-zero-IMEI, and out-of-prefix ratios across
/// `rows`. `imei_column` names the column holding the raw IMEI, if any
/// (not every schema has one, e.g. GSMA rows are keyed by TAC).
/// `imsi_column` and `operator_prefixes` are both needed for the
/// out-of-prefix check; rows are only eligible for it when `imsi_column`
/// is `Some` (currently only `pairing_list` carries an IMSI).
pub fn check_row_invariants(
    rows: &[ImportRow],
    imei_column: Option<&'static str>,
    imsi_column: Option<&'static str>,
    operator_prefixes: &[MccMncPrefix],
    config: &RowInvariantConfig,
) -> Result<(), ThresholdError> {
    let total = rows.len() as u64;
    if total == 0 {
        return Ok(());
    }

    for (column, max_ratio) in &config.max_null_ratio {
        let empty = rows
            .iter()
            .filter(|r| r.get(column).map(str::is_empty).unwrap_or(true))
            .count() as u64;
        check_ratio("null_ratio", column, empty, total, *max_ratio)?;
    }

    if let Some(imei_column) = imei_column {
        let leading_zero = rows
            .iter()
            .filter(|r| r.get(imei_column).is_some_and(|v| {
                let normalized = normalize_imei_unchecked(v);
                normalized.starts_with('0')
            }))
            .count() as u64;
        check_ratio(
            "leading_zero_imei",
            imei_column,
            leading_zero,
            total,
            config.max_leading_zero_imei_ratio,
        )?;
    }

    if let Some(imsi_column) = imsi_column {
        if !operator_prefixes.is_empty() {
            let out_of_prefix = rows
                .iter()
                .filter(|r| {
                    r.get(imsi_column).is_some_and(|imsi| {
                        !operator_prefixes.iter().any(|p| imsi.starts_with(&p.prefix()))
                    })
                })
                .count() as u64;
            check_ratio(
                "out_of_prefix",
                imsi_column,
                out_of_prefix,
                total,
                config.max_out_of_prefix_ratio,
            )?;
        }
    }

    Ok(())
}

fn check_ratio(
    invariant: &'static str,
    column: &'static str,
    violating: u64,
    total: u64,
    max_ratio: f64,
) -> Result<(), ThresholdError> {
    let ratio = violating as f64 / total as f64;
    if ratio > max_ratio {
        return Err(ThresholdError::RowInvariant {
            invariant,
            column,
            violating,
            total,
            ratio,
            max_ratio,
        });
    }
    Ok(())
}

/// Historic size-variation check (SPEC_FULL.md §4.5.2): the projected
/// post-import row count must stay within an absolute-or-percentage
/// band of the previous successful import's count.
pub fn check_historic_size_variation(
    prev: u64,
    cur: u64,
    max_absolute: u64,
    max_percent: f64,
) -> Result<(), ThresholdError> {
    let allowed = max_absolute.max((max_percent * prev as f64) as u64);
    let delta = prev.abs_diff(cur);
    if delta > allowed {
        return Err(ThresholdError::HistoricSizeVariation {
            prev,
            cur,
            abs: max_absolute,
            pct: max_percent,
        });
    }
    Ok(())
}

/// Delta-update sanity check (SPEC_FULL.md §4.5.3, delta mode only):
/// the fraction of staged rows rejected for mismatched liveness must
/// not exceed `max_ratio`.
pub fn check_delta_sanity(
    violations: DeltaViolations,
    total_staged: u64,
    max_ratio: f64,
) -> Result<(), ThresholdError> {
    if total_staged == 0 {
        return Ok(());
    }
    let invalid = violations.total();
    let ratio = invalid as f64 / total_staged as f64;
    if ratio > max_ratio {
        return Err(ThresholdError::DeltaSanity {
            invalid,
            total: total_staged,
            ratio,
            max_ratio,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with_imei(imei: &str) -> ImportRow {
        let mut row = ImportRow::default();
        row.set("imei", imei.to_string());
        row
    }

    fn row_with_imsi(imsi: &str) -> ImportRow {
        let mut row = ImportRow::default();
        row.set("imsi", imsi.to_string());
        row
    }

    #[test]
    fn null_ratio_within_tolerance_passes() {
        let rows = vec![row_with_imei("1"), row_with_imei("")];
        let config = RowInvariantConfig {
            max_null_ratio: vec![("imei", 0.5)],
            ..Default::default()
        };
        assert!(check_row_invariants(&rows, None, None, &[], &config).is_ok());
    }

    #[test]
    fn null_ratio_beyond_tolerance_fails() {
        let rows = vec![row_with_imei(""), row_with_imei("")];
        let config = RowInvariantConfig {
            max_null_ratio: vec![("imei", 0.1)],
            ..Default::default()
        };
        let err = check_row_invariants(&rows, None, None, &[], &config).unwrap_err();
        assert!(matches!(err, ThresholdError::RowInvariant { .. }));
    }

    #[test]
    fn out_of_prefix_within_tolerance_passes() {
        let rows = vec![row_with_imsi("639020000000001"), row_with_imsi("639020000000002")];
        let prefixes = vec![MccMncPrefix { mcc: "639".into(), mnc: "02".into() }];
        let config = RowInvariantConfig {
            max_out_of_prefix_ratio: 0.5,
            ..Default::default()
        };
        assert!(check_row_invariants(&rows, None, Some("imsi"), &prefixes, &config).is_ok());
    }

    #[test]
    fn out_of_prefix_beyond_tolerance_fails() {
        let rows = vec![row_with_imsi("111110000000001"), row_with_imsi("111110000000002")];
        let prefixes = vec![MccMncPrefix { mcc: "639".into(), mnc: "02".into() }];
        let config = RowInvariantConfig {
            max_out_of_prefix_ratio: 0.1,
            ..Default::default()
        };
        let err = check_row_invariants(&rows, None, Some("imsi"), &prefixes, &config).unwrap_err();
        assert!(matches!(err, ThresholdError::RowInvariant { .. }));
    }

    #[test]
    fn out_of_prefix_skipped_without_imsi_column() {
        let rows = vec![row_with_imsi("111110000000001")];
        let prefixes = vec![MccMncPrefix { mcc: "639".into(), mnc: "02".into() }];
        let config = RowInvariantConfig {
            max_out_of_prefix_ratio: 0.0,
            ..Default::default()
        };
        assert!(check_row_invariants(&rows, None, None, &prefixes, &config).is_ok());
    }

    #[test]
    fn historic_size_variation_within_band_passes() {
        assert!(check_historic_size_variation(1000, 1050, 10, 0.1).is_ok());
    }

    #[test]
    fn historic_size_variation_beyond_band_fails() {
        let err = check_historic_size_variation(1000, 2000, 10, 0.1).unwrap_err();
        assert!(matches!(err, ThresholdError::HistoricSizeVariation { .. }));
    }

    #[test]
    fn delta_sanity_within_ratio_passes() {
        let violations = DeltaViolations { invalid_add: 1, invalid_remove: 0, invalid_update: 0 };
        assert!(check_delta_sanity(violations, 100, 0.05).is_ok());
    }

    #[test]
    fn delta_sanity_beyond_ratio_fails() {
        let violations = DeltaViolations { invalid_add: 10, invalid_remove: 0, invalid_update: 0 };
        let err = check_delta_sanity(violations, 100, 0.05).unwrap_err();
        assert!(matches!(err, ThresholdError::DeltaSanity { .. }));
    }
}
