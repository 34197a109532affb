//! Threshold guard error taxonomy (SPEC_FULL.md §7 `ThresholdError`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThresholdError {
    #[error("row invariant {invariant:?} violated on column {column:?}: {violating} of {total} rows ({ratio:.4}) exceeds max ratio {max_ratio:.4}")]
    RowInvariant {
        invariant: &'static str,
        column: &'static str,
        violating: u64,
        total: u64,
        ratio: f64,
        max_ratio: f64,
    },

    #[error("historic size variation: prev={prev}, cur={cur}, allowed=max({abs}, {pct} * {prev})")]
    HistoricSizeVariation { prev: u64, cur: u64, abs: u64, pct: f64 },

    #[error("delta sanity: {invalid} of {total} staged rows failed liveness checks ({ratio:.4}) exceeds max ratio {max_ratio:.4}")]
    DeltaSanity { invalid: u64, total: u64, ratio: f64, max_ratio: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
