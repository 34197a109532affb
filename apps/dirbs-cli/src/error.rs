//! Top-level error type unifying every component's taxonomy (spec.md §7)
//! into one `main`-facing `Result`.

use dirbs_domain_classify::SafetyRatioExceeded;
use dirbs_infra_db::DbError;
use dirbs_infra_importer::ThresholdError;
use dirbs_infra_validation::PreValidationError;
use dirbs_shared_runtime::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirbsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PreValidation(#[from] PreValidationError),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("condition exceeded its safety ratio: {0}")]
    Safety(#[from] SafetyRatioExceeded),

    #[error("listgen run-over-run delta of {delta} rows against a base of {base} exceeds the allowed variance ratio {max_ratio:.4}")]
    ListgenSanity {
        delta: usize,
        base: usize,
        max_ratio: f64,
    },

    #[error("{0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A malformed invocation: unknown list type, missing `--operator`
    /// on an operator-scoped list, a filename that doesn't match its
    /// `--operator` flag.
    #[error("{0}")]
    Usage(String),
}

impl DirbsError {
    /// Process exit code for this error, per spec.md §7 ("CLI prints a
    /// concise cause and exits non-zero"). Every variant is non-zero;
    /// the specific value only distinguishes broad classes for scripts
    /// that branch on it.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::PreValidation(_) => 3,
            Self::Threshold(_) => 4,
            Self::Safety(_) => 5,
            Self::ListgenSanity { .. } => 6,
            Self::Db(_) => 7,
            Self::Io(_) => 8,
            Self::Internal(_) => 1,
            Self::Csv(_) => 3,
            Self::Usage(_) => 64,
        }
    }
}
