//! Condition and dimension definitions (SPEC_FULL.md §4.7, §9).
//!
//! Dimension kinds are a closed tagged-variant set, resolved at build
//! time rather than loaded as plugins — the set of kinds a condition can
//! reference is exactly what's listed in [`DimensionKind`].

use serde::{Deserialize, Serialize};

/// One configured dimension kind and its parameters.
///
/// The matching-set algorithm for each variant lives in
/// `dirbs-domain-conditions`; this type only carries the configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "module", content = "params", rename_all = "snake_case")]
pub enum DimensionKind {
    /// IMEIs whose TAC is not present in the GSMA TAC directory.
    GsmaNotFound,
    /// IMEIs present on the live stolen list.
    Stolen,
    /// IMEIs observed paired with more than `threshold` distinct IMSIs
    /// within the lookback window.
    DuplicateLarge {
        /// Number of distinct IMSIs above which an IMEI is "duplicated".
        threshold: u32,
    },
    /// IMEIs not present on the live device registration list.
    NotOnRegistrationList,
    /// IMEIs that failed `normalize_imei`'s structural validation.
    MalformedImei,
    /// IMEIs whose observed radio-access-technology bitmask is
    /// inconsistent with the GSMA-reported device capability.
    InconsistentRat,
}

/// One dimension reference within a condition: a kind plus an `invert` flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dimension {
    /// The dimension module and its parameters.
    pub kind: DimensionKind,
    /// When true, the condition uses the complement of this dimension's
    /// matching set (relative to all distinct observed IMEIs) instead of
    /// the set itself.
    pub invert: bool,
}

/// A configured blocking or informational condition (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Unique label, alnum + underscore, at most 64 characters.
    pub label: String,
    /// Days between classification and blacklist inclusion.
    pub grace_period_days: u32,
    /// Whether a match under this condition contributes to the blacklist.
    pub blocking: bool,
    /// Whether an unmatch leaves the classification row open
    /// (closed only by administrative action).
    pub sticky: bool,
    /// Human-readable reason string; must not contain `|`.
    pub reason: String,
    /// Safety-ratio ceiling: matching_set_size / distinct_observed_imeis.
    pub max_allowed_matching_ratio: f64,
    /// Whether IMEIs newly matching this condition can be granted amnesty.
    /// Only meaningful (and only ever true) when `blocking` is true.
    pub amnesty_eligible: bool,
    /// Ordered dimensions; the condition's matching set is their
    /// intersection (respecting each dimension's `invert` flag).
    pub dimensions: Vec<Dimension>,
}

impl Condition {
    /// Validates the structural invariants from SPEC_FULL.md §4.7:
    /// label shape, reason shape, ratio bounds, and that `amnesty_eligible`
    /// is only set on blocking conditions.
    pub fn validate(&self) -> Result<(), ConditionValidationError> {
        if self.label.is_empty()
            || self.label.len() > 64
            || !self.label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ConditionValidationError::InvalidLabel(self.label.clone()));
        }
        if self.reason.contains('|') {
            return Err(ConditionValidationError::ReasonContainsDelimiter(
                self.reason.clone(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_allowed_matching_ratio) {
            return Err(ConditionValidationError::RatioOutOfRange(
                self.max_allowed_matching_ratio,
            ));
        }
        if self.amnesty_eligible && !self.blocking {
            return Err(ConditionValidationError::AmnestyRequiresBlocking);
        }
        if self.dimensions.is_empty() {
            return Err(ConditionValidationError::NoDimensions);
        }
        Ok(())
    }
}

/// Structural errors a [`Condition`] can fail to satisfy.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConditionValidationError {
    /// `label` is empty, too long, or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid condition label: {0:?}")]
    InvalidLabel(String),
    /// `reason` contains the reserved join delimiter `|`.
    #[error("reason contains reserved delimiter '|': {0:?}")]
    ReasonContainsDelimiter(String),
    /// `max_allowed_matching_ratio` is outside `[0.0, 1.0]`.
    #[error("max_allowed_matching_ratio out of range: {0}")]
    RatioOutOfRange(f64),
    /// `amnesty_eligible` was set on a non-blocking condition.
    #[error("amnesty_eligible is only valid on blocking conditions")]
    AmnestyRequiresBlocking,
    /// A condition must reference at least one dimension.
    #[error("condition has no dimensions")]
    NoDimensions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str) -> Condition {
        Condition {
            label: label.to_string(),
            grace_period_days: 30,
            blocking: true,
            sticky: false,
            reason: "local_stolen".to_string(),
            max_allowed_matching_ratio: 0.1,
            amnesty_eligible: false,
            dimensions: vec![Dimension {
                kind: DimensionKind::Stolen,
                invert: false,
            }],
        }
    }

    #[test]
    fn valid_condition_passes() {
        assert!(sample("local_stolen").validate().is_ok());
    }

    #[test]
    fn pipe_in_reason_rejected() {
        let mut c = sample("local_stolen");
        c.reason = "a|b".to_string();
        assert_eq!(
            c.validate(),
            Err(ConditionValidationError::ReasonContainsDelimiter("a|b".into()))
        );
    }

    #[test]
    fn amnesty_requires_blocking() {
        let mut c = sample("local_stolen");
        c.blocking = false;
        c.amnesty_eligible = true;
        assert_eq!(c.validate(), Err(ConditionValidationError::AmnestyRequiresBlocking));
    }

    #[test]
    fn ratio_out_of_range_rejected() {
        let mut c = sample("local_stolen");
        c.max_allowed_matching_ratio = 1.5;
        assert!(matches!(
            c.validate(),
            Err(ConditionValidationError::RatioOutOfRange(_))
        ));
    }

    #[test]
    fn empty_dimensions_rejected() {
        let mut c = sample("local_stolen");
        c.dimensions.clear();
        assert_eq!(c.validate(), Err(ConditionValidationError::NoDimensions));
    }
}
