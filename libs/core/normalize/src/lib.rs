//! Normalization and validation of the semantic identifiers from
//! SPEC_FULL.md §3: IMEI, TAC, IMSI, MSISDN, UID, operator_id, MCC/MNC.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved operator id denoting the country-wide aggregate.
pub const COUNTRY_AGGREGATE_OPERATOR: &str = "__all__";

/// Raw-IMEI character class: `[0-9A-Fa-f*#]`, 1 to 16 characters.
static RAW_IMEI_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f*#]{1,16}$").unwrap());

/// Operator id: lowercase alnum + underscore, at most 16 characters.
static OPERATOR_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{1,16}$").unwrap());

/// Condition label: alnum + underscore, at most 64 characters.
static CONDITION_LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,64}$").unwrap());

/// Validation failures for the identifiers this crate normalizes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The input did not match the raw-IMEI character class or length bound.
    #[error("invalid raw IMEI: {0:?}")]
    InvalidImei(String),
    /// The input is not a valid decimal IMSI (up to 15 digits).
    #[error("invalid IMSI: {0:?}")]
    InvalidImsi(String),
    /// The input is not a valid decimal MSISDN (up to 15 digits).
    #[error("invalid MSISDN: {0:?}")]
    InvalidMsisdn(String),
    /// The input is not a valid operator id.
    #[error("invalid operator id: {0:?}")]
    InvalidOperatorId(String),
    /// The input is not a valid condition label.
    #[error("invalid condition label: {0:?}")]
    InvalidConditionLabel(String),
    /// A condition `reason` string contained the reserved join delimiter `|`.
    #[error("reason string contains reserved delimiter '|': {0:?}")]
    ReservedDelimiterInReason(String),
}

/// Normalizes a raw IMEI into its canonical `imei_norm` form.
///
/// Per SPEC_FULL.md §3: if the first 14 characters are all digits, the
/// normalized form is those 14 digits; otherwise the normalized form is
/// the whole input, uppercased. Idempotent: `normalize_imei(normalize_imei(x)) == normalize_imei(x)`.
///
/// # Errors
/// Returns [`NormalizeError::InvalidImei`] if `raw` is empty, longer than
/// 16 characters, or contains characters outside `[0-9A-Fa-f*#]`.
pub fn normalize_imei(raw: &str) -> Result<String, NormalizeError> {
    if !RAW_IMEI_PATTERN.is_match(raw) {
        return Err(NormalizeError::InvalidImei(raw.to_string()));
    }
    Ok(normalize_imei_unchecked(raw))
}

/// Normalizes without validating the raw-IMEI character class.
///
/// Used internally (and by idempotence tests) once a value is already
/// known to be a valid `imei_norm`, to avoid re-deriving the regex match
/// on every reconciliation pass.
#[must_use]
pub fn normalize_imei_unchecked(raw: &str) -> String {
    let first_14: &str = if raw.len() >= 14 { &raw[..14] } else { raw };
    if raw.len() >= 14 && first_14.bytes().all(|b| b.is_ascii_digit()) {
        first_14.to_string()
    } else {
        raw.to_uppercase()
    }
}

/// Extracts the TAC (first 8 digits) from an `imei_norm`, if it is all-digit.
///
/// Per SPEC_FULL.md §3, TAC is only defined when `imei_norm` is 14
/// all-digit characters (the normal case); non-digit `imei_norm` values
/// (malformed IMEIs preserved verbatim) have no TAC.
#[must_use]
pub fn tac_of(imei_norm: &str) -> Option<&str> {
    if imei_norm.len() >= 8 && imei_norm.bytes().all(|b| b.is_ascii_digit()) {
        Some(&imei_norm[..8])
    } else {
        None
    }
}

/// Validates an IMSI: up to 15 decimal digits.
///
/// # Errors
/// Returns [`NormalizeError::InvalidImsi`] if not 1-15 ASCII digits.
pub fn validate_imsi(raw: &str) -> Result<(), NormalizeError> {
    if raw.is_empty() || raw.len() > 15 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidImsi(raw.to_string()));
    }
    Ok(())
}

/// Validates an MSISDN: up to 15 decimal digits.
///
/// # Errors
/// Returns [`NormalizeError::InvalidMsisdn`] if not 1-15 ASCII digits.
pub fn validate_msisdn(raw: &str) -> Result<(), NormalizeError> {
    if raw.is_empty() || raw.len() > 15 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidMsisdn(raw.to_string()));
    }
    Ok(())
}

/// Validates an operator id: lowercase alnum + underscore, at most 16 chars.
///
/// `__all__` (the country-aggregate sentinel) is always valid even though
/// it would otherwise match the same pattern anyway.
///
/// # Errors
/// Returns [`NormalizeError::InvalidOperatorId`] on a pattern mismatch.
pub fn validate_operator_id(raw: &str) -> Result<(), NormalizeError> {
    if !OPERATOR_ID_PATTERN.is_match(raw) {
        return Err(NormalizeError::InvalidOperatorId(raw.to_string()));
    }
    Ok(())
}

/// Validates a condition `label`: alnum + underscore, at most 64 chars.
///
/// # Errors
/// Returns [`NormalizeError::InvalidConditionLabel`] on a pattern mismatch.
pub fn validate_condition_label(raw: &str) -> Result<(), NormalizeError> {
    if !CONDITION_LABEL_PATTERN.is_match(raw) {
        return Err(NormalizeError::InvalidConditionLabel(raw.to_string()));
    }
    Ok(())
}

/// Validates a condition `reason` string: must not contain the reserved
/// join delimiter `|` (SPEC_FULL.md §7, §4.8).
///
/// # Errors
/// Returns [`NormalizeError::ReservedDelimiterInReason`] if `reason` contains `|`.
pub fn validate_reason(reason: &str) -> Result<(), NormalizeError> {
    if reason.contains('|') {
        return Err(NormalizeError::ReservedDelimiterInReason(reason.to_string()));
    }
    Ok(())
}

/// A disjoint MCC+MNC prefix pair owned by one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MccMncPrefix {
    /// Mobile country code.
    pub mcc: String,
    /// Mobile network code.
    pub mnc: String,
}

impl MccMncPrefix {
    /// The concatenated `mcc+mnc` prefix string.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}{}", self.mcc, self.mnc)
    }

    /// Whether this prefix and `other` would violate the disjointness
    /// invariant (neither prefix may start with the other).
    #[must_use]
    pub fn conflicts_with(&self, other: &MccMncPrefix) -> bool {
        let (a, b) = (self.prefix(), other.prefix());
        a.starts_with(&b) || b.starts_with(&a)
    }
}

/// Verifies that no pair in `prefixes` starts with another pair, per the
/// "each operator owns a set of disjoint MCC+MNC prefixes" invariant.
#[must_use]
pub fn prefixes_are_disjoint(prefixes: &[MccMncPrefix]) -> bool {
    for (i, a) in prefixes.iter().enumerate() {
        for b in &prefixes[i + 1..] {
            if a.conflicts_with(b) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn all_digit_14_char_imei_normalizes_to_first_14() {
        assert_eq!(normalize_imei("64220297727231").unwrap(), "64220297727231");
        assert_eq!(normalize_imei("6422029772723199").unwrap(), "64220297727231");
    }

    #[test]
    fn non_digit_imei_uppercases_whole_value() {
        assert_eq!(normalize_imei("aa1122bb*").unwrap(), "AA1122BB*");
    }

    #[test]
    fn short_all_digit_imei_uppercases_itself() {
        // Fewer than 14 chars: the "first 14 digits" branch cannot apply.
        assert_eq!(normalize_imei("12345").unwrap(), "12345");
    }

    #[test]
    fn invalid_characters_rejected() {
        assert!(normalize_imei("abc xyz").is_err());
        assert!(normalize_imei("").is_err());
        assert!(normalize_imei(&"1".repeat(17)).is_err());
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["64220297727231", "6422029772723199", "aa1122bb*", "12345"] {
            let once = normalize_imei(raw).unwrap();
            let twice = normalize_imei_unchecked(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn tac_extracted_only_for_all_digit_norm() {
        assert_eq!(tac_of("64220297727231"), Some("64220297"));
        assert_eq!(tac_of("AA1122BB*"), None);
    }

    #[test]
    fn operator_id_validation() {
        assert!(validate_operator_id("safaricom_ke").is_ok());
        assert!(validate_operator_id(COUNTRY_AGGREGATE_OPERATOR).is_ok());
        assert!(validate_operator_id("Safaricom").is_err());
        assert!(validate_operator_id(&"a".repeat(17)).is_err());
    }

    #[test]
    fn reason_rejects_pipe() {
        assert!(validate_reason("stolen_list").is_ok());
        assert!(validate_reason("stolen|duplicate").is_err());
    }

    #[test]
    fn disjoint_prefixes_detects_prefix_collision() {
        let disjoint = vec![
            MccMncPrefix { mcc: "639".into(), mnc: "02".into() },
            MccMncPrefix { mcc: "639".into(), mnc: "03".into() },
        ];
        assert!(prefixes_are_disjoint(&disjoint));

        let colliding = vec![
            MccMncPrefix { mcc: "639".into(), mnc: "0".into() },
            MccMncPrefix { mcc: "639".into(), mnc: "02".into() },
        ];
        assert!(!prefixes_are_disjoint(&colliding));
    }

    proptest! {
        #[test]
        fn normalize_never_panics(s in "\\PC*") {
            let _ = normalize_imei(&s);
        }

        #[test]
        fn idempotence_holds_for_valid_imeis(s in "[0-9A-Fa-f*#]{1,16}") {
            let once = normalize_imei(&s).unwrap();
            let twice = normalize_imei_unchecked(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
