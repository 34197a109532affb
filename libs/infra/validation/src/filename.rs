//! Filename-convention check (SPEC_FULL.md §4.3 step 2, §6): an operator
//! file's stem must be `<operator_id>_<YYYYMMDD>_<YYYYMMDD>` with
//! `start <= end <= today`.

use crate::errors::PreValidationError;
use chrono::NaiveDate;
use dirbs_core_normalize::validate_operator_id;

/// The parsed, validated window carried by an operator filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorFileWindow {
    pub operator_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Validates `stem` against the operator filename convention.
///
/// # Errors
/// Returns [`PreValidationError::FilenameConvention`] if the stem isn't
/// three underscore-separated fields, the operator id is invalid, either
/// date fails to parse as `YYYYMMDD`, or `start <= end <= today` doesn't hold.
pub fn check_operator_filename(
    stem: &str,
    today: NaiveDate,
) -> Result<OperatorFileWindow, PreValidationError> {
    let reject = |reason: &str| PreValidationError::FilenameConvention {
        stem: stem.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = stem.rsplitn(3, '_').collect();
    let [end_str, start_str, operator_id] = parts.as_slice() else {
        return Err(reject("expected <operator_id>_<YYYYMMDD>_<YYYYMMDD>"));
    };

    validate_operator_id(operator_id).map_err(|e| reject(&e.to_string()))?;

    let start_date = NaiveDate::parse_from_str(start_str, "%Y%m%d")
        .map_err(|_| reject(&format!("invalid start date {start_str:?}")))?;
    let end_date = NaiveDate::parse_from_str(end_str, "%Y%m%d")
        .map_err(|_| reject(&format!("invalid end date {end_str:?}")))?;

    if start_date > end_date {
        return Err(reject("start date is after end date"));
    }
    if end_date > today {
        return Err(reject("end date is in the future"));
    }

    Ok(OperatorFileWindow {
        operator_id: operator_id.to_string(),
        start_date,
        end_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accepts_well_formed_window() {
        let window = check_operator_filename("op1_20200101_20200102", date(2020, 1, 3)).unwrap();
        assert_eq!(window.operator_id, "op1");
        assert_eq!(window.start_date, date(2020, 1, 1));
        assert_eq!(window.end_date, date(2020, 1, 2));
    }

    #[test]
    fn rejects_end_date_in_future() {
        let err = check_operator_filename("op1_20200101_20200102", date(2020, 1, 1)).unwrap_err();
        assert!(matches!(err, PreValidationError::FilenameConvention { .. }));
    }

    #[test]
    fn rejects_start_after_end() {
        let err = check_operator_filename("op1_20200105_20200101", date(2020, 2, 1)).unwrap_err();
        assert!(matches!(err, PreValidationError::FilenameConvention { .. }));
    }

    #[test]
    fn rejects_invalid_operator_id() {
        let err = check_operator_filename("OP-1_20200101_20200102", date(2020, 2, 1)).unwrap_err();
        assert!(matches!(err, PreValidationError::FilenameConvention { .. }));
    }
}
