//! Value checks shared by the business contracts.

use crate::{ErrorCode, ValidationError};
use serde_json::Value;

/// 2015-06-01T04:00:00Z. Timestamps must be strictly after this.
pub const DATE_LOWER_BOUND: i64 = 1_433_131_200;
/// 2200-01-01T05:00:00Z. Timestamps must be strictly before this.
pub const DATE_UPPER_BOUND: i64 = 7_258_136_400;

pub const UUID_LEN: usize = 36;

pub fn expect_str(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .ok_or_else(|| ValidationError::new(ErrorCode::IncorrectType))
}

pub fn expect_bool(value: &Value) -> Result<bool, ValidationError> {
    value
        .as_bool()
        .ok_or_else(|| ValidationError::new(ErrorCode::IncorrectType))
}

/// Integers only; floats and booleans are the wrong type.
pub fn expect_int(value: &Value) -> Result<i64, ValidationError> {
    value
        .as_i64()
        .ok_or_else(|| ValidationError::new(ErrorCode::IncorrectType))
}

pub fn expect_array(value: &Value) -> Result<&Vec<Value>, ValidationError> {
    value
        .as_array()
        .ok_or_else(|| ValidationError::new(ErrorCode::IncorrectType))
}

/// Identifiers are opaque 36-character strings.
pub fn uuid(value: &Value) -> Result<&str, ValidationError> {
    let id = expect_str(value)?;
    if id.chars().count() != UUID_LEN {
        return Err(ValidationError::new(ErrorCode::InvalidUuid));
    }
    Ok(id)
}

/// Epoch seconds inside the accepted calendar window.
pub fn date(value: &Value) -> Result<i64, ValidationError> {
    // integral but past i64::MAX is a date out of range, not a wrong type
    if value.is_u64() && value.as_i64().is_none() {
        return Err(ValidationError::new(ErrorCode::InvalidDate));
    }
    let secs = expect_int(value)?;
    if !(DATE_LOWER_BOUND < secs && secs < DATE_UPPER_BOUND) {
        return Err(ValidationError::new(ErrorCode::InvalidDate));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn code<T: std::fmt::Debug>(r: Result<T, ValidationError>) -> ErrorCode {
        r.unwrap_err().code
    }

    #[test]
    fn uuid_requires_string_of_exact_length() {
        let good = "0f8fad5b-d9cb-469f-a165-70867728950e";
        assert_eq!(uuid(&json!(good)).unwrap(), good);
        assert_eq!(code(uuid(&json!("X".repeat(35)))), ErrorCode::InvalidUuid);
        assert_eq!(code(uuid(&json!("X".repeat(37)))), ErrorCode::InvalidUuid);
        assert_eq!(code(uuid(&json!(42))), ErrorCode::IncorrectType);
    }

    #[test]
    fn date_bounds_are_exclusive() {
        assert_eq!(date(&json!(1_500_000_000)).unwrap(), 1_500_000_000);
        assert_eq!(code(date(&json!(DATE_LOWER_BOUND))), ErrorCode::InvalidDate);
        assert_eq!(code(date(&json!(DATE_UPPER_BOUND))), ErrorCode::InvalidDate);
        assert_eq!(date(&json!(DATE_LOWER_BOUND + 1)).unwrap(), DATE_LOWER_BOUND + 1);
        assert_eq!(code(date(&json!(0))), ErrorCode::InvalidDate);
    }

    #[test]
    fn integers_past_i64_are_out_of_range_dates() {
        assert_eq!(code(date(&json!(u64::MAX))), ErrorCode::InvalidDate);
        assert_eq!(code(date(&json!(i64::MAX as u64 + 1))), ErrorCode::InvalidDate);
        assert_eq!(code(date(&json!(i64::MIN))), ErrorCode::InvalidDate);
        assert_eq!(code(expect_int(&json!(u64::MAX))), ErrorCode::IncorrectType);
    }

    #[test]
    fn type_checks_reject_lookalikes() {
        assert_eq!(code(date(&json!(1.5e9))), ErrorCode::IncorrectType);
        assert_eq!(code(date(&json!("1500000000"))), ErrorCode::IncorrectType);
        assert_eq!(code(expect_int(&json!(true))), ErrorCode::IncorrectType);
        assert_eq!(code(expect_bool(&json!(0))), ErrorCode::IncorrectType);
        assert_eq!(code(expect_array(&json!({}))), ErrorCode::IncorrectType);
        assert!(expect_array(&json!([])).unwrap().is_empty());
    }
}
