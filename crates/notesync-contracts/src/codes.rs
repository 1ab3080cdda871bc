use serde::{Serialize, Serializer};
use std::fmt;

/// Closed catalog of validation outcome codes reported to clients.
///
/// Codes are rendered as JSON integers. Gaps in the numbering are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unknown,
    ValidNotProcessed,
    Ignored,
    Missing,
    IncorrectType,
    TooLong,
    InvalidDate,
    InvalidUuid,
    UuidConflict,
    Unauthorized,
    PasswordIncorrect,
    Forbidden,
    DoesNotExist,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 13] = [
        ErrorCode::Unknown,
        ErrorCode::ValidNotProcessed,
        ErrorCode::Ignored,
        ErrorCode::Missing,
        ErrorCode::IncorrectType,
        ErrorCode::TooLong,
        ErrorCode::InvalidDate,
        ErrorCode::InvalidUuid,
        ErrorCode::UuidConflict,
        ErrorCode::Unauthorized,
        ErrorCode::PasswordIncorrect,
        ErrorCode::Forbidden,
        ErrorCode::DoesNotExist,
    ];

    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::Unknown => -1,
            ErrorCode::ValidNotProcessed => 0,
            ErrorCode::Ignored => 1,
            ErrorCode::Missing => 11,
            ErrorCode::IncorrectType => 12,
            ErrorCode::TooLong => 21,
            ErrorCode::InvalidDate => 23,
            ErrorCode::InvalidUuid => 31,
            ErrorCode::UuidConflict => 32,
            ErrorCode::Unauthorized => 41,
            ErrorCode::PasswordIncorrect => 42,
            ErrorCode::Forbidden => 43,
            ErrorCode::DoesNotExist => 44,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Stable symbolic name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unknown => "unknown",
            ErrorCode::ValidNotProcessed => "valid_not_processed",
            ErrorCode::Ignored => "ignored",
            ErrorCode::Missing => "missing",
            ErrorCode::IncorrectType => "incorrect_type",
            ErrorCode::TooLong => "too_long",
            ErrorCode::InvalidDate => "invalid_date",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::UuidConflict => "uuid_conflict",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::PasswordIncorrect => "password_incorrect",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::DoesNotExist => "does_not_exist",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl From<ErrorCode> for serde_json::Value {
    fn from(code: ErrorCode) -> Self {
        serde_json::Value::from(code.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code);
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code(99), None);
    }

    #[test]
    fn serializes_as_integer() {
        let v = serde_json::to_value(ErrorCode::Missing).unwrap();
        assert_eq!(v, serde_json::json!(11));
        assert_eq!(serde_json::Value::from(ErrorCode::Forbidden), serde_json::json!(43));
    }
}
