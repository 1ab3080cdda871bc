use crate::{Contract, ContractError, ErrorCode};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Untyped record handed to a processor. Owned by the caller for one `process` call.
pub type Record = Map<String, Value>;

/// Error response for a single record.
pub type Payload = Map<String, Value>;

pub const ERROR_FIELD_SUFFIX: &str = "_errors";

/// Key under which a field's error code is reported, e.g. `note_id_errors`.
pub fn error_key(field: &str) -> String {
    let mut key = String::with_capacity(field.len() + ERROR_FIELD_SUFFIX.len());
    key.push_str(field);
    key.push_str(ERROR_FIELD_SUFFIX);
    key
}

/// Extra entries merged into an error payload next to a field's own code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelInsert {
    entries: Vec<(String, Value)>,
}

impl ParallelInsert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Merge parallel-insert entries into a payload. Later entries win on key collisions.
pub fn merge_parallel(mut payload: Payload, extras: &ParallelInsert) -> Payload {
    for (key, value) in extras.iter() {
        payload.insert(key.to_string(), value.clone());
    }
    payload
}

/// An expected, client-facing validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub fail_fast: bool,
    pub parallel_insert: ParallelInsert,
}

impl ValidationError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            fail_fast: false,
            parallel_insert: ParallelInsert::default(),
        }
    }

    /// A failure that aborts the remaining checks of the record.
    pub fn fail_fast(code: ErrorCode) -> Self {
        Self {
            fail_fast: true,
            ..Self::new(code)
        }
    }

    pub fn with_parallel(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parallel_insert = self.parallel_insert.with(key, value);
        self
    }
}

impl From<ErrorCode> for ValidationError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fail_fast {
            write!(f, "{} (fail-fast)", self.code)
        } else {
            write!(f, "{}", self.code)
        }
    }
}

/// Failure of a single field validator.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("invalid field: {0}")]
    Invalid(ValidationError),
    #[error(transparent)]
    Fatal(#[from] ContractError),
}

impl From<ValidationError> for FieldError {
    fn from(err: ValidationError) -> Self {
        FieldError::Invalid(err)
    }
}

impl From<ErrorCode> for FieldError {
    fn from(code: ErrorCode) -> Self {
        FieldError::Invalid(ValidationError::new(code))
    }
}

impl From<anyhow::Error> for FieldError {
    fn from(err: anyhow::Error) -> Self {
        FieldError::Fatal(ContractError::Repository(err))
    }
}

/// Failure raised by a record-level pre-commit check. Always aborts the record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record rejected on {field}: {error}")]
    Invalid {
        field: &'static str,
        error: ValidationError,
    },
    #[error(transparent)]
    Fatal(#[from] ContractError),
}

impl From<anyhow::Error> for RecordError {
    fn from(err: anyhow::Error) -> Self {
        RecordError::Fatal(ContractError::Repository(err))
    }
}

/// What a passing validator wants done with the field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Pass,
    /// Replace the record's value with a parsed or normalized form.
    Replace(Value),
}

pub type FieldResult = Result<FieldOutcome, FieldError>;

pub type FieldValidator<C> = fn(&C, &mut <C as Contract>::Scratch, &Value) -> FieldResult;

/// One declared field of a contract.
pub struct FieldSpec<C: Contract> {
    pub name: &'static str,
    pub validator: FieldValidator<C>,
    pub reflect_on_error: bool,
}

impl<C: Contract> FieldSpec<C> {
    pub fn new(name: &'static str, validator: FieldValidator<C>) -> Self {
        Self {
            name,
            validator,
            reflect_on_error: false,
        }
    }

    /// Echo this field's value back in error payloads.
    pub fn reflected(mut self) -> Self {
        self.reflect_on_error = true;
        self
    }
}

impl<C: Contract> Clone for FieldSpec<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Contract> Copy for FieldSpec<C> {}

impl<C: Contract> fmt::Debug for FieldSpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("reflect_on_error", &self.reflect_on_error)
            .finish()
    }
}

/// Ordered, immutable field table of a contract.
pub struct FieldSet<C: Contract> {
    specs: Vec<FieldSpec<C>>,
}

impl<C: Contract> FieldSet<C> {
    pub fn new(contract: &'static str, specs: Vec<FieldSpec<C>>) -> Result<Self, ContractError> {
        if specs.is_empty() {
            return Err(ContractError::NoFields { contract });
        }
        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            if !seen.insert(spec.name) {
                return Err(ContractError::DuplicateField {
                    contract,
                    field: spec.name.to_string(),
                });
            }
        }
        Ok(Self { specs })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec<C>> {
        self.specs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|s| s.name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec<C>> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn reflected(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs
            .iter()
            .filter(|s| s.reflect_on_error)
            .map(|s| s.name)
    }
}

impl<C: Contract> fmt::Debug for FieldSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.specs.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_key_appends_suffix() {
        assert_eq!(error_key("note_id"), "note_id_errors");
    }

    #[test]
    fn merge_parallel_overwrites_and_extends() {
        let mut payload = Payload::new();
        payload.insert("note_errors".into(), json!(43));
        payload.insert("authentication".into(), json!(0));
        let extras = ParallelInsert::new()
            .with("authentication", ErrorCode::Forbidden)
            .with("hint", "x");
        let merged = merge_parallel(payload, &extras);
        assert_eq!(
            serde_json::Value::Object(merged),
            json!({"note_errors": 43, "authentication": 43, "hint": "x"})
        );
    }

    #[test]
    fn fail_fast_constructor_sets_flag() {
        let err = ValidationError::fail_fast(ErrorCode::UuidConflict);
        assert!(err.fail_fast);
        assert!(err.parallel_insert.is_empty());
        assert!(!ValidationError::from(ErrorCode::Missing).fail_fast);
    }
}
