//! Generic validation-and-commit pipeline shared by every business object.
//!
//! A [`Processor`] runs a [`Contract`] against one untyped record: each declared field is
//! validated in order, errors are aggregated into a payload, fail-fast failures abort the
//! record early, and the contract's commit step runs only when everything passed.

use crate::field::{
    error_key, merge_parallel, FieldError, FieldOutcome, FieldSet, FieldSpec, Payload, Record,
    RecordError, ValidationError,
};
use crate::{ContractError, ErrorCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Declarative shape of one business-object type plus its side effects.
pub trait Contract: Sized {
    /// Per-record accumulator threaded through validators, pre-commit and commit.
    type Scratch: Default;
    /// Payload returned by a successful commit.
    type Output;

    fn name(&self) -> &'static str;

    fn fields(&self) -> &FieldSet<Self>;

    /// A single-use contract refuses a second `process` call on the same processor.
    fn single_use(&self) -> bool {
        false
    }

    /// Default for aborting the record on the first missing field.
    fn fail_fast_on_missing(&self) -> bool {
        false
    }

    /// Record-level checks that span fields or need a lookup. Runs only when every field passed.
    fn pre_commit(
        &self,
        _record: &Record,
        _scratch: &mut Self::Scratch,
    ) -> Result<(), RecordError> {
        Ok(())
    }

    /// Apply the record's effect. Runs at most once per record.
    ///
    /// A write that loses a race with another writer reports it as [`RecordError::Invalid`];
    /// the record is then rejected exactly as if the pre-commit check had caught it.
    fn commit(&self, record: Record, scratch: Self::Scratch) -> Result<Self::Output, RecordError>;
}

/// Per-call overrides of a contract's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    fields: Option<Vec<String>>,
    reflected: Option<Vec<String>>,
    fail_fast_on_missing: Option<bool>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn reflected<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reflected = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn fail_fast_on_missing(mut self, enabled: bool) -> Self {
        self.fail_fast_on_missing = Some(enabled);
        self
    }
}

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed<T> {
    Committed(T),
    Rejected(Payload),
    /// The target was not a mapping; nothing was validated.
    Malformed,
}

impl<T> Processed<T> {
    pub fn succeeded(&self) -> bool {
        matches!(self, Processed::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Processed::Committed(out) => Some(out),
            _ => None,
        }
    }

    /// Error payload as sent to clients; `None` on success.
    pub fn error_value(&self) -> Option<Value> {
        match self {
            Processed::Committed(_) => None,
            Processed::Rejected(payload) => Some(Value::Object(payload.clone())),
            Processed::Malformed => Some(ErrorCode::IncorrectType.into()),
        }
    }

    /// `(succeeded, payload)`; fails only when the commit output cannot be serialised.
    pub fn into_parts(self) -> Result<(bool, Value), serde_json::Error>
    where
        T: Serialize,
    {
        Ok(match self {
            Processed::Committed(out) => (true, serde_json::to_value(out)?),
            Processed::Rejected(payload) => (false, Value::Object(payload)),
            Processed::Malformed => (false, ErrorCode::IncorrectType.into()),
        })
    }
}

/// Drives one contract instance. Tracks uses to enforce single-use contracts.
#[derive(Debug)]
pub struct Processor<C: Contract> {
    contract: C,
    uses: usize,
}

impl<C: Contract> Processor<C> {
    pub fn new(contract: C) -> Self {
        Self { contract, uses: 0 }
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn uses(&self) -> usize {
        self.uses
    }

    pub fn process(
        &mut self,
        target: Value,
        options: &ProcessOptions,
    ) -> Result<Processed<C::Output>, ContractError> {
        let name = self.contract.name();
        if self.contract.single_use() && self.uses > 0 {
            return Err(ContractError::SingleUseViolation { contract: name });
        }

        let mut record = match target {
            Value::Object(record) => record,
            other => {
                debug!(
                    contract = name,
                    kind = json_kind(&other),
                    "rejecting non-mapping record"
                );
                return Ok(Processed::Malformed);
            }
        };

        let specs = self.active_fields(options)?;
        let reflected = self.reflected_fields(options);
        let fail_fast_on_missing = options
            .fail_fast_on_missing
            .unwrap_or_else(|| self.contract.fail_fast_on_missing());

        self.uses += 1;

        let mut scratch = C::Scratch::default();
        let failed =
            self.validate_fields(&specs, &mut record, &mut scratch, fail_fast_on_missing)?;
        if let Some(payload) = failed {
            debug!(contract = name, "record failed field validation");
            return Ok(Processed::Rejected(render(payload, &record, &reflected)));
        }

        match self.contract.pre_commit(&record, &mut scratch) {
            Ok(()) => {}
            Err(err) => return reject(name, "pre-commit", err, &record, &reflected),
        }

        // commit consumes the record; keep what a rejection has to echo
        let echo: Record = reflected
            .iter()
            .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        match self.contract.commit(record, scratch) {
            Ok(output) => {
                debug!(contract = name, "record committed");
                Ok(Processed::Committed(output))
            }
            Err(err) => reject(name, "commit", err, &echo, &reflected),
        }
    }

    fn active_fields(&self, options: &ProcessOptions) -> Result<Vec<FieldSpec<C>>, ContractError> {
        let name = self.contract.name();
        let declared = self.contract.fields();
        let specs: Vec<FieldSpec<C>> = match &options.fields {
            Some(overrides) => overrides
                .iter()
                .map(|field| {
                    declared
                        .get(field)
                        .copied()
                        .ok_or_else(|| ContractError::UnknownField {
                            contract: name,
                            field: field.clone(),
                        })
                })
                .collect::<Result<_, _>>()?,
            None => declared.iter().copied().collect(),
        };
        if specs.is_empty() {
            return Err(ContractError::NoFields { contract: name });
        }
        Ok(specs)
    }

    fn reflected_fields(&self, options: &ProcessOptions) -> Vec<String> {
        match &options.reflected {
            Some(fields) => fields.clone(),
            None => self.contract.fields().reflected().map(String::from).collect(),
        }
    }

    /// Returns the accumulated payload when any field failed.
    fn validate_fields(
        &self,
        specs: &[FieldSpec<C>],
        record: &mut Record,
        scratch: &mut C::Scratch,
        fail_fast_on_missing: bool,
    ) -> Result<Option<Payload>, ContractError> {
        let mut payload = Payload::new();
        for spec in specs {
            let Some(value) = record.get(spec.name) else {
                payload.insert(error_key(spec.name), ErrorCode::Missing.into());
                if fail_fast_on_missing {
                    return Ok(Some(payload));
                }
                continue;
            };
            match (spec.validator)(&self.contract, scratch, value) {
                Ok(FieldOutcome::Pass) => {}
                Ok(FieldOutcome::Replace(parsed)) => {
                    record.insert(spec.name.to_string(), parsed);
                }
                Err(FieldError::Invalid(error)) => {
                    payload = record_field_error(payload, spec.name, &error);
                    if error.fail_fast {
                        return Ok(Some(payload));
                    }
                }
                Err(FieldError::Fatal(err)) => return Err(err),
            }
        }
        Ok(if payload.is_empty() { None } else { Some(payload) })
    }
}

/// Turn a record-level failure into a rejection; fatal errors pass through.
fn reject<T>(
    contract: &'static str,
    stage: &'static str,
    err: RecordError,
    record: &Record,
    reflected: &[String],
) -> Result<Processed<T>, ContractError> {
    match err {
        RecordError::Invalid { field, error } => {
            debug!(
                contract,
                stage,
                field,
                code = error.code.as_str(),
                "record rejected"
            );
            let payload = record_field_error(Payload::new(), field, &error);
            Ok(Processed::Rejected(render(payload, record, reflected)))
        }
        RecordError::Fatal(err) => Err(err),
    }
}

fn record_field_error(mut payload: Payload, field: &str, error: &ValidationError) -> Payload {
    payload.insert(error_key(field), error.code.into());
    merge_parallel(payload, &error.parallel_insert)
}

/// Echo reflected fields into a failure payload, skipping fields that were themselves missing.
fn render(mut payload: Payload, record: &Record, reflected: &[String]) -> Payload {
    let missing = Value::from(ErrorCode::Missing);
    for field in reflected {
        if payload.get(&error_key(field)) == Some(&missing) {
            continue;
        }
        if let Some(value) = record.get(field) {
            payload.insert(field.clone(), value.clone());
        }
    }
    payload
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
