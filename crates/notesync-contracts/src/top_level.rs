use crate::checks;
use crate::{
    Contract, ContractError, FieldOutcome, FieldResult, FieldSet, FieldSpec, Record, RecordError,
};
use serde_json::Value;

pub const NOTES: &str = "notes";
pub const NOTE_CONTENTS: &str = "note_contents";

/// Lists pulled out of a batch request that passed the shape gate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchShape {
    pub notes: Vec<Value>,
    pub note_contents: Vec<Value>,
}

/// Shape gate for a batch request. Has no side effects.
pub struct TopLevelContract {
    fields: FieldSet<TopLevelContract>,
}

impl TopLevelContract {
    pub fn new() -> Result<Self, ContractError> {
        let fields = FieldSet::new(
            "top_level",
            vec![
                FieldSpec::new(NOTES, Self::validate_list),
                FieldSpec::new(NOTE_CONTENTS, Self::validate_list),
            ],
        )?;
        Ok(Self { fields })
    }

    fn validate_list(&self, _scratch: &mut (), value: &Value) -> FieldResult {
        checks::expect_array(value)?;
        Ok(FieldOutcome::Pass)
    }
}

impl Contract for TopLevelContract {
    type Scratch = ();
    type Output = BatchShape;

    fn name(&self) -> &'static str {
        "top_level"
    }

    fn fields(&self) -> &FieldSet<Self> {
        &self.fields
    }

    fn commit(&self, mut record: Record, _scratch: ()) -> Result<BatchShape, RecordError> {
        let mut take = |key: &str| match record.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        Ok(BatchShape {
            notes: take(NOTES),
            note_contents: take(NOTE_CONTENTS),
        })
    }
}
