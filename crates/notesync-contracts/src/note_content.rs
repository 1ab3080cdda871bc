use crate::checks;
use crate::{
    ContentInsert, Contract, ContractError, ErrorCode, FieldOutcome, FieldResult, FieldSet,
    FieldSpec, Lookup, NoteContentRow, Record, RecordError, Repository, ValidationError,
};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NoteContentScratch {
    note_content_id: Option<String>,
    note_id: Option<String>,
    data: Option<String>,
    date_created: Option<i64>,
}

/// A content revision of a note. Insert only; stored revisions never change.
pub struct NoteContentContract<'a> {
    repo: &'a dyn Repository,
    user_id: i64,
    fields: FieldSet<NoteContentContract<'a>>,
}

impl<'a> NoteContentContract<'a> {
    pub fn new(repo: &'a dyn Repository, user_id: i64) -> Result<Self, ContractError> {
        let fields = FieldSet::new(
            "note_content",
            vec![
                FieldSpec::new("note_content_id", Self::validate_note_content_id).reflected(),
                FieldSpec::new("note", Self::validate_note),
                FieldSpec::new("data", Self::validate_data),
                FieldSpec::new("date_created", Self::validate_date_created),
            ],
        )?;
        Ok(Self {
            repo,
            user_id,
            fields,
        })
    }

    fn validate_note_content_id(
        &self,
        scratch: &mut NoteContentScratch,
        value: &Value,
    ) -> FieldResult {
        let id = checks::uuid(value)?;
        if self.repo.note_content_id_exists(id)? {
            return Err(ValidationError::fail_fast(ErrorCode::UuidConflict).into());
        }
        scratch.note_content_id = Some(id.to_string());
        Ok(FieldOutcome::Pass)
    }

    fn validate_note(&self, scratch: &mut NoteContentScratch, value: &Value) -> FieldResult {
        let requested = checks::uuid(value)?;
        match self.repo.find_note_owner_and_id(requested)? {
            Lookup::Missing => Err(ValidationError::fail_fast(ErrorCode::DoesNotExist).into()),
            Lookup::Unique((owner, note_id)) if owner == self.user_id => {
                scratch.note_id = Some(note_id);
                Ok(FieldOutcome::Pass)
            }
            Lookup::Unique(_) => {
                debug!(
                    note_id = requested,
                    user_id = self.user_id,
                    "content targets foreign note"
                );
                Err(ValidationError::fail_fast(ErrorCode::Forbidden)
                    .with_parallel("authentication", ErrorCode::Forbidden)
                    .into())
            }
            Lookup::Duplicate(count) => Err(ContractError::Integrity(format!(
                "note_id {requested} matched {count} rows"
            ))
            .into()),
        }
    }

    fn validate_data(&self, scratch: &mut NoteContentScratch, value: &Value) -> FieldResult {
        scratch.data = Some(checks::expect_str(value)?.to_string());
        Ok(FieldOutcome::Pass)
    }

    fn validate_date_created(
        &self,
        scratch: &mut NoteContentScratch,
        value: &Value,
    ) -> FieldResult {
        scratch.date_created = Some(checks::date(value)?);
        Ok(FieldOutcome::Pass)
    }

    fn missing(&self, what: &'static str) -> ContractError {
        ContractError::MissingContext {
            contract: self.name(),
            what,
        }
    }
}

impl Contract for NoteContentContract<'_> {
    type Scratch = NoteContentScratch;
    type Output = ();

    fn name(&self) -> &'static str {
        "note_content"
    }

    fn fields(&self) -> &FieldSet<Self> {
        &self.fields
    }

    fn commit(&self, _record: Record, scratch: NoteContentScratch) -> Result<(), RecordError> {
        let row = NoteContentRow {
            note_content_id: scratch
                .note_content_id
                .ok_or_else(|| self.missing("note_content_id"))?,
            note_id: scratch.note_id.ok_or_else(|| self.missing("note"))?,
            data: scratch.data.ok_or_else(|| self.missing("data"))?,
            date_created: scratch
                .date_created
                .ok_or_else(|| self.missing("date_created"))?,
        };
        if self.repo.insert_note_content(&row)? == ContentInsert::Conflict {
            debug!(note_content_id = %row.note_content_id, "note content stored concurrently");
            return Err(RecordError::Invalid {
                field: "note_content_id",
                error: ValidationError::fail_fast(ErrorCode::UuidConflict),
            });
        }
        debug!(
            note_content_id = %row.note_content_id,
            note_id = %row.note_id,
            "note content stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryRepository;
    use crate::{ProcessOptions, Processed, Processor};
    use serde_json::json;

    const NOTE_A: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
    const CONTENT_1: &str = "11111111-1111-4111-8111-111111111111";

    fn content(id: &str, note: &str) -> Value {
        json!({"note_content_id": id, "note": note, "data": "body", "date_created": 1_500_000_000})
    }

    #[test]
    fn inserts_content_for_own_note() {
        let repo = MemoryRepository::new().with_note(NOTE_A, 1);
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        let out = p.process(content(CONTENT_1, NOTE_A), &ProcessOptions::new()).unwrap();
        assert_eq!(out, Processed::Committed(()));
        let stored = repo.content(CONTENT_1).unwrap();
        assert_eq!(stored.note_id, NOTE_A);
        assert_eq!(stored.data, "body");
    }

    #[test]
    fn existing_content_id_is_a_fail_fast_conflict() {
        let repo = MemoryRepository::new().with_note(NOTE_A, 1);
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        assert!(p
            .process(content(CONTENT_1, NOTE_A), &ProcessOptions::new())
            .unwrap()
            .succeeded());
        let mut resend = content(CONTENT_1, NOTE_A);
        resend["data"] = json!(7);
        let out = p.process(resend, &ProcessOptions::new()).unwrap();
        // data is never checked once the id conflicts
        assert_eq!(
            out.error_value(),
            Some(json!({"note_content_id_errors": 32, "note_content_id": CONTENT_1}))
        );
        assert_eq!(repo.content_count(), 1);
    }

    #[test]
    fn content_stored_after_lookup_is_a_conflict_not_fatal() {
        let repo = MemoryRepository::new()
            .with_note(NOTE_A, 1)
            .with_content(CONTENT_1, NOTE_A)
            .stale_lookups();
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        let out = p.process(content(CONTENT_1, NOTE_A), &ProcessOptions::new()).unwrap();
        assert_eq!(
            out.error_value(),
            Some(json!({"note_content_id_errors": 32, "note_content_id": CONTENT_1}))
        );
        assert_eq!(repo.content(CONTENT_1).unwrap().data, "seeded");
        assert_eq!(repo.content_count(), 1);
    }

    #[test]
    fn unknown_note_is_not_found() {
        let repo = MemoryRepository::new();
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        let out = p.process(content(CONTENT_1, NOTE_A), &ProcessOptions::new()).unwrap();
        assert_eq!(
            out.error_value(),
            Some(json!({"note_errors": 44, "note_content_id": CONTENT_1}))
        );
    }

    #[test]
    fn foreign_note_is_forbidden() {
        let repo = MemoryRepository::new().with_note(NOTE_A, 2);
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        let out = p.process(content(CONTENT_1, NOTE_A), &ProcessOptions::new()).unwrap();
        assert_eq!(
            out.error_value(),
            Some(json!({
                "note_errors": 43,
                "authentication": 43,
                "note_content_id": CONTENT_1,
            }))
        );
        assert_eq!(repo.content_count(), 0);
    }

    #[test]
    fn missing_identifier_is_not_reflected() {
        let repo = MemoryRepository::new().with_note(NOTE_A, 1);
        let mut p = Processor::new(NoteContentContract::new(&repo, 1).unwrap());
        let out = p
            .process(
                json!({"note": NOTE_A, "data": "x", "date_created": 99}),
                &ProcessOptions::new(),
            )
            .unwrap();
        assert_eq!(
            out.error_value(),
            Some(json!({"note_content_id_errors": 11, "date_created_errors": 23}))
        );
    }
}
