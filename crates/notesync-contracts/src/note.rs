use crate::checks;
use crate::{
    Contract, ContractError, ErrorCode, FieldOutcome, FieldResult, FieldSet, FieldSpec, Lookup,
    NoteRow, NoteUpsert, Record, RecordError, Repository, ValidationError,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Forbidden masks whether the id exists under someone else.
fn foreign_owner() -> RecordError {
    RecordError::Invalid {
        field: "note_id",
        error: ValidationError::fail_fast(ErrorCode::Forbidden)
            .with_parallel("authentication", ErrorCode::Forbidden),
    }
}

/// How a committed note reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteWrite {
    Created,
    Updated,
}

#[derive(Debug, Default)]
pub struct NoteScratch {
    note_id: Option<String>,
    title: Option<String>,
    deleted: Option<bool>,
    date_modified: Option<i64>,
    existing: Option<NoteRow>,
}

/// Note metadata pushed by an authenticated user.
pub struct NoteContract<'a> {
    repo: &'a dyn Repository,
    user_id: i64,
    fields: FieldSet<NoteContract<'a>>,
}

impl<'a> NoteContract<'a> {
    pub fn new(repo: &'a dyn Repository, user_id: i64) -> Result<Self, ContractError> {
        let fields = FieldSet::new(
            "note",
            vec![
                FieldSpec::new("note_id", Self::validate_note_id).reflected(),
                FieldSpec::new("title", Self::validate_title),
                FieldSpec::new("deleted", Self::validate_deleted),
                FieldSpec::new("date_modified", Self::validate_date_modified),
            ],
        )?;
        Ok(Self {
            repo,
            user_id,
            fields,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    fn validate_note_id(&self, scratch: &mut NoteScratch, value: &Value) -> FieldResult {
        scratch.note_id = Some(checks::uuid(value)?.to_string());
        Ok(FieldOutcome::Pass)
    }

    fn validate_title(&self, scratch: &mut NoteScratch, value: &Value) -> FieldResult {
        scratch.title = Some(checks::expect_str(value)?.to_string());
        Ok(FieldOutcome::Pass)
    }

    fn validate_deleted(&self, scratch: &mut NoteScratch, value: &Value) -> FieldResult {
        scratch.deleted = Some(checks::expect_bool(value)?);
        Ok(FieldOutcome::Pass)
    }

    fn validate_date_modified(&self, scratch: &mut NoteScratch, value: &Value) -> FieldResult {
        scratch.date_modified = Some(checks::date(value)?);
        Ok(FieldOutcome::Pass)
    }

    fn missing(&self, what: &'static str) -> ContractError {
        ContractError::MissingContext {
            contract: self.name(),
            what,
        }
    }
}

impl Contract for NoteContract<'_> {
    type Scratch = NoteScratch;
    type Output = NoteWrite;

    fn name(&self) -> &'static str {
        "note"
    }

    fn fields(&self) -> &FieldSet<Self> {
        &self.fields
    }

    fn pre_commit(&self, _record: &Record, scratch: &mut NoteScratch) -> Result<(), RecordError> {
        let note_id = scratch.note_id.as_deref().ok_or_else(|| self.missing("note_id"))?;
        match self.repo.find_note_by_id(note_id)? {
            Lookup::Missing => Ok(()),
            Lookup::Unique(existing) if existing.user_id != self.user_id => {
                debug!(note_id, user_id = self.user_id, "note owned by another user");
                Err(foreign_owner())
            }
            Lookup::Unique(existing) => {
                scratch.existing = Some(existing);
                Ok(())
            }
            Lookup::Duplicate(count) => Err(ContractError::Integrity(format!(
                "note_id {note_id} matched {count} rows"
            ))
            .into()),
        }
    }

    fn commit(&self, _record: Record, scratch: NoteScratch) -> Result<NoteWrite, RecordError> {
        let row = NoteRow {
            note_id: scratch.note_id.ok_or_else(|| self.missing("note_id"))?,
            user_id: self.user_id,
            title: scratch.title.ok_or_else(|| self.missing("title"))?,
            deleted: scratch.deleted.ok_or_else(|| self.missing("deleted"))?,
            date_modified: scratch
                .date_modified
                .ok_or_else(|| self.missing("date_modified"))?,
        };
        if self.repo.upsert_note(&row)? == NoteUpsert::ForeignOwner {
            debug!(note_id = %row.note_id, user_id = self.user_id, "note claimed by another user");
            return Err(foreign_owner());
        }
        let write = if scratch.existing.is_some() {
            NoteWrite::Updated
        } else {
            NoteWrite::Created
        };
        debug!(note_id = %row.note_id, user_id = self.user_id, ?write, "note stored");
        Ok(write)
    }
}
