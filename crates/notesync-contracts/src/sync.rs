//! Request-level orchestration: authenticate, gate the batch shape, then process each record.

use crate::top_level::{NOTES, NOTE_CONTENTS};
use crate::{
    AuthenticationContract, ContractError, NoteContentContract, NoteContract, NoteWrite,
    ProcessOptions, Processed, Processor, Repository, TopLevelContract,
};
use serde::Serialize;
use serde_json::{json, Value};
use serde_with::skip_serializing_none;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(i64),
    /// Credentials were rejected; carries the error payload.
    Denied(Value),
}

/// Run the credentials through a fresh single-use authentication processor.
pub fn authenticate(
    repo: &dyn Repository,
    credentials: Value,
) -> Result<AuthOutcome, ContractError> {
    let mut processor = Processor::new(AuthenticationContract::new(repo)?);
    match processor.process(credentials, &ProcessOptions::new())? {
        Processed::Committed(user_id) => {
            debug!(user_id, "authenticated");
            Ok(AuthOutcome::Authenticated(user_id))
        }
        rejected => {
            let payload = rejected.error_value().unwrap_or(Value::Null);
            warn!(%payload, "authentication denied");
            Ok(AuthOutcome::Denied(payload))
        }
    }
}

/// Per-record results of a processed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub notes: Vec<Value>,
    pub note_contents: Vec<Value>,
    pub notes_created: usize,
    pub notes_updated: usize,
    pub contents_inserted: usize,
}

#[skip_serializing_none]
#[derive(Serialize)]
struct SyncResponse<'a> {
    notes: Option<&'a [Value]>,
    note_contents: Option<&'a [Value]>,
}

impl SyncReport {
    /// True when every record committed.
    pub fn is_complete(&self) -> bool {
        self.notes.is_empty() && self.note_contents.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.notes.len() + self.note_contents.len()
    }

    pub fn committed(&self) -> usize {
        self.notes_created + self.notes_updated + self.contents_inserted
    }

    /// Failed payloads keyed by list; lists without failures are omitted.
    pub fn to_response(&self) -> Value {
        let response = SyncResponse {
            notes: (!self.notes.is_empty()).then_some(self.notes.as_slice()),
            note_contents: (!self.note_contents.is_empty())
                .then_some(self.note_contents.as_slice()),
        };
        serde_json::to_value(response).unwrap_or_else(|_| json!({}))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The request failed the shape gate; no record was processed.
    Malformed(Value),
    Processed(SyncReport),
}

/// Process a `{ "notes": [...], "note_contents": [...] }` batch for an authenticated user.
///
/// Notes run before note contents so a content may reference a note created in the same batch.
pub fn process_batch(
    repo: &dyn Repository,
    user_id: i64,
    body: Value,
) -> Result<BatchOutcome, ContractError> {
    if let Value::Object(map) = &body {
        let ignored: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| *k != NOTES && *k != NOTE_CONTENTS)
            .collect();
        if !ignored.is_empty() {
            warn!(user_id, ?ignored, "ignoring unknown top-level keys");
        }
    }

    let options = ProcessOptions::new();
    let mut gate = Processor::new(TopLevelContract::new()?);
    let shape = match gate.process(body, &options)? {
        Processed::Committed(shape) => shape,
        rejected => {
            let payload = rejected.error_value().unwrap_or(Value::Null);
            debug!(user_id, %payload, "batch failed shape gate");
            return Ok(BatchOutcome::Malformed(payload));
        }
    };

    let mut report = SyncReport::default();

    let mut notes = Processor::new(NoteContract::new(repo, user_id)?);
    for record in shape.notes {
        match notes.process(record, &options)? {
            Processed::Committed(NoteWrite::Created) => report.notes_created += 1,
            Processed::Committed(NoteWrite::Updated) => report.notes_updated += 1,
            rejected => report.notes.extend(rejected.error_value()),
        }
    }

    let mut contents = Processor::new(NoteContentContract::new(repo, user_id)?);
    for record in shape.note_contents {
        match contents.process(record, &options)? {
            Processed::Committed(()) => report.contents_inserted += 1,
            rejected => report.note_contents.extend(rejected.error_value()),
        }
    }

    info!(
        user_id,
        notes_created = report.notes_created,
        notes_updated = report.notes_updated,
        contents_inserted = report.contents_inserted,
        failed = report.failed(),
        "batch processed"
    );
    Ok(BatchOutcome::Processed(report))
}
