use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRow {
    pub note_id: String,
    #[serde(skip_serializing, default)]
    pub user_id: i64,
    pub title: String,
    pub deleted: bool,
    pub date_modified: i64,
}

/// Immutable once stored. Serialises its owning note as `note`, matching the push shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContentRow {
    pub note_content_id: String,
    #[serde(rename = "note")]
    pub note_id: String,
    pub data: String,
    pub date_created: i64,
}

/// Result of a lookup that is expected to match at most one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Missing,
    Unique(T),
    /// More than one row matched a key that should be unique.
    Duplicate(usize),
}

impl<T> Lookup<T> {
    pub fn from_rows(mut rows: Vec<T>) -> Self {
        match rows.len() {
            0 => Lookup::Missing,
            1 => rows.pop().map_or(Lookup::Missing, Lookup::Unique),
            n => Lookup::Duplicate(n),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Missing => Lookup::Missing,
            Lookup::Unique(v) => Lookup::Unique(f(v)),
            Lookup::Duplicate(n) => Lookup::Duplicate(n),
        }
    }
}

/// Outcome of an owner-guarded note upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteUpsert {
    Written,
    /// The identifier belongs to another user; nothing was written.
    ForeignOwner,
}

/// Outcome of an insert-only note content write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentInsert {
    Inserted,
    /// The identifier is already stored; nothing was written.
    Conflict,
}

/// Persistence capability the processors call into.
///
/// The lookups that run during validation are advisory: another writer may land before the
/// commit. The writes themselves are atomic and report a lost race as [`NoteUpsert::ForeignOwner`]
/// or [`ContentInsert::Conflict`] instead of failing.
pub trait Repository {
    fn find_note_by_id(&self, note_id: &str) -> Result<Lookup<NoteRow>>;

    /// Owner user id and note id of a note.
    fn find_note_owner_and_id(&self, note_id: &str) -> Result<Lookup<(i64, String)>>;

    fn upsert_note(&self, note: &NoteRow) -> Result<NoteUpsert>;

    fn note_content_id_exists(&self, note_content_id: &str) -> Result<bool>;

    fn insert_note_content(&self, content: &NoteContentRow) -> Result<ContentInsert>;

    fn find_user_by_username(&self, username: &str) -> Result<Lookup<UserRow>>;

    fn check_password(&self, user: &UserRow, plaintext: &str) -> bool;
}
