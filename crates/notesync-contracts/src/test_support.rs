//! In-memory repository for exercising contracts without a database.

use crate::{ContentInsert, Lookup, NoteContentRow, NoteRow, NoteUpsert, Repository, UserRow};
use anyhow::{bail, Result};
use std::cell::{Cell, RefCell};

/// Rows live in plain vectors so tests can seed duplicate keys on purpose.
#[derive(Default)]
pub struct MemoryRepository {
    users: RefCell<Vec<UserRow>>,
    notes: RefCell<Vec<NoteRow>>,
    contents: RefCell<Vec<NoteContentRow>>,
    password_checks: Cell<usize>,
    fail_writes: bool,
    stale_lookups: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: i64, username: &str, password: &str) -> Self {
        self.users.borrow_mut().push(UserRow {
            user_id,
            username: username.to_string(),
            password_hash: format!("plain:{password}"),
        });
        self
    }

    pub fn with_note(self, note_id: &str, user_id: i64) -> Self {
        self.notes.borrow_mut().push(NoteRow {
            note_id: note_id.to_string(),
            user_id,
            title: "seeded".into(),
            deleted: false,
            date_modified: 1_450_000_000,
        });
        self
    }

    pub fn with_content(self, note_content_id: &str, note_id: &str) -> Self {
        self.contents.borrow_mut().push(NoteContentRow {
            note_content_id: note_content_id.to_string(),
            note_id: note_id.to_string(),
            data: "seeded".into(),
            date_created: 1_450_000_000,
        });
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Existence lookups miss rows that are already stored, as if another writer
    /// committed between the lookup and the write.
    pub fn stale_lookups(mut self) -> Self {
        self.stale_lookups = true;
        self
    }

    pub fn note(&self, note_id: &str) -> Option<NoteRow> {
        self.notes
            .borrow()
            .iter()
            .find(|n| n.note_id == note_id)
            .cloned()
    }

    pub fn note_count(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn content(&self, note_content_id: &str) -> Option<NoteContentRow> {
        self.contents
            .borrow()
            .iter()
            .find(|c| c.note_content_id == note_content_id)
            .cloned()
    }

    pub fn content_count(&self) -> usize {
        self.contents.borrow().len()
    }

    pub fn password_checks(&self) -> usize {
        self.password_checks.get()
    }
}

impl Repository for MemoryRepository {
    fn find_note_by_id(&self, note_id: &str) -> Result<Lookup<NoteRow>> {
        if self.stale_lookups {
            return Ok(Lookup::Missing);
        }
        let rows = self
            .notes
            .borrow()
            .iter()
            .filter(|n| n.note_id == note_id)
            .cloned()
            .collect();
        Ok(Lookup::from_rows(rows))
    }

    fn find_note_owner_and_id(&self, note_id: &str) -> Result<Lookup<(i64, String)>> {
        let rows = self
            .notes
            .borrow()
            .iter()
            .filter(|n| n.note_id == note_id)
            .map(|n| (n.user_id, n.note_id.clone()))
            .collect();
        Ok(Lookup::from_rows(rows))
    }

    fn upsert_note(&self, note: &NoteRow) -> Result<NoteUpsert> {
        if self.fail_writes {
            bail!("store is read-only");
        }
        let mut notes = self.notes.borrow_mut();
        match notes.iter_mut().find(|n| n.note_id == note.note_id) {
            Some(existing) if existing.user_id != note.user_id => {
                return Ok(NoteUpsert::ForeignOwner)
            }
            Some(existing) => *existing = note.clone(),
            None => notes.push(note.clone()),
        }
        Ok(NoteUpsert::Written)
    }

    fn note_content_id_exists(&self, note_content_id: &str) -> Result<bool> {
        Ok(!self.stale_lookups && self.content(note_content_id).is_some())
    }

    fn insert_note_content(&self, content: &NoteContentRow) -> Result<ContentInsert> {
        if self.fail_writes {
            bail!("store is read-only");
        }
        if self.content(&content.note_content_id).is_some() {
            return Ok(ContentInsert::Conflict);
        }
        self.contents.borrow_mut().push(content.clone());
        Ok(ContentInsert::Inserted)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Lookup<UserRow>> {
        let rows = self
            .users
            .borrow()
            .iter()
            .filter(|u| u.username == username)
            .cloned()
            .collect();
        Ok(Lookup::from_rows(rows))
    }

    fn check_password(&self, user: &UserRow, plaintext: &str) -> bool {
        self.password_checks.set(self.password_checks.get() + 1);
        user.password_hash == format!("plain:{plaintext}")
    }
}
