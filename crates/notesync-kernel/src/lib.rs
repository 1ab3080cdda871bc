use anyhow::{anyhow, bail, Context, Result};
use notesync_contracts::sync::{self, AuthOutcome, BatchOutcome};
use notesync_contracts::{
    ContentInsert, Lookup, NoteContentRow, NoteRow, NoteUpsert, Repository, UserRow,
};
use rusqlite::{params, Connection, ErrorCode as SqliteErrorCode, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

mod password;

pub use password::{hash_password, verify_password};

pub const DB_FILE: &str = "notesync.sqlite";

/// SQLite-backed store for users, notes and note contents.
///
/// Cheap to clone; every operation opens its own connection.
#[derive(Clone, Debug)]
pub struct Kernel {
    db_path: PathBuf,
    busy_timeout: Duration,
}

/// Everything a user pulled since a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub notes: Vec<NoteRow>,
    pub note_contents: Vec<NoteContentRow>,
}

impl Kernel {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create state dir {}", dir.display()))?;
        let db_path = dir.join(DB_FILE);
        // Busy timeout (default 5000ms; override with NOTESYNC_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("NOTESYNC_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let kernel = Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_ms),
        };
        let conn = kernel.conn()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_schema(&conn)?;
        info!(path = %kernel.db_path.display(), "opened note store");
        Ok(kernel)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              user_id INTEGER PRIMARY KEY AUTOINCREMENT,
              username TEXT NOT NULL UNIQUE,
              password_hash TEXT NOT NULL,
              created TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
              note_id CHAR(36) PRIMARY KEY,
              user_id INTEGER NOT NULL REFERENCES users(user_id),
              title TEXT NOT NULL,
              deleted INTEGER NOT NULL DEFAULT 0,
              date_modified INTEGER NOT NULL    -- seconds from epoch
            );
            CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);
            CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(date_modified);

            -- Content revisions are append-only
            CREATE TABLE IF NOT EXISTS note_contents (
              note_content_id CHAR(36) PRIMARY KEY,
              note_id CHAR(36) NOT NULL REFERENCES notes(note_id),
              data TEXT NOT NULL,
              date_created INTEGER NOT NULL     -- seconds from epoch
            );
            CREATE INDEX IF NOT EXISTS idx_contents_note ON note_contents(note_id);
            CREATE INDEX IF NOT EXISTS idx_contents_created ON note_contents(date_created);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------- Users ----------------

    pub fn create_user(&self, username: &str, password: &str) -> Result<i64> {
        let username = username.trim();
        if username.is_empty() {
            bail!("username must not be empty");
        }
        let conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let inserted = conn.execute(
            "INSERT INTO users(username,password_hash,created) VALUES(?,?,?)",
            params![username, hash_password(password), now],
        );
        match inserted {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                info!(user_id = id, username, "created user");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == SqliteErrorCode::ConstraintViolation =>
            {
                Err(anyhow!("user {username} already exists"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns false when no such user exists.
    pub fn set_password(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE users SET password_hash=? WHERE username=?",
            params![hash_password(password), username],
        )?;
        Ok(n > 0)
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT user_id,username,password_hash FROM users ORDER BY user_id")?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ---------------- Pull queries ----------------

    /// Notes owned by `user_id` modified strictly after `after` (all when `None`).
    pub fn list_notes_after(&self, user_id: i64, after: Option<i64>) -> Result<Vec<NoteRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT note_id,user_id,title,deleted,date_modified FROM notes
             WHERE user_id=? AND date_modified>? ORDER BY date_modified ASC, note_id ASC",
        )?;
        let rows = stmt.query_map(params![user_id, after.unwrap_or(i64::MIN)], note_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Contents of notes owned by `user_id` created strictly after `after`.
    pub fn list_note_contents_after(
        &self,
        user_id: i64,
        after: Option<i64>,
    ) -> Result<Vec<NoteContentRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.note_content_id,c.note_id,c.data,c.date_created FROM note_contents c
             JOIN notes n ON n.note_id=c.note_id
             WHERE n.user_id=? AND c.date_created>?
             ORDER BY c.date_created ASC, c.note_content_id ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, after.unwrap_or(i64::MIN)],
            content_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn snapshot(&self, user_id: i64, after: Option<i64>) -> Result<Snapshot> {
        Ok(Snapshot {
            notes: self.list_notes_after(user_id, after)?,
            note_contents: self.list_note_contents_after(user_id, after)?,
        })
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------
    // These helpers offload rusqlite work from async executors.

    pub async fn authenticate_async(&self, credentials: serde_json::Value) -> Result<AuthOutcome> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || -> Result<AuthOutcome> {
            Ok(sync::authenticate(&k, credentials)?)
        })
        .await
        .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn process_batch_async(
        &self,
        user_id: i64,
        body: serde_json::Value,
    ) -> Result<BatchOutcome> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || -> Result<BatchOutcome> {
            Ok(sync::process_batch(&k, user_id, body)?)
        })
        .await
        .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn snapshot_async(&self, user_id: i64, after: Option<i64>) -> Result<Snapshot> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.snapshot(user_id, after))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }
}

fn user_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: r.get(0)?,
        username: r.get(1)?,
        password_hash: r.get(2)?,
    })
}

fn note_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        note_id: r.get(0)?,
        user_id: r.get(1)?,
        title: r.get(2)?,
        deleted: r.get(3)?,
        date_modified: r.get(4)?,
    })
}

fn content_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<NoteContentRow> {
    Ok(NoteContentRow {
        note_content_id: r.get(0)?,
        note_id: r.get(1)?,
        data: r.get(2)?,
        date_created: r.get(3)?,
    })
}

impl Repository for Kernel {
    fn find_note_by_id(&self, note_id: &str) -> Result<Lookup<NoteRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT note_id,user_id,title,deleted,date_modified FROM notes WHERE note_id=?",
        )?;
        let rows = stmt
            .query_map([note_id], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Lookup::from_rows(rows))
    }

    fn find_note_owner_and_id(&self, note_id: &str) -> Result<Lookup<(i64, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id,note_id FROM notes WHERE note_id=?")?;
        let rows = stmt
            .query_map([note_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Lookup::from_rows(rows))
    }

    fn upsert_note(&self, note: &NoteRow) -> Result<NoteUpsert> {
        let conn = self.conn()?;
        // One statement: a row inserted by another user since the lookup is left untouched.
        let n = conn.execute(
            "INSERT INTO notes(note_id,user_id,title,deleted,date_modified) VALUES(?,?,?,?,?)
             ON CONFLICT(note_id) DO UPDATE SET
               title=excluded.title,
               deleted=excluded.deleted,
               date_modified=excluded.date_modified
             WHERE notes.user_id=excluded.user_id",
            params![
                note.note_id,
                note.user_id,
                note.title,
                note.deleted,
                note.date_modified
            ],
        )?;
        if n == 0 {
            debug!(note_id = %note.note_id, user_id = note.user_id, "note owned by another user");
            return Ok(NoteUpsert::ForeignOwner);
        }
        debug!(note_id = %note.note_id, user_id = note.user_id, "upserted note");
        Ok(NoteUpsert::Written)
    }

    fn note_content_id_exists(&self, note_content_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM note_contents WHERE note_content_id=?",
                [note_content_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_note_content(&self, content: &NoteContentRow) -> Result<ContentInsert> {
        let conn = self.conn()?;
        let n = conn
            .execute(
                "INSERT INTO note_contents(note_content_id,note_id,data,date_created)
                 VALUES(?,?,?,?)
                 ON CONFLICT(note_content_id) DO NOTHING",
                params![
                    content.note_content_id,
                    content.note_id,
                    content.data,
                    content.date_created
                ],
            )
            .with_context(|| format!("insert note content {}", content.note_content_id))?;
        Ok(if n == 0 {
            ContentInsert::Conflict
        } else {
            ContentInsert::Inserted
        })
    }

    fn find_user_by_username(&self, username: &str) -> Result<Lookup<UserRow>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT user_id,username,password_hash FROM users WHERE username=?")?;
        let rows = stmt
            .query_map([username], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Lookup::from_rows(rows))
    }

    fn check_password(&self, user: &UserRow, plaintext: &str) -> bool {
        verify_password(&user.password_hash, plaintext)
    }
}
