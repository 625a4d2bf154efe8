//! # Note Store
//!
//! Durable per-user note storage backed by a single JSON document.
//!
//! The on-disk layout is a map from user id (text) to an ordered array of
//! note records. Saves replace the whole document by writing a sibling
//! temp file and renaming it into place, so a reader never observes a
//! partial write. There is no fsync, so a power loss exactly at a flush
//! can drop that flush; at this scale that window is accepted.
//!
//! All mutation goes through one async mutex, so a conversation completing
//! a note and a dispatcher tick marking deliveries can never lose each
//! other's updates.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add transactional handle for multi-step read-modify-write
//! - 1.0.0: Initial JSON-file store

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::core::clock::format_minute;

/// One reminder note belonging to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Stable identity, generated at creation. Records written by older
    /// versions are backfilled on open (a nil id marks a legacy record).
    #[serde(default)]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Scheduled minute in the canonical `YYYY-MM-DD HH:MM` format.
    pub remind_at: String,
    /// Becomes true exactly once, after successful delivery.
    pub notified: bool,
    /// Fields this version does not know about are kept and written back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Note {
    /// Create a new undelivered note scheduled at the given minute.
    pub fn new(title: impl Into<String>, description: impl Into<String>, remind_at: NaiveDateTime) -> Self {
        Note {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            remind_at: format_minute(remind_at),
            notified: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// The full persisted state: user id → that user's notes, in insertion
/// order. `BTreeMap` keeps key order deterministic so repeated saves of
/// the same state are byte-identical.
pub type NoteBook = BTreeMap<String, Vec<Note>>;

/// JSON-file note store. Cheap to construct; every operation reads the
/// current file state fresh, so the file is the single source of truth.
pub struct NoteStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NoteStore {
    /// Store over the given path. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NoteStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Open a store and normalize legacy records: notes persisted before
    /// ids existed get one assigned and flushed back, so later in-place
    /// updates can target them reliably.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = NoteStore::new(path);
        let mut txn = store.transaction().await?;

        let mut backfilled = 0usize;
        for notes in txn.notes.values_mut() {
            for note in notes.iter_mut().filter(|n| n.id.is_nil()) {
                note.id = Uuid::new_v4();
                backfilled += 1;
            }
        }
        if backfilled > 0 {
            info!("assigned ids to {backfilled} legacy note(s)");
            txn.commit().await?;
        } else {
            drop(txn);
        }

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full current state. A missing file is a valid empty state,
    /// never an error; an unreadable or malformed file is an error and the
    /// existing data is left untouched.
    pub async fn load(&self) -> Result<NoteBook> {
        let _guard = self.lock.lock().await;
        self.read_book().await
    }

    /// Atomically replace the persisted state.
    pub async fn save(&self, notes: &NoteBook) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_book(notes).await
    }

    /// Append one note to a user's list, creating the list if absent.
    pub async fn append_note(&self, user_id: &str, note: Note) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut book = self.read_book().await?;
        book.entry(user_id.to_string()).or_default().push(note);
        self.write_book(&book).await
    }

    /// Flip one note's `notified` flag to true, by id. The flag is
    /// monotonic: there is no way back to false.
    pub async fn mark_notified(&self, user_id: &str, note_id: Uuid) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut book = self.read_book().await?;
        let note = book
            .get_mut(user_id)
            .and_then(|notes| notes.iter_mut().find(|n| n.id == note_id))
            .ok_or_else(|| anyhow!("no note {note_id} for user {user_id}"))?;
        note.notified = true;
        self.write_book(&book).await
    }

    /// Begin a multi-step read-modify-write. The returned handle holds the
    /// store mutex until it is committed or dropped; dropping it without
    /// committing discards any changes.
    pub async fn transaction(&self) -> Result<StoreTxn<'_>> {
        let guard = self.lock.lock().await;
        let notes = self.read_book().await?;
        Ok(StoreTxn {
            store: self,
            notes,
            _guard: guard,
        })
    }

    async fn read_book(&self) -> Result<NoteBook> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("note store {} does not exist yet, starting empty", self.path.display());
                return Ok(NoteBook::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading note store {}", self.path.display()))
            }
        };

        serde_json::from_slice(&bytes)
            .with_context(|| format!("note store {} is corrupt", self.path.display()))
    }

    async fn write_book(&self, notes: &NoteBook) -> Result<()> {
        let json = serde_json::to_string_pretty(notes).context("serializing note store")?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .with_context(|| format!("writing note store temp file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing note store {}", self.path.display()))?;

        debug!("flushed note store {}", self.path.display());
        Ok(())
    }
}

/// An exclusive, in-flight read-modify-write over the full store.
///
/// This is the serialized access point the dispatcher uses for its
/// scan-and-mark cycle: one load, arbitrary in-memory edits, one save.
pub struct StoreTxn<'a> {
    store: &'a NoteStore,
    /// Working copy of the persisted state; edit freely, then commit.
    pub notes: NoteBook,
    _guard: MutexGuard<'a, ()>,
}

impl StoreTxn<'_> {
    /// Persist the working copy in a single atomic save.
    pub async fn commit(self) -> Result<()> {
        self.store.write_book(&self.notes).await
    }
}
