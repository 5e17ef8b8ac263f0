//! Key-value persistence over the workspace database.
//!
//! Every collection lives under one key as a JSON blob. Writes bump a per-key
//! revision and append to `store_changes`, which views poll through
//! [`changes_since`] to learn which keys moved.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

pub const KEY_BATCHES: &str = "batches";
pub const KEY_STUDENTS: &str = "students";
pub const KEY_ATTENDANCE: &str = "attendance";
pub const KEY_TRAININGS: &str = "trainings";
pub const KEY_DARK_MODE: &str = "darkMode";

/// Keys only the record operations may write.
pub const DOMAIN_KEYS: [&str; 4] = [KEY_BATCHES, KEY_STUDENTS, KEY_ATTENDANCE, KEY_TRAININGS];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("revision mismatch for {key}: expected {expected}, actual {actual}")]
    RevisionMismatch {
        key: String,
        expected: i64,
        actual: i64,
    },

    #[error("stored value for {key} is malformed: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub value: T,
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub key: String,
    pub revision: i64,
    pub seq: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeed {
    pub cursor: i64,
    pub changes: Vec<Change>,
}

/// Expected revisions supplied by a caller that read the keys earlier.
/// Keys without an entry are written unconditionally.
#[derive(Debug, Clone, Default)]
pub struct RevisionGuard {
    expected: HashMap<String, i64>,
}

impl RevisionGuard {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn expect(mut self, key: &str, revision: i64) -> Self {
        self.expected.insert(key.to_string(), revision);
        self
    }

    pub fn from_json(raw: Option<&serde_json::Value>) -> Result<Self, String> {
        let mut guard = Self::default();
        let Some(raw) = raw else {
            return Ok(guard);
        };
        if raw.is_null() {
            return Ok(guard);
        }
        let Some(obj) = raw.as_object() else {
            return Err("expectedRevisions must be an object".to_string());
        };
        for (key, v) in obj {
            let Some(rev) = v.as_i64() else {
                return Err(format!("expectedRevisions.{} must be an integer", key));
            };
            guard.expected.insert(key.clone(), rev);
        }
        Ok(guard)
    }

    fn expected_for(&self, key: &str) -> Option<i64> {
        self.expected.get(key).copied()
    }
}

pub fn revision(conn: &Connection, key: &str) -> Result<i64, StoreError> {
    let rev: Option<i64> = conn
        .query_row(
            "SELECT revision FROM store_entries WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(rev.unwrap_or(0))
}

pub fn read_raw(conn: &Connection, key: &str) -> Result<Option<(String, i64)>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT value, revision FROM store_entries WHERE key = ?",
            [key],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
        )
        .optional()?)
}

pub fn contains(conn: &Connection, key: &str) -> Result<bool, StoreError> {
    Ok(read_raw(conn, key)?.is_some())
}

/// Reads `key` with its revision, or `default` at revision 0 when absent.
/// A blob that no longer parses is an error so callers never rewrite a
/// collection from a default.
pub fn read_entry<T: DeserializeOwned>(
    conn: &Connection,
    key: &str,
    default: T,
) -> Result<Entry<T>, StoreError> {
    let Some((text, revision)) = read_raw(conn, key)? else {
        return Ok(Entry {
            value: default,
            revision: 0,
        });
    };
    match serde_json::from_str::<T>(&text) {
        Ok(value) => Ok(Entry { value, revision }),
        Err(e) => {
            tracing::warn!(key, revision, error = %e, "stored value is malformed");
            Err(StoreError::Malformed {
                key: key.to_string(),
                source: e,
            })
        }
    }
}

/// Reads `key` or falls back to `default`, never failing.
pub fn read<T: DeserializeOwned>(conn: &Connection, key: &str, default: T) -> T {
    match read_raw(conn, key) {
        Ok(None) => default,
        Ok(Some((text, _))) => match serde_json::from_str::<T>(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is malformed; using default");
                default
            }
        },
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored value; using default");
            default
        }
    }
}

pub fn write<T: Serialize + ?Sized>(
    conn: &Connection,
    key: &str,
    value: &T,
    guard: &RevisionGuard,
) -> Result<Change, StoreError> {
    let text = serde_json::to_string(value)?;
    write_raw(conn, key, &text, guard)
}

pub fn write_raw(
    conn: &Connection,
    key: &str,
    text: &str,
    guard: &RevisionGuard,
) -> Result<Change, StoreError> {
    let current = revision(conn, key)?;
    if let Some(expected) = guard.expected_for(key) {
        if expected != current {
            return Err(StoreError::RevisionMismatch {
                key: key.to_string(),
                expected,
                actual: current,
            });
        }
    }

    let next = current + 1;
    let now = Utc::now().to_rfc3339();
    let res = conn
        .execute(
            "INSERT INTO store_entries(key, value, revision, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               revision = excluded.revision,
               updated_at = excluded.updated_at",
            (key, text, next, &now),
        )
        .and_then(|_| {
            conn.execute(
                "INSERT INTO store_changes(key, revision, changed_at) VALUES(?, ?, ?)",
                (key, next, &now),
            )
        });
    if let Err(e) = res {
        tracing::warn!(key, error = %e, "failed to write stored value");
        return Err(e.into());
    }

    Ok(Change {
        key: key.to_string(),
        revision: next,
        seq: conn.last_insert_rowid(),
    })
}

/// Latest change per key with `seq > cursor`, ordered by seq.
pub fn changes_since(conn: &Connection, cursor: i64) -> Result<ChangeFeed, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT key, revision, seq
         FROM store_changes
         WHERE seq IN (
           SELECT MAX(seq) FROM store_changes WHERE seq > ? GROUP BY key
         )
         ORDER BY seq",
    )?;
    let changes = stmt
        .query_map([cursor], |r| {
            Ok(Change {
                key: r.get(0)?,
                revision: r.get(1)?,
                seq: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChangeFeed {
        cursor: head_seq(conn)?.max(cursor),
        changes,
    })
}

/// Sequence number of the latest write, 0 for a fresh workspace.
pub fn head_seq(conn: &Connection) -> Result<i64, StoreError> {
    let head: Option<i64> = conn.query_row("SELECT MAX(seq) FROM store_changes", [], |r| r.get(0))?;
    Ok(head.unwrap_or(0))
}
