//! Validated record operations over the stored collections.
//!
//! Each operation runs in one transaction: it reads the collections it needs,
//! checks references, writes the new values through the store, and returns the
//! resulting changes. A failed check or write rolls everything back.

use crate::model::{
    attendance_record_id, format_day, parse_day, AttendanceRecord, AttendanceStatus, Student,
    TrainingRecord,
};
use crate::store::{
    self, Change, RevisionGuard, StoreError, KEY_ATTENDANCE, KEY_BATCHES, KEY_STUDENTS,
    KEY_TRAININGS,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{0}")]
    Invalid(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("{kind} does not exist: {id}")]
    InvalidReference { kind: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for RosterError {
    fn from(e: rusqlite::Error) -> Self {
        RosterError::Store(StoreError::Db(e))
    }
}

impl RosterError {
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Invalid(_) => "bad_params",
            RosterError::NotFound { .. } => "not_found",
            RosterError::Duplicate { .. } => "duplicate",
            RosterError::InvalidReference { .. } => "invalid_reference",
            RosterError::Store(StoreError::RevisionMismatch { .. }) => "revision_conflict",
            RosterError::Store(StoreError::Malformed { .. }) => "corrupt_store",
            RosterError::Store(StoreError::Db(_)) => "db_write_failed",
            RosterError::Store(StoreError::Serialize(_)) => "db_write_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            RosterError::NotFound { kind, id }
            | RosterError::Duplicate { kind, id }
            | RosterError::InvalidReference { kind, id } => Some(json!({ "kind": kind, "id": id })),
            RosterError::Store(StoreError::RevisionMismatch {
                key,
                expected,
                actual,
            }) => Some(json!({ "key": key, "expected": expected, "actual": actual })),
            RosterError::Store(StoreError::Malformed { key, .. }) => Some(json!({ "key": key })),
            _ => None,
        }
    }
}

pub type RosterResult<T> = Result<T, RosterError>;

/// Result of a mutation plus the store changes it made.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    pub changes: Vec<Change>,
}

/// Current collections plus their revisions, loaded inside a transaction.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub batches: Vec<String>,
    pub students: Vec<Student>,
    pub attendance: Vec<AttendanceRecord>,
    pub trainings: Vec<TrainingRecord>,
}

/// Non-failing read of all collections for queries and dashboards.
pub fn snapshot(conn: &Connection) -> Snapshot {
    Snapshot {
        batches: store::read(conn, KEY_BATCHES, Vec::new()),
        students: store::read(conn, KEY_STUDENTS, Vec::new()),
        attendance: store::read(conn, KEY_ATTENDANCE, Vec::new()),
        trainings: store::read(conn, KEY_TRAININGS, Vec::new()),
    }
}

fn load<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> RosterResult<Vec<T>> {
    Ok(store::read_entry(conn, key, Vec::new())?.value)
}

fn required(field: &str, raw: &str) -> RosterResult<String> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(RosterError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(v.to_string())
}

fn require_batch(batches: &[String], name: &str) -> RosterResult<()> {
    if batches.iter().any(|b| b == name) {
        Ok(())
    } else {
        Err(RosterError::InvalidReference {
            kind: "batch",
            id: name.to_string(),
        })
    }
}

fn checked_day(raw: &str) -> RosterResult<String> {
    parse_day(raw)
        .map(format_day)
        .ok_or_else(|| RosterError::Invalid(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

fn in_tx<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> RosterResult<Applied<T>>,
) -> RosterResult<Applied<T>> {
    let tx = conn.unchecked_transaction()?;
    match f(&tx) {
        Ok(applied) => {
            tx.commit()?;
            Ok(applied)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

// ---- batches ----

pub fn create_batch(conn: &Connection, name: &str, guard: &RevisionGuard) -> RosterResult<Applied<String>> {
    let name = required("name", name)?;
    in_tx(conn, |tx| {
        let mut batches: Vec<String> = load(tx, KEY_BATCHES)?;
        if batches.iter().any(|b| *b == name) {
            return Err(RosterError::Duplicate {
                kind: "batch",
                id: name,
            });
        }
        batches.push(name.clone());
        let change = store::write(tx, KEY_BATCHES, &batches, guard)?;
        Ok(Applied {
            value: name,
            changes: vec![change],
        })
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRemoval {
    pub name: String,
    pub students_removed: usize,
    pub attendance_removed: usize,
}

/// Removes the batch, its students, and those students' attendance.
pub fn delete_batch(conn: &Connection, name: &str, guard: &RevisionGuard) -> RosterResult<Applied<BatchRemoval>> {
    let name = name.trim().to_string();
    in_tx(conn, |tx| {
        let mut batches: Vec<String> = load(tx, KEY_BATCHES)?;
        let before = batches.len();
        batches.retain(|b| *b != name);
        if batches.len() == before {
            return Err(RosterError::NotFound {
                kind: "batch",
                id: name,
            });
        }

        let mut students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        let removed_ids: HashSet<String> = students
            .iter()
            .filter(|s| s.batch == name)
            .map(|s| s.id.clone())
            .collect();
        students.retain(|s| s.batch != name);

        let mut attendance: Vec<AttendanceRecord> = load(tx, KEY_ATTENDANCE)?;
        let att_before = attendance.len();
        attendance.retain(|a| !removed_ids.contains(&a.student_id));
        let attendance_removed = att_before - attendance.len();

        let mut changes = vec![store::write(tx, KEY_BATCHES, &batches, guard)?];
        if !removed_ids.is_empty() {
            changes.push(store::write(tx, KEY_STUDENTS, &students, guard)?);
        }
        if attendance_removed > 0 {
            changes.push(store::write(tx, KEY_ATTENDANCE, &attendance, guard)?);
        }

        tracing::info!(
            batch = %name,
            students_removed = removed_ids.len(),
            attendance_removed,
            "batch deleted"
        );
        Ok(Applied {
            value: BatchRemoval {
                name,
                students_removed: removed_ids.len(),
                attendance_removed,
            },
            changes,
        })
    })
}

/// Appends batch names referenced by students but missing from the batch list.
pub fn reconcile_batches(conn: &Connection) -> RosterResult<Applied<Vec<String>>> {
    in_tx(conn, |tx| {
        let mut batches: Vec<String> = load(tx, KEY_BATCHES)?;
        let students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        let mut added = Vec::new();
        for s in &students {
            if !s.batch.is_empty() && !batches.contains(&s.batch) {
                batches.push(s.batch.clone());
                added.push(s.batch.clone());
            }
        }
        if added.is_empty() {
            return Ok(Applied {
                value: added,
                changes: Vec::new(),
            });
        }
        tracing::warn!(added = ?added, "students referenced unknown batches; added to batch list");
        let change = store::write(tx, KEY_BATCHES, &batches, &RevisionGuard::none())?;
        Ok(Applied {
            value: added,
            changes: vec![change],
        })
    })
}

// ---- students ----

#[derive(Debug, Clone, Default)]
pub struct StudentInput {
    pub id: Option<String>,
    pub name: String,
    pub batch: String,
    pub course: String,
    pub contact: String,
}

impl StudentInput {
    fn validated(&self, id: String) -> RosterResult<Student> {
        Ok(Student {
            id,
            name: required("name", &self.name)?,
            batch: required("batch", &self.batch)?,
            course: required("course", &self.course)?,
            contact: required("contact", &self.contact)?,
        })
    }
}

pub fn create_student(
    conn: &Connection,
    input: &StudentInput,
    guard: &RevisionGuard,
) -> RosterResult<Applied<Student>> {
    let id = match input.id.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    let student = input.validated(id)?;
    in_tx(conn, |tx| {
        let batches: Vec<String> = load(tx, KEY_BATCHES)?;
        require_batch(&batches, &student.batch)?;
        let mut students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        if students.iter().any(|s| s.id == student.id) {
            return Err(RosterError::Duplicate {
                kind: "student",
                id: student.id.clone(),
            });
        }
        students.push(student.clone());
        let change = store::write(tx, KEY_STUDENTS, &students, guard)?;
        Ok(Applied {
            value: student,
            changes: vec![change],
        })
    })
}

pub fn update_student(
    conn: &Connection,
    id: &str,
    input: &StudentInput,
    guard: &RevisionGuard,
) -> RosterResult<Applied<Student>> {
    let updated = input.validated(id.to_string())?;
    in_tx(conn, |tx| {
        let batches: Vec<String> = load(tx, KEY_BATCHES)?;
        require_batch(&batches, &updated.batch)?;
        let mut students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        let Some(slot) = students.iter_mut().find(|s| s.id == updated.id) else {
            return Err(RosterError::NotFound {
                kind: "student",
                id: updated.id.clone(),
            });
        };
        *slot = updated.clone();
        let change = store::write(tx, KEY_STUDENTS, &students, guard)?;
        Ok(Applied {
            value: updated,
            changes: vec![change],
        })
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRemoval {
    pub student_id: String,
    pub attendance_removed: usize,
}

pub fn delete_student(conn: &Connection, id: &str, guard: &RevisionGuard) -> RosterResult<Applied<StudentRemoval>> {
    in_tx(conn, |tx| {
        let mut students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        let before = students.len();
        students.retain(|s| s.id != id);
        if students.len() == before {
            return Err(RosterError::NotFound {
                kind: "student",
                id: id.to_string(),
            });
        }
        let mut attendance: Vec<AttendanceRecord> = load(tx, KEY_ATTENDANCE)?;
        let att_before = attendance.len();
        attendance.retain(|a| a.student_id != id);
        let attendance_removed = att_before - attendance.len();

        let mut changes = vec![store::write(tx, KEY_STUDENTS, &students, guard)?];
        if attendance_removed > 0 {
            changes.push(store::write(tx, KEY_ATTENDANCE, &attendance, guard)?);
        }
        Ok(Applied {
            value: StudentRemoval {
                student_id: id.to_string(),
                attendance_removed,
            },
            changes,
        })
    })
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub batch: Option<String>,
    pub search: Option<String>,
}

pub fn filter_students<'a>(students: &'a [Student], filter: &StudentFilter) -> Vec<&'a Student> {
    let needle = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    students
        .iter()
        .filter(|s| filter.batch.as_deref().map_or(true, |b| s.batch == b))
        .filter(|s| {
            needle
                .as_deref()
                .map_or(true, |n| s.name.to_lowercase().contains(n))
        })
        .collect()
}

// ---- attendance ----

/// Records one status per student of `batch` on `date`. Students without an
/// explicit mark are recorded present. Earlier records for the same batch and
/// date, and any record sharing a `<date>-<studentId>` id, are replaced.
pub fn mark_attendance(
    conn: &Connection,
    batch: &str,
    date: &str,
    marks: &HashMap<String, AttendanceStatus>,
    guard: &RevisionGuard,
) -> RosterResult<Applied<Vec<AttendanceRecord>>> {
    let batch = required("batch", batch)?;
    let date = checked_day(date)?;
    in_tx(conn, |tx| {
        let batches: Vec<String> = load(tx, KEY_BATCHES)?;
        require_batch(&batches, &batch)?;
        let students: Vec<Student> = load(tx, KEY_STUDENTS)?;
        let members: Vec<&Student> = students.iter().filter(|s| s.batch == batch).collect();

        let member_ids: HashSet<&str> = members.iter().map(|s| s.id.as_str()).collect();
        let mut stray: Vec<&String> = marks.keys().filter(|k| !member_ids.contains(k.as_str())).collect();
        if !stray.is_empty() {
            stray.sort();
            return Err(RosterError::InvalidReference {
                kind: "student in batch",
                id: stray[0].clone(),
            });
        }

        let fresh: Vec<AttendanceRecord> = members
            .iter()
            .map(|s| AttendanceRecord {
                id: attendance_record_id(&date, &s.id),
                student_id: s.id.clone(),
                date: date.clone(),
                status: marks.get(&s.id).copied().unwrap_or(AttendanceStatus::Present),
                batch: batch.clone(),
            })
            .collect();
        let fresh_ids: HashSet<&str> = fresh.iter().map(|r| r.id.as_str()).collect();

        let mut attendance: Vec<AttendanceRecord> = load(tx, KEY_ATTENDANCE)?;
        attendance.retain(|r| !(r.date == date && r.batch == batch) && !fresh_ids.contains(r.id.as_str()));
        attendance.extend(fresh.iter().cloned());

        let change = store::write(tx, KEY_ATTENDANCE, &attendance, guard)?;
        tracing::info!(batch = %batch, date = %date, records = fresh.len(), "attendance marked");
        Ok(Applied {
            value: fresh,
            changes: vec![change],
        })
    })
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub student_id: Option<String>,
    pub batch: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// ISO day strings compare in calendar order, so range checks are string compares.
pub fn filter_attendance<'a>(records: &'a [AttendanceRecord], f: &AttendanceFilter) -> Vec<&'a AttendanceRecord> {
    let mut out: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| f.student_id.as_deref().map_or(true, |v| r.student_id == v))
        .filter(|r| f.batch.as_deref().map_or(true, |v| r.batch == v))
        .filter(|r| f.date.as_deref().map_or(true, |v| r.date == v))
        .filter(|r| f.from.as_deref().map_or(true, |v| r.date.as_str() >= v))
        .filter(|r| f.to.as_deref().map_or(true, |v| r.date.as_str() <= v))
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.student_id.cmp(&b.student_id)));
    out
}

// ---- trainings ----

#[derive(Debug, Clone, Default)]
pub struct TrainingInput {
    pub date: String,
    pub batch: String,
    pub topic: String,
    pub duration: i64,
    pub notes: String,
    pub file_link: String,
}

pub fn log_training(
    conn: &Connection,
    input: &TrainingInput,
    guard: &RevisionGuard,
) -> RosterResult<Applied<TrainingRecord>> {
    let date = checked_day(&input.date)?;
    let batch = required("batch", &input.batch)?;
    let topic = required("topic", &input.topic)?;
    let duration = u32::try_from(input.duration)
        .map_err(|_| RosterError::Invalid(format!("duration must be 0 or more hours, got {}", input.duration)))?;
    let record = TrainingRecord {
        id: Uuid::new_v4().to_string(),
        date,
        batch,
        topic,
        duration,
        notes: input.notes.trim().to_string(),
        file_link: input.file_link.trim().to_string(),
    };
    in_tx(conn, |tx| {
        let batches: Vec<String> = load(tx, KEY_BATCHES)?;
        require_batch(&batches, &record.batch)?;
        let mut trainings: Vec<TrainingRecord> = load(tx, KEY_TRAININGS)?;
        trainings.push(record.clone());
        let change = store::write(tx, KEY_TRAININGS, &trainings, guard)?;
        Ok(Applied {
            value: record,
            changes: vec![change],
        })
    })
}

pub fn delete_training(conn: &Connection, id: &str, guard: &RevisionGuard) -> RosterResult<Applied<String>> {
    in_tx(conn, |tx| {
        let mut trainings: Vec<TrainingRecord> = load(tx, KEY_TRAININGS)?;
        let before = trainings.len();
        trainings.retain(|t| t.id != id);
        if trainings.len() == before {
            return Err(RosterError::NotFound {
                kind: "training",
                id: id.to_string(),
            });
        }
        let change = store::write(tx, KEY_TRAININGS, &trainings, guard)?;
        Ok(Applied {
            value: id.to_string(),
            changes: vec![change],
        })
    })
}

pub fn filter_trainings<'a>(
    trainings: &'a [TrainingRecord],
    batch: Option<&str>,
    date: Option<&str>,
) -> Vec<&'a TrainingRecord> {
    let mut out: Vec<&TrainingRecord> = trainings
        .iter()
        .filter(|t| batch.map_or(true, |b| t.batch == b))
        .filter(|t| date.map_or(true, |d| t.date == d))
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn conn_with(batches: &[&str], students: &[(&str, &str)]) -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::ensure_schema(&conn).expect("schema");
        let g = RevisionGuard::none();
        for b in batches {
            create_batch(&conn, b, &g).expect("batch");
        }
        for (id, batch) in students {
            create_student(
                &conn,
                &StudentInput {
                    id: Some(id.to_string()),
                    name: format!("Student {}", id),
                    batch: batch.to_string(),
                    course: "BCA".into(),
                    contact: format!("{}@example.com", id),
                },
                &g,
            )
            .expect("student");
        }
        conn
    }

    #[test]
    fn remarking_same_batch_and_date_replaces_records() {
        let conn = conn_with(&["A", "B"], &[("1", "A"), ("2", "A"), ("3", "B")]);
        let g = RevisionGuard::none();
        mark_attendance(&conn, "B", "2024-03-01", &HashMap::new(), &g).expect("mark b");

        let mut marks = HashMap::new();
        marks.insert("2".to_string(), AttendanceStatus::Absent);
        mark_attendance(&conn, "A", "2024-03-01", &marks, &g).expect("mark 1");
        let count_after_first = snapshot(&conn).attendance.len();
        assert_eq!(count_after_first, 3);

        marks.insert("2".to_string(), AttendanceStatus::Late);
        let applied = mark_attendance(&conn, "A", "2024-03-01", &marks, &g).expect("mark 2");
        assert_eq!(applied.value.len(), 2);

        let snap = snapshot(&conn);
        assert_eq!(snap.attendance.len(), count_after_first);
        let r2 = snap
            .attendance
            .iter()
            .find(|r| r.student_id == "2")
            .expect("record for 2");
        assert_eq!(r2.status, AttendanceStatus::Late);
        assert_eq!(r2.id, "2024-03-01-2");
    }

    #[test]
    fn malformed_attendance_blob_blocks_marking_and_is_left_intact() {
        let conn = conn_with(&["A"], &[("1", "A")]);
        let blob = r#"[{"id":"2024-01-01-1","studentId":"1","date":"2024-01-01","status":"present","batch":"A"},
{"id":"2024-01-02-1","studentId":"1","date":"2024-01-02","status":"excused","batch":"A"},
{"id":"2024-01-03-1","studentId":"1","date":"2024-01-03","status":"late","batch":"A"}]"#;
        store::write_raw(&conn, KEY_ATTENDANCE, blob, &RevisionGuard::none()).expect("raw");

        let err = mark_attendance(&conn, "A", "2024-02-01", &HashMap::new(), &RevisionGuard::none())
            .expect_err("malformed collection");
        assert_eq!(err.code(), "corrupt_store");
        assert_eq!(err.details(), Some(json!({ "key": KEY_ATTENDANCE })));

        let (stored, revision) = store::read_raw(&conn, KEY_ATTENDANCE)
            .expect("read")
            .expect("present");
        assert_eq!(stored, blob);
        assert_eq!(revision, 1);

        let err = delete_student(&conn, "1", &RevisionGuard::none()).expect_err("cascade over malformed");
        assert_eq!(err.code(), "corrupt_store");
        assert_eq!(snapshot(&conn).students.len(), 1);
    }

    #[test]
    fn marks_for_students_outside_batch_are_rejected() {
        let conn = conn_with(&["A", "B"], &[("1", "A"), ("3", "B")]);
        let mut marks = HashMap::new();
        marks.insert("3".to_string(), AttendanceStatus::Absent);
        let err = mark_attendance(&conn, "A", "2024-03-01", &marks, &RevisionGuard::none())
            .expect_err("stray mark");
        assert_eq!(err.code(), "invalid_reference");
        assert!(snapshot(&conn).attendance.is_empty());

        let err = mark_attendance(&conn, "A", "yesterday", &HashMap::new(), &RevisionGuard::none())
            .expect_err("bad date");
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn moving_a_student_keeps_one_record_per_day() {
        let conn = conn_with(&["A", "B"], &[("1", "A")]);
        let g = RevisionGuard::none();
        mark_attendance(&conn, "A", "2024-03-01", &HashMap::new(), &g).expect("mark a");
        update_student(
            &conn,
            "1",
            &StudentInput {
                id: None,
                name: "Moved".into(),
                batch: "B".into(),
                course: "BCA".into(),
                contact: "x".into(),
            },
            &g,
        )
        .expect("move");
        mark_attendance(&conn, "B", "2024-03-01", &HashMap::new(), &g).expect("mark b");
        let snap = snapshot(&conn);
        assert_eq!(snap.attendance.len(), 1);
        assert_eq!(snap.attendance[0].batch, "B");
    }

    #[test]
    fn deleting_batch_cascades_to_its_students_only() {
        let conn = conn_with(&["A", "B"], &[("1", "A"), ("2", "A"), ("3", "B")]);
        let g = RevisionGuard::none();
        mark_attendance(&conn, "A", "2024-03-01", &HashMap::new(), &g).expect("mark a");
        mark_attendance(&conn, "B", "2024-03-01", &HashMap::new(), &g).expect("mark b");

        let applied = delete_batch(&conn, "A", &g).expect("delete");
        assert_eq!(applied.value.students_removed, 2);
        assert_eq!(applied.value.attendance_removed, 2);
        assert_eq!(applied.changes.len(), 3);

        let snap = snapshot(&conn);
        assert_eq!(snap.batches, vec!["B".to_string()]);
        assert_eq!(snap.students.len(), 1);
        assert_eq!(snap.students[0].id, "3");
        assert_eq!(snap.attendance.len(), 1);
        assert_eq!(snap.attendance[0].student_id, "3");

        let err = delete_batch(&conn, "A", &g).expect_err("gone");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn student_writes_enforce_uniqueness_and_batch_reference() {
        let conn = conn_with(&["A"], &[("1", "A")]);
        let g = RevisionGuard::none();
        let dup = StudentInput {
            id: Some("1".into()),
            name: "Dup".into(),
            batch: "A".into(),
            course: "BCA".into(),
            contact: "c".into(),
        };
        assert_eq!(create_student(&conn, &dup, &g).expect_err("dup").code(), "duplicate");

        let orphan = StudentInput {
            id: None,
            batch: "Nope".into(),
            ..dup.clone()
        };
        assert_eq!(
            create_student(&conn, &orphan, &g).expect_err("orphan").code(),
            "invalid_reference"
        );

        let blank = StudentInput {
            id: None,
            contact: "  ".into(),
            ..dup
        };
        assert_eq!(create_student(&conn, &blank, &g).expect_err("blank").code(), "bad_params");
        assert_eq!(snapshot(&conn).students.len(), 1);
    }

    #[test]
    fn deleting_student_removes_their_attendance() {
        let conn = conn_with(&["A"], &[("1", "A"), ("2", "A")]);
        let g = RevisionGuard::none();
        mark_attendance(&conn, "A", "2024-03-01", &HashMap::new(), &g).expect("mark");
        let applied = delete_student(&conn, "1", &g).expect("delete");
        assert_eq!(applied.value.attendance_removed, 1);
        let snap = snapshot(&conn);
        assert!(snap.attendance.iter().all(|r| r.student_id == "2"));
    }

    #[test]
    fn stale_guard_rolls_back_whole_operation() {
        let conn = conn_with(&["A"], &[("1", "A")]);
        let rev = store::revision(&conn, KEY_STUDENTS).expect("rev");
        let g = RevisionGuard::none().expect(KEY_STUDENTS, rev - 1);
        let err = delete_batch(&conn, "A", &g).expect_err("conflict");
        assert_eq!(err.code(), "revision_conflict");
        let snap = snapshot(&conn);
        assert_eq!(snap.batches, vec!["A".to_string()]);
        assert_eq!(snap.students.len(), 1);
    }

    #[test]
    fn training_duration_and_batch_are_checked() {
        let conn = conn_with(&["A"], &[]);
        let g = RevisionGuard::none();
        let mut input = TrainingInput {
            date: "2024-03-01".into(),
            batch: "A".into(),
            topic: "Ownership".into(),
            duration: -1,
            ..Default::default()
        };
        assert_eq!(log_training(&conn, &input, &g).expect_err("neg").code(), "bad_params");
        input.duration = 2;
        input.batch = "Z".into();
        assert_eq!(
            log_training(&conn, &input, &g).expect_err("batch").code(),
            "invalid_reference"
        );
        input.batch = "A".into();
        let t = log_training(&conn, &input, &g).expect("log").value;
        assert_eq!(t.duration, 2);
        delete_training(&conn, &t.id, &g).expect("delete");
        assert!(snapshot(&conn).trainings.is_empty());
    }

    #[test]
    fn reconcile_adds_batches_referenced_by_students() {
        let conn = Connection::open_in_memory().expect("open");
        db::ensure_schema(&conn).expect("schema");
        let g = RevisionGuard::none();
        store::write(&conn, KEY_BATCHES, &vec!["A"], &g).expect("batches");
        store::write(
            &conn,
            KEY_STUDENTS,
            &vec![Student {
                id: "1".into(),
                name: "N".into(),
                batch: "Legacy".into(),
                course: "C".into(),
                contact: "x".into(),
            }],
            &g,
        )
        .expect("students");
        let applied = reconcile_batches(&conn).expect("reconcile");
        assert_eq!(applied.value, vec!["Legacy".to_string()]);
        assert_eq!(snapshot(&conn).batches, vec!["A".to_string(), "Legacy".to_string()]);
        assert!(reconcile_batches(&conn).expect("again").changes.is_empty());
    }

    #[test]
    fn attendance_filter_range_is_inclusive() {
        let rec = |sid: &str, date: &str| AttendanceRecord {
            id: attendance_record_id(date, sid),
            student_id: sid.into(),
            date: date.into(),
            status: AttendanceStatus::Present,
            batch: "A".into(),
        };
        let records = vec![rec("1", "2024-03-03"), rec("1", "2024-03-01"), rec("2", "2024-03-02")];
        let f = AttendanceFilter {
            from: Some("2024-03-01".into()),
            to: Some("2024-03-02".into()),
            ..Default::default()
        };
        let dates: Vec<&str> = filter_attendance(&records, &f).iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02"]);
    }
}
