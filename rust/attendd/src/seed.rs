use crate::model::Student;
use crate::store::{self, Change, RevisionGuard, StoreError, DOMAIN_KEYS, KEY_ATTENDANCE, KEY_BATCHES, KEY_STUDENTS, KEY_TRAININGS};
use rusqlite::Connection;

const DEFAULT_BATCHES: [&str; 3] = ["BCA-Sem3", "Python-BatchA", "MCA-Sem1"];

const DEFAULT_STUDENTS: [(&str, &str, &str, &str, &str); 6] = [
    ("1", "John Doe", "BCA-Sem3", "BCA", "john@example.com"),
    ("2", "Jane Smith", "BCA-Sem3", "BCA", "jane@example.com"),
    ("3", "Mike Johnson", "Python-BatchA", "Python", "mike@example.com"),
    ("4", "Sarah Williams", "Python-BatchA", "Python", "sarah@example.com"),
    ("5", "Tom Brown", "MCA-Sem1", "MCA", "tom@example.com"),
    ("6", "Emily Davis", "MCA-Sem1", "MCA", "emily@example.com"),
];

/// Seeds each absent collection; keys that already exist are left alone.
/// Returns the changes made, empty when the workspace was already populated.
pub fn seed_defaults(conn: &Connection) -> Result<Vec<Change>, StoreError> {
    let mut missing = Vec::new();
    for key in DOMAIN_KEYS {
        if !store::contains(conn, key)? {
            missing.push(key);
        }
    }
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let guard = RevisionGuard::none();
    let tx = conn.unchecked_transaction()?;
    let mut changes = Vec::new();
    for key in missing {
        let change = match key {
            KEY_BATCHES => store::write(&tx, key, &DEFAULT_BATCHES, &guard)?,
            KEY_STUDENTS => {
                let students: Vec<Student> = DEFAULT_STUDENTS
                    .iter()
                    .map(|(id, name, batch, course, contact)| Student {
                        id: id.to_string(),
                        name: name.to_string(),
                        batch: batch.to_string(),
                        course: course.to_string(),
                        contact: contact.to_string(),
                    })
                    .collect();
                store::write(&tx, key, &students, &guard)?
            }
            KEY_ATTENDANCE | KEY_TRAININGS => store::write(&tx, key, &Vec::<()>::new(), &guard)?,
            _ => continue,
        };
        changes.push(change);
    }
    tx.commit()?;
    tracing::info!(keys = changes.len(), "seeded default records");
    Ok(changes)
}
