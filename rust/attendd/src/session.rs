use crate::model::{Role, Student};
use serde::Serialize;

/// Who is driving the connected view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: Role,
    pub student_id: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            role: Role::Admin,
            student_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    StudentRequired,
    UnknownStudent(String),
}

impl Session {
    /// Builds a session, checking that a student session names a known student.
    /// Non-student roles drop any student id.
    pub fn select(role: Role, student_id: Option<&str>, students: &[Student]) -> Result<Self, SessionError> {
        if role != Role::Student {
            return Ok(Self {
                role,
                student_id: None,
            });
        }
        let Some(id) = student_id.map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(SessionError::StudentRequired);
        };
        if !students.iter().any(|s| s.id == id) {
            return Err(SessionError::UnknownStudent(id.to_string()));
        }
        Ok(Self {
            role,
            student_id: Some(id.to_string()),
        })
    }

    /// The session student, if it still exists.
    pub fn current_student<'a>(&self, students: &'a [Student]) -> Option<&'a Student> {
        let id = self.student_id.as_deref()?;
        students.iter().find(|s| s.id == id)
    }
}
