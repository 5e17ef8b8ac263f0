use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub batch: String,
    pub course: String,
    pub contact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Present and late both count toward the attendance percentage.
    pub fn is_attended(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub batch: String,
}

pub fn attendance_record_id(date: &str, student_id: &str) -> String {
    format!("{}-{}", date, student_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    pub id: String,
    pub date: String,
    pub batch: String,
    pub topic: String,
    pub duration: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub file_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trainer,
    Student,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "trainer" => Some(Role::Trainer),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trainer => "trainer",
            Role::Student => "student",
        }
    }

    pub fn can_manage_roster(self) -> bool {
        self == Role::Admin
    }

    pub fn can_record_sessions(self) -> bool {
        matches!(self, Role::Admin | Role::Trainer)
    }
}

pub const EXCELLENT_THRESHOLD: u32 = 85;
pub const GOOD_THRESHOLD: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusBand {
    Excellent,
    Good,
    Low,
}

impl StatusBand {
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            StatusBand::Excellent
        } else if percentage >= GOOD_THRESHOLD {
            StatusBand::Good
        } else {
            StatusBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusBand::Excellent => "Excellent",
            StatusBand::Good => "Good",
            StatusBand::Low => "Low",
        }
    }

    /// Wording for the student's own dashboard.
    pub fn advice(self) -> &'static str {
        match self {
            StatusBand::Excellent => "Excellent",
            StatusBand::Good => "Good",
            StatusBand::Low => "Needs Improvement",
        }
    }
}

pub fn is_low_attendance(percentage: u32) -> bool {
    percentage < GOOD_THRESHOLD
}

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Parses an ISO calendar day (`YYYY-MM-DD`) with a four-digit positive year.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| (MIN_YEAR..=MAX_YEAR).contains(&d.year()))
}

pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
