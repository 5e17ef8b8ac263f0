use crate::model::{
    format_day, is_low_attendance, AttendanceRecord, AttendanceStatus, StatusBand, Student,
    TrainingRecord,
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Round-half-up integer percentage, matching `Math.round(100 * num / denom)`
/// for non-negative inputs.
pub fn rounded_percent(num: usize, denom: usize) -> u32 {
    if denom == 0 {
        return 0;
    }
    ((200 * num + denom) / (2 * denom)) as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

impl Tally {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.late + self.absent
    }

    pub fn attended(&self) -> usize {
        self.present + self.late
    }

    /// A student with no records counts as fully present.
    pub fn percentage(&self) -> u32 {
        if self.total() == 0 {
            return 100;
        }
        rounded_percent(self.attended(), self.total())
    }
}

/// Per-student tallies in one pass over the records.
pub fn tally_by_student(records: &[AttendanceRecord]) -> HashMap<&str, Tally> {
    let mut out: HashMap<&str, Tally> = HashMap::new();
    for r in records {
        out.entry(r.student_id.as_str()).or_default().add(r.status);
    }
    out
}

pub fn student_tally(records: &[AttendanceRecord], student_id: &str) -> Tally {
    let mut t = Tally::default();
    for r in records.iter().filter(|r| r.student_id == student_id) {
        t.add(r.status);
    }
    t
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub student_id: String,
    pub name: String,
    pub batch: String,
    pub course: String,
    pub contact: String,
    pub days_recorded: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub percentage: u32,
    pub status: &'static str,
    pub low_attendance: bool,
}

pub fn student_rows(students: &[Student], records: &[AttendanceRecord]) -> Vec<StudentAttendance> {
    let tallies = tally_by_student(records);
    students
        .iter()
        .map(|s| {
            let t = tallies.get(s.id.as_str()).copied().unwrap_or_default();
            let percentage = t.percentage();
            StudentAttendance {
                student_id: s.id.clone(),
                name: s.name.clone(),
                batch: s.batch.clone(),
                course: s.course.clone(),
                contact: s.contact.clone(),
                days_recorded: t.total(),
                present: t.present,
                late: t.late,
                absent: t.absent,
                percentage,
                status: StatusBand::from_percentage(percentage).label(),
                low_attendance: is_low_attendance(percentage),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub name: String,
    pub total_students: usize,
    pub avg_attendance: u32,
    pub status: &'static str,
}

/// Mean of per-student percentages for the batch; an empty batch averages 0.
fn batch_stats(students: &[Student], tallies: &HashMap<&str, Tally>, batch: &str) -> BatchStats {
    let pcts: Vec<u32> = students
        .iter()
        .filter(|s| s.batch == batch)
        .map(|s| {
            tallies
                .get(s.id.as_str())
                .copied()
                .unwrap_or_default()
                .percentage()
        })
        .collect();
    let sum: usize = pcts.iter().map(|p| *p as usize).sum();
    let avg = rounded_percent(sum, pcts.len() * 100);
    BatchStats {
        name: batch.to_string(),
        total_students: pcts.len(),
        avg_attendance: avg,
        status: StatusBand::from_percentage(avg).label(),
    }
}

pub fn all_batch_stats(
    batches: &[String],
    students: &[Student],
    records: &[AttendanceRecord],
) -> Vec<BatchStats> {
    let tallies = tally_by_student(records);
    batches
        .iter()
        .map(|b| batch_stats(students, &tallies, b))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandCounts {
    pub excellent: usize,
    pub good: usize,
    pub low: usize,
}

pub fn band_counts(percentages: impl IntoIterator<Item = u32>) -> BandCounts {
    let mut c = BandCounts::default();
    for p in percentages {
        match StatusBand::from_percentage(p) {
            StatusBand::Excellent => c.excellent += 1,
            StatusBand::Good => c.good += 1,
            StatusBand::Low => c.low += 1,
        }
    }
    c
}

/// Attended records over all records marked on `date`; 0 when nothing was marked.
pub fn day_attendance_rate(records: &[AttendanceRecord], date: &str) -> u32 {
    let mut t = Tally::default();
    for r in records.iter().filter(|r| r.date == date) {
        t.add(r.status);
    }
    rounded_percent(t.attended(), t.total())
}

/// Batches that have at least one record on `date`.
pub fn batches_marked_on<'a>(records: &'a [AttendanceRecord], date: &str) -> BTreeSet<&'a str> {
    records
        .iter()
        .filter(|r| r.date == date)
        .map(|r| r.batch.as_str())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPoint {
    pub date: String,
    pub present: u8,
    pub absent: u8,
}

/// One point per day for the `days` days ending at `end` (inclusive).
pub fn daily_series(
    records: &[AttendanceRecord],
    student_id: &str,
    end: NaiveDate,
    days: u32,
) -> Vec<DayPoint> {
    let by_date: HashMap<&str, AttendanceStatus> = records
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| (r.date.as_str(), r.status))
        .collect();

    // Days before the calendar's lower bound are dropped rather than wrapped.
    (0..days as i64)
        .rev()
        .filter_map(|offset| end.checked_sub_signed(Duration::days(offset)))
        .map(|d| {
            let day = format_day(d);
            let status = by_date.get(day.as_str()).copied();
            DayPoint {
                present: u8::from(status.map(|s| s.is_attended()).unwrap_or(false)),
                absent: u8::from(status == Some(AttendanceStatus::Absent)),
                date: day,
            }
        })
        .collect()
}

/// Training logs the student sat in: same date and batch as one of their
/// present or late records. Ordered by date.
pub fn attended_trainings<'a>(
    trainings: &'a [TrainingRecord],
    records: &[AttendanceRecord],
    student_id: &str,
) -> Vec<&'a TrainingRecord> {
    let attended: BTreeSet<(&str, &str)> = records
        .iter()
        .filter(|r| r.student_id == student_id && r.status.is_attended())
        .map(|r| (r.date.as_str(), r.batch.as_str()))
        .collect();
    let mut out: Vec<&TrainingRecord> = trainings
        .iter()
        .filter(|t| attended.contains(&(t.date.as_str(), t.batch.as_str())))
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance_record_id;

    fn student(id: &str, batch: &str) -> Student {
        Student {
            id: id.into(),
            name: format!("Student {}", id),
            batch: batch.into(),
            course: "BCA".into(),
            contact: format!("{}@example.com", id),
        }
    }

    fn rec(student_id: &str, date: &str, status: AttendanceStatus, batch: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: attendance_record_id(date, student_id),
            student_id: student_id.into(),
            date: date.into(),
            status,
            batch: batch.into(),
        }
    }

    #[test]
    fn student_without_records_is_fully_present() {
        assert_eq!(student_tally(&[], "1").percentage(), 100);
        let other = vec![rec("2", "2024-01-01", AttendanceStatus::Absent, "A")];
        assert_eq!(student_tally(&other, "1").percentage(), 100);
    }

    #[test]
    fn late_counts_as_attended_and_rounds_to_nearest() {
        let records = vec![
            rec("1", "2024-01-01", AttendanceStatus::Present, "A"),
            rec("1", "2024-01-02", AttendanceStatus::Late, "A"),
            rec("1", "2024-01-03", AttendanceStatus::Absent, "A"),
        ];
        assert_eq!(student_tally(&records, "1").percentage(), 67);

        let one_of_three = vec![
            rec("2", "2024-01-01", AttendanceStatus::Present, "A"),
            rec("2", "2024-01-02", AttendanceStatus::Absent, "A"),
            rec("2", "2024-01-03", AttendanceStatus::Absent, "A"),
        ];
        assert_eq!(student_tally(&one_of_three, "2").percentage(), 33);
    }

    #[test]
    fn rounding_goes_half_up() {
        assert_eq!(rounded_percent(1, 8), 13); // 12.5
        assert_eq!(rounded_percent(5, 8), 63); // 62.5
        assert_eq!(rounded_percent(0, 0), 0);
    }

    #[test]
    fn batch_average_is_mean_of_student_percentages() {
        let students = vec![student("1", "A"), student("2", "A"), student("3", "B")];
        let records = vec![
            rec("1", "2024-01-01", AttendanceStatus::Present, "A"),
            rec("1", "2024-01-02", AttendanceStatus::Absent, "A"),
            rec("3", "2024-01-01", AttendanceStatus::Absent, "B"),
        ];
        // student 1: 50, student 2: 100 (no records) -> 75
        let stats = all_batch_stats(
            &["A".to_string(), "B".to_string(), "C".to_string()],
            &students,
            &records,
        );
        let a = &stats[0];
        assert_eq!(a.total_students, 2);
        assert_eq!(a.avg_attendance, 75);
        assert_eq!(a.status, "Good");

        let b = &stats[1];
        assert_eq!(b.avg_attendance, 0);
        assert_eq!(b.status, "Low");

        let empty = &stats[2];
        assert_eq!(empty.total_students, 0);
        assert_eq!(empty.avg_attendance, 0);
    }

    #[test]
    fn band_counts_split_on_thresholds() {
        let c = band_counts([85, 84, 70, 69, 100]);
        assert_eq!(
            c,
            BandCounts {
                excellent: 2,
                good: 2,
                low: 1
            }
        );
    }

    #[test]
    fn day_rate_only_counts_that_day() {
        let records = vec![
            rec("1", "2024-01-01", AttendanceStatus::Present, "A"),
            rec("2", "2024-01-01", AttendanceStatus::Absent, "A"),
            rec("3", "2024-01-01", AttendanceStatus::Late, "B"),
            rec("1", "2024-01-02", AttendanceStatus::Absent, "A"),
        ];
        assert_eq!(day_attendance_rate(&records, "2024-01-01"), 67);
        assert_eq!(day_attendance_rate(&records, "2024-01-03"), 0);
        let marked: Vec<&str> = batches_marked_on(&records, "2024-01-01").into_iter().collect();
        assert_eq!(marked, vec!["A", "B"]);
    }

    #[test]
    fn daily_series_covers_window_oldest_first() {
        let records = vec![
            rec("1", "2024-03-01", AttendanceStatus::Late, "A"),
            rec("1", "2024-03-03", AttendanceStatus::Absent, "A"),
        ];
        let end = NaiveDate::from_ymd_opt(2024, 3, 3).expect("date");
        let s = daily_series(&records, "1", end, 30);
        assert_eq!(s.len(), 30);
        assert_eq!(s[0].date, "2024-02-03");
        assert_eq!(s[27].date, "2024-03-01");
        assert_eq!((s[27].present, s[27].absent), (1, 0));
        assert_eq!((s[28].present, s[28].absent), (0, 0));
        assert_eq!((s[29].present, s[29].absent), (0, 1));
    }

    #[test]
    fn daily_series_stops_at_calendar_start() {
        let end = NaiveDate::MIN + Duration::days(2);
        let s = daily_series(&[], "1", end, 30);
        assert_eq!(s.len(), 3);
        assert_eq!(s[2].date, format_day(end));
    }

    #[test]
    fn attended_trainings_match_date_and_batch() {
        let t = |id: &str, date: &str, batch: &str| TrainingRecord {
            id: id.into(),
            date: date.into(),
            batch: batch.into(),
            topic: format!("topic {}", id),
            duration: 1,
            notes: String::new(),
            file_link: String::new(),
        };
        let trainings = vec![
            t("t1", "2024-01-02", "A"),
            t("t2", "2024-01-01", "A"),
            t("t3", "2024-01-01", "B"),
            t("t4", "2024-01-03", "A"),
        ];
        let records = vec![
            rec("1", "2024-01-01", AttendanceStatus::Present, "A"),
            rec("1", "2024-01-02", AttendanceStatus::Late, "A"),
            rec("1", "2024-01-03", AttendanceStatus::Absent, "A"),
        ];
        let ids: Vec<&str> = attended_trainings(&trainings, &records, "1")
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }
}
