use crate::calc::{self, BandCounts};
use crate::model::{format_day, AttendanceRecord, Student};
use anyhow::Context;
use chrono::NaiveDate;
use csv::Writer;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 5] = ["Name", "Batch", "Course", "Attendance %", "Status"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student_id: String,
    pub name: String,
    pub batch: String,
    pub course: String,
    pub percentage: u32,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub as_of: String,
    pub batch: Option<String>,
    pub summary: BandCounts,
    pub rows: Vec<ReportRow>,
}

pub fn build_report(
    students: &[Student],
    records: &[AttendanceRecord],
    batch: Option<&str>,
    as_of: NaiveDate,
) -> BatchReport {
    let selected: Vec<Student> = students
        .iter()
        .filter(|s| batch.map_or(true, |b| s.batch == b))
        .cloned()
        .collect();
    let rows: Vec<ReportRow> = calc::student_rows(&selected, records)
        .into_iter()
        .map(|r| ReportRow {
            student_id: r.student_id,
            name: r.name,
            batch: r.batch,
            course: r.course,
            percentage: r.percentage,
            status: r.status,
        })
        .collect();
    BatchReport {
        as_of: format_day(as_of),
        batch: batch.map(str::to_string),
        summary: calc::band_counts(rows.iter().map(|r| r.percentage)),
        rows,
    }
}

pub fn render_csv(report: &BatchReport) -> anyhow::Result<String> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for row in &report.rows {
        let pct = format!("{}%", row.percentage);
        wtr.write_record([
            row.name.as_str(),
            row.batch.as_str(),
            row.course.as_str(),
            pct.as_str(),
            row.status,
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush csv writer")?;
    Ok(String::from_utf8(data)?)
}

pub fn export_file_name(day: NaiveDate) -> String {
    format!("batch-report-{}.csv", format_day(day))
}

#[derive(Debug, Clone)]
pub enum ExportTarget {
    Dir(PathBuf),
    File(PathBuf),
}

pub fn write_csv(report: &BatchReport, target: &ExportTarget, day: NaiveDate) -> anyhow::Result<PathBuf> {
    let out = match target {
        ExportTarget::Dir(dir) => dir.join(export_file_name(day)),
        ExportTarget::File(path) => path.clone(),
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let text = render_csv(report)?;
    write_file(&out, &text)?;
    tracing::info!(path = %out.display(), rows = report.rows.len(), "report exported");
    Ok(out)
}

fn write_file(path: &Path, text: &str) -> anyhow::Result<()> {
    std::fs::write(path, text)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))
}
