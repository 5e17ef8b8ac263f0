use crate::calc;
use crate::ipc::helpers::{
    applied_json, day_param, db_conn, guard_param, optional_i64, optional_str, require_role,
    required_str, respond, scoped_student_id, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_day, parse_day, AttendanceRecord, AttendanceStatus, Role};
use crate::roster::{self, AttendanceFilter};
use crate::store::{self, KEY_ATTENDANCE};
use serde_json::json;
use std::collections::HashMap;

const DEFAULT_SERIES_DAYS: i64 = 30;
const MAX_SERIES_DAYS: i64 = 366;

fn parse_marks(params: &serde_json::Value) -> Result<HashMap<String, AttendanceStatus>, HandlerErr> {
    let mut out = HashMap::new();
    let Some(raw) = params.get("marks") else {
        return Ok(out);
    };
    if raw.is_null() {
        return Ok(out);
    }
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params("marks must be an object of studentId -> status"));
    };
    for (student_id, v) in obj {
        let status = v
            .as_str()
            .and_then(AttendanceStatus::parse)
            .ok_or_else(|| {
                HandlerErr::bad_params("status must be one of: present, absent, late")
                    .with_details(json!({ "studentId": student_id, "status": v }))
            })?;
        out.insert(student_id.clone(), status);
    }
    Ok(out)
}

fn optional_day(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match optional_str(params, key)? {
        None => Ok(None),
        Some(raw) => parse_day(&raw)
            .map(|d| Some(format_day(d)))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))),
    }
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let filter = AttendanceFilter {
            student_id: scoped_student_id(state, optional_str(&req.params, "studentId")?)?,
            batch: optional_str(&req.params, "batch")?,
            date: optional_day(&req.params, "date")?,
            from: optional_day(&req.params, "from")?,
            to: optional_day(&req.params, "to")?,
        };
        let entry = store::read_entry(conn, KEY_ATTENDANCE, Vec::<AttendanceRecord>::new())?;
        let records = roster::filter_attendance(&entry.value, &filter);
        Ok(json!({ "records": records, "revision": entry.revision }))
    })
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_record_sessions, "mark attendance")?;
        let conn = db_conn(state)?;
        let batch = required_str(&req.params, "batch")?;
        let date = format_day(day_param(&req.params, "date")?);
        let marks = parse_marks(&req.params)?;
        let guard = guard_param(&req.params)?;
        applied_json(
            "records",
            roster::mark_attendance(conn, &batch, &date, &marks, &guard)?,
        )
    })
}

fn handle_attendance_student_series(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let student_id = scoped_student_id(state, optional_str(&req.params, "studentId")?)?
            .ok_or_else(|| HandlerErr::bad_params("missing studentId"))?;
        let end = day_param(&req.params, "endDate")?;
        let days = optional_i64(&req.params, "days")?.unwrap_or(DEFAULT_SERIES_DAYS);
        if !(1..=MAX_SERIES_DAYS).contains(&days) {
            return Err(HandlerErr::bad_params(format!(
                "days must be between 1 and {}",
                MAX_SERIES_DAYS
            )));
        }
        let snap = roster::snapshot(conn);
        if !snap.students.iter().any(|s| s.id == student_id) {
            return Err(HandlerErr::new("not_found", "student not found")
                .with_details(json!({ "studentId": student_id })));
        }
        let points = calc::daily_series(&snap.attendance, &student_id, end, days as u32);
        Ok(json!({ "studentId": student_id, "points": points }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.studentSeries" => Some(handle_attendance_student_series(state, req)),
        _ => None,
    }
}
