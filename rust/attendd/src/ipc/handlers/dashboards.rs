use crate::calc;
use crate::ipc::helpers::{day_param, db_conn, require_role, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_day, is_low_attendance, Role, StatusBand, TrainingRecord};
use crate::roster;
use crate::store;
use serde_json::json;

const RECENT_TRAININGS: usize = 5;
const CHART_DAYS: u32 = 30;

/// Reverses the given order, which callers sort by date (ties keep logging
/// order), and keeps at most `RECENT_TRAININGS`.
fn recent<'a>(trainings: impl DoubleEndedIterator<Item = &'a TrainingRecord>) -> Vec<&'a TrainingRecord> {
    trainings.rev().take(RECENT_TRAININGS).collect()
}

fn handle_dashboard_admin(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "view the admin dashboard")?;
        let conn = db_conn(state)?;
        let today = format_day(day_param(&req.params, "date")?);
        let snap = roster::snapshot(conn);
        let students = calc::student_rows(&snap.students, &snap.attendance);
        let batches = calc::all_batch_stats(&snap.batches, &snap.students, &snap.attendance);
        let low_attendance = students.iter().filter(|s| s.low_attendance).count();
        let cursor = store::head_seq(conn)?;

        Ok(json!({
            "date": today,
            "totalStudents": students.len(),
            "todayAttendanceRate": calc::day_attendance_rate(&snap.attendance, &today),
            "activeBatches": snap.batches.len(),
            "lowAttendanceCount": low_attendance,
            "bands": calc::band_counts(students.iter().map(|s| s.percentage)),
            "batches": batches,
            "students": students,
            "cursor": cursor,
        }))
    })
}

fn handle_dashboard_trainer(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_record_sessions, "view the trainer dashboard")?;
        let conn = db_conn(state)?;
        let today = format_day(day_param(&req.params, "date")?);
        let snap = roster::snapshot(conn);

        let marked = calc::batches_marked_on(&snap.attendance, &today);
        let todays_trainings = roster::filter_trainings(&snap.trainings, None, Some(&today));
        let sessions: Vec<serde_json::Value> = snap
            .batches
            .iter()
            .map(|b| {
                let logged: Vec<&TrainingRecord> = todays_trainings
                    .iter()
                    .copied()
                    .filter(|t| t.batch == *b)
                    .collect();
                json!({
                    "batch": b,
                    "studentCount": snap.students.iter().filter(|s| s.batch == *b).count(),
                    "attendanceMarked": marked.contains(b.as_str()),
                    "logged": !logged.is_empty(),
                    "topics": logged.iter().map(|t| t.topic.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let total_hours: u64 = todays_trainings.iter().map(|t| t.duration as u64).sum();

        Ok(json!({
            "date": today,
            "sessions": sessions,
            "todayTrainingCount": todays_trainings.len(),
            "todayTrainingHours": total_hours,
            "recentTrainings": recent(todays_trainings.iter().copied()),
        }))
    })
}

fn handle_dashboard_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        if state.session.role != Role::Student {
            return Err(HandlerErr::new(
                "no_session_student",
                "select the student role with a studentId first",
            ));
        }
        let today = day_param(&req.params, "date")?;
        let snap = roster::snapshot(conn);
        let Some(student) = state.session.current_student(&snap.students) else {
            return Err(HandlerErr::new("not_found", "session student no longer exists"));
        };

        let tally = calc::student_tally(&snap.attendance, &student.id);
        let percentage = tally.percentage();
        let band = StatusBand::from_percentage(percentage);
        let attended = calc::attended_trainings(&snap.trainings, &snap.attendance, &student.id);

        Ok(json!({
            "student": student,
            "daysRecorded": tally.total(),
            "tally": tally,
            "percentage": percentage,
            "status": band.label(),
            "performance": band.advice(),
            "lowAttendanceAlert": is_low_attendance(percentage),
            "trainingsCompleted": attended.len(),
            "recentTrainings": recent(attended.iter().copied()),
            "chart": calc::daily_series(&snap.attendance, &student.id, today, CHART_DAYS),
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.admin" => Some(handle_dashboard_admin(state, req)),
        "dashboard.trainer" => Some(handle_dashboard_trainer(state, req)),
        "dashboard.student" => Some(handle_dashboard_student(state, req)),
        _ => None,
    }
}
