use crate::calc;
use crate::ipc::helpers::{
    applied_json, db_conn, guard_param, optional_str, require_role, required_str, respond,
    scoped_student_id, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, Student};
use crate::roster::{self, StudentFilter, StudentInput};
use crate::store::{self, KEY_STUDENTS};
use serde_json::json;

fn student_input(params: &serde_json::Value) -> Result<StudentInput, HandlerErr> {
    Ok(StudentInput {
        id: optional_str(params, "studentId")?,
        name: required_str(params, "name")?,
        batch: required_str(params, "batch")?,
        course: required_str(params, "course")?,
        contact: required_str(params, "contact")?,
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let only = scoped_student_id(state, optional_str(&req.params, "studentId")?)?;
        let filter = StudentFilter {
            batch: optional_str(&req.params, "batch")?,
            search: optional_str(&req.params, "search")?,
        };
        let entry = store::read_entry(conn, KEY_STUDENTS, Vec::<Student>::new())?;
        let selected: Vec<Student> = roster::filter_students(&entry.value, &filter)
            .into_iter()
            .filter(|s| only.as_deref().map_or(true, |id| s.id == id))
            .cloned()
            .collect();
        let snap = roster::snapshot(conn);
        let rows = calc::student_rows(&selected, &snap.attendance);
        Ok(json!({ "students": rows, "revision": entry.revision }))
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "manage students")?;
        let conn = db_conn(state)?;
        let input = student_input(&req.params)?;
        let guard = guard_param(&req.params)?;
        applied_json("student", roster::create_student(conn, &input, &guard)?)
    })
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "manage students")?;
        let conn = db_conn(state)?;
        let student_id = required_str(&req.params, "studentId")?;
        let input = student_input(&req.params)?;
        let guard = guard_param(&req.params)?;
        applied_json(
            "student",
            roster::update_student(conn, &student_id, &input, &guard)?,
        )
    })
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "manage students")?;
        let conn = db_conn(state)?;
        let student_id = required_str(&req.params, "studentId")?;
        let guard = guard_param(&req.params)?;
        applied_json("removed", roster::delete_student(conn, &student_id, &guard)?)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
