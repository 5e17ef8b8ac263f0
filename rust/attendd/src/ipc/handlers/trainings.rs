use crate::ipc::helpers::{
    applied_json, day_param, db_conn, guard_param, optional_i64, optional_str, require_role,
    required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_day, Role, TrainingRecord};
use crate::roster::{self, TrainingInput};
use crate::store::{self, KEY_TRAININGS};
use serde_json::json;

const DEFAULT_DURATION_HOURS: i64 = 1;

fn handle_trainings_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let batch = optional_str(&req.params, "batch")?;
        let date = match optional_str(&req.params, "date")? {
            Some(_) => Some(format_day(day_param(&req.params, "date")?)),
            None => None,
        };
        let entry = store::read_entry(conn, KEY_TRAININGS, Vec::<TrainingRecord>::new())?;
        let trainings = roster::filter_trainings(&entry.value, batch.as_deref(), date.as_deref());
        Ok(json!({ "trainings": trainings, "revision": entry.revision }))
    })
}

fn handle_trainings_log(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_record_sessions, "log training sessions")?;
        let conn = db_conn(state)?;
        let input = TrainingInput {
            date: format_day(day_param(&req.params, "date")?),
            batch: required_str(&req.params, "batch")?,
            topic: required_str(&req.params, "topic")?,
            duration: optional_i64(&req.params, "duration")?.unwrap_or(DEFAULT_DURATION_HOURS),
            notes: optional_str(&req.params, "notes")?.unwrap_or_default(),
            file_link: optional_str(&req.params, "fileLink")?.unwrap_or_default(),
        };
        let guard = guard_param(&req.params)?;
        applied_json("training", roster::log_training(conn, &input, &guard)?)
    })
}

fn handle_trainings_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_record_sessions, "delete training sessions")?;
        let conn = db_conn(state)?;
        let training_id = required_str(&req.params, "trainingId")?;
        let guard = guard_param(&req.params)?;
        applied_json("trainingId", roster::delete_training(conn, &training_id, &guard)?)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "trainings.list" => Some(handle_trainings_list(state, req)),
        "trainings.log" => Some(handle_trainings_log(state, req)),
        "trainings.delete" => Some(handle_trainings_delete(state, req)),
        _ => None,
    }
}
