use crate::calc;
use crate::ipc::helpers::{applied_json, db_conn, guard_param, require_role, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::roster;
use crate::store::{self, KEY_BATCHES};
use serde_json::json;

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let batches = store::read_entry(conn, KEY_BATCHES, Vec::<String>::new())?;
        let snap = roster::snapshot(conn);
        let stats = calc::all_batch_stats(&batches.value, &snap.students, &snap.attendance);
        Ok(json!({ "batches": stats, "revision": batches.revision }))
    })
}

fn handle_batches_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "manage batches")?;
        let conn = db_conn(state)?;
        let name = required_str(&req.params, "name")?;
        let guard = guard_param(&req.params)?;
        let applied = roster::create_batch(conn, &name, &guard)?;
        applied_json("name", applied)
    })
}

fn handle_batches_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "manage batches")?;
        let conn = db_conn(state)?;
        let name = required_str(&req.params, "name")?;
        let guard = guard_param(&req.params)?;
        let applied = roster::delete_batch(conn, &name, &guard)?;
        applied_json("removed", applied)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batches.list" => Some(handle_batches_list(state, req)),
        "batches.create" => Some(handle_batches_create(state, req)),
        "batches.delete" => Some(handle_batches_delete(state, req)),
        _ => None,
    }
}
