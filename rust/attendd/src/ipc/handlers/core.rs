use crate::db;
use crate::ipc::helpers::{db_conn, optional_str, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::roster;
use crate::seed;
use crate::session::{Session, SessionError};
use crate::store::{self, RevisionGuard, KEY_DARK_MODE, KEY_STUDENTS};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let schema_version = match state.db.as_ref() {
            Some(conn) => Some(db::schema_version(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?),
            None => None,
        };
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "schemaVersion": schema_version,
        }))
    })
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let path = PathBuf::from(required_str(&req.params, "path")?);
        let seed_requested = req
            .params
            .get("seed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let conn = db::open_db(&path).map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;

        let seeded = if seed_requested && state.config.seed_defaults {
            !seed::seed_defaults(&conn)?.is_empty()
        } else {
            false
        };
        let reconciled = roster::reconcile_batches(&conn)?.value;
        let cursor = store::head_seq(&conn)?;

        tracing::info!(workspace = %path.display(), seeded, "workspace opened");
        state.workspace = Some(path.clone());
        state.db = Some(conn);
        state.session = Session::default();

        Ok(json!({
            "workspacePath": path.to_string_lossy(),
            "seeded": seeded,
            "reconciledBatches": reconciled,
            "cursor": cursor,
        }))
    })
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || Ok(json!(state.session)))
}

fn handle_session_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let raw_role = required_str(&req.params, "role")?;
        let role = Role::parse(&raw_role).ok_or_else(|| {
            HandlerErr::bad_params("role must be one of: admin, trainer, student")
                .with_details(json!({ "role": raw_role }))
        })?;
        let student_id = optional_str(&req.params, "studentId")?;

        let students = match state.db.as_ref() {
            Some(conn) => store::read(conn, KEY_STUDENTS, Vec::new()),
            None if role == Role::Student => return Err(HandlerErr::new("no_workspace", "select a workspace first")),
            None => Vec::new(),
        };
        let session = Session::select(role, student_id.as_deref(), &students).map_err(|e| match e {
            SessionError::StudentRequired => HandlerErr::bad_params("student role requires studentId"),
            SessionError::UnknownStudent(id) => {
                HandlerErr::new("not_found", "student not found").with_details(json!({ "studentId": id }))
            }
        })?;
        state.session = session;
        Ok(json!(state.session))
    })
}

fn handle_prefs_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let dark: bool = store::read(conn, KEY_DARK_MODE, false);
        Ok(json!({ "darkMode": dark }))
    })
}

fn handle_prefs_set_dark_mode(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let dark = req
            .params
            .get("darkMode")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| HandlerErr::bad_params("darkMode must be a boolean"))?;
        let change = store::write(conn, KEY_DARK_MODE, &dark, &RevisionGuard::none())?;
        Ok(json!({ "darkMode": dark, "changes": [change] }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "session.set" => Some(handle_session_set(state, req)),
        "prefs.get" => Some(handle_prefs_get(state, req)),
        "prefs.setDarkMode" => Some(handle_prefs_set_dark_mode(state, req)),
        _ => None,
    }
}
