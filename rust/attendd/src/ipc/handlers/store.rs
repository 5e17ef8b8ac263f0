use crate::ipc::helpers::{db_conn, optional_i64, require_role, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store::{self, RevisionGuard, DOMAIN_KEYS};
use serde_json::json;

fn handle_store_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let key = required_str(&req.params, "key")?;
        // Raw collections hold every student's records.
        if state.session.role == Role::Student && DOMAIN_KEYS.contains(&key.as_str()) {
            return Err(HandlerErr::new("forbidden", "students may not read raw collections")
                .with_details(json!({ "key": key })));
        }
        let Some((text, revision)) = store::read_raw(conn, &key)? else {
            return Ok(json!({ "key": key, "value": null, "revision": 0 }));
        };
        let value = serde_json::from_str::<serde_json::Value>(&text).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "stored value is malformed; returning null");
            serde_json::Value::Null
        });
        Ok(json!({ "key": key, "value": value, "revision": revision }))
    })
}

/// Generic write for preference-style keys. Collections go through the
/// record operations so their references stay checked.
fn handle_store_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_record_sessions, "write stored values")?;
        let conn = db_conn(state)?;
        let key = required_str(&req.params, "key")?;
        if key.trim().is_empty() {
            return Err(HandlerErr::bad_params("key must not be empty"));
        }
        if DOMAIN_KEYS.contains(&key.as_str()) {
            return Err(HandlerErr::bad_params(format!(
                "{} is written through its record methods",
                key
            ))
            .with_details(json!({ "key": key })));
        }
        let Some(value) = req.params.get("value") else {
            return Err(HandlerErr::bad_params("missing value"));
        };
        let guard = match optional_i64(&req.params, "expectedRevision")? {
            Some(rev) => RevisionGuard::none().expect(&key, rev),
            None => RevisionGuard::none(),
        };
        let change = store::write(conn, &key, value, &guard)?;
        Ok(json!({ "change": change }))
    })
}

fn handle_store_changes(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db_conn(state)?;
        let since = optional_i64(&req.params, "since")?.unwrap_or(0);
        let feed = store::changes_since(conn, since)?;
        Ok(json!(feed))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "store.get" => Some(handle_store_get(state, req)),
        "store.set" => Some(handle_store_set(state, req)),
        "store.changes" => Some(handle_store_changes(state, req)),
        _ => None,
    }
}
