use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_day, Role};
use crate::roster::{Applied, RosterError};
use crate::store::{RevisionGuard, StoreError};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        RosterError::Store(e).into()
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

/// Runs a handler body and wraps its outcome in the response envelope.
pub fn respond(req: &Request, f: impl FnOnce() -> HandlerResult) -> serde_json::Value {
    match f() {
        Ok(result) => crate::ipc::error::ok(&req.id, result),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

/// `params[key]` as an ISO day, or today when absent.
pub fn day_param(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    match optional_str(params, key)? {
        None => Ok(chrono::Local::now().date_naive()),
        Some(raw) => parse_day(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))),
    }
}

pub fn guard_param(params: &serde_json::Value) -> Result<RevisionGuard, HandlerErr> {
    RevisionGuard::from_json(params.get("expectedRevisions")).map_err(HandlerErr::bad_params)
}

pub fn require_role(state: &AppState, allowed: fn(Role) -> bool, action: &str) -> Result<(), HandlerErr> {
    let role = state.session.role;
    if allowed(role) {
        return Ok(());
    }
    Err(HandlerErr::new(
        "forbidden",
        format!("role {} may not {}", role.as_str(), action),
    )
    .with_details(json!({ "role": role.as_str() })))
}

/// Students only ever see their own records; other roles get `requested` as is.
pub fn scoped_student_id(state: &AppState, requested: Option<String>) -> Result<Option<String>, HandlerErr> {
    if state.session.role != Role::Student {
        return Ok(requested);
    }
    let own = state.session.student_id.clone();
    match requested {
        Some(id) if Some(&id) != own.as_ref() => Err(HandlerErr::new(
            "forbidden",
            "students may only view their own records",
        )
        .with_details(json!({ "studentId": id }))),
        _ => Ok(own),
    }
}

/// Serializes an applied mutation as `{<field>: value, changes: [...]}`.
pub fn applied_json<T: serde::Serialize>(field: &str, applied: Applied<T>) -> HandlerResult {
    let value = serde_json::to_value(&applied.value)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    let changes = serde_json::to_value(&applied.changes)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    let mut out = serde_json::Map::new();
    out.insert(field.to_string(), value);
    out.insert("changes".to_string(), changes);
    Ok(serde_json::Value::Object(out))
}
