use crate::backup;
use crate::db;
use crate::ipc::helpers::{require_role, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::roster;
use crate::session::Session;
use serde_json::json;
use std::path::PathBuf;

fn workspace_path(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    req.params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "export workspace bundles")?;
        let out_path = required_str(&req.params, "outPath")?;
        let workspace = workspace_path(state, req)?;

        if let Some(conn) = state.db.as_ref() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
        }

        let export = backup::export_workspace_bundle(&workspace, &PathBuf::from(&out_path)).map_err(|e| {
            HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": out_path }))
        })?;
        tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace bundle exported");

        Ok(json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256,
        }))
    })
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        require_role(state, Role::can_manage_roster, "import workspace bundles")?;
        let in_path = PathBuf::from(required_str(&req.params, "inPath")?);
        let workspace = workspace_path(state, req)?;
        if !in_path.is_file() {
            return Err(HandlerErr::new("not_found", "bundle file not found")
                .with_details(json!({ "path": in_path.to_string_lossy() })));
        }

        // The open handle must be gone before the file is replaced. A failed
        // import reopens the workspace that was selected before, not the target.
        let previous = match state.db.take() {
            Some(_) => state.workspace.clone(),
            None => None,
        };
        let import = match backup::import_workspace_bundle(&in_path, &workspace) {
            Ok(v) => v,
            Err(e) => {
                if let Some(prev) = previous {
                    state.db = db::open_db(&prev).ok();
                }
                return Err(HandlerErr::new("io_failed", format!("{e:#}"))
                    .with_details(json!({ "path": in_path.to_string_lossy() })));
            }
        };

        let conn = db::open_db(&workspace).map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
        let reconciled = roster::reconcile_batches(&conn)?.value;
        tracing::info!(workspace = %workspace.display(), sha256 = %import.db_sha256, "workspace bundle imported");
        state.workspace = Some(workspace.clone());
        state.db = Some(conn);
        state.session = Session::default();

        Ok(json!({
            "workspacePath": workspace.to_string_lossy(),
            "bundleFormat": import.bundle_format,
            "dbSha256": import.db_sha256,
            "reconciledBatches": reconciled,
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        _ => None,
    }
}
