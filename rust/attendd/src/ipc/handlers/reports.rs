use crate::ipc::helpers::{day_param, db_conn, optional_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::report::{self, ExportTarget};
use crate::roster;
use serde_json::json;
use std::path::PathBuf;

fn report_for(state: &AppState, req: &Request) -> Result<(report::BatchReport, chrono::NaiveDate), HandlerErr> {
    if state.session.role == Role::Student {
        return Err(HandlerErr::new("forbidden", "students may not view batch reports")
            .with_details(json!({ "role": state.session.role.as_str() })));
    }
    let conn = db_conn(state)?;
    let batch = optional_str(&req.params, "batch")?;
    let day = day_param(&req.params, "date")?;
    let snap = roster::snapshot(conn);
    if let Some(b) = batch.as_deref() {
        if !snap.batches.iter().any(|x| x == b) {
            return Err(HandlerErr::new("not_found", "batch not found").with_details(json!({ "batch": b })));
        }
    }
    Ok((
        report::build_report(&snap.students, &snap.attendance, batch.as_deref(), day),
        day,
    ))
}

fn handle_reports_batch_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let (model, _) = report_for(state, req)?;
        serde_json::to_value(model).map_err(|e| HandlerErr::new("internal", e.to_string()))
    })
}

fn handle_reports_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let target = match (
            optional_str(&req.params, "outPath")?,
            optional_str(&req.params, "outDir")?,
        ) {
            (Some(path), _) => ExportTarget::File(PathBuf::from(path)),
            (None, Some(dir)) => ExportTarget::Dir(PathBuf::from(dir)),
            (None, None) => return Err(HandlerErr::bad_params("missing outDir or outPath")),
        };
        let (model, day) = report_for(state, req)?;
        let path = report::write_csv(&model, &target, day).map_err(|e| {
            HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "target": format!("{:?}", target) }))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(json!({
            "path": path.to_string_lossy(),
            "fileName": file_name,
            "rowsExported": model.rows.len(),
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.batchReport" => Some(handle_reports_batch_report(state, req)),
        "reports.exportCsv" => Some(handle_reports_export_csv(state, req)),
        _ => None,
    }
}
