use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::error;

use super::core::select_workspace;

fn handle_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "path": out_path.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "bundleFiles": summary.bundle_files,
                "dbSha256": summary.db_sha256
            }),
        ),
        Err(e) => err(&req.id, "backup_failed", format!("{e:#}"), None),
    }
}

fn handle_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let workspace_path = match req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
    {
        Some(v) => PathBuf::from(v.trim()),
        None => match state.workspace.clone() {
            Some(p) => p,
            None => return err(&req.id, "bad_params", "missing workspacePath", None),
        },
    };

    let staged = match backup::stage_import(&in_path, &workspace_path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "backup_failed", format!("{e:#}"), None),
    };

    // Release the open handle before the database file is replaced.
    let reopen = if state.workspace.as_deref() == Some(workspace_path.as_path()) {
        state.db = None;
        true
    } else {
        false
    };

    let import = match staged.commit() {
        Ok(v) => v,
        Err(e) => {
            if reopen {
                if let Err(reopen_err) = select_workspace(state, workspace_path.clone()) {
                    error!(
                        workspace = %workspace_path.to_string_lossy(),
                        "workspace could not be reopened after failed import: {reopen_err:#}"
                    );
                }
            }
            return err(&req.id, "backup_failed", format!("{e:#}"), None);
        }
    };

    match select_workspace(state, workspace_path.clone()) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": workspace_path.to_string_lossy(),
                "bundleFormatDetected": import.bundle_format_detected
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_workspace_bundle(state, req)),
        _ => None,
    }
}
