mod backup;
mod calc;
mod config;
mod db;
mod error;
mod export;
mod ipc;
mod logging;
mod model;
mod roster;
mod status;
mod store;

use std::io::{self, BufRead, Write};
use tracing::{error, info};

fn main() {
    let config = config::Config::from_env();
    logging::init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "attendanced starting");

    let mut state = ipc::AppState::default();
    if let Some(path) = config.workspace.clone() {
        if let Err(e) = ipc::select_workspace(&mut state, path.clone()) {
            error!(workspace = %path.to_string_lossy(), "startup workspace could not be opened: {e:#}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; answer with a bare error line.
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, shutting down");
}
