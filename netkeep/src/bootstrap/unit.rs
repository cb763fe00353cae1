//! Service unit for the watchdog.
//!
//! The unit file is rendered from [`BootstrapOptions`] and written only when its content
//! differs. Drop-in overrides under `<unit>.d/` belong to the administrator: they are
//! reported, never removed.

use std::{
    io,
    path::{Path, PathBuf},
};

use netkeep_sys::command::{self, Runner};

use super::{write_if_changed, Outcome, Summary, Written};
use crate::{options::BootstrapOptions, LOG_SOURCE};

/// Default service manager control binary.
pub const SYSTEMCTL: &str = "systemctl";

/// Seconds systemd waits before restarting the watchdog.
pub const RESTART_SEC: u64 = 5;

/// Renders the unit file starting `exec_path`.
pub fn render(exec_path: &Path) -> String {
    format!(
        "\
[Unit]
Description=netkeep root qdisc and congestion control watchdog
Wants=network-online.target
After=network-online.target

[Service]
Type=simple
ExecStart={exec}
Restart=always
RestartSec={RESTART_SEC}
StandardOutput=journal
StandardError=journal
SyslogIdentifier={LOG_SOURCE}

[Install]
WantedBy=multi-user.target
",
        exec = exec_path.display(),
    )
}

/// Lists the `*.conf` drop-ins in `<unit_dir>/<unit_name>.d/`, sorted by name. A missing
/// directory means no drop-ins.
pub fn drop_ins(unit_dir: &Path, unit_name: &str) -> io::Result<Vec<PathBuf>> {
    let dir = unit_dir.join(format!("{unit_name}.d"));
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "conf") {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Installs the unit, flags drop-ins and makes sure the service is enabled and running.
pub async fn apply(runner: &Runner, options: &BootstrapOptions) -> Summary {
    let mut summary = Summary::default();
    let path = options.unit_path();

    if !options.exec_path.exists() {
        let exec = options.exec_path.display();
        tracing::warn!(%exec, "watchdog binary not installed, the service will fail to start");
    }

    let written = match write_if_changed(&path, &render(&options.exec_path)).await {
        Ok(written) => {
            tracing::info!(path = %path.display(), ?written, "service unit");
            summary.record(written.into());
            written
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to write service unit");
            summary.record(Outcome::Failed);
            return summary;
        }
    };

    match drop_ins(&options.unit_dir, &options.unit_name) {
        Ok(found) => {
            for drop_in in found {
                let path = drop_in.display();
                tracing::warn!(%path, "drop-in override present, left in place");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to list drop-in overrides"),
    }

    let unit = options.unit_name.as_str();
    let commands = match written {
        Written::Changed => {
            vec![vec!["daemon-reload"], vec!["enable", unit], vec!["restart", unit]]
        }
        Written::Unchanged => vec![vec!["enable", "--now", unit]],
    };

    for args in &commands {
        match runner.run(&options.tools.systemctl, args).await {
            Ok(_) => {
                tracing::debug!(?args, "systemctl succeeded");
                summary.record(Outcome::Applied);
            }
            Err(e) if e.is_not_found() || is_offline(&e) => {
                tracing::info!(error = %e, "systemd not available, skipping service activation");
                summary.record(Outcome::Skipped);
                break;
            }
            Err(e) => {
                tracing::error!(?args, error = %e, "systemctl failed");
                summary.record(Outcome::Failed);
                break;
            }
        }
    }

    summary
}

/// Returns `true` if `error` says that systemd is not running as init, as in most
/// containers.
pub fn is_offline(error: &command::Error) -> bool {
    error.stderr().is_some_and(|stderr| stderr.contains("System has not been booted with systemd"))
}
