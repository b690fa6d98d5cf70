// SPDX-License-Identifier: Apache-2.0
//! Orphan UE worker detection.
//!
//! Scans the process list for workers left over from a previous daemon
//! incarnation: any process whose command line names both the UE worker
//! mode flag and a pool base URL on this daemon's port. Run once at
//! startup, before the pool begins spawning its own workers.

use crate::process::kill_tree;
use tracing::{info, warn};

const WORKER_MODE_FLAG: &str = "-MRQWorkerMode";

fn base_url_marker(port: u16) -> String {
    format!("-WorkerPoolBaseUrl=http://127.0.0.1:{port}/")
}

/// Returns `(pid, cmdline)` for every process on the host, best-effort.
/// Linux-only (`/proc` scan); other platforms return an empty list, a
/// documented gap for this sweep.
#[cfg(target_os = "linux")]
fn list_processes() -> Vec<(u32, String)> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return out;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let cmdline_path = entry.path().join("cmdline");
        let Ok(raw) = std::fs::read(&cmdline_path) else {
            continue;
        };
        let cmdline = raw
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        out.push((pid, cmdline));
    }
    out
}

#[cfg(not(target_os = "linux"))]
fn list_processes() -> Vec<(u32, String)> {
    Vec::new()
}

/// Kills every orphaned UE worker process targeting `port`. Returns the
/// number of processes killed.
pub async fn sweep(port: u16) -> usize {
    let marker = base_url_marker(port);
    let orphans: Vec<u32> = list_processes()
        .into_iter()
        .filter(|(_, cmdline)| cmdline.contains(WORKER_MODE_FLAG) && cmdline.contains(&marker))
        .map(|(pid, _)| pid)
        .collect();

    if orphans.is_empty() {
        return 0;
    }

    warn!(count = orphans.len(), port, "killing orphaned UE workers from a previous incarnation");
    for pid in &orphans {
        kill_tree(*pid).await;
    }
    info!(count = orphans.len(), "orphan sweep complete");
    orphans.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_marker_matches_documented_format() {
        assert_eq!(base_url_marker(9100), "-WorkerPoolBaseUrl=http://127.0.0.1:9100/");
    }
}
