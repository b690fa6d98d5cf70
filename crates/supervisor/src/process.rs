// SPDX-License-Identifier: Apache-2.0
//! Launch and supervise UE Editor child processes.

use crate::error::SupervisorError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Delay between SIGTERM and a follow-up SIGKILL when tearing down a
/// process tree.
pub const KILL_GRACE: Duration = Duration::from_millis(500);

/// A launched UE child process.
pub struct Launched {
    pub child: Child,
    pub pid: u32,
}

/// Spawns `exe` with `args`, redirecting stdout/stderr into `log_path`.
/// On Unix, the child is placed in its own process group (`setsid`) so
/// [`kill_tree`] can signal the whole subtree via the negative pid.
pub async fn spawn(
    exe: &Path,
    args: &[String],
    envs: &[(String, String)],
    log_path: &Path,
) -> Result<Launched, SupervisorError> {
    let log_file = std::fs::File::create(log_path).map_err(|source| SupervisorError::LogFile {
        path: log_path.to_path_buf(),
        source,
    })?;
    let log_file_err = log_file.try_clone().map_err(|source| SupervisorError::LogFile {
        path: log_path.to_path_buf(),
        source,
    })?;

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .envs(envs.iter().cloned())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_file_err))
        .stdin(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // SAFETY: setsid() is async-signal-safe and only affects the
        // child after fork, before exec.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
    }

    let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
        path: exe.to_path_buf(),
        source,
    })?;
    let pid = child.id().ok_or(SupervisorError::ProcessNotFound { pid: 0 })?;

    Ok(Launched { child, pid })
}

/// Resolves the UE command-line binary for the given engine root and
/// host platform, returning an error if it does not exist.
pub fn resolve_ue_cmd(ue_root: &Path) -> Result<PathBuf, SupervisorError> {
    let candidate = if cfg!(target_os = "windows") {
        ue_root.join("Engine/Binaries/Win64/UnrealEditor-Cmd.exe")
    } else {
        ue_root.join("Engine/Binaries/Linux/UnrealEditor-Cmd")
    };

    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(SupervisorError::ExecutableNotFound { root: ue_root.to_path_buf() })
    }
}

/// Tests whether `pid` refers to a live, non-zombie process.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    // No portable liveness check without an external process-listing
    // crate; treated as alive until the supervisor is ported.
    true
}

/// Kills a process and its descendant subtree: SIGTERM the process
/// group, wait briefly, then SIGKILL any survivor.
///
/// On non-Unix, or if the process could not be grouped, falls back to
/// killing only the recorded pid — UE's own children may survive that
/// fallback path.
#[cfg(unix)]
pub async fn kill_tree(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(-(pid as i32));
    let _ = kill(pgid, Signal::SIGTERM);
    tokio::time::sleep(KILL_GRACE).await;
    if is_alive(pid) {
        let _ = kill(pgid, Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
pub async fn kill_tree(pid: u32) {
    // Fallback: kill only the recorded pid.
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_ue_cmd_fails_when_missing() {
        let result = resolve_ue_cmd(Path::new("/nonexistent/engine/root"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn spawn_redirects_output_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("worker.log");
        let mut launched = spawn(
            Path::new("/bin/echo"),
            &["hello".to_string()],
            &[],
            &log_path,
        )
        .await
        .unwrap();

        let status = launched.child.wait().await.unwrap();
        assert!(status.success());
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.trim(), "hello");
    }

    #[test]
    fn is_alive_reflects_current_process() {
        assert!(is_alive(std::process::id()));
    }
}
