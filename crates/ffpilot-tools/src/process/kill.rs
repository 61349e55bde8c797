//! Forceful process-tree termination
//!
//! Sessions are spawned as process-group leaders, so signalling the group
//! reaches whatever the shell started (ffmpeg and its helpers).

use super::session::SessionId;
use std::io;

/// Kill `pid` and its descendants without giving them a chance to clean up.
///
/// A process (group) that no longer exists counts as success.
#[cfg(unix)]
#[allow(unsafe_code)]
pub async fn kill_process_tree(pid: SessionId) -> io::Result<()> {
    let pgid = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;

    // SAFETY: kill(2) has no memory-safety preconditions. The negative pid
    // addresses the whole group led by `pgid`.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Kill `pid` and its descendants without giving them a chance to clean up.
///
/// A process that no longer exists counts as success.
#[cfg(windows)]
pub async fn kill_process_tree(pid: SessionId) -> io::Result<()> {
    use std::process::Stdio;

    let status = tokio::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    // 128: no such process
    match status.code() {
        Some(0) | Some(128) => Ok(()),
        code => Err(io::Error::other(format!(
            "taskkill for pid {pid} failed with {code:?}"
        ))),
    }
}
