//! Process launch, output capture and exit observation

use super::constants::{EXIT_DRAIN_GRACE_MS, READ_CHUNK_BYTES};
use super::decode::Utf8Decoder;
use super::kill::kill_process_tree;
use super::scheduler::arm_deadline;
use super::session::{ExitState, Session, SessionId};
use super::store::SessionStore;
use crate::error::{Error, Result};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shell program plus the flag that makes it run a command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Shell executable
    pub program: String,
    /// Flag preceding the command string (`-c`, `/C`, `-Command`)
    pub flag: &'static str,
}

impl ShellCommand {
    /// Pick the shell: explicit override, then configured default, then platform default.
    #[must_use]
    pub fn resolve(override_shell: Option<&str>, configured: Option<&str>) -> Self {
        fn pick(shell: Option<&str>) -> Option<&str> {
            shell.map(str::trim).filter(|s| !s.is_empty())
        }
        let program = pick(override_shell)
            .or_else(|| pick(configured))
            .map(str::to_string)
            .unwrap_or_else(platform_default_shell);
        let flag = command_flag(&program);
        Self { program, flag }
    }
}

#[cfg(windows)]
fn platform_default_shell() -> String {
    std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
}

#[cfg(not(windows))]
fn platform_default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

fn command_flag(program: &str) -> &'static str {
    // Split on both separators so a Windows path resolves the same everywhere.
    let file = program.rsplit(&['/', '\\'][..]).next().unwrap_or(program);
    let name = file
        .rsplit_once('.')
        .map_or(file, |(stem, _)| stem)
        .to_ascii_lowercase();
    match name.as_str() {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    }
}

/// What `start` hands back once the settling window has passed.
#[derive(Debug, Clone)]
pub struct StartedSession {
    /// Session id (process id)
    pub id: SessionId,
    /// Output captured during the settling window
    pub initial_output: String,
    /// Whether the process was still running when the window closed
    pub running: bool,
}

/// Launches processes and wires them into the store.
#[derive(Debug, Clone)]
pub struct Spawner {
    store: SessionStore,
    default_shell: Option<String>,
    settle_window: Duration,
}

impl Spawner {
    /// Create a spawner that registers sessions in `store`
    #[must_use]
    pub fn new(store: SessionStore, default_shell: Option<String>, settle_window: Duration) -> Self {
        Self {
            store,
            default_shell,
            settle_window,
        }
    }

    /// Launch `command_line` under a shell and return its early output.
    ///
    /// `timeout` of `None` (or zero) leaves the session without a deadline.
    pub async fn start(
        &self,
        command_line: &str,
        timeout: Option<Duration>,
        shell: Option<&str>,
    ) -> Result<StartedSession> {
        let shell = ShellCommand::resolve(shell, self.default_shell.as_deref());

        let mut command = Command::new(&shell.program);
        command
            .arg(shell.flag)
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        #[cfg(unix)]
        command.process_group(0);
        #[cfg(windows)]
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);

        let mut child = command.spawn().map_err(|e| {
            warn!(shell = %shell.program, command = %command_line, error = %e, "Failed to spawn process");
            Error::SpawnFailed(format!("{}: {}", shell.program, e))
        })?;

        let Some(id) = child.id() else {
            return Err(Error::SpawnFailed(
                "process exited before its pid could be read".to_string(),
            ));
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let open_streams = u8::from(stdout.is_some()) + u8::from(stderr.is_some());
        let session = Arc::new(Session::new(id, command_line, open_streams));

        if let Err(e) = self.register(&session).await {
            if let Err(kill_err) = kill_process_tree(id).await {
                warn!(session_id = id, error = %kill_err, "Failed to kill process after registration failure");
            }
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
            return Err(e);
        }

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            readers.push(tokio::spawn(capture(stdout, Arc::clone(&session))));
        }
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(capture(stderr, Arc::clone(&session))));
        }
        tokio::spawn(observe_exit(child, readers, Arc::clone(&session)));

        if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
            arm_deadline(self.store.clone(), &session, timeout);
        }

        info!(
            session_id = id,
            command = %command_line,
            shell = %shell.program,
            "Process session started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.settle_window) => {}
            _ = session.exited().cancelled() => {}
        }

        Ok(StartedSession {
            id,
            initial_output: session.peek().await,
            running: session.is_running().await,
        })
    }

    /// Insert the session, evicting a finished entry whose pid the OS reused.
    async fn register(&self, session: &Arc<Session>) -> Result<()> {
        if self.store.insert(Arc::clone(session)) {
            return Ok(());
        }

        let id = session.id();
        if let Some(existing) = self.store.get(id) {
            if !existing.is_running().await && self.store.remove_exact(&existing) {
                warn!(session_id = id, "Evicted finished session whose pid was reused");
                if self.store.insert(Arc::clone(session)) {
                    return Ok(());
                }
            }
        }
        Err(Error::SpawnFailed(format!(
            "session id {} is already in use",
            id
        )))
    }
}

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Append everything read from `reader` to the session buffer until EOF.
async fn capture<R>(mut reader: R, session: Arc<Session>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Utf8Decoder::default();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => session.append(&decoder.push(&buf[..n])).await,
            Err(e) => {
                debug!(session_id = session.id(), error = %e, "Output stream read failed");
                break;
            }
        }
    }
    session.append(&decoder.finish()).await;
    session.close_stream().await;
}

/// Wait for the process to exit, let the pipes drain, then record the exit.
async fn observe_exit(mut child: Child, readers: Vec<JoinHandle<()>>, session: Arc<Session>) {
    let exit = match child.wait().await {
        Ok(status) => ExitState::from_status(&status),
        Err(e) => {
            warn!(session_id = session.id(), error = %e, "Failed to wait for process");
            ExitState::Unknown
        }
    };

    let grace = Duration::from_millis(EXIT_DRAIN_GRACE_MS);
    if tokio::time::timeout(grace, futures::future::join_all(readers))
        .await
        .is_err()
    {
        // A descendant still holds the pipes; capture keeps running in the background.
        debug!(session_id = session.id(), "Output pipes still open after exit");
    }

    if session.mark_exited(exit).await {
        info!(session_id = session.id(), %exit, "Process exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_override_wins() {
        let shell = ShellCommand::resolve(Some("/bin/bash"), Some("/bin/zsh"));
        assert_eq!(shell.program, "/bin/bash");
        assert_eq!(shell.flag, "-c");
    }

    #[test]
    fn test_blank_override_falls_back() {
        let shell = ShellCommand::resolve(Some("  "), Some("/bin/dash"));
        assert_eq!(shell.program, "/bin/dash");

        let shell = ShellCommand::resolve(None, None);
        assert_eq!(shell.program, platform_default_shell());
    }

    #[test]
    fn test_command_flags() {
        assert_eq!(command_flag("cmd.exe"), "/C");
        assert_eq!(command_flag(r"C:\Windows\System32\CMD.EXE"), "/C");
        assert_eq!(command_flag("pwsh"), "-Command");
        assert_eq!(command_flag("powershell.exe"), "-Command");
        assert_eq!(command_flag("/usr/bin/fish"), "-c");
        assert_eq!(command_flag(r"D:\tools\pwsh.exe"), "-Command");
        assert_eq!(command_flag("/mnt/c/Windows/System32/cmd.exe"), "/C");
        assert_eq!(command_flag("/opt/sh.d/bash"), "-c");
    }

    #[cfg(unix)]
    fn spawner(store: &SessionStore) -> Spawner {
        Spawner::new(
            store.clone(),
            Some("/bin/sh".to_string()),
            Duration::from_millis(500),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_captures_both_streams() {
        let store = SessionStore::new();
        let started = spawner(&store)
            .start("echo out; echo err 1>&2", None, None)
            .await
            .unwrap();

        assert!(started.id > 0);
        assert!(started.initial_output.contains("out"));
        assert!(started.initial_output.contains("err"));
        assert!(!started.running);
        assert!(started.initial_output.contains("[process exited with code 0]"));
        // Exit does not remove the session.
        assert!(store.get(started.id).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_code_recorded() {
        let store = SessionStore::new();
        let started = spawner(&store).start("exit 3", None, None).await.unwrap();
        let session = store.get(started.id).unwrap();
        assert_eq!(session.exit().await, Some(ExitState::Code(3)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_shell_is_spawn_failure() {
        let store = SessionStore::new();
        let err = spawner(&store)
            .start("echo hi", None, Some("/nonexistent/shell"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SpawnFailed(_)));
        assert!(store.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_long_running_reports_running() {
        let store = SessionStore::new();
        let started = spawner(&store).start("sleep 5", None, None).await.unwrap();
        assert!(started.running);
        assert!(crate::process::terminate::terminate(
            &store,
            started.id,
            crate::process::terminate::TerminationReason::Requested
        )
        .await);
    }
}
