//! Bounded child-process execution shared by every engine adapter.
//!
//! [`run_bounded`] launches one engine process and guarantees that it is gone
//! when the call returns, however the call ends:
//!
//! * normal exit: the status and captured output are returned;
//! * timeout: the child is killed and reaped within `kill_grace`;
//! * cancellation: same as timeout, reported as `Cancelled`;
//! * the future itself is dropped: `kill_on_drop` takes the child down.
//!
//! stdout and stderr are drained concurrently so a chatty engine can never
//! block on a full pipe, but only the first `capture_limit` bytes of each are
//! kept.
//!
//! Only the direct child is signalled. An engine that forks helpers into a
//! new session (LibreOffice's `soffice` wrapper does this on some platforms)
//! can leave those helpers running until they notice the closed pipes.

use crate::engine::EngineKind;
use crate::error::{ConvertError, Diagnostic};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A fully-resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(OsString, OsString)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, vars: &[(OsString, OsString)]) -> Self {
        self.env.extend(vars.iter().cloned());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut s = self.program.display().to_string();
        for a in &self.args {
            s.push(' ');
            s.push_str(&a.to_string_lossy());
        }
        s
    }
}

/// Time and size bounds for one process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// How long to wait for a killed child to be reaped.
    pub kill_grace: Duration,
    /// Bytes kept per output stream.
    pub capture_limit: usize,
}

/// Bytes read from one output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// How a process that ran to completion ended.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub duration: Duration,
}

impl ProcessOutcome {
    /// stderr, falling back to stdout, bounded to `limit` bytes.
    pub fn diagnostic(&self, limit: usize) -> Diagnostic {
        let stderr = self.stderr.text();
        if !stderr.trim().is_empty() {
            return Diagnostic::bounded(&stderr, limit, self.stderr.truncated);
        }
        Diagnostic::bounded(&self.stdout.text(), limit, self.stdout.truncated)
    }
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run `spec` to completion, or kill it on timeout/cancellation.
pub async fn run_bounded(
    engine: EngineKind,
    spec: &CommandSpec,
    limits: &ProcessLimits,
    cancel: &CancellationToken,
) -> Result<ProcessOutcome, ConvertError> {
    if cancel.is_cancelled() {
        return Err(ConvertError::cancelled(format!("{engine} launch")));
    }

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = spec.cwd {
        cmd.current_dir(dir);
    }

    debug!("Running {} engine: {}", engine, spec.display());
    let started = Instant::now();

    let mut child = cmd.spawn().map_err(|e| ConvertError::EngineExecution {
        engine,
        exit_code: None,
        diagnostic: Diagnostic::bounded(
            &format!("failed to launch '{}': {}", spec.program.display(), e),
            limits.capture_limit,
            false,
        ),
    })?;
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .map(|s| tokio::spawn(capture(s, limits.capture_limit)));
    let stderr = child
        .stderr
        .take()
        .map(|s| tokio::spawn(capture(s, limits.capture_limit)));

    let ending = tokio::select! {
        status = child.wait() => Ending::Exited(status),
        _ = tokio::time::sleep(limits.timeout) => Ending::TimedOut,
        _ = cancel.cancelled() => Ending::Cancelled,
    };

    match ending {
        Ending::Exited(Ok(status)) => {
            let stdout = join_capture(stdout, limits.kill_grace).await;
            let stderr = join_capture(stderr, limits.kill_grace).await;
            let duration = started.elapsed();
            debug!(
                "{} engine (pid {:?}) exited with {} after {}ms",
                engine,
                pid,
                status,
                duration.as_millis()
            );
            Ok(ProcessOutcome {
                status,
                stdout,
                stderr,
                duration,
            })
        }
        Ending::Exited(Err(e)) => {
            abort_capture(stdout);
            abort_capture(stderr);
            Err(ConvertError::EngineExecution {
                engine,
                exit_code: None,
                diagnostic: Diagnostic::bounded(
                    &format!("failed to wait for engine process: {e}"),
                    limits.capture_limit,
                    false,
                ),
            })
        }
        Ending::TimedOut => {
            warn!(
                "{} engine (pid {:?}) exceeded {}ms; killing",
                engine,
                pid,
                limits.timeout.as_millis()
            );
            terminate(&mut child, engine, pid, limits.kill_grace).await;
            abort_capture(stdout);
            abort_capture(stderr);
            Err(ConvertError::EngineTimeout {
                engine,
                timeout_ms: limits.timeout.as_millis() as u64,
            })
        }
        Ending::Cancelled => {
            debug!("{} engine (pid {:?}) cancelled; killing", engine, pid);
            terminate(&mut child, engine, pid, limits.kill_grace).await;
            abort_capture(stdout);
            abort_capture(stderr);
            Err(ConvertError::cancelled(format!("{engine} engine run")))
        }
    }
}

/// Kill the child and wait up to `grace` for the OS to reap it.
async fn terminate(child: &mut Child, engine: EngineKind, pid: Option<u32>, grace: Duration) {
    if let Err(e) = child.start_kill() {
        // Already exited between the select and here.
        debug!("{} engine (pid {:?}) kill: {}", engine, pid, e);
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!("{} engine (pid {:?}) reaped: {}", engine, pid, status),
        Ok(Err(e)) => error!("{} engine (pid {:?}) wait after kill failed: {}", engine, pid, e),
        Err(_) => error!(
            "{} engine (pid {:?}) not reaped within {}ms of kill",
            engine,
            pid,
            grace.as_millis()
        ),
    }
}

async fn capture<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Captured {
    let mut out = Captured::default();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(out.bytes.len());
                if n > room {
                    out.truncated = true;
                }
                // Keep draining past the limit so the child never blocks.
                out.bytes.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    out
}

async fn join_capture(handle: Option<JoinHandle<Captured>>, grace: Duration) -> Captured {
    let Some(handle) = handle else {
        return Captured::default();
    };
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(_)) => Captured::default(),
        Err(_) => {
            // A grandchild still holds the pipe open.
            abort.abort();
            Captured {
                bytes: Vec::new(),
                truncated: true,
            }
        }
    }
}

fn abort_capture(handle: Option<JoinHandle<Captured>>) {
    if let Some(h) = handle {
        h.abort();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn limits(timeout_ms: u64) -> ProcessLimits {
        ProcessLimits {
            timeout: Duration::from_millis(timeout_ms),
            kill_grace: Duration::from_secs(2),
            capture_limit: 64,
        }
    }

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_exit_status_and_output() {
        let out = run_bounded(
            EngineKind::Image,
            &sh("echo out; echo err >&2; exit 3"),
            &limits(5_000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout.text().trim(), "out");
        assert_eq!(out.diagnostic(100).text, "err");
    }

    #[tokio::test]
    async fn large_output_is_truncated_not_blocking() {
        // 1 MiB on stderr would fill a pipe buffer many times over.
        let out = run_bounded(
            EngineKind::Pdf,
            &sh("head -c 1048576 /dev/zero | tr '\\0' 'x' >&2"),
            &limits(10_000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stderr.bytes.len(), 64);
        assert!(out.stderr.truncated);
        assert!(out.diagnostic(16).truncated);
    }

    #[tokio::test]
    async fn timeout_kills_child() {
        let started = Instant::now();
        let err = run_bounded(
            EngineKind::Office,
            &sh("exec sleep 30"),
            &limits(200),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineTimeout);
        assert!(err.is_transient());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let err = run_bounded(EngineKind::Pdf, &sh("exec sleep 30"), &limits(30_000), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn missing_program_is_execution_error() {
        let err = run_bounded(
            EngineKind::Image,
            &CommandSpec::new("/nonexistent/docforge-magick"),
            &limits(1_000),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineExecutionError);
        assert!(err.to_string().contains("failed to launch"));
    }

    #[test]
    fn display_joins_args() {
        let spec = CommandSpec::new("gs").args(["-dSAFER", "-dBATCH"]);
        assert_eq!(spec.display(), "gs -dSAFER -dBATCH");
    }
}
