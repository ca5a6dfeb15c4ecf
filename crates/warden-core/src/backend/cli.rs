//! Claude CLI backend.
//!
//! Spawns the `claude` executable in `--output-format stream-json` mode
//! and adapts its stdout into the backend event stream. Interruption is
//! cooperative: a SIGINT on Unix gives the CLI a chance to flush buffered
//! events before exiting, and an interrupted call is never reported as a
//! process failure.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::{
    Backend, BackendCall, BackendError, BackendErrorKind, BackendEvent, BackendRequest,
    BackendResult, InterruptHandle,
};

/// Well-known install locations relative to the home directory, checked in
/// order before the system-wide paths.
const HOME_CANDIDATES: &[&str] = &[
    ".claude/local/claude",
    ".local/bin/claude",
    ".npm-global/bin/claude",
];

/// System-wide install locations, checked after the home-relative ones.
const SYSTEM_CANDIDATES: &[&str] = &["/usr/local/bin/claude", "/opt/homebrew/bin/claude"];

/// Maximum bytes of stderr retained for the process-failure diagnostic.
const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Backend that drives the Claude Code command-line executable.
#[derive(Debug, Clone, Default)]
pub struct CliBackend {
    executable: Option<PathBuf>,
}

impl CliBackend {
    /// Creates a backend, optionally pinned to a specific executable path.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    /// Locates the Claude CLI executable.
    ///
    /// An explicit override wins outright; an override that does not exist
    /// is treated as not found rather than silently replaced by discovery.
    /// Otherwise the well-known install locations are checked in order and
    /// the first existing path is used.
    pub fn locate_executable(override_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = override_path {
            return path.exists().then(|| path.to_path_buf());
        }

        if let Some(home) = dirs::home_dir() {
            for candidate in HOME_CANDIDATES {
                let path = home.join(candidate);
                if path.exists() {
                    return Some(path);
                }
            }
        }

        SYSTEM_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Builds the argument list for one backend call.
    fn build_args(request: &BackendRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];

        if let Some(resume) = &request.resume {
            args.push("--resume".to_string());
            args.push(resume.clone());
        }
        if let Some(mode) = &request.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(mode.clone());
        }
        if !request.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(request.allowed_tools.join(","));
        }

        args
    }
}

impl Backend for CliBackend {
    async fn open(&self, request: BackendRequest) -> BackendResult<BackendCall> {
        let executable =
            Self::locate_executable(self.executable.as_deref()).ok_or_else(|| {
                BackendError::not_found(
                    "Claude CLI not found. Install the claude binary or set \
                     backend.executable in the config.",
                )
            })?;

        let args = Self::build_args(&request);
        tracing::debug!(
            executable = %executable.display(),
            vault = %request.vault.display(),
            resume = request.resume.is_some(),
            "starting backend call"
        );

        let mut child = tokio::process::Command::new(&executable)
            .args(&args)
            .current_dir(&request.vault)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::with_details(
                    BackendErrorKind::Spawn,
                    format!("Failed to start {}", executable.display()),
                    e.to_string(),
                )
            })?;

        let pid = child.id();
        let stdout = child.stdout.take().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Spawn, "Backend stdout was not captured")
        })?;
        let stderr = child.stderr.take();

        let interrupted = Arc::new(AtomicBool::new(false));
        let interrupt = {
            let interrupted = Arc::clone(&interrupted);
            InterruptHandle::new(move || {
                if !interrupted.swap(true, Ordering::SeqCst) {
                    send_interrupt(pid);
                }
            })
        };

        // The cancellation token doubles as an interrupt source so that
        // cancelling the call works without holding the stream handle. The
        // watcher exits when the call finishes, whichever comes first.
        let finished = CancellationToken::new();
        {
            let interrupt = interrupt.clone();
            let cancel = request.cancel.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => interrupt.interrupt(),
                    () = finished.cancelled() => {}
                }
            });
        }

        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let stderr_task = stderr.map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("claude stderr: {line}");
                    append_tail(&tail, &line);
                }
            })
        });

        let events = async_stream::stream! {
            let _finished = finished.drop_guard();
            let mut lines = BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<BackendEvent>(line) {
                            Ok(event) => yield Ok(event),
                            Err(err) => {
                                // Unrecognized shapes are skipped, not fatal.
                                tracing::debug!("skipping unparseable backend line: {err}");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(BackendError::with_details(
                            BackendErrorKind::Io,
                            "Failed to read backend output",
                            err.to_string(),
                        ));
                        break;
                    }
                }
            }

            // The tail is only complete once the stderr reader hits EOF.
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            match child.wait().await {
                Ok(status) if !status.success() && !interrupted.load(Ordering::SeqCst) => {
                    let tail = stderr_tail
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .trim()
                        .to_string();
                    let message = format!("Claude CLI exited with {status}");
                    yield Err(if tail.is_empty() {
                        BackendError::new(BackendErrorKind::Process, message)
                    } else {
                        BackendError::with_details(BackendErrorKind::Process, message, tail)
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("failed to reap backend process: {err}");
                }
            }
        };

        Ok(BackendCall {
            events: Box::pin(events),
            interrupt,
        })
    }
}

/// Appends one stderr line to the bounded diagnostic tail.
fn append_tail(tail: &Mutex<String>, line: &str) {
    let mut tail = tail.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    tail.push_str(line);
    tail.push('\n');
    if tail.len() > STDERR_TAIL_BYTES {
        let mut cut = tail.len() - STDERR_TAIL_BYTES;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail.drain(..cut);
    }
}

/// Sends a cooperative stop signal to the backend process.
fn send_interrupt(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SIGINT rather than SIGKILL: the CLI flushes buffered events and
        // exits on its own, which is what lets callers drain to the end.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGINT);
        }
    }
    #[cfg(not(unix))]
    {
        // No cooperative signal available; kill_on_drop remains the backstop.
        let _ = pid;
    }
}
