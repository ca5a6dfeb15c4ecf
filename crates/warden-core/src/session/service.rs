//! Session lifecycle and the query stream.
//!
//! [`AgentSession`] owns the captured session handle and the record of the
//! current in-flight backend call. `query()` hands back a lazy chunk
//! stream: nothing runs until the caller polls, chunks are yielded in
//! arrival order, and every call ends with exactly one `Done` chunk — on
//! precondition failures too.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendRequest, CliBackend, InterruptHandle};
use crate::config::Config;
use crate::policy::CommandPolicy;
use crate::session::chunk::Chunk;
use crate::session::transform::transform;

/// Caller-side configuration for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Working directory for backend runs; unresolvable vaults fail the
    /// call with an error chunk instead of opening a stream.
    pub vault: Option<PathBuf>,
    /// Command blocklist applied to shell tool invocations.
    pub policy: CommandPolicy,
    /// Pass-through permission mode for the backend.
    pub permission_mode: Option<String>,
    /// Pass-through tool allowlist for the backend.
    pub allowed_tools: Vec<String>,
}

/// Record of the current in-flight backend call.
///
/// At most one exists at a time. Starting a new query overwrites it
/// without cancelling the prior call; `cancel()` always targets the most
/// recently started call.
struct ActiveCall {
    id: u64,
    interrupt: InterruptHandle,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    active: Option<ActiveCall>,
    next_call_id: u64,
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The agent-session service: turns prompts into typed chunk streams.
pub struct AgentSession<B: Backend> {
    backend: Arc<B>,
    options: SessionOptions,
    state: Arc<Mutex<SessionState>>,
}

impl AgentSession<CliBackend> {
    /// Builds a CLI-backed session from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let backend = CliBackend::new(config.backend.executable.clone());
        let options = SessionOptions {
            vault: config.vault.clone(),
            policy: CommandPolicy::new(
                &config.security.blocked_commands,
                config.security.enable_blocklist,
            ),
            permission_mode: config.backend.permission_mode.clone(),
            allowed_tools: config.backend.allowed_tools.clone(),
        };
        Self::new(backend, options)
    }
}

impl<B: Backend> AgentSession<B> {
    pub fn new(backend: B, options: SessionOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Returns the session handle captured from the backend, if any.
    pub fn session_handle(&self) -> Option<String> {
        lock(&self.state).session_id.clone()
    }

    /// Runs one prompt and returns the lazy chunk stream for it.
    ///
    /// The stream is finite and non-restartable; abandoning it does not
    /// cancel the call — `cancel()` is explicit.
    pub fn query(&self, prompt: &str) -> ChunkStream {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let policy = self.options.policy.clone();
        let vault = self.options.vault.clone();
        let permission_mode = self.options.permission_mode.clone();
        let allowed_tools = self.options.allowed_tools.clone();
        let prompt = prompt.to_string();

        let stream = async_stream::stream! {
            let vault = match resolve_vault(vault.as_deref()) {
                Ok(vault) => vault,
                Err(content) => {
                    yield Chunk::Error { content };
                    yield Chunk::Done;
                    return;
                }
            };

            let cancel = CancellationToken::new();
            let resume = lock(&state).session_id.clone();
            let request = BackendRequest {
                prompt,
                vault,
                resume,
                permission_mode,
                allowed_tools,
                cancel: cancel.clone(),
            };

            let call = match backend.open(request).await {
                Ok(call) => call,
                Err(err) => {
                    yield Chunk::Error { content: err.to_string() };
                    yield Chunk::Done;
                    return;
                }
            };

            let call_id = {
                let mut st = lock(&state);
                st.next_call_id += 1;
                st.active = Some(ActiveCall {
                    id: st.next_call_id,
                    interrupt: call.interrupt.clone(),
                    cancel,
                });
                st.next_call_id
            };
            let clear = ClearActiveGuard {
                state: Arc::clone(&state),
                call_id,
            };

            // Drain to the end even after cancellation: the interrupt is
            // cooperative, and events already in flight are not truncated.
            let mut events = call.events;
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        let chunks = {
                            let mut st = lock(&state);
                            transform(event, &mut st.session_id, &policy)
                        };
                        for chunk in chunks {
                            yield chunk;
                        }
                    }
                    Err(err) => {
                        yield Chunk::Error { content: err.to_string() };
                    }
                }
            }

            drop(clear);
            yield Chunk::Done;
        };

        ChunkStream {
            inner: Box::pin(stream),
        }
    }

    /// Cancels the most recently started call, if one is in flight.
    ///
    /// Signals the call's cancellation token and requests the backend's
    /// cooperative interrupt; the caller keeps draining the chunk stream
    /// until it reaches `Done`. A no-op when nothing is active.
    pub fn cancel(&self) {
        let call = lock(&self.state).active.take();
        if let Some(call) = call {
            tracing::debug!("cancelling active call");
            call.cancel.cancel();
            call.interrupt.interrupt();
        }
    }

    /// Clears the captured session handle; the next query starts a fresh
    /// conversation. Does not affect an in-flight stream.
    pub fn reset_session(&self) {
        lock(&self.state).session_id = None;
    }

    /// Full teardown: `cancel()` followed by `reset_session()`.
    /// Idempotent and safe with no call active.
    pub fn cleanup(&self) {
        self.cancel();
        self.reset_session();
    }
}

/// Clears the ActiveCall record on every exit path, including an
/// abandoned stream, but only if it still belongs to this call.
struct ClearActiveGuard {
    state: Arc<Mutex<SessionState>>,
    call_id: u64,
}

impl Drop for ClearActiveGuard {
    fn drop(&mut self) {
        let mut st = lock(&self.state);
        if st.active.as_ref().is_some_and(|call| call.id == self.call_id) {
            st.active = None;
        }
    }
}

/// Validates the configured vault path before any stream is opened.
fn resolve_vault(vault: Option<&Path>) -> Result<PathBuf, String> {
    match vault {
        None => Err("vault path is not configured; set `vault` in the config".to_string()),
        Some(path) if !path.is_dir() => {
            Err(format!("vault path does not exist: {}", path.display()))
        }
        Some(path) => Ok(path.to_path_buf()),
    }
}

/// Lazily produced, finite chunk sequence for one query call.
pub struct ChunkStream {
    inner: Pin<Box<dyn Stream<Item = Chunk> + Send>>,
}

impl Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.inner.as_mut().poll_next(cx)
    }
}
