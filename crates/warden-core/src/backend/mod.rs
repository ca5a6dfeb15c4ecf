//! Backend contract shared across implementations.
//!
//! The agent process is opaque to this crate: all it owes us is an async
//! sequence of [`BackendEvent`]s plus a cooperative interrupt hook. The
//! [`Backend`] trait is the seam the session service is generic over, so
//! tests can substitute a scripted event source for the real CLI.

pub mod cli;
pub mod event;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

pub use cli::CliBackend;
pub use event::{AssistantBlock, AssistantMessage, BackendEvent};

/// Categories of backend errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The backend executable could not be located.
    NotFound,
    /// The backend process failed to start.
    Spawn,
    /// Reading the event stream failed.
    Io,
    /// The backend process exited with a failure status.
    Process,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::NotFound => write!(f, "not_found"),
            BackendErrorKind::Spawn => write!(f, "spawn"),
            BackendErrorKind::Io => write!(f, "io"),
            BackendErrorKind::Process => write!(f, "process"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone)]
pub struct BackendError {
    /// Error category
    pub kind: BackendErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., captured stderr)
    pub details: Option<String>,
}

impl BackendError {
    /// Creates a new backend error.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a backend error with details.
    pub fn with_details(
        kind: BackendErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a not-found error for a missing executable.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Boxed stream of backend events.
pub type EventStream = BoxStream<'static, BackendResult<BackendEvent>>;

/// Options for opening one backend call.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// The user prompt for this turn.
    pub prompt: String,
    /// Working directory the backend operates in.
    pub vault: PathBuf,
    /// Session handle to resume, if a prior call captured one.
    pub resume: Option<String>,
    /// Pass-through permission mode for the backend.
    pub permission_mode: Option<String>,
    /// Pass-through tool allowlist for the backend.
    pub allowed_tools: Vec<String>,
    /// Cancellation signal for this call; cancelling it requests the
    /// backend's cooperative interrupt.
    pub cancel: CancellationToken,
}

/// Cooperative-interrupt hook for a live backend call.
///
/// Invoking it asks the backend to stop producing further events; it never
/// severs the stream itself, so callers keep draining until the stream
/// ends on its own.
#[derive(Clone)]
pub struct InterruptHandle {
    inner: Arc<dyn Fn() + Send + Sync>,
}

impl InterruptHandle {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// Returns a handle that does nothing when invoked.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Requests cooperative interruption of the call.
    pub fn interrupt(&self) {
        (self.inner)();
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InterruptHandle")
    }
}

/// A live backend call: the event stream plus its interrupt hook.
pub struct BackendCall {
    pub events: EventStream,
    pub interrupt: InterruptHandle,
}

impl fmt::Debug for BackendCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCall")
            .field("interrupt", &self.interrupt)
            .finish_non_exhaustive()
    }
}

/// An event source the session service can drive.
pub trait Backend: Send + Sync + 'static {
    /// Opens a backend call for one prompt.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be located or started;
    /// failures after the call is open travel through the event stream.
    fn open(
        &self,
        request: BackendRequest,
    ) -> impl Future<Output = BackendResult<BackendCall>> + Send;
}
