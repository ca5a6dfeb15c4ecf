//! Ctrl+C wiring for query cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use warden_core::backend::CliBackend;
use warden_core::session::AgentSession;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Installs the Ctrl+C handler.
///
/// The first Ctrl+C cancels the session's active call and lets the chunk
/// stream drain to `done`; a second one force-exits with the conventional
/// signal status.
///
/// # Panics
/// Panics if registering the Ctrl+C handler fails.
pub fn install(session: Arc<AgentSession<CliBackend>>) {
    ctrlc::set_handler(move || {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            // Second interrupt - force exit.
            std::process::exit(130);
        }
        session.cancel();
    })
    .expect("Error setting Ctrl+C handler");
}
