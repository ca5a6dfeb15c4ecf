//! Output chunk types for the query stream.
//!
//! Chunks are the stable, typed contract between this crate and whatever
//! renders the conversation. They are serializable for JSON output modes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of a query's output stream.
///
/// Ordering is significant: chunks mirror backend event order, and `Done`
/// is always the last chunk of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Assistant prose.
    Text { content: String },

    /// A tool invocation that passed the command policy.
    ToolUse { name: String, input: Value },

    /// Output returned by a completed tool invocation.
    ToolResult { content: String },

    /// A tool invocation stopped by the command blocklist.
    Blocked { content: String },

    /// A failed precondition or a fault reported by the backend.
    Error { content: String },

    /// Terminal marker; emitted exactly once per query, always last.
    Done,
}

impl Chunk {
    /// Builds the user-facing content for a blocked command.
    pub(crate) fn blocked_command(command: &str, pattern: Option<&str>) -> Self {
        let content = match pattern {
            Some(pattern) => format!("Command blocked: {command} (pattern: {pattern})"),
            None => format!("Command blocked: {command}"),
        };
        Chunk::Blocked { content }
    }
}
