//! Backend event → chunk transformation.
//!
//! Purely reactive per event: the only cross-event state is the captured
//! session handle. Shell-tool invocations are routed through the command
//! policy before they may surface as actionable `tool_use` chunks.

use serde_json::Value;

use crate::backend::{AssistantBlock, BackendEvent};
use crate::policy::CommandPolicy;
use crate::session::chunk::Chunk;

/// Tool names that designate shell execution and therefore get policed.
fn is_shell_tool(name: &str) -> bool {
    name.eq_ignore_ascii_case("bash")
}

/// Maps one backend event to zero or more chunks, in wire order.
///
/// `system`/`init` events capture the session handle as a side effect and
/// emit nothing; `result` and unrecognized events are swallowed.
pub fn transform(
    event: BackendEvent,
    session_handle: &mut Option<String>,
    policy: &CommandPolicy,
) -> Vec<Chunk> {
    match event {
        BackendEvent::System {
            subtype,
            session_id,
        } => {
            if subtype.as_deref() == Some("init")
                && let Some(id) = session_id
            {
                tracing::debug!(session_id = %id, "captured session handle");
                *session_handle = Some(id);
            }
            Vec::new()
        }

        BackendEvent::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(|block| match block {
                AssistantBlock::Text { text } => Some(Chunk::Text { content: text }),
                AssistantBlock::ToolUse { name, input, .. } => {
                    Some(route_tool_use(name, input, policy))
                }
                AssistantBlock::Other => None,
            })
            .collect(),

        BackendEvent::ToolUse { name, input, .. } => {
            vec![route_tool_use(name, input, policy)]
        }

        BackendEvent::ToolResult { content } => vec![Chunk::ToolResult { content }],

        BackendEvent::Error { message } => vec![Chunk::Error { content: message }],

        BackendEvent::Result | BackendEvent::Other => Vec::new(),
    }
}

/// Decides between `tool_use` and `blocked` for one tool invocation.
///
/// Only shell tools are evaluated; everything else passes straight
/// through. A shell invocation without a command string has nothing to
/// police and is allowed.
fn route_tool_use(name: String, input: Value, policy: &CommandPolicy) -> Chunk {
    if is_shell_tool(&name)
        && let Some(command) = input.get("command").and_then(Value::as_str)
    {
        let decision = policy.evaluate(command);
        if decision.blocked {
            tracing::warn!(command, pattern = ?decision.matched_pattern, "blocked shell command");
            return Chunk::blocked_command(command, decision.matched_pattern.as_deref());
        }
    }

    Chunk::ToolUse { name, input }
}
