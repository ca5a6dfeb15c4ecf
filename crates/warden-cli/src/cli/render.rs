//! Chunk rendering.
//!
//! The renderer owns stdout/stderr; the core never prints. Assistant text
//! goes to stdout, policy blocks and errors go to stderr, and tool
//! activity is shown only when `show_tool_use` is on.

use serde_json::Value;
use warden_core::config::DisplayConfig;
use warden_core::session::Chunk;

/// Prints one chunk according to the display preferences.
pub fn chunk(chunk: &Chunk, display: &DisplayConfig) {
    match chunk {
        Chunk::Text { content } => println!("{content}"),
        Chunk::ToolUse { name, input } => {
            if display.show_tool_use {
                println!("[tool] {}", tool_line(name, input));
            }
        }
        Chunk::ToolResult { content } => {
            if display.show_tool_use && !content.is_empty() {
                println!("[tool result] {content}");
            }
        }
        Chunk::Blocked { content } => eprintln!("! {content}"),
        Chunk::Error { content } => eprintln!("error: {content}"),
        Chunk::Done => {}
    }
}

/// One-line summary of a tool invocation.
///
/// Shell invocations show the command itself; everything else shows the
/// compact input JSON.
fn tool_line(name: &str, input: &Value) -> String {
    if let Some(command) = input.get("command").and_then(Value::as_str) {
        return format!("{name}: {command}");
    }
    match serde_json::to_string(input) {
        Ok(json) if json != "{}" && json != "null" => format!("{name} {json}"),
        _ => name.to_string(),
    }
}
