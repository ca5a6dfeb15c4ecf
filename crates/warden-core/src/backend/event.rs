//! Backend protocol events.
//!
//! The Claude CLI emits newline-delimited JSON in `--output-format
//! stream-json` mode. The event taxonomy is loosely typed on the wire, so
//! it is narrowed into a closed enum right here at the ingestion edge;
//! anything unrecognized becomes [`BackendEvent::Other`] and is ignored
//! downstream instead of failing the stream.

use serde::Deserialize;
use serde_json::Value;

fn empty_input() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A single protocol event read from the backend stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    /// Lifecycle notice; the `init` subtype carries the session handle.
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },

    /// An assistant turn with ordered content blocks.
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },

    /// A standalone tool invocation (not nested in an assistant message).
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default = "empty_input")]
        input: Value,
    },

    /// Output of a completed tool invocation.
    ToolResult {
        #[serde(default)]
        content: String,
    },

    /// Terminal bookkeeping for a turn; carries nothing we report.
    Result,

    /// A fault reported by the backend itself.
    Error { message: String },

    /// Any event tag this version does not recognize.
    #[serde(other)]
    Other,
}

/// Body of an `assistant` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<AssistantBlock>,
}

/// One content block inside an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default = "empty_input")]
        input: Value,
    },
    /// Block kinds we do not surface (thinking, images, ...).
    #[serde(other)]
    Other,
}
