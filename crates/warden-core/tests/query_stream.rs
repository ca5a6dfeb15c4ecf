//! End-to-end tests for the query stream through the public API.
//!
//! These build their own backends against the `Backend` trait: a scripted
//! replay backend and a channel-fed backend whose stream honors the
//! cooperative cancellation contract.

use std::path::Path;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

use warden_core::backend::{
    AssistantBlock, AssistantMessage, Backend, BackendCall, BackendEvent, BackendRequest,
    BackendResult, InterruptHandle,
};
use warden_core::policy::CommandPolicy;
use warden_core::session::{AgentSession, Chunk, SessionOptions};

fn options(vault: &Path) -> SessionOptions {
    SessionOptions {
        vault: Some(vault.to_path_buf()),
        policy: CommandPolicy::new([r"rm\s+-rf"], true),
        ..SessionOptions::default()
    }
}

fn text_event(text: &str) -> BackendResult<BackendEvent> {
    Ok(BackendEvent::Assistant {
        message: AssistantMessage {
            content: vec![AssistantBlock::Text {
                text: text.to_string(),
            }],
        },
    })
}

/// Replays a fixed event list for every call and records requests.
#[derive(Clone, Default)]
struct ScriptedBackend {
    script: Vec<BackendResult<BackendEvent>>,
    requests: Arc<Mutex<Vec<BackendRequest>>>,
}

impl Backend for ScriptedBackend {
    async fn open(&self, request: BackendRequest) -> BackendResult<BackendCall> {
        self.requests.lock().unwrap().push(request);
        Ok(BackendCall {
            events: Box::pin(futures_util::stream::iter(self.script.clone())),
            interrupt: InterruptHandle::noop(),
        })
    }
}

/// Feeds events from a channel; the stream ends when the channel closes
/// or — after draining everything already queued — when the call's
/// cancellation token fires.
struct ChannelBackend {
    rx: Mutex<Option<mpsc::UnboundedReceiver<BackendResult<BackendEvent>>>>,
}

impl ChannelBackend {
    fn new() -> (
        mpsc::UnboundedSender<BackendResult<BackendEvent>>,
        Self,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx: Mutex::new(Some(rx)),
            },
        )
    }
}

impl Backend for ChannelBackend {
    async fn open(&self, request: BackendRequest) -> BackendResult<BackendCall> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("channel backend supports a single call");
        let cancel = request.cancel.clone();

        let events = futures_util::stream::unfold((rx, cancel), |(mut rx, cancel)| async move {
            let item = tokio::select! {
                biased;
                item = rx.recv() => item,
                () = cancel.cancelled() => None,
            };
            item.map(|event| (event, (rx, cancel)))
        });

        Ok(BackendCall {
            events: Box::pin(events),
            interrupt: InterruptHandle::noop(),
        })
    }
}

#[tokio::test]
async fn full_conversation_maps_to_ordered_chunks() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend {
        script: vec![
            Ok(BackendEvent::System {
                subtype: Some("init".to_string()),
                session_id: Some("S1".to_string()),
            }),
            Ok(BackendEvent::Assistant {
                message: AssistantMessage {
                    content: vec![
                        AssistantBlock::Text {
                            text: "Checking the folder.".to_string(),
                        },
                        AssistantBlock::ToolUse {
                            id: Some("tu_1".to_string()),
                            name: "Bash".to_string(),
                            input: json!({"command": "ls -la"}),
                        },
                    ],
                },
            }),
            Ok(BackendEvent::ToolResult {
                content: "notes.md".to_string(),
            }),
            Ok(BackendEvent::Result),
        ],
        ..ScriptedBackend::default()
    };
    let session = AgentSession::new(backend, options(temp.path()));

    let chunks: Vec<Chunk> = session.query("what is here?").collect().await;

    assert_eq!(
        chunks,
        vec![
            Chunk::Text {
                content: "Checking the folder.".to_string()
            },
            Chunk::ToolUse {
                name: "Bash".to_string(),
                input: json!({"command": "ls -la"}),
            },
            Chunk::ToolResult {
                content: "notes.md".to_string()
            },
            Chunk::Done,
        ]
    );
    assert_eq!(session.session_handle().as_deref(), Some("S1"));
}

#[tokio::test]
async fn resume_token_threads_across_sequential_calls() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend {
        script: vec![
            Ok(BackendEvent::System {
                subtype: Some("init".to_string()),
                session_id: Some("S1".to_string()),
            }),
            Ok(BackendEvent::Result),
        ],
        ..ScriptedBackend::default()
    };
    let session = AgentSession::new(backend.clone(), options(temp.path()));

    let _: Vec<Chunk> = session.query("first").collect().await;
    let _: Vec<Chunk> = session.query("second").collect().await;

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].resume, None);
    assert_eq!(requests[1].resume.as_deref(), Some("S1"));
}

#[tokio::test]
async fn cancellation_drains_in_flight_events_before_done() {
    let temp = TempDir::new().unwrap();
    let (tx, backend) = ChannelBackend::new();
    let session = AgentSession::new(backend, options(temp.path()));

    let mut stream = session.query("long task");

    tx.send(text_event("one")).unwrap();
    assert_eq!(
        stream.next().await,
        Some(Chunk::Text {
            content: "one".to_string()
        })
    );

    // Queue more events, then cancel: everything already in flight must
    // still arrive before the terminal chunk.
    tx.send(text_event("two")).unwrap();
    tx.send(text_event("three")).unwrap();
    session.cancel();

    let rest: Vec<Chunk> = stream.collect().await;
    assert_eq!(
        rest,
        vec![
            Chunk::Text {
                content: "two".to_string()
            },
            Chunk::Text {
                content: "three".to_string()
            },
            Chunk::Done,
        ]
    );
}

#[tokio::test]
async fn cancelled_call_still_ends_with_exactly_one_done() {
    let temp = TempDir::new().unwrap();
    let (tx, backend) = ChannelBackend::new();
    let session = AgentSession::new(backend, options(temp.path()));

    let mut stream = session.query("long task");
    tx.send(text_event("partial")).unwrap();
    let _ = stream.next().await;

    session.cancel();
    let rest: Vec<Chunk> = stream.collect().await;
    assert_eq!(rest.iter().filter(|c| **c == Chunk::Done).count(), 1);
    assert_eq!(rest.last(), Some(&Chunk::Done));
}
