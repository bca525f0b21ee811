//! IPC protocol types for communication with the desktop frontend.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (assistant -> UI).
//! Commands use `{"command": "<name>", ...}` format (UI -> assistant).

pub mod bridge;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Events: assistant -> UI (stdout)
// ---------------------------------------------------------------------------

/// All events emitted to the frontend via stdout as JSON lines.
///
/// Serialized as `{"event": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum AssistantEvent {
    Starting {},
    Loading { step: String },
    Ready {},
    /// Status line text, e.g. "Thinking ...".
    Status { status: String },
    MicStatus { active: bool },
    /// The user's line as shown on screen: `"<User> : <query>"`.
    Transcript { text: String },
    Response { text: String, source: String },
    /// Whole formatted chat history, sent once at startup.
    ChatHistory { text: String },
    Decision { tags: Vec<String> },
    ImageRequested { prompt: String },
    Error { message: String },
    Pong {},
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: UI -> assistant (stdin)
// ---------------------------------------------------------------------------

/// All commands received from the frontend via stdin as JSON lines.
///
/// Deserialized from `{"command": "<variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum AssistantCommand {
    /// Mic button clicked.
    ToggleListening {},
    /// Typed query; skips speech recognition.
    Query { text: String },
    SystemSpeak { text: String },
    Ping {},
    Stop {},
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for outgoing events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AssistantEvent);
}

/// Writes events to stdout as JSON lines.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: AssistantEvent) {
        bridge::emit_event(&event);
    }
}
