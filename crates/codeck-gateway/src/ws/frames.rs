//! Wire shapes for the `/ws` and `/internal/pty/:id` frame protocols.
//!
//! Frames are tagged JSON objects: `{"type": "...", ...fields}`. Inbound
//! and outbound frames are kept as separate enums since a connection
//! never needs to deserialize its own outgoing shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest `console:input` payload accepted before it is dropped silently.
pub const MAX_INPUT_BYTES: usize = 64 * 1024;

/// Frames a client may send on the operator-facing `/ws` connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "console:attach")]
    ConsoleAttach {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    #[serde(rename = "console:input")]
    ConsoleInput {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        data: String,
    },
    #[serde(rename = "console:resize")]
    ConsoleResize {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        cols: u16,
        rows: u16,
    },
}

/// Frames the gateway sends on the operator-facing `/ws` connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "status")]
    Status { authenticated: bool },
    #[serde(rename = "logs")]
    Logs { lines: Vec<String> },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "console:output")]
    ConsoleOutput {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        data: String,
    },
    #[serde(rename = "console:exit")]
    ConsoleExit {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
    },
    #[serde(rename = "console:error")]
    ConsoleError {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        error: String,
    },
}

/// Frames exchanged on the internal per-session PTY channel, where the
/// session id is bound to the URL path rather than carried in-frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InternalClientFrame {
    #[serde(rename = "console:input")]
    ConsoleInput { data: String },
    #[serde(rename = "console:resize")]
    ConsoleResize { cols: u16, rows: u16 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum InternalServerFrame {
    #[serde(rename = "console:output")]
    ConsoleOutput { data: String },
    #[serde(rename = "console:exit")]
    ConsoleExit {
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
    },
    #[serde(rename = "console:error")]
    ConsoleError { error: String },
}
