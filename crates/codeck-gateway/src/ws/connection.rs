//! The operator-facing `/ws` connection: one socket multiplexing
//! `status`/`logs`/`heartbeat` frames with the multi-session PTY
//! protocol (attach/input/resize/output/exit/error).

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use codeck_pty::types::Geometry;

use crate::state::SharedState;
use crate::ws::frames::{ClientFrame, ServerFrame, MAX_INPUT_BYTES};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

struct Attachment {
    forward: JoinHandle<()>,
    exit_watch: JoinHandle<()>,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.forward.abort();
        self.exit_watch.abort();
    }
}

/// Drive one operator WS connection until it closes.
pub async fn run(mut socket: WebSocket, state: SharedState, connection_id: Uuid, authenticated: bool) {
    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(256);
    let mut attachments: HashMap<Uuid, Attachment> = HashMap::new();

    if send_frame(&mut socket, &ServerFrame::Status { authenticated }).await.is_err() {
        return;
    }

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    heartbeat_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong {
                    tracing::debug!(%connection_id, "ws ping timeout, closing");
                    break;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
            _ = heartbeat_interval.tick() => {
                if send_frame(&mut socket, &ServerFrame::Heartbeat).await.is_err() {
                    break;
                }
            }
            Some(frame) = out_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                let Some(result) = incoming else { break };
                match result {
                    Ok(Message::Text(text)) => {
                        if !state.ws_rate_limits.check(connection_id) {
                            continue;
                        }
                        handle_client_frame(&state, connection_id, &text, &out_tx, &mut attachments).await;
                    }
                    Ok(Message::Pong(_)) => {
                        awaiting_pong = false;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }

    state.ws_rate_limits.forget(connection_id);
    for id in attachments.keys().copied().collect::<Vec<_>>() {
        let _ = state.pty.detach(id, connection_id);
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}

async fn handle_client_frame(
    state: &SharedState,
    connection_id: Uuid,
    text: &str,
    out_tx: &mpsc::Sender<ServerFrame>,
    attachments: &mut HashMap<Uuid, Attachment>,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed ws frame");
            return;
        }
    };

    match frame {
        ClientFrame::ConsoleAttach { session_id } => {
            attach(state, connection_id, session_id, out_tx, attachments).await;
        }
        ClientFrame::ConsoleInput { session_id, data } => {
            if data.len() > MAX_INPUT_BYTES {
                return;
            }
            if let Err(e) = state.pty.write_input(session_id, data.into_bytes()).await {
                let _ = out_tx
                    .send(ServerFrame::ConsoleError { session_id, error: e.to_string() })
                    .await;
            }
        }
        ClientFrame::ConsoleResize { session_id, cols, rows } => {
            let Ok(geometry) = Geometry::validate(cols, rows) else { return };
            if let Err(e) = state.pty.resize(session_id, connection_id, geometry) {
                let _ = out_tx
                    .send(ServerFrame::ConsoleError { session_id, error: e.to_string() })
                    .await;
            }
        }
    }
}

async fn attach(
    state: &SharedState,
    connection_id: Uuid,
    session_id: Uuid,
    out_tx: &mpsc::Sender<ServerFrame>,
    attachments: &mut HashMap<Uuid, Attachment>,
) {
    if attachments.contains_key(&session_id) {
        return;
    }

    let attach_result = state.pty.attach(session_id, connection_id, Geometry::INITIAL);
    let (initial, mut output_rx) = match attach_result {
        Ok(pair) => pair,
        Err(e) => {
            let _ = out_tx.send(ServerFrame::ConsoleError { session_id, error: e.to_string() }).await;
            return;
        }
    };

    if !initial.is_empty() {
        let data = String::from_utf8_lossy(&initial).into_owned();
        let _ = out_tx.send(ServerFrame::ConsoleOutput { session_id, data }).await;
    }

    let forward_tx = out_tx.clone();
    let forward = tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(bytes) => {
                    let data = String::from_utf8_lossy(&bytes).into_owned();
                    if forward_tx.send(ServerFrame::ConsoleOutput { session_id, data }).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let exit_tx = out_tx.clone();
    let mut exit_rx = match state.pty.subscribe_exit(session_id) {
        Ok(rx) => rx,
        Err(_) => {
            attachments.insert(session_id, Attachment { forward, exit_watch: tokio::spawn(async {}) });
            return;
        }
    };
    let exit_watch = tokio::spawn(async move {
        loop {
            if exit_rx.changed().await.is_err() {
                break;
            }
            if let Some(code) = *exit_rx.borrow() {
                let _ = exit_tx.send(ServerFrame::ConsoleExit { session_id, exit_code: Some(code) }).await;
                break;
            }
        }
    });

    attachments.insert(session_id, Attachment { forward, exit_watch });
}
